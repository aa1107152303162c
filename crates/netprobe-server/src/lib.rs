//! HTTP API server for netprobe.

mod handlers;
mod metrics;
mod resolver;

pub use handlers::{create_router, AppState, EngineParams};
pub use metrics::TracingMetrics;
pub use resolver::CachingResolver;

/// Default server port (IANA Remote Traceroute).
pub const DEFAULT_PORT: u16 = 3765;
