//! Core types, traits, and error handling for netprobe.
//!
//! This crate provides the fundamental abstractions shared by the probe
//! engines:
//!
//! - [`IcmpTransport`] and [`TransportFactory`] for raw socket access
//! - [`Resolver`] and [`MetricsRecorder`] collaborators
//! - [`ProbeError`] for error handling
//! - Result records and response bodies

pub mod context;
pub mod error;
pub mod params;
pub mod result;
pub mod sequence;
pub mod target;
pub mod traits;
pub mod types;

pub use context::ProbeContext;
pub use error::{ErrorBody, ProbeError, ProbeResult, RAW_SOCKET_PERMISSION_DENIED};
pub use params::{MtuParams, PingParams, ScanParams, TraceParams};
pub use result::{
    BurstStats, Envelope, MtuResponse, PingResponse, PortScanResponse, SmokepingResponse,
    SuspectedDestination, TraceResponse,
};
pub use sequence::SequenceCounter;
pub use target::resolve_target;
pub use traits::{
    IcmpTransport, MetricsRecorder, NoopMetrics, OperationOutcome, Resolver, TransportFactory,
    TransportProtocol,
};
pub use types::{
    duration_ms, AddressFamily, HopRecord, HopStatus, MtuTestResult, PingOutcome, PortScanResult,
    PortStatus, ProbeErrorKind, ProbeIds, ProbeTarget, ScanProtocol,
};
