//! ICMP probe engines for netprobe.
//!
//! All engines share [`exchange::probe_once`], which sends one echo request
//! on a fresh transport and waits for the first matching answer.

pub mod exchange;
pub mod mtu;
pub mod ping;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traceroute;

pub use exchange::{probe_once, ExchangeOutcome, PacketShape, ProbeRequest};
pub use mtu::{discover_mtu, discover_target_mtu};
pub use ping::{outcome_error, ping, ping_burst, ping_target};
pub use traceroute::{trace_target, traceroute};
