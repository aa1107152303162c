//! Port scanning for netprobe.
//!
//! TCP ports are classified by a plain connect. UDP ports get a payload the
//! service on that port is likely to answer; silence stays ambiguous and is
//! reported as `open|filtered`.

pub mod payloads;
pub mod ports;
pub mod scan;
pub mod services;
pub mod tcp;
pub mod udp;

pub use ports::{common_ports, parse_ports, ScanMethod};
pub use scan::scan_ports;
pub use services::{service_info, ServiceInfo};
