//! Core types for probe operations.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// IP protocol family of a probe target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Returns the family of the given address.
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Size of the fixed IP header the kernel attaches for this family.
    pub fn ip_header_len(self) -> usize {
        match self {
            AddressFamily::V4 => 20,
            AddressFamily::V6 => 40,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "ipv4"),
            AddressFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// A resolved probe destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Address the probes are sent to.
    pub addr: IpAddr,
    /// Family of `addr`.
    pub family: AddressFamily,
    /// Host as given by the caller.
    pub input: String,
}

impl ProbeTarget {
    pub fn new(addr: IpAddr, input: impl Into<String>) -> Self {
        Self {
            addr,
            family: AddressFamily::of(addr),
            input: input.into(),
        }
    }
}

/// Identifier/sequence pair stamped on an echo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeIds {
    pub identifier: u16,
    pub sequence: u16,
}

impl ProbeIds {
    /// Returns the ids of the `offset`-th probe of a multi-probe run.
    pub fn nth(self, offset: u16) -> Self {
        Self {
            identifier: self.identifier,
            sequence: self.sequence.wrapping_add(offset),
        }
    }
}

/// Why a single probe attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeErrorKind {
    None,
    TtlExpired,
    Unreachable,
    Timeout,
    PermissionDenied,
    SendError,
    PacketTooBig,
}

/// Result of one echo round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingOutcome {
    pub alive: bool,
    pub round_trip_ms: Option<f64>,
    pub error_kind: ProbeErrorKind,
    pub responding_hop_address: Option<IpAddr>,
    /// Human readable detail for failed attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PingOutcome {
    pub fn replied(rtt: Duration) -> Self {
        Self {
            alive: true,
            round_trip_ms: Some(duration_ms(rtt)),
            error_kind: ProbeErrorKind::None,
            responding_hop_address: None,
            message: None,
        }
    }

    pub fn failed(kind: ProbeErrorKind, hop: Option<IpAddr>, message: impl Into<String>) -> Self {
        Self {
            alive: false,
            round_trip_ms: None,
            error_kind: kind,
            responding_hop_address: hop,
            message: Some(message.into()),
        }
    }
}

/// Status of a single traceroute hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopStatus {
    Reached,
    Intermediate,
    Timeout,
    Error,
}

/// One traceroute step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopRecord {
    pub hop_number: u8,
    pub responding_address: Option<IpAddr>,
    pub round_trip_ms: Option<f64>,
    pub status: HopStatus,
}

/// Outcome of sending one packet of a given size during MTU discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MtuTestResult {
    pub packet_size: u16,
    pub succeeded: bool,
    pub round_trip_ms: Option<f64>,
    pub error_kind: ProbeErrorKind,
}

/// Transport protocol of a port scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanProtocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for ScanProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanProtocol::Tcp => write!(f, "tcp"),
            ScanProtocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for ScanProtocol {
    type Err = crate::ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(ScanProtocol::Tcp),
            "udp" => Ok(ScanProtocol::Udp),
            _ => Err(crate::ProbeError::InvalidInput(format!(
                "unsupported protocol: {}",
                s
            ))),
        }
    }
}

/// Terminal state of one scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "closed")]
    Closed,
    /// UDP silence: the port may be open or the probe may have been dropped.
    #[serde(rename = "open|filtered")]
    OpenFiltered,
}

/// Result for one scanned port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortScanResult {
    pub port: u16,
    pub protocol: ScanProtocol,
    pub status: PortStatus,
    pub service_name: Option<String>,
    pub security_risk: Option<String>,
}

/// Converts a duration into fractional milliseconds.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
