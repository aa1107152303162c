//! Collaborator traits the probe engines are written against.

use crate::{AddressFamily, ProbeError};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// How a transport expects outbound packets to be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    /// The kernel prepends the IP header; callers send bare ICMP messages.
    Icmp,
    /// Callers send full IPv4 packets (IP_HDRINCL). IPv6 sockets instead set
    /// IPV6_DONTFRAG and still take bare ICMPv6 messages.
    IcmpHeaderIncluded,
}

/// A raw ICMP socket handle serving one in-flight probe.
///
/// Received buffers are in the shape [`crate::AddressFamily`] dictates: IPv4
/// reads include the IP header, IPv6 reads start at the ICMPv6 header.
#[async_trait]
pub trait IcmpTransport: Send {
    /// Returns the address family this handle was opened for.
    fn family(&self) -> AddressFamily;

    /// Sets the hop limit of outgoing packets.
    ///
    /// Best effort: implementations log and swallow failures so the probe
    /// still goes out.
    fn set_hop_limit(&mut self, ttl: u8) -> Result<(), ProbeError>;

    /// Sends one packet to `dest`.
    async fn send_to(&mut self, packet: &[u8], dest: IpAddr) -> Result<(), ProbeError>;

    /// Waits for the next inbound packet until `deadline`.
    ///
    /// Returns `Err(ProbeError::Timeout)` once the deadline passes.
    async fn receive(&mut self, deadline: Instant) -> Result<(Vec<u8>, IpAddr), ProbeError>;

    /// Releases the underlying sockets.
    async fn close(&mut self) -> Result<(), ProbeError>;
}

/// Opens raw transports.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        family: AddressFamily,
        protocol: TransportProtocol,
    ) -> Result<Box<dyn IcmpTransport>, ProbeError>;

    /// Returns the source address the kernel would pick for `target`.
    ///
    /// Only IPv6 checksums need it; `None` is acceptable for IPv4.
    fn local_address_for(&self, target: IpAddr) -> Option<IpAddr>;
}

/// Hostname resolution.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `host` to one or more addresses.
    ///
    /// Never returns an empty list; no answer is `ProbeError::HostNotFound`.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError>;
}

/// Outcome label attached to a metrics sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failure,
}

impl OperationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Failure => "failure",
        }
    }
}

/// Records the outcome and duration of an operation.
pub trait MetricsRecorder: Send + Sync {
    fn record(&self, operation: &str, outcome: OperationOutcome, elapsed: Duration);
}

/// A recorder that drops every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record(&self, _operation: &str, _outcome: OperationOutcome, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(OperationOutcome::Success.as_str(), "success");
        assert_eq!(OperationOutcome::Failure.as_str(), "failure");
    }
}
