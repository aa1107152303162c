//! Single request/answer exchange shared by all ICMP engines.

use netprobe_core::{
    IcmpTransport, ProbeError, ProbeIds, TransportFactory, TransportProtocol,
};
use netprobe_packets::{
    build_echo_request, build_non_fragmentable_packet, parse_icmp_message, EchoRoute, IcmpKind,
};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Shape of the probe packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketShape {
    /// Plain echo request with the given payload size.
    Echo { payload_size: usize },
    /// Echo request that may not be fragmented, `total_size` bytes on the wire.
    NonFragmentable { total_size: u16 },
}

/// One probe to send.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub target: IpAddr,
    pub ids: ProbeIds,
    /// Hop limit to apply, or the system default.
    pub ttl: Option<u8>,
    pub shape: PacketShape,
    pub timeout: Duration,
}

/// How a single exchange ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// Echo reply from the target.
    Replied { rtt: Duration },
    /// A router dropped the probe because its hop limit ran out.
    TimeExceeded { hop: IpAddr, rtt: Duration },
    /// Destination unreachable.
    Unreachable { hop: IpAddr, code: u8, rtt: Duration },
    /// The probe was too large for a link on the path.
    PacketTooBig { hop: IpAddr, mtu: Option<u16> },
    /// No matching answer before the deadline.
    TimedOut,
    /// The socket refused to send the probe.
    SendFailed { message: String },
}

/// Sends one probe and waits for the first matching answer.
///
/// A fresh transport is opened for the exchange and closed on every exit
/// path. Errors are only returned when the transport cannot be used at all;
/// everything the network says is an [`ExchangeOutcome`].
pub async fn probe_once(
    transports: &dyn TransportFactory,
    request: &ProbeRequest,
) -> Result<ExchangeOutcome, ProbeError> {
    let family = netprobe_core::AddressFamily::of(request.target);
    let protocol = match request.shape {
        PacketShape::Echo { .. } => TransportProtocol::Icmp,
        PacketShape::NonFragmentable { .. } => TransportProtocol::IcmpHeaderIncluded,
    };

    let mut transport = transports.open(family, protocol).await?;
    let route = EchoRoute::new(transports.local_address_for(request.target), request.target);
    let result = exchange(transport.as_mut(), &route, request).await;

    if let Err(e) = transport.close().await {
        warn!(error = %e, "Failed to close transport");
    }
    result
}

async fn exchange(
    transport: &mut dyn IcmpTransport,
    route: &EchoRoute,
    request: &ProbeRequest,
) -> Result<ExchangeOutcome, ProbeError> {
    let ids = request.ids;
    let packet = match request.shape {
        PacketShape::Echo { payload_size } => {
            build_echo_request(route, ids.identifier, ids.sequence, payload_size)?
        }
        PacketShape::NonFragmentable { total_size } => {
            build_non_fragmentable_packet(route, ids.identifier, ids.sequence, total_size)?
        }
    };

    if let Some(ttl) = request.ttl {
        transport.set_hop_limit(ttl)?;
    }

    let send_time = Instant::now();
    let deadline = send_time + request.timeout;

    debug!(ip = %request.target, ttl = ?request.ttl, id = ids.identifier, seq = ids.sequence, len = packet.len(), "Sending probe");
    match transport.send_to(&packet, request.target).await {
        Ok(()) => {}
        Err(ProbeError::SendFailed(e)) => {
            debug!(ip = %request.target, error = %e, "Send failed");
            return Ok(ExchangeOutcome::SendFailed {
                message: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    }

    loop {
        let (bytes, source) = match transport.receive(deadline).await {
            Ok(received) => received,
            Err(ProbeError::Timeout) => {
                debug!(ip = %request.target, seq = ids.sequence, "Timeout waiting for response");
                return Ok(ExchangeOutcome::TimedOut);
            }
            Err(e) => return Err(e),
        };

        if source.is_loopback() && !request.target.is_loopback() {
            trace!(src = %source, "Ignored packet from loopback");
            continue;
        }

        let Some(message) = parse_icmp_message(transport.family(), &bytes) else {
            trace!(src = %source, len = bytes.len(), "Ignored unrelated packet");
            continue;
        };

        if message.identifier != ids.identifier || message.sequence != ids.sequence {
            trace!(
                expected_id = ids.identifier,
                actual_id = message.identifier,
                expected_seq = ids.sequence,
                actual_seq = message.sequence,
                "Ignored ICMP packet with different ids"
            );
            continue;
        }

        let rtt = send_time.elapsed();
        match message.kind {
            IcmpKind::EchoRequest => continue,
            IcmpKind::EchoReply if source == request.target => {
                return Ok(ExchangeOutcome::Replied { rtt });
            }
            IcmpKind::EchoReply => {
                trace!(src = %source, "Ignored echo reply from another host");
                continue;
            }
            IcmpKind::TimeExceeded => {
                return Ok(ExchangeOutcome::TimeExceeded { hop: source, rtt });
            }
            IcmpKind::DestinationUnreachable => {
                return Ok(ExchangeOutcome::Unreachable {
                    hop: source,
                    code: message.code,
                    rtt,
                });
            }
            IcmpKind::PacketTooBig => {
                return Ok(ExchangeOutcome::PacketTooBig {
                    hop: source,
                    mtu: message.next_hop_mtu,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedFactory};

    fn request(target: &str) -> ProbeRequest {
        ProbeRequest {
            target: target.parse().unwrap(),
            ids: ProbeIds {
                identifier: 0x1111,
                sequence: 4,
            },
            ttl: Some(12),
            shape: PacketShape::Echo { payload_size: 16 },
            timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_reply_from_target() {
        let factory = ScriptedFactory::new(|sent| vec![Reply::EchoReply { from: sent.dest }]);
        let outcome = probe_once(&factory, &request("192.0.2.10")).await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Replied { .. }));
        assert_eq!(factory.sent()[0].ttl, Some(12));
        assert_eq!(factory.open_count(), factory.close_count());
    }

    #[tokio::test]
    async fn test_skips_foreign_and_loopback_packets() {
        let factory = ScriptedFactory::new(|sent| {
            vec![
                Reply::Foreign { from: sent.dest },
                Reply::EchoReply {
                    from: "127.0.0.1".parse().unwrap(),
                },
                Reply::TimeExceeded {
                    from: "10.1.1.1".parse().unwrap(),
                },
            ]
        });
        let outcome = probe_once(&factory, &request("192.0.2.10")).await.unwrap();
        match outcome {
            ExchangeOutcome::TimeExceeded { hop, .. } => {
                assert_eq!(hop, "10.1.1.1".parse::<IpAddr>().unwrap())
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let factory = ScriptedFactory::silent();
        let outcome = probe_once(&factory, &request("2001:db8::1")).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::TimedOut);
        assert_eq!(factory.close_count(), 1);
    }

    #[tokio::test]
    async fn test_send_error_is_an_outcome() {
        let factory = ScriptedFactory::new(|_| vec![Reply::SendError("Message too long".into())]);
        let outcome = probe_once(&factory, &request("192.0.2.10")).await.unwrap();
        match outcome {
            ExchangeOutcome::SendFailed { message } => assert!(message.contains("too long")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(factory.close_count(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_propagates() {
        let factory = ScriptedFactory::denied();
        let err = probe_once(&factory, &request("192.0.2.10")).await.unwrap_err();
        assert_eq!(err.name(), "PermissionDenied");
    }
}
