//! UDP probing.

use crate::payloads::udp_payload;
use netprobe_core::{PortStatus, ProbeError};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

/// Classifies `port` by sending it a service-specific datagram.
///
/// Any reply means `open`. An ICMP port unreachable surfaces as
/// `ConnectionRefused` on the connected socket and means `closed`. Silence
/// cannot tell a listening service from a filter, so it is `open|filtered`.
///
/// Only local socket setup failures are returned as errors.
pub async fn probe_udp(
    addr: IpAddr,
    port: u16,
    reply_timeout: Duration,
) -> Result<PortStatus, ProbeError> {
    let bind_addr = match addr {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(ProbeError::SocketCreation)?;
    socket
        .connect(SocketAddr::new(addr, port))
        .await
        .map_err(ProbeError::SocketCreation)?;

    if let Err(e) = socket.send(udp_payload(port)).await {
        trace!(port = port, error = %e, "Send failed");
        return Ok(PortStatus::Closed);
    }

    let mut buf = [0u8; 2048];
    let status = match timeout(reply_timeout, socket.recv(&mut buf)).await {
        Ok(Ok(len)) => {
            trace!(port = port, len = len, "Got reply");
            PortStatus::Open
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => PortStatus::Closed,
        Ok(Err(e)) => {
            trace!(port = port, error = %e, "Receive failed");
            PortStatus::Closed
        }
        Err(_) => PortStatus::OpenFiltered,
    };
    Ok(status)
}
