//! Raw ICMP sockets.
//!
//! Each [`RawTransport`] owns the sockets of exactly one in-flight probe.
//! Receives run on the blocking pool with a read timeout equal to the time
//! left until the caller's deadline.

use async_trait::async_trait;
use netprobe_core::{AddressFamily, IcmpTransport, ProbeError, TransportFactory, TransportProtocol};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const RECV_BUFFER_LEN: usize = 65536;

/// Shortest read timeout handed to the kernel. socket2 truncates to whole
/// microseconds and a zero timeval means "no timeout".
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// IPV6_DONTFRAG on Linux and macOS.
const IPV6_DONTFRAG: libc::c_int = 62;

/// Raw socket handle implementing [`IcmpTransport`].
pub struct RawTransport {
    family: AddressFamily,
    send: Option<Arc<Socket>>,
    /// Separate receive socket when the send socket takes full IP packets.
    recv: Option<Arc<Socket>>,
    hop_limit_failed: bool,
}

impl RawTransport {
    /// Opens the sockets for one probe.
    pub fn open(family: AddressFamily, protocol: TransportProtocol) -> Result<Self, ProbeError> {
        let (send, recv) = match (family, protocol) {
            (AddressFamily::V4, TransportProtocol::Icmp) => {
                (raw_socket(Domain::IPV4, Protocol::ICMPV4)?, None)
            }
            (AddressFamily::V6, TransportProtocol::Icmp) => {
                (raw_socket(Domain::IPV6, Protocol::ICMPV6)?, None)
            }
            (AddressFamily::V4, TransportProtocol::IcmpHeaderIncluded) => {
                let send = raw_socket(Domain::IPV4, Protocol::from(libc::IPPROTO_RAW))?;
                set_int_option(&send, libc::IPPROTO_IP, libc::IP_HDRINCL, 1)
                    .map_err(ProbeError::SocketCreation)?;
                let recv = raw_socket(Domain::IPV4, Protocol::ICMPV4)?;
                (send, Some(Arc::new(recv)))
            }
            (AddressFamily::V6, TransportProtocol::IcmpHeaderIncluded) => {
                let socket = raw_socket(Domain::IPV6, Protocol::ICMPV6)?;
                set_int_option(&socket, libc::IPPROTO_IPV6, IPV6_DONTFRAG, 1)
                    .map_err(ProbeError::SocketCreation)?;
                (socket, None)
            }
        };

        debug!(family = %family, protocol = ?protocol, "Opened raw socket");
        Ok(Self {
            family,
            send: Some(Arc::new(send)),
            recv,
            hop_limit_failed: false,
        })
    }

    /// Returns true if the last hop limit could not be applied.
    pub fn hop_limit_failed(&self) -> bool {
        self.hop_limit_failed
    }

    fn send_socket(&self) -> Result<&Arc<Socket>, ProbeError> {
        self.send
            .as_ref()
            .ok_or_else(|| ProbeError::Internal("transport already closed".to_string()))
    }

    fn recv_socket(&self) -> Result<Arc<Socket>, ProbeError> {
        match &self.recv {
            Some(recv) => Ok(Arc::clone(recv)),
            None => self.send_socket().map(Arc::clone),
        }
    }
}

fn raw_socket(domain: Domain, protocol: Protocol) -> Result<Socket, ProbeError> {
    Socket::new(domain, Type::RAW, Some(protocol)).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ProbeError::permission_denied(&e)
        } else {
            ProbeError::SocketCreation(e)
        }
    })
}

fn set_int_option(
    socket: &Socket,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> std::io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            name,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of_val(&value) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the read timeout left before `deadline`, or `None` when too little
/// time remains to wait at all.
fn read_timeout(deadline: Instant, now: Instant) -> Option<Duration> {
    Some(deadline.saturating_duration_since(now)).filter(|left| *left >= MIN_READ_TIMEOUT)
}

/// Reads one packet, blocking for at most `remaining`.
fn recv_blocking(
    socket: &Socket,
    remaining: Duration,
) -> Result<(Vec<u8>, IpAddr), ProbeError> {
    socket.set_read_timeout(Some(remaining))?;

    let mut buf = vec![MaybeUninit::<u8>::uninit(); RECV_BUFFER_LEN];
    let (n, from) = socket.recv_from(&mut buf)?;

    // SAFETY: recv_from initialized the first n bytes.
    let bytes: Vec<u8> = buf[..n].iter().map(|b| unsafe { b.assume_init() }).collect();
    let source = from
        .as_socket()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Internal("received packet without an IP source".to_string()))?;

    Ok((bytes, source))
}

#[async_trait]
impl IcmpTransport for RawTransport {
    fn family(&self) -> AddressFamily {
        self.family
    }

    fn set_hop_limit(&mut self, ttl: u8) -> Result<(), ProbeError> {
        let socket = self.send_socket()?;
        let ttl_value = ttl as u32;

        let result = match self.family {
            AddressFamily::V4 => socket.set_ttl(ttl_value).or_else(|primary| {
                trace!(error = %primary, "IP_TTL rejected, trying IP_MULTICAST_TTL");
                socket.set_multicast_ttl_v4(ttl_value)
            }),
            AddressFamily::V6 => socket.set_unicast_hops_v6(ttl_value).or_else(|primary| {
                trace!(error = %primary, "IPV6_UNICAST_HOPS rejected, trying IPV6_MULTICAST_HOPS");
                socket.set_multicast_hops_v6(ttl_value)
            }),
        };

        self.hop_limit_failed = result.is_err();
        if let Err(e) = result {
            warn!(ttl = ttl, error = %e, "Failed to set hop limit, sending with the default");
        }
        Ok(())
    }

    async fn send_to(&mut self, packet: &[u8], dest: IpAddr) -> Result<(), ProbeError> {
        let socket = self.send_socket()?;
        let addr = SockAddr::from(SocketAddr::new(dest, 0));
        socket
            .send_to(packet, &addr)
            .map_err(ProbeError::SendFailed)?;
        trace!(ip = %dest, len = packet.len(), "Sent packet");
        Ok(())
    }

    async fn receive(&mut self, deadline: Instant) -> Result<(Vec<u8>, IpAddr), ProbeError> {
        let Some(remaining) = read_timeout(deadline, Instant::now()) else {
            return Err(ProbeError::Timeout);
        };

        let socket = self.recv_socket()?;
        tokio::task::spawn_blocking(move || recv_blocking(&socket, remaining))
            .await
            .map_err(|e| ProbeError::Internal(format!("receive task failed: {}", e)))?
    }

    async fn close(&mut self) -> Result<(), ProbeError> {
        self.send = None;
        self.recv = None;
        Ok(())
    }
}

/// Opens [`RawTransport`]s; the production [`TransportFactory`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RawSocketFactory;

#[async_trait]
impl TransportFactory for RawSocketFactory {
    async fn open(
        &self,
        family: AddressFamily,
        protocol: TransportProtocol,
    ) -> Result<Box<dyn IcmpTransport>, ProbeError> {
        Ok(Box::new(RawTransport::open(family, protocol)?))
    }

    fn local_address_for(&self, target: IpAddr) -> Option<IpAddr> {
        local_address_for(target)
    }
}

/// Returns the source address the kernel picks to reach `target`.
///
/// Connecting a UDP socket sends nothing but runs the route lookup.
pub fn local_address_for(target: IpAddr) -> Option<IpAddr> {
    let socket = match target {
        IpAddr::V4(_) => std::net::UdpSocket::bind("0.0.0.0:0"),
        IpAddr::V6(_) => std::net::UdpSocket::bind("[::]:0"),
    }
    .ok()?;

    socket.connect(SocketAddr::new(target, 33434)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
