//! Scripted transports for exercising the engines without raw sockets.
//!
//! A [`ScriptedFactory`] hands out transports that answer every sent probe
//! with the replies a user supplied closure returns. Replies are encoded as
//! real ICMP packets so they travel through the normal parser. An empty
//! reply list means silence: the next receive times out immediately.

use async_trait::async_trait;
use netprobe_core::{
    AddressFamily, IcmpTransport, ProbeError, TransportFactory, TransportProtocol,
};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// A probe handed to a scripted transport.
#[derive(Debug, Clone)]
pub struct SentProbe {
    pub family: AddressFamily,
    pub protocol: TransportProtocol,
    pub ttl: Option<u8>,
    pub dest: IpAddr,
    pub packet: Vec<u8>,
}

impl SentProbe {
    /// Size of the probe on the wire, IP header included.
    pub fn wire_size(&self) -> usize {
        match (self.family, self.protocol) {
            (AddressFamily::V4, TransportProtocol::IcmpHeaderIncluded) => self.packet.len(),
            (family, _) => self.packet.len() + family.ip_header_len(),
        }
    }

    /// The ICMP echo request inside the packet.
    pub fn echo(&self) -> &[u8] {
        match (self.family, self.protocol) {
            (AddressFamily::V4, TransportProtocol::IcmpHeaderIncluded) => &self.packet[20..],
            _ => &self.packet,
        }
    }

    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes([self.echo()[6], self.echo()[7]])
    }
}

/// An answer to a sent probe.
#[derive(Debug, Clone)]
pub enum Reply {
    EchoReply { from: IpAddr },
    TimeExceeded { from: IpAddr },
    Unreachable { from: IpAddr },
    PacketTooBig { from: IpAddr, mtu: u16 },
    /// An echo reply for somebody else's probe.
    Foreign { from: IpAddr },
    /// Fail the send with this OS error message.
    SendError(String),
}

type Responder = dyn Fn(&SentProbe) -> Vec<Reply> + Send + Sync;

/// [`TransportFactory`] whose transports follow a script.
#[derive(Clone)]
pub struct ScriptedFactory {
    responder: Arc<Responder>,
    deny: bool,
    sent: Arc<Mutex<Vec<SentProbe>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&SentProbe) -> Vec<Reply> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            deny: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A network that never answers.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// A process without raw socket privileges.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::silent()
        }
    }

    /// Every probe sent so far, in order.
    pub fn sent(&self) -> Vec<SentProbe> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn open(
        &self,
        family: AddressFamily,
        protocol: TransportProtocol,
    ) -> Result<Box<dyn IcmpTransport>, ProbeError> {
        if self.deny {
            return Err(ProbeError::permission_denied(&std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTransport {
            factory: self.clone(),
            family,
            protocol,
            ttl: None,
            inbox: VecDeque::new(),
            closed: false,
        }))
    }

    fn local_address_for(&self, _target: IpAddr) -> Option<IpAddr> {
        None
    }
}

struct ScriptedTransport {
    factory: ScriptedFactory,
    family: AddressFamily,
    protocol: TransportProtocol,
    ttl: Option<u8>,
    inbox: VecDeque<(Vec<u8>, IpAddr)>,
    closed: bool,
}

#[async_trait]
impl IcmpTransport for ScriptedTransport {
    fn family(&self) -> AddressFamily {
        self.family
    }

    fn set_hop_limit(&mut self, ttl: u8) -> Result<(), ProbeError> {
        self.ttl = Some(ttl);
        Ok(())
    }

    async fn send_to(&mut self, packet: &[u8], dest: IpAddr) -> Result<(), ProbeError> {
        let probe = SentProbe {
            family: self.family,
            protocol: self.protocol,
            ttl: self.ttl,
            dest,
            packet: packet.to_vec(),
        };
        self.factory
            .sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(probe.clone());

        for reply in (self.factory.responder)(&probe) {
            match reply {
                Reply::SendError(message) => {
                    return Err(ProbeError::SendFailed(std::io::Error::other(message)));
                }
                other => self.inbox.extend(encode_reply(&probe, &other)),
            }
        }
        Ok(())
    }

    async fn receive(&mut self, _deadline: Instant) -> Result<(Vec<u8>, IpAddr), ProbeError> {
        self.inbox.pop_front().ok_or(ProbeError::Timeout)
    }

    async fn close(&mut self) -> Result<(), ProbeError> {
        if !self.closed {
            self.closed = true;
            self.factory.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn encode_reply(probe: &SentProbe, reply: &Reply) -> Option<(Vec<u8>, IpAddr)> {
    let echo = probe.echo();
    let v6 = probe.family == AddressFamily::V6;

    let (from, message) = match reply {
        Reply::EchoReply { from } | Reply::Foreign { from } => {
            let mut message = echo.to_vec();
            message[0] = if v6 { 129 } else { 0 };
            if matches!(reply, Reply::Foreign { .. }) {
                message[4] ^= 0xFF;
            }
            (*from, message)
        }
        Reply::TimeExceeded { from } => {
            let header = if v6 { [3, 0] } else { [11, 0] };
            (*from, error_message(probe, header, [0; 4]))
        }
        Reply::Unreachable { from } => {
            let header = if v6 { [1, 0] } else { [3, 1] };
            (*from, error_message(probe, header, [0; 4]))
        }
        Reply::PacketTooBig { from, mtu } => {
            let [hi, lo] = mtu.to_be_bytes();
            let message = if v6 {
                error_message(probe, [2, 0], [0, 0, hi, lo])
            } else {
                error_message(probe, [3, 4], [0, 0, hi, lo])
            };
            (*from, message)
        }
        Reply::SendError(_) => return None,
    };

    if v6 {
        Some((message, from))
    } else {
        let mut packet = ipv4_header(1, message.len());
        packet.extend_from_slice(&message);
        Some((packet, from))
    }
}

/// Builds an ICMP error quoting the probe's IP header and first 8 echo bytes.
fn error_message(probe: &SentProbe, type_code: [u8; 2], rest: [u8; 4]) -> Vec<u8> {
    let mut message = vec![type_code[0], type_code[1], 0, 0];
    message.extend_from_slice(&rest);

    let echo = probe.echo();
    if probe.family == AddressFamily::V6 {
        let mut quoted = vec![0x60, 0, 0, 0];
        quoted.extend_from_slice(&(echo.len() as u16).to_be_bytes());
        quoted.extend_from_slice(&[58, 1]);
        quoted.extend_from_slice(&[0u8; 32]);
        message.extend_from_slice(&quoted);
    } else {
        message.extend_from_slice(&ipv4_header(1, echo.len()));
    }
    message.extend_from_slice(&echo[..8]);
    message
}

fn ipv4_header(protocol: u8, payload_len: usize) -> Vec<u8> {
    let total = (20 + payload_len) as u16;
    let mut header = vec![0x45, 0, 0, 0, 0, 0, 0x40, 0, 64, protocol, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    header[2..4].copy_from_slice(&total.to_be_bytes());
    header
}
