//! ICMP response parsing.
//!
//! Raw IPv4 sockets deliver the IP header in front of the ICMP message while
//! raw ICMPv6 sockets deliver only the ICMPv6 message, so the entry point
//! takes the family to know where the message starts. Error messages quote
//! the offending packet; the identifier and sequence reported for them are
//! those of the quoted echo request.

use crate::builder::ICMP_HEADER_LEN;
use netprobe_core::AddressFamily;
use pnet_packet::icmp::IcmpPacket;
use pnet_packet::ipv4::Ipv4Packet;

const ICMP_PROTOCOL: u8 = 1;
const ICMPV6_NEXT_HEADER: u8 = 58;
const IPV6_HEADER_LEN: usize = 40;

/// Classification of a parsed ICMP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoReply,
    /// Our own request, looped back by the kernel on some platforms.
    EchoRequest,
    TimeExceeded,
    DestinationUnreachable,
    /// ICMPv6 packet too big, or ICMPv4 fragmentation needed with DF set.
    PacketTooBig,
}

/// A parsed ICMP message relevant to an echo probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpMessage {
    pub icmp_type: u8,
    pub code: u8,
    pub kind: IcmpKind,
    /// Identifier of the echo (or of the quoted echo for error messages).
    pub identifier: u16,
    /// Sequence of the echo (or of the quoted echo for error messages).
    pub sequence: u16,
    /// Next-hop MTU announced by a packet-too-big answer, when non-zero.
    pub next_hop_mtu: Option<u16>,
}

/// Parses a raw buffer received on an ICMP socket of the given family.
///
/// Returns `None` on truncated input, on message types that are not related
/// to echo probes, and on error messages that do not quote an echo request.
pub fn parse_icmp_message(family: AddressFamily, raw: &[u8]) -> Option<IcmpMessage> {
    match family {
        AddressFamily::V4 => {
            let ip = Ipv4Packet::new(raw)?;
            let header_len = ip.get_header_length() as usize * 4;
            if header_len < 20 {
                return None;
            }
            parse_icmpv4(raw.get(header_len..)?)
        }
        AddressFamily::V6 => parse_icmpv6(raw),
    }
}

fn parse_icmpv4(message: &[u8]) -> Option<IcmpMessage> {
    if message.len() < ICMP_HEADER_LEN {
        return None;
    }
    let icmp = IcmpPacket::new(message)?;
    let icmp_type = icmp.get_icmp_type().0;
    let code = icmp.get_icmp_code().0;

    let kind = match (icmp_type, code) {
        (0, _) => IcmpKind::EchoReply,
        (8, _) => IcmpKind::EchoRequest,
        (11, _) => IcmpKind::TimeExceeded,
        (3, 4) => IcmpKind::PacketTooBig,
        (3, _) => IcmpKind::DestinationUnreachable,
        _ => return None,
    };

    let (identifier, sequence, next_hop_mtu) = match kind {
        IcmpKind::EchoReply | IcmpKind::EchoRequest => {
            let (id, seq) = echo_ids(message)?;
            (id, seq, None)
        }
        _ => {
            let (id, seq) = quoted_ipv4_echo(&message[ICMP_HEADER_LEN..])?;
            let mtu = (kind == IcmpKind::PacketTooBig)
                .then(|| be_u16(message, 6))
                .flatten()
                .filter(|mtu| *mtu > 0);
            (id, seq, mtu)
        }
    };

    Some(IcmpMessage {
        icmp_type,
        code,
        kind,
        identifier,
        sequence,
        next_hop_mtu,
    })
}

fn parse_icmpv6(message: &[u8]) -> Option<IcmpMessage> {
    if message.len() < ICMP_HEADER_LEN {
        return None;
    }
    let icmp_type = message[0];
    let code = message[1];

    let kind = match icmp_type {
        129 => IcmpKind::EchoReply,
        128 => IcmpKind::EchoRequest,
        3 => IcmpKind::TimeExceeded,
        1 => IcmpKind::DestinationUnreachable,
        2 => IcmpKind::PacketTooBig,
        _ => return None,
    };

    let (identifier, sequence, next_hop_mtu) = match kind {
        IcmpKind::EchoReply | IcmpKind::EchoRequest => {
            let (id, seq) = echo_ids(message)?;
            (id, seq, None)
        }
        _ => {
            let (id, seq) = quoted_ipv6_echo(&message[ICMP_HEADER_LEN..])?;
            let mtu = if kind == IcmpKind::PacketTooBig {
                let raw = u32::from_be_bytes([message[4], message[5], message[6], message[7]]);
                Some(raw.min(u16::MAX as u32) as u16).filter(|mtu| *mtu > 0)
            } else {
                None
            };
            (id, seq, mtu)
        }
    };

    Some(IcmpMessage {
        icmp_type,
        code,
        kind,
        identifier,
        sequence,
        next_hop_mtu,
    })
}

/// Extracts the echo ids from the packet an ICMPv4 error quotes.
fn quoted_ipv4_echo(quoted: &[u8]) -> Option<(u16, u16)> {
    let ip = Ipv4Packet::new(quoted)?;
    let header_len = ip.get_header_length() as usize * 4;
    if header_len < 20 || ip.get_next_level_protocol().0 != ICMP_PROTOCOL {
        return None;
    }
    let echo = quoted.get(header_len..)?;
    if echo.first() != Some(&8) {
        return None;
    }
    echo_ids(echo)
}

/// Extracts the echo ids from the packet an ICMPv6 error quotes.
fn quoted_ipv6_echo(quoted: &[u8]) -> Option<(u16, u16)> {
    if quoted.len() < IPV6_HEADER_LEN || quoted[0] >> 4 != 6 {
        return None;
    }
    if quoted[6] != ICMPV6_NEXT_HEADER {
        return None;
    }
    let echo = &quoted[IPV6_HEADER_LEN..];
    if echo.first() != Some(&128) {
        return None;
    }
    echo_ids(echo)
}

fn echo_ids(echo: &[u8]) -> Option<(u16, u16)> {
    Some((be_u16(echo, 4)?, be_u16(echo, 6)?))
}

fn be_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}
