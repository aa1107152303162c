//! ICMP echo request construction using pnet.

use crate::checksum::{icmpv6_checksum, internet_checksum};
use netprobe_core::{AddressFamily, ProbeError};
use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpType, IcmpTypes};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{Ipv4Flags, MutableIpv4Packet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Size of the ICMP echo header (type, code, checksum, identifier, sequence).
pub const ICMP_HEADER_LEN: usize = 8;

const ICMPV6_ECHO_REQUEST: u8 = 128;
const CRAFTED_TTL: u8 = 64;

/// Addresses a probe travels between.
///
/// The source is only needed for the ICMPv6 pseudo-header; when unknown the
/// unspecified address is used and the kernel's own checksum wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoRoute {
    pub source: Option<IpAddr>,
    pub destination: IpAddr,
}

impl EchoRoute {
    pub fn new(source: Option<IpAddr>, destination: IpAddr) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(self.destination)
    }

    fn v6_pair(&self) -> Result<(Ipv6Addr, Ipv6Addr), ProbeError> {
        let IpAddr::V6(dst) = self.destination else {
            return Err(ProbeError::Internal("expected an IPv6 destination".to_string()));
        };
        let src = match self.source {
            Some(IpAddr::V6(src)) => src,
            Some(IpAddr::V4(_)) => {
                return Err(ProbeError::Internal(
                    "IP version mismatch between source and destination".to_string(),
                ))
            }
            None => Ipv6Addr::UNSPECIFIED,
        };
        Ok((src, dst))
    }
}

/// Smallest packet the non-fragmentable builder produces for `family`:
/// the IP header plus a bare echo header.
pub fn min_packet_size(family: AddressFamily) -> u16 {
    (family.ip_header_len() + ICMP_HEADER_LEN) as u16
}

/// Creates an ICMP (v4 type 8) or ICMPv6 (type 128) echo request carrying
/// `payload_size` bytes of payload.
///
/// Returns the bare ICMP message; the kernel prepends the IP header.
pub fn build_echo_request(
    route: &EchoRoute,
    identifier: u16,
    sequence: u16,
    payload_size: usize,
) -> Result<Vec<u8>, ProbeError> {
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + payload_size];
    write_echo(&mut buffer, route, identifier, sequence)?;
    Ok(buffer)
}

/// Creates a probe of exactly `total_size` bytes on the wire that routers may
/// not fragment.
///
/// For IPv4 the result is a complete packet (20-byte header with DF set and
/// a fresh header checksum) meant for an IP_HDRINCL socket. For IPv6 it is
/// only the ICMPv6 echo, sized `total_size - 40`; the socket's IPV6_DONTFRAG
/// option forbids fragmentation. Sizes below [`min_packet_size`] are raised
/// to it.
pub fn build_non_fragmentable_packet(
    route: &EchoRoute,
    identifier: u16,
    sequence: u16,
    total_size: u16,
) -> Result<Vec<u8>, ProbeError> {
    let family = route.family();
    let total = total_size.max(min_packet_size(family)) as usize;

    match (route.source, route.destination) {
        (_, IpAddr::V6(_)) => {
            let mut buffer = vec![0u8; total - family.ip_header_len()];
            write_echo(&mut buffer, route, identifier, sequence)?;
            Ok(buffer)
        }
        (Some(IpAddr::V6(_)), IpAddr::V4(_)) => Err(ProbeError::Internal(
            "IP version mismatch between source and destination".to_string(),
        )),
        (source, IpAddr::V4(dst)) => {
            let src = match source {
                Some(IpAddr::V4(src)) => src,
                _ => Ipv4Addr::UNSPECIFIED,
            };
            build_ipv4_df_packet(src, dst, route, identifier, sequence, total)
        }
    }
}

fn build_ipv4_df_packet(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    route: &EchoRoute,
    identifier: u16,
    sequence: u16,
    total: usize,
) -> Result<Vec<u8>, ProbeError> {
    let header_len = AddressFamily::V4.ip_header_len();
    let mut buffer = vec![0u8; total];

    {
        let mut ip_packet = MutableIpv4Packet::new(&mut buffer)
            .ok_or_else(|| ProbeError::Internal("Failed to create IP packet".to_string()))?;

        ip_packet.set_version(4);
        ip_packet.set_header_length(5);
        ip_packet.set_total_length(total as u16);
        ip_packet.set_identification(identifier);
        ip_packet.set_flags(Ipv4Flags::DontFragment);
        ip_packet.set_ttl(CRAFTED_TTL);
        ip_packet.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        ip_packet.set_source(src);
        ip_packet.set_destination(dst);
    }

    let ip_checksum = internet_checksum(&buffer[..header_len]);
    buffer[10..12].copy_from_slice(&ip_checksum.to_be_bytes());

    write_echo(&mut buffer[header_len..], route, identifier, sequence)?;
    Ok(buffer)
}

/// Lays out an echo request over the whole of `buffer` and fills in its
/// checksum.
fn write_echo(
    buffer: &mut [u8],
    route: &EchoRoute,
    identifier: u16,
    sequence: u16,
) -> Result<(), ProbeError> {
    let family = route.family();
    {
        let mut echo = MutableEchoRequestPacket::new(buffer)
            .ok_or_else(|| ProbeError::Internal("Failed to create ICMP packet".to_string()))?;

        match family {
            AddressFamily::V4 => echo.set_icmp_type(IcmpTypes::EchoRequest),
            AddressFamily::V6 => echo.set_icmp_type(IcmpType::new(ICMPV6_ECHO_REQUEST)),
        }
        echo.set_icmp_code(IcmpCode::new(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_checksum(0);
    }

    for (i, byte) in buffer[ICMP_HEADER_LEN..].iter_mut().enumerate() {
        *byte = (i & 0xFF) as u8;
    }

    let checksum = match family {
        AddressFamily::V4 => internet_checksum(buffer),
        AddressFamily::V6 => {
            let (src, dst) = route.v6_pair()?;
            icmpv6_checksum(src, dst, buffer)
        }
    };
    buffer[2..4].copy_from_slice(&checksum.to_be_bytes());
    Ok(())
}
