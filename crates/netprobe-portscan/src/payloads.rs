//! UDP probe payloads.
//!
//! An empty datagram rarely gets an answer, so each well-known port gets a
//! request its service is expected to reply to.

/// Standard DNS query: `A example.com`, recursion desired.
const DNS_QUERY: &[u8] = &[
    0x4e, 0x50, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x',
    b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
];

/// NTPv3 client request.
const NTP_REQUEST: &[u8] = &{
    let mut packet = [0u8; 48];
    packet[0] = 0x1b;
    packet
};

/// SNMPv1 GetRequest for sysDescr.0 with community `public`.
const SNMP_GET: &[u8] = &[
    0x30, 0x29, 0x02, 0x01, 0x00, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa0, 0x1c,
    0x02, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0e, 0x30,
    0x0c, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x05, 0x00,
];

/// NetBIOS node status request for the wildcard name.
const NETBIOS_STATUS: &[u8] = &[
    0x80, 0xf0, 0x00, 0x10, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, b'C', b'K',
    b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A',
    b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A', b'A',
    0x00, 0x00, 0x21, 0x00, 0x01,
];

const SSDP_SEARCH: &[u8] = b"M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:1900\r\n\
MAN: \"ssdp:discover\"\r\n\
MX: 1\r\n\
ST: ssdp:all\r\n\r\n";

/// mDNS PTR query for `_services._dns-sd._udp.local`.
const MDNS_SERVICES: &[u8] = &[
    0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, b'_', b's',
    b'e', b'r', b'v', b'i', b'c', b'e', b's', 0x07, b'_', b'd', b'n', b's', b'-', b's', b'd',
    0x04, b'_', b'u', b'd', b'p', 0x05, b'l', b'o', b'c', b'a', b'l', 0x00, 0x00, 0x0c, 0x00,
    0x01,
];

/// TFTP read request. Servers answer with data or an error packet.
const TFTP_READ: &[u8] = b"\x00\x01netprobe.txt\x00octet\x00";

const SIP_OPTIONS: &[u8] = b"OPTIONS sip:nm SIP/2.0\r\n\
Via: SIP/2.0/UDP nm;branch=z9hG4bK-netprobe;rport\r\n\
Max-Forwards: 70\r\n\
To: <sip:nm@nm>\r\n\
From: <sip:nm@nm>;tag=netprobe\r\n\
Call-ID: 50000\r\n\
CSeq: 42 OPTIONS\r\n\
Contact: <sip:nm@nm>\r\n\
Accept: application/sdp\r\n\
Content-Length: 0\r\n\r\n";

/// memcached UDP frame header followed by `stats`.
const MEMCACHED_STATS: &[u8] = b"\x00\x01\x00\x00\x00\x01\x00\x00stats\r\n";

/// ISAKMP header opening an identity protection exchange.
const IKE_HEADER: &[u8] = &[
    0x6e, 0x65, 0x74, 0x70, 0x72, 0x6f, 0x62, 0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1c,
];

/// OpenVPN P_CONTROL_HARD_RESET_CLIENT_V2.
const OPENVPN_RESET: &[u8] = &[
    0x38, 0x6e, 0x65, 0x74, 0x70, 0x72, 0x6f, 0x62, 0x65, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// ONC RPC call to the portmapper NULL procedure.
const PORTMAP_NULL: &[u8] = &[
    0x72, 0xfe, 0x1d, 0x13, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x86,
    0xa0, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const LINE_PROBE: &[u8] = b"netprobe\r\n";

/// Sent to ports without a dedicated payload.
pub const GENERIC_PROBE: &[u8] = b"\r\n\r\n";

/// Returns the datagram to send to `port`.
pub fn udp_payload(port: u16) -> &'static [u8] {
    match port {
        7 | 19 => LINE_PROBE,
        53 => DNS_QUERY,
        69 => TFTP_READ,
        111 => PORTMAP_NULL,
        123 => NTP_REQUEST,
        137 => NETBIOS_STATUS,
        161 => SNMP_GET,
        500 => IKE_HEADER,
        1194 => OPENVPN_RESET,
        1900 => SSDP_SEARCH,
        5060 => SIP_OPTIONS,
        5353 => MDNS_SERVICES,
        11211 => MEMCACHED_STATS,
        _ => GENERIC_PROBE,
    }
}
