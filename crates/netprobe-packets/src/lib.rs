//! Packet codec and raw socket transport for netprobe.
//!
//! Builds and parses ICMPv4/ICMPv6 echo and error messages, computes the
//! Internet checksum, and opens the raw sockets the probe engines send
//! through.

pub mod builder;
pub mod checksum;
pub mod parser;
pub mod socket;

pub use builder::{
    build_echo_request, build_non_fragmentable_packet, min_packet_size, EchoRoute,
    ICMP_HEADER_LEN,
};
pub use checksum::{icmpv6_checksum, internet_checksum};
pub use parser::{parse_icmp_message, IcmpKind, IcmpMessage};
pub use socket::{local_address_for, RawSocketFactory, RawTransport};
