//! Internet checksum (RFC 1071).

use std::net::Ipv6Addr;

/// Next-header value of ICMPv6 in the IPv6 pseudo-header.
const ICMPV6_NEXT_HEADER: u8 = 58;

/// Computes the 16-bit one's-complement checksum of `data`.
///
/// Words are read big-endian; an odd trailing byte is padded with zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    fold(sum_words(0, data))
}

/// Computes the ICMPv6 checksum of `message` sent from `source` to
/// `destination`.
///
/// The sum covers the pseudo-header (source, destination, upper-layer length,
/// three zero bytes and next-header 58) followed by the message itself. The
/// checksum field inside `message` must be zero.
pub fn icmpv6_checksum(source: Ipv6Addr, destination: Ipv6Addr, message: &[u8]) -> u16 {
    let mut pseudo = [0u8; 40];
    pseudo[0..16].copy_from_slice(&source.octets());
    pseudo[16..32].copy_from_slice(&destination.octets());
    pseudo[32..36].copy_from_slice(&(message.len() as u32).to_be_bytes());
    pseudo[39] = ICMPV6_NEXT_HEADER;

    fold(sum_words(sum_words(0, &pseudo), message))
}

fn sum_words(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

fn fold(mut sum: u32) -> u16 {
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc1071_example() {
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(internet_checksum(&data), !0xddf2);
    }

    #[test]
    fn test_checksum_self_verifies() {
        let mut message = vec![8, 0, 0, 0, 0x12, 0x34, 0x00, 0x01, b'h', b'i', b'!'];
        let sum = internet_checksum(&message);
        message[2..4].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(internet_checksum(&message), 0);
    }

    #[test]
    fn test_odd_length_pads_with_zero() {
        assert_eq!(internet_checksum(&[0xab]), internet_checksum(&[0xab, 0x00]));
    }

    #[test]
    fn test_icmpv6_checksum_self_verifies() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();
        let mut message = vec![128, 0, 0, 0, 0xbe, 0xef, 0x00, 0x07, 1, 2, 3, 4];
        let sum = icmpv6_checksum(src, dst, &message);
        message[2..4].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(icmpv6_checksum(src, dst, &message), 0);
    }

    #[test]
    fn test_icmpv6_checksum_depends_on_addresses() {
        let message = [128, 0, 0, 0, 0, 1, 0, 1];
        let a = icmpv6_checksum("::1".parse().unwrap(), "::1".parse().unwrap(), &message);
        let b = icmpv6_checksum("::1".parse().unwrap(), "::2".parse().unwrap(), &message);
        assert_ne!(a, b);
    }

    use proptest::prelude::*;

    proptest! {
        /// Writing the checksum into its field makes any message sum to zero
        #[test]
        fn proptest_checksum_self_verifies(data in prop::collection::vec(any::<u8>(), 0..1500)) {
            let mut message = vec![0u8, 0u8];
            message.extend_from_slice(&data);
            let sum = internet_checksum(&message);
            message[0..2].copy_from_slice(&sum.to_be_bytes());

            prop_assert_eq!(internet_checksum(&message), 0);
        }

        /// Same law for ICMPv6 with any pair of addresses
        #[test]
        fn proptest_icmpv6_checksum_self_verifies(
            src in any::<[u8; 16]>(),
            dst in any::<[u8; 16]>(),
            payload in prop::collection::vec(any::<u8>(), 0..256)
        ) {
            let (src, dst) = (Ipv6Addr::from(src), Ipv6Addr::from(dst));
            let mut message = vec![128, 0, 0, 0, 0, 0, 0, 0];
            message.extend_from_slice(&payload);
            let sum = icmpv6_checksum(src, dst, &message);
            message[2..4].copy_from_slice(&sum.to_be_bytes());

            prop_assert_eq!(icmpv6_checksum(src, dst, &message), 0);
        }
    }
}
