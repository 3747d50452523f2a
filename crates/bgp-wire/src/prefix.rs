//! The compressed IPv4 prefix encoding shared by UPDATE's NLRI and
//! withdrawn-routes fields.
//!
//! ## References
//! - [NLRI Encoding, Section 4.3 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.3)

use crate::{
    take,
    WireError,
};
use octavius_bgp_common::Ipv4Prefix;
use std::net::Ipv4Addr;

/// Encodes/decodes a single IPv4 prefix as `[length: 1][network: ceil(length/8)]`.
/// The 0-length default route therefore serializes to a single zero byte.
pub struct PrefixCodec;

impl PrefixCodec {
    pub fn unpack(input: &[u8]) -> Result<(Ipv4Prefix, &[u8]), WireError> {
        let (length, input) = take(input, 1)?;
        let length = length[0];
        if length > 32 {
            return Err(WireError::InvalidPrefixLength(length));
        }

        let octets = length.div_ceil(8) as usize;
        let (network, input) = take(input, octets).map_err(|_| WireError::TruncatedPrefix {
            needed: octets,
            have: input.len(),
        })?;

        let mut address = [0u8; 4];
        address[..octets].copy_from_slice(network);
        let prefix = Ipv4Prefix::new(Ipv4Addr::from(address), length)
            .expect("length already validated to be <= 32");
        Ok((prefix, input))
    }

    pub fn pack(prefix: &Ipv4Prefix) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(1 + prefix.address_octets());
        buffer.push(prefix.length);
        buffer.extend_from_slice(&prefix.address.octets()[..prefix.address_octets()]);
        buffer
    }

    /// Decodes a run of back-to-back prefixes until `input` is exhausted -
    /// used for UPDATE's withdrawn-routes and NLRI fields, each of which is a
    /// byte-length-delimited sequence of prefixes rather than a count.
    pub fn unpack_many(mut input: &[u8]) -> Result<Vec<Ipv4Prefix>, WireError> {
        let mut prefixes = Vec::new();
        while !input.is_empty() {
            let (prefix, rest) = Self::unpack(input)?;
            prefixes.push(prefix);
            input = rest;
        }
        Ok(prefixes)
    }

    pub fn pack_many(prefixes: &[Ipv4Prefix]) -> Vec<u8> {
        let mut buffer = Vec::new();
        for prefix in prefixes {
            buffer.extend(Self::pack(prefix));
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_route_encodes_to_single_zero_byte() {
        assert_eq!(PrefixCodec::pack(&Ipv4Prefix::DEFAULT_ROUTE), vec![0x00]);
    }

    #[test]
    fn encodes_classful_examples_from_the_spec() {
        let a: Ipv4Prefix = "10.0.0.0/8".parse().unwrap();
        assert_eq!(PrefixCodec::pack(&a), vec![0x08, 0x0A]);

        let b: Ipv4Prefix = "10.100.220.0/24".parse().unwrap();
        assert_eq!(PrefixCodec::pack(&b), vec![0x18, 0x0A, 0x64, 0xDC]);
    }

    #[test]
    fn round_trips_every_prefix_length() {
        for length in 0..=32u8 {
            let prefix = Ipv4Prefix::new(Ipv4Addr::new(255, 255, 255, 255), length).unwrap();
            let packed = PrefixCodec::pack(&prefix);
            assert_eq!(packed.len(), 1 + length.div_ceil(8) as usize);

            let (decoded, rest) = PrefixCodec::unpack(&packed).unwrap();
            assert!(rest.is_empty());
            assert_eq!(decoded, prefix);
        }
    }

    #[test]
    fn rejects_prefix_length_over_32() {
        assert_eq!(PrefixCodec::unpack(&[33]), Err(WireError::InvalidPrefixLength(33)));
    }

    #[test]
    fn rejects_truncated_network_bytes() {
        assert!(matches!(PrefixCodec::unpack(&[24, 10]), Err(WireError::TruncatedPrefix { .. })));
    }

    #[test]
    fn unpack_many_reads_back_to_back_prefixes() {
        let prefixes = vec![
            "10.0.0.0/8".parse().unwrap(),
            "192.168.1.0/24".parse::<Ipv4Prefix>().unwrap(),
        ];
        let packed = PrefixCodec::pack_many(&prefixes);
        assert_eq!(PrefixCodec::unpack_many(&packed).unwrap(), prefixes);
    }
}
