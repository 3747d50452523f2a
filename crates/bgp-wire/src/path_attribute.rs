//! Path attributes: `ORIGIN`, `AS_PATH` and `NEXT_HOP`, plus an opaque
//! `Unknown` variant that preserves any attribute type this speaker doesn't
//! implement so decoded UPDATEs still round-trip.
//!
//! ## References
//! - [Path Attributes, Section 5 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-5)
//! - [UPDATE Message Format, Section 4.3 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.3)

use crate::{
    be_u16,
    be_u8,
    take,
    BgpElement,
    WireError,
};
use bitflags::bitflags;
use octavius_bgp_common::Asn;
use std::net::Ipv4Addr;

bitflags! {
    /// Flag octet preceding every path attribute's type code.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct PathAttributeFlags: u8 {
        const OPTIONAL = 0b1000_0000;
        const TRANSITIVE = 0b0100_0000;
        const PARTIAL = 0b0010_0000;
        const EXTENDED_LENGTH = 0b0001_0000;
    }
}

const TYPE_ORIGIN: u8 = 1;
const TYPE_AS_PATH: u8 = 2;
const TYPE_NEXT_HOP: u8 = 3;

const SEGMENT_AS_SET: u8 = 1;
const SEGMENT_AS_SEQUENCE: u8 = 2;

octavius_bgp_common::byte_enum! {
    /// Origin is a well-known mandatory attribute describing how a route was
    /// learned.
    #[derive(Eq, PartialEq, Debug, Hash, Clone, Copy)]
    pub enum Origin: u8 => WireError, |_| WireError::TruncatedAttribute, {
        Igp = 0,
        Egp = 1,
        Incomplete = 2,
    }
}

/// The `AS_PATH` attribute, simplified to a single segment (this speaker
/// never merges paths from more than one upstream, so a list-of-segments
/// model would be unexercised complexity).
#[derive(Eq, PartialEq, Debug, Hash, Clone)]
pub enum AsPath {
    /// Ordered, duplicates allowed - order is preserved on encode/decode.
    Sequence(Vec<Asn>),
    /// Unordered, duplicate-free - `insert` silently ignores a value already
    /// present.
    Set(Vec<Asn>),
}

impl AsPath {
    pub fn empty_sequence() -> Self {
        Self::Sequence(Vec::new())
    }

    /// Inserts `asn` into a `Set`, ignoring it if already present. Appends
    /// `asn` to a `Sequence` unconditionally - this is how Adj-RIB-Out
    /// rewrites an originated path's AS_PATH with the local AS before
    /// emitting an UPDATE.
    pub fn push(&mut self, asn: Asn) {
        match self {
            Self::Sequence(values) => values.push(asn),
            Self::Set(values) => {
                if !values.contains(&asn) {
                    values.push(asn);
                }
            }
        }
    }

    pub fn contains(&self, asn: Asn) -> bool {
        match self {
            Self::Sequence(values) | Self::Set(values) => values.contains(&asn),
        }
    }
}

impl BgpElement for AsPath {
    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (segment_type, input) = be_u8(input)?;
        let (count, input) = be_u8(input)?;
        let (mut body, input) = take(input, count as usize * 2)?;

        let mut values = Vec::with_capacity(count as usize);
        while !body.is_empty() {
            let (value, rest) = be_u16(body)?;
            values.push(Asn(value));
            body = rest;
        }

        let path = match segment_type {
            SEGMENT_AS_SET => Self::Set(values),
            _ => Self::Sequence(values),
        };
        Ok((path, input))
    }

    fn pack(&self) -> Vec<u8> {
        let (segment_type, values) = match self {
            Self::Sequence(values) => (SEGMENT_AS_SEQUENCE, values),
            Self::Set(values) => (SEGMENT_AS_SET, values),
        };

        let mut buffer = Vec::with_capacity(2 + values.len() * 2);
        buffer.push(segment_type);
        buffer.push(values.len() as u8);
        for asn in values {
            buffer.extend_from_slice(&asn.0.to_be_bytes());
        }
        buffer
    }
}

/// Metadata attached to a route advertisement: origin, AS path, next hop,
/// or an opaque attribute of a type this speaker doesn't implement.
#[derive(Eq, PartialEq, Debug, Hash, Clone)]
pub enum PathAttribute {
    Origin(Origin),
    AsPath(AsPath),
    NextHop(Ipv4Addr),
    /// Preserves the raw flags/type/value of an attribute type we don't
    /// decode so a round-tripped UPDATE still carries it.
    Unknown { kind: u8, flags: PathAttributeFlags, data: Vec<u8> },
}

impl PathAttribute {
    /// True if this attribute is an AS_PATH (sequence or set) containing
    /// `asn`. Used by the RIB pipeline's loop-prevention check.
    pub fn contains_as(&self, asn: Asn) -> bool {
        matches!(self, Self::AsPath(path) if path.contains(asn))
    }
}

impl BgpElement for PathAttribute {
    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (flags, input) = be_u8(input)?;
        let flags = PathAttributeFlags::from_bits_truncate(flags);
        let (kind, input) = be_u8(input)?;

        let (length, input) = if flags.contains(PathAttributeFlags::EXTENDED_LENGTH) {
            be_u16(input)?
        } else {
            let (length, input) = be_u8(input)?;
            (length as u16, input)
        };

        let (data, input) = take(input, length as usize).map_err(|_| WireError::TruncatedAttribute)?;
        let attribute = match kind {
            TYPE_ORIGIN => {
                let (value, _) = be_u8(data)?;
                Self::Origin(Origin::try_from(value)?)
            }
            TYPE_AS_PATH => Self::AsPath(AsPath::unpack(data)?.0),
            TYPE_NEXT_HOP => {
                let (octets, _) = take(data, 4)?;
                Self::NextHop(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
            }
            _ => Self::Unknown { kind, flags, data: data.to_vec() },
        };
        Ok((attribute, input))
    }

    fn pack(&self) -> Vec<u8> {
        let (flags, kind, value) = match self {
            Self::Origin(origin) => (
                PathAttributeFlags::TRANSITIVE,
                TYPE_ORIGIN,
                vec![u8::from(*origin)],
            ),
            Self::AsPath(as_path) => (PathAttributeFlags::TRANSITIVE, TYPE_AS_PATH, as_path.pack()),
            Self::NextHop(addr) => (PathAttributeFlags::TRANSITIVE, TYPE_NEXT_HOP, addr.octets().to_vec()),
            Self::Unknown { kind, flags, data } => (*flags, *kind, data.clone()),
        };

        let use_extended_length = value.len() >= 256;
        let flags = if use_extended_length {
            flags | PathAttributeFlags::EXTENDED_LENGTH
        } else {
            flags
        };

        let mut buffer = Vec::with_capacity(3 + value.len());
        buffer.push(flags.bits());
        buffer.push(kind);
        if use_extended_length {
            buffer.extend_from_slice(&(value.len() as u16).to_be_bytes());
        } else {
            buffer.push(value.len() as u8);
        }
        buffer.extend(value);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_round_trips() {
        let attr = PathAttribute::Origin(Origin::Igp);
        let packed = attr.pack();
        let (decoded, rest) = PathAttribute::unpack(&packed).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, attr);
    }

    #[test]
    fn as_sequence_preserves_order() {
        let attr = PathAttribute::AsPath(AsPath::Sequence(vec![Asn(64513), Asn(64514)]));
        let (decoded, _) = PathAttribute::unpack(&attr.pack()).unwrap();
        assert_eq!(decoded, attr);
    }

    #[test]
    fn as_set_rejects_duplicate_insert() {
        let mut set = AsPath::Set(vec![]);
        set.push(Asn(65000));
        set.push(Asn(65000));
        assert_eq!(set, AsPath::Set(vec![Asn(65000)]));
    }

    #[test]
    fn next_hop_round_trips() {
        let attr = PathAttribute::NextHop(Ipv4Addr::new(10, 200, 100, 3));
        let (decoded, _) = PathAttribute::unpack(&attr.pack()).unwrap();
        assert_eq!(decoded, attr);
    }

    #[test]
    fn unknown_attribute_round_trips_opaquely() {
        let attr = PathAttribute::Unknown {
            kind: 9,
            flags: PathAttributeFlags::OPTIONAL,
            data: vec![1, 2, 3, 4],
        };
        let (decoded, _) = PathAttribute::unpack(&attr.pack()).unwrap();
        assert_eq!(decoded, attr);
    }

    #[test]
    fn contains_as_checks_both_segment_kinds() {
        assert!(PathAttribute::AsPath(AsPath::Sequence(vec![Asn(1), Asn(2)])).contains_as(Asn(2)));
        assert!(PathAttribute::AsPath(AsPath::Set(vec![Asn(7)])).contains_as(Asn(7)));
        assert!(!PathAttribute::Origin(Origin::Igp).contains_as(Asn(7)));
    }
}
