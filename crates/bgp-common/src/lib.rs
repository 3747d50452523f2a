//! Shared value types used across the Octavius BGP speaker workspace: the
//! autonomous system number, the IPv4 prefix, and the peer mode/config
//! parsing shared by the wire codec, the RIB pipeline and the daemon.

pub mod macros;

use std::{
    fmt::{
        Debug,
        Display,
        Formatter,
    },
    net::{
        AddrParseError,
        Ipv4Addr,
    },
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("expected format <address>/<mask>, e.g. 192.168.2.0/24, but got '{0}'")]
    InvalidPrefixFormat(String),
    #[error("unable to parse IPv4 address => {0}")]
    AddrParse(#[from] AddrParseError),
    #[error("unable to parse integer => {0}")]
    IntParse(#[from] ParseIntError),
    #[error("prefix length {0} is out of range 0..=32")]
    InvalidPrefixLength(u8),
}

/// A 2-octet BGP autonomous system number.
///
/// ## References
/// - [Autonomous System (AS) Numbers, Section 1 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-1)
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Clone, Copy)]
pub struct Asn(pub u16);

impl From<u16> for Asn {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<Asn> for u16 {
    fn from(value: Asn) -> Self {
        value.0
    }
}

impl FromStr for Asn {
    type Err = CommonError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(Self(string.parse()?))
    }
}

impl Display for Asn {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// An IPv4 network prefix: a network address together with a mask length in
/// `0..=32`. Bits past `length` in `address` are always zero - both
/// `new`/`FromStr` and the wire codec enforce this by masking rather than by
/// rejecting non-canonical input.
///
/// ## References
/// - [NLRI Encoding, Section 4.3 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.3)
#[derive(Eq, PartialEq, Hash, Clone, Copy)]
pub struct Ipv4Prefix {
    pub address: Ipv4Addr,
    pub length: u8,
}

impl Ipv4Prefix {
    pub const DEFAULT_ROUTE: Ipv4Prefix = Ipv4Prefix {
        address: Ipv4Addr::new(0, 0, 0, 0),
        length: 0,
    };

    pub fn new(address: Ipv4Addr, length: u8) -> Result<Self, CommonError> {
        if length > 32 {
            return Err(CommonError::InvalidPrefixLength(length));
        }
        Ok(Self {
            address: mask(address, length),
            length,
        })
    }

    /// Number of octets of network address carried on the wire for this
    /// prefix length: `ceil(length / 8)`.
    pub fn address_octets(&self) -> usize {
        self.length.div_ceil(8) as usize
    }
}

fn mask(address: Ipv4Addr, length: u8) -> Ipv4Addr {
    if length >= 32 {
        return address;
    }
    let bits = u32::from(address) & (!0u32).checked_shl(32 - length as u32).unwrap_or(0);
    Ipv4Addr::from(bits)
}

impl FromStr for Ipv4Prefix {
    type Err = CommonError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let (addr, length) = string
            .split_once('/')
            .ok_or_else(|| CommonError::InvalidPrefixFormat(string.to_string()))?;
        Self::new(addr.parse()?, length.parse()?)
    }
}

impl Debug for Ipv4Prefix {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.address, self.length)
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.address, self.length)
    }
}

/// Whether a peer actively dials the remote or passively waits for an
/// incoming connection.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Clone, Copy)]
pub enum Mode {
    Active,
    Passive,
}

impl FromStr for Mode {
    type Err = CommonError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "active" => Ok(Self::Active),
            "passive" => Ok(Self::Passive),
            _ => Err(CommonError::InvalidPrefixFormat(string.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_bits_past_length_on_construction() {
        let prefix = Ipv4Prefix::new(Ipv4Addr::new(10, 100, 220, 5), 24).unwrap();
        assert_eq!(prefix.address, Ipv4Addr::new(10, 100, 220, 0));
    }

    #[test]
    fn default_route_has_zero_length() {
        let prefix: Ipv4Prefix = "0.0.0.0/0".parse().unwrap();
        assert_eq!(prefix, Ipv4Prefix::DEFAULT_ROUTE);
    }

    #[test]
    fn rejects_prefix_length_over_32() {
        assert!(matches!(
            Ipv4Prefix::new(Ipv4Addr::UNSPECIFIED, 33),
            Err(CommonError::InvalidPrefixLength(33))
        ));
    }

    #[test]
    fn address_octets_rounds_up() {
        assert_eq!(Ipv4Prefix::new(Ipv4Addr::new(10, 0, 0, 0), 8).unwrap().address_octets(), 1);
        assert_eq!(Ipv4Prefix::new(Ipv4Addr::new(10, 100, 220, 0), 24).unwrap().address_octets(), 3);
        assert_eq!(Ipv4Prefix::DEFAULT_ROUTE.address_octets(), 0);
    }
}
