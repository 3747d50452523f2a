//! Bit-exact encode/decode of the BGP-4 messages this speaker needs: OPEN,
//! KEEPALIVE and UPDATE, plus the path attribute and compressed-prefix
//! sub-codecs shared by them. Only RFC 4271's happy path is implemented -
//! no NOTIFICATION, no capability negotiation, no MP-BGP.
//!
//! ## References
//! - [A Border Gateway Protocol 4 (BGP-4), RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271)

pub mod message;
pub mod path_attribute;
pub mod prefix;

pub use message::{
    BgpHeader,
    BgpMessage,
    MessageKind,
    OpenMessage,
    UpdateMessage,
    HEADER_LENGTH,
};
pub use path_attribute::{
    AsPath,
    Origin,
    PathAttribute,
};
pub use prefix::PrefixCodec;

use thiserror::Error;

/// Every way a byte slice can fail to become a well-formed BGP element.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum WireError {
    #[error("unsupported BGP version {0}, only version 4 is implemented")]
    UnsupportedVersion(u8),
    #[error("prefix length {0} is out of range 0..=32")]
    InvalidPrefixLength(u8),
    #[error("input truncated while decoding a prefix, need {needed} bytes, have {have}")]
    TruncatedPrefix { needed: usize, have: usize },
    #[error("input truncated while decoding a message, need {needed} bytes, have {have}")]
    TruncatedMessage { needed: usize, have: usize },
    #[error("input truncated while decoding a path attribute")]
    TruncatedAttribute,
    #[error("message type {0} is not one of OPEN(1)/UPDATE(2)/KEEPALIVE(4)")]
    UnexpectedMessageType(u8),
}

/// Implemented by every BGP wire element: headers, messages and the
/// sub-structures nested inside them. `unpack` consumes a prefix of `input`
/// and returns the remainder; `pack` serializes back to bytes.
pub trait BgpElement: Sized {
    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError>;
    fn pack(&self) -> Vec<u8>;
}

/// Peeks the 2-byte total-length field of a BGP message header (offset 16,
/// per RFC 4271 section 4.1) without consuming anything. Used by
/// `Connection::recv` to decide when enough bytes have arrived to carve off
/// one full message. The marker (offset 0..16) is read but never validated
/// for all-ones - compatibility, not trust, per RFC 4271's framing note.
pub fn peek_message_length(buffer: &[u8]) -> Option<u16> {
    if buffer.len() < HEADER_LENGTH {
        return None;
    }
    Some(u16::from_be_bytes([buffer[16], buffer[17]]))
}

pub(crate) fn be_u8(input: &[u8]) -> Result<(u8, &[u8]), WireError> {
    nom::number::complete::be_u8::<_, nom::error::Error<&[u8]>>(input)
        .map(|(rest, value)| (value, rest))
        .map_err(|_| WireError::TruncatedMessage { needed: 1, have: input.len() })
}

pub(crate) fn be_u16(input: &[u8]) -> Result<(u16, &[u8]), WireError> {
    nom::number::complete::be_u16::<_, nom::error::Error<&[u8]>>(input)
        .map(|(rest, value)| (value, rest))
        .map_err(|_| WireError::TruncatedMessage { needed: 2, have: input.len() })
}

pub(crate) fn be_u32(input: &[u8]) -> Result<(u32, &[u8]), WireError> {
    nom::number::complete::be_u32::<_, nom::error::Error<&[u8]>>(input)
        .map(|(rest, value)| (value, rest))
        .map_err(|_| WireError::TruncatedMessage { needed: 4, have: input.len() })
}

pub(crate) fn take(input: &[u8], count: usize) -> Result<(&[u8], &[u8]), WireError> {
    nom::bytes::complete::take::<_, _, nom::error::Error<&[u8]>>(count)(input)
        .map(|(rest, taken)| (taken, rest))
        .map_err(|_| WireError::TruncatedMessage { needed: count, have: input.len() })
}
