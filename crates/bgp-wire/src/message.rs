//! The BGP message header and the three message bodies this speaker
//! implements: OPEN, UPDATE and KEEPALIVE.
//!
//! ## References
//! - [Message Header Format, Section 4.1 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.1)
//! - [OPEN Message Format, Section 4.2 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.2)
//! - [UPDATE Message Format, Section 4.3 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.3)
//! - [KEEPALIVE Message Format, Section 4.4 RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271#section-4.4)

use crate::{
    be_u16,
    be_u32,
    be_u8,
    path_attribute::PathAttribute,
    prefix::PrefixCodec,
    take,
    BgpElement,
    WireError,
};
use octavius_bgp_common::Ipv4Prefix;
use std::net::Ipv4Addr;

pub const HEADER_LENGTH: usize = 19;
const SUPPORTED_VERSION: u8 = 4;

octavius_bgp_common::byte_enum! {
    #[derive(Eq, PartialEq, Debug, Clone, Copy)]
    pub enum MessageKind: u8 => WireError, WireError::UnexpectedMessageType, {
        Open = 1,
        Update = 2,
        KeepAlive = 4,
    }
}

/// The 19-octet header every BGP message starts with. The marker is read
/// but never checked for all-ones: framing relies only on `length`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct BgpHeader {
    pub marker: [u8; 16],
    pub length: u16,
    pub kind: u8,
}

impl BgpElement for BgpHeader {
    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (marker, input) = take(input, 16)?;
        let (length, input) = be_u16(input)?;
        let (kind, input) = be_u8(input)?;
        Ok((
            Self {
                marker: marker.try_into().expect("take(16) yields exactly 16 bytes"),
                length,
                kind,
            },
            input,
        ))
    }

    fn pack(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LENGTH);
        buffer.extend_from_slice(&self.marker);
        buffer.extend_from_slice(&self.length.to_be_bytes());
        buffer.push(self.kind);
        buffer
    }
}

/// An OPEN message. This speaker always emits `version = 4`, `hold_time =
/// 0` (hold timers are not enforced) and no optional parameters; optional
/// parameters received from a peer are preserved verbatim but otherwise
/// ignored.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OpenMessage {
    pub version: u8,
    pub autonomous_system: u16,
    pub hold_time: u16,
    pub bgp_identifier: Ipv4Addr,
    pub optional_parameters: Vec<u8>,
}

impl OpenMessage {
    pub fn new(autonomous_system: u16, local_ip: Ipv4Addr) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            autonomous_system,
            hold_time: 0,
            bgp_identifier: local_ip,
            optional_parameters: Vec::new(),
        }
    }
}

impl BgpElement for OpenMessage {
    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (version, input) = be_u8(input)?;
        if version != SUPPORTED_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let (autonomous_system, input) = be_u16(input)?;
        let (hold_time, input) = be_u16(input)?;
        let (bgp_identifier, input) = be_u32(input)?;
        let (opt_param_len, input) = be_u8(input)?;
        let (optional_parameters, input) = take(input, opt_param_len as usize)?;

        Ok((
            Self {
                version,
                autonomous_system,
                hold_time,
                bgp_identifier: Ipv4Addr::from(bgp_identifier),
                optional_parameters: optional_parameters.to_vec(),
            },
            input,
        ))
    }

    fn pack(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(10 + self.optional_parameters.len());
        buffer.push(self.version);
        buffer.extend_from_slice(&self.autonomous_system.to_be_bytes());
        buffer.extend_from_slice(&self.hold_time.to_be_bytes());
        buffer.extend_from_slice(&u32::from(self.bgp_identifier).to_be_bytes());
        buffer.push(self.optional_parameters.len() as u8);
        buffer.extend_from_slice(&self.optional_parameters);
        buffer
    }
}

/// An UPDATE message. NLRI length isn't carried explicitly: it's whatever
/// remains of the message body after withdrawn-routes and path-attributes
/// have been consumed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UpdateMessage {
    pub withdrawn_routes: Vec<Ipv4Prefix>,
    pub path_attributes: Vec<PathAttribute>,
    pub nlri: Vec<Ipv4Prefix>,
}

impl UpdateMessage {
    pub fn unpack_body(input: &[u8]) -> Result<Self, WireError> {
        let (withdrawn_len, input) = be_u16(input)?;
        let (withdrawn_routes, input) = take(input, withdrawn_len as usize)?;
        let withdrawn_routes = PrefixCodec::unpack_many(withdrawn_routes)?;

        let (path_attr_len, input) = be_u16(input)?;
        let (path_attrs, nlri) = take(input, path_attr_len as usize)?;

        let mut path_attributes = Vec::new();
        let mut remaining = path_attrs;
        while !remaining.is_empty() {
            let (attribute, rest) = PathAttribute::unpack(remaining)?;
            path_attributes.push(attribute);
            remaining = rest;
        }

        let nlri = PrefixCodec::unpack_many(nlri)?;
        Ok(Self { withdrawn_routes, path_attributes, nlri })
    }

    pub fn pack_body(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        let withdrawn = PrefixCodec::pack_many(&self.withdrawn_routes);
        buffer.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        buffer.extend(withdrawn);

        let mut attributes = Vec::new();
        for attribute in &self.path_attributes {
            attributes.extend(attribute.pack());
        }
        buffer.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        buffer.extend(attributes);

        buffer.extend(PrefixCodec::pack_many(&self.nlri));
        buffer
    }
}

/// Wrapper around every BGP message this speaker can send or receive.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BgpMessage {
    Open(OpenMessage),
    Update(UpdateMessage),
    KeepAlive,
}

impl BgpMessage {
    fn kind(&self) -> MessageKind {
        match self {
            Self::Open(_) => MessageKind::Open,
            Self::Update(_) => MessageKind::Update,
            Self::KeepAlive => MessageKind::KeepAlive,
        }
    }

    /// Decodes one full message (header + body) from the front of `input`,
    /// returning the unconsumed remainder. `input` must contain at least
    /// the header's declared `length` bytes - callers (namely
    /// `Connection::recv`) are responsible for buffering that much first
    /// using [`crate::peek_message_length`].
    pub fn unpack(input: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (header, after_header) = BgpHeader::unpack(input)?;
        let body_len = header.length as usize - HEADER_LENGTH;
        let (body, rest) = take(after_header, body_len)?;

        let message = match MessageKind::try_from(header.kind)? {
            MessageKind::Open => Self::Open(OpenMessage::unpack(body)?.0),
            MessageKind::Update => Self::Update(UpdateMessage::unpack_body(body)?),
            MessageKind::KeepAlive => Self::KeepAlive,
        };
        Ok((message, rest))
    }

    pub fn pack(&self) -> Vec<u8> {
        let body = match self {
            Self::Open(open) => open.pack(),
            Self::Update(update) => update.pack_body(),
            Self::KeepAlive => Vec::new(),
        };

        let header = BgpHeader {
            marker: [0xFF; 16],
            length: (HEADER_LENGTH + body.len()) as u16,
            kind: u8::from(self.kind()),
        };

        let mut buffer = header.pack();
        buffer.extend(body);
        buffer
    }
}
