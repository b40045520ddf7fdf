//! RDP wire formats: TPKT/X.224 framing, PER/BER primitives, MCS, GCC
//! conference blocks, connection negotiation, share PDUs, capability sets and
//! the legacy-security cryptography.

use core::fmt;

pub mod crypto;
pub mod gcc;
pub mod geometry;
pub mod input;
pub mod mcs;
pub mod nego;
pub mod rdp;
pub mod tpdu;
pub mod tpkt;
pub mod utils;
pub mod x224;

pub(crate) mod ber;
pub(crate) mod per;

use ferrodp_core::{DecodeResult, InvalidFieldErr as _, ReadCursor};

use crate::tpkt::TpktHeader;

pub type PduResult<T> = Result<T, PduError>;

pub type PduError = ferrodp_error::Error<PduErrorKind>;

#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum PduErrorKind {
    NotEnoughBytes { received: usize, expected: usize },
    InvalidMessage { field: &'static str, reason: &'static str },
    UnexpectedMessageType { got: u8 },
    UnsupportedVersion { got: u8 },
    Other { description: &'static str },
}

impl std::error::Error for PduErrorKind {}

impl fmt::Display for PduErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughBytes { received, expected } => write!(
                f,
                "not enough bytes provided to decode: received {received} bytes, expected {expected} bytes"
            ),
            Self::InvalidMessage { field, reason } => write!(f, "invalid `{field}`: {reason}"),
            Self::UnexpectedMessageType { got } => write!(f, "invalid message type ({got})"),
            Self::UnsupportedVersion { got } => write!(f, "unsupported version ({got})"),
            Self::Other { description } => write!(f, "{description}"),
        }
    }
}

pub trait PduErrorExt {
    fn not_enough_bytes(context: &'static str, received: usize, expected: usize) -> Self;
    fn invalid_message(context: &'static str, field: &'static str, reason: &'static str) -> Self;
    fn unexpected_message_type(context: &'static str, got: u8) -> Self;
    fn unsupported_version(context: &'static str, got: u8) -> Self;
    fn other(context: &'static str, description: &'static str) -> Self;
}

impl PduErrorExt for PduError {
    fn not_enough_bytes(context: &'static str, received: usize, expected: usize) -> Self {
        Self::new(context, PduErrorKind::NotEnoughBytes { received, expected })
    }

    fn invalid_message(context: &'static str, field: &'static str, reason: &'static str) -> Self {
        Self::new(context, PduErrorKind::InvalidMessage { field, reason })
    }

    fn unexpected_message_type(context: &'static str, got: u8) -> Self {
        Self::new(context, PduErrorKind::UnexpectedMessageType { got })
    }

    fn unsupported_version(context: &'static str, got: u8) -> Self {
        Self::new(context, PduErrorKind::UnsupportedVersion { got })
    }

    fn other(context: &'static str, description: &'static str) -> Self {
        Self::new(context, PduErrorKind::Other { description })
    }
}

/// Finds the size of the next TPKT frame, if enough bytes are buffered to tell.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn find_size(bytes: &[u8]) -> DecodeResult<Option<usize>> {
    if bytes.len() < TpktHeader::SIZE {
        return Ok(None);
    }

    let mut cursor = ReadCursor::new(bytes);
    let tpkt = TpktHeader::read(&mut cursor)?;

    if tpkt.packet_length() < TpktHeader::SIZE {
        return Err(ferrodp_core::DecodeError::invalid_field(
            "TpktHeader",
            "length",
            "TPKT length smaller than the TPKT header itself",
        ));
    }

    Ok(Some(tpkt.packet_length()))
}

/// Finds the next PDU size by reading the first few bytes of an incoming frame.
pub trait PduHint: Send + Sync + core::fmt::Debug + 'static {
    fn find_size(&self, bytes: &[u8]) -> DecodeResult<Option<usize>>;
}

#[derive(Clone, Copy, Debug)]
pub struct X224Hint;

pub const X224_HINT: X224Hint = X224Hint;

impl PduHint for X224Hint {
    fn find_size(&self, bytes: &[u8]) -> DecodeResult<Option<usize>> {
        find_size(bytes)
    }
}
