//! The active stage of an RDP session: share-PDU dispatch, the
//! deactivation-reactivation loop, server redirection, input sending and the
//! client-side caches.

#[macro_use]
extern crate tracing;

pub mod caches;
pub mod gdi;

mod active_stage;
mod update;

use core::fmt;

pub use active_stage::{ActiveStage, ActiveStageOutput};
pub use update::UpdateHandler;

pub type SessionResult<T> = Result<T, SessionError>;

#[non_exhaustive]
#[derive(Debug)]
pub enum SessionErrorKind {
    Encode(ferrodp_core::EncodeError),
    Decode(ferrodp_core::DecodeError),
    /// A malformed MPPC stream or an unsupported bulk dialect.
    Bulk(ferrodp_bulk::BulkError),
    /// MAC mismatch or another standard-security failure.
    Security(ferrodp_pdu::crypto::CryptoError),
    Connector(ferrodp_connector::ConnectorError),
    Reason(String),
    General,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SessionErrorKind::Encode(_) => write!(f, "encode error"),
            SessionErrorKind::Decode(_) => write!(f, "decode error"),
            SessionErrorKind::Bulk(_) => write!(f, "bulk compression error"),
            SessionErrorKind::Security(_) => write!(f, "security failure"),
            SessionErrorKind::Connector(_) => write!(f, "connector error"),
            SessionErrorKind::Reason(description) => write!(f, "reason: {description}"),
            SessionErrorKind::General => write!(f, "general error"),
        }
    }
}

impl std::error::Error for SessionErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            SessionErrorKind::Encode(e) => Some(e),
            SessionErrorKind::Decode(e) => Some(e),
            SessionErrorKind::Bulk(e) => Some(e),
            SessionErrorKind::Security(e) => Some(e),
            SessionErrorKind::Connector(e) => Some(e),
            _ => None,
        }
    }
}

pub type SessionError = ferrodp_error::Error<SessionErrorKind>;

pub trait SessionErrorExt {
    fn encode(error: ferrodp_core::EncodeError) -> Self;
    fn decode(error: ferrodp_core::DecodeError) -> Self;
    fn bulk(error: ferrodp_bulk::BulkError) -> Self;
    fn security(error: ferrodp_pdu::crypto::CryptoError) -> Self;
    fn connector(error: ferrodp_connector::ConnectorError) -> Self;
    fn general(context: &'static str) -> Self;
    fn reason(context: &'static str, reason: impl Into<String>) -> Self;
}

impl SessionErrorExt for SessionError {
    fn encode(error: ferrodp_core::EncodeError) -> Self {
        Self::new("encode error", SessionErrorKind::Encode(error))
    }

    fn decode(error: ferrodp_core::DecodeError) -> Self {
        Self::new("decode error", SessionErrorKind::Decode(error))
    }

    fn bulk(error: ferrodp_bulk::BulkError) -> Self {
        Self::new("bulk compression", SessionErrorKind::Bulk(error))
    }

    fn security(error: ferrodp_pdu::crypto::CryptoError) -> Self {
        Self::new("security failure", SessionErrorKind::Security(error))
    }

    fn connector(error: ferrodp_connector::ConnectorError) -> Self {
        Self::new("connector", SessionErrorKind::Connector(error))
    }

    fn general(context: &'static str) -> Self {
        Self::new(context, SessionErrorKind::General)
    }

    fn reason(context: &'static str, reason: impl Into<String>) -> Self {
        Self::new(context, SessionErrorKind::Reason(reason.into()))
    }
}

macro_rules! session_general_err {
    ( $context:expr $(,)? ) => {{
        <$crate::SessionError as $crate::SessionErrorExt>::general($context)
    }};
}

macro_rules! session_reason_err {
    ( $context:expr, $($arg:tt)* ) => {{
        <$crate::SessionError as $crate::SessionErrorExt>::reason($context, format!($($arg)*))
    }};
}

pub(crate) use {session_general_err, session_reason_err};
