//! State machines driving the RDP connection sequence: negotiation, MCS
//! connect, channel joins, key establishment, licensing, capability exchange
//! and finalization.

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

pub mod legacy;

mod channel_connection;
mod connection;
pub mod connection_activation;
mod connection_finalization;
mod license_exchange;

use core::any::Any;
use core::fmt;

use ferrodp_core::{encode_buf, encode_vec, Encode, WriteBuf};
use ferrodp_pdu::gcc::EncryptionMethod;
use ferrodp_pdu::nego::{FailureCode, NegoRequestData};
use ferrodp_pdu::rdp::capability_sets::{CellInfo, MajorPlatformType, BITMAP_CACHE_REV2_CELL_INFO_NUM};
use ferrodp_pdu::rdp::client_info::{PerformanceFlags, TimezoneInfo, RECONNECT_COOKIE_LEN};
use ferrodp_pdu::x224::{X224, X224Data};
use ferrodp_pdu::PduHint;

pub use self::channel_connection::{ChannelConnectionSequence, ChannelConnectionState};
pub use self::connection::{ClientConnector, ClientConnectorState, ConnectionResult, StaticChannels};
pub use self::connection_finalization::{ConnectionFinalizationSequence, ConnectionFinalizationState};
pub use self::license_exchange::{LicenseExchangeSequence, LicenseExchangeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopSize {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
}

/// Bitmap-cache negotiation knobs consumed during capability exchange and by
/// the session caches.
#[derive(Debug, Clone)]
pub struct BitmapCacheConfig {
    /// 1 or 2; persistence requires version 2.
    pub version: u8,
    pub cell_info: [CellInfo; BITMAP_CACHE_REV2_CELL_INFO_NUM],
    pub persist_enabled: bool,
    pub persist_file: Option<std::path::PathBuf>,
}

impl Default for BitmapCacheConfig {
    fn default() -> Self {
        Self {
            version: 2,
            cell_info: [
                CellInfo {
                    num_entries: 600,
                    is_cache_persistent: false,
                },
                CellInfo {
                    num_entries: 600,
                    is_cache_persistent: false,
                },
                CellInfo {
                    num_entries: 2048,
                    is_cache_persistent: false,
                },
                CellInfo {
                    num_entries: 4096,
                    is_cache_persistent: false,
                },
                CellInfo {
                    num_entries: 2048,
                    is_cache_persistent: false,
                },
            ],
            persist_enabled: false,
            persist_file: None,
        }
    }
}

/// The configuration record the core consumes.
///
/// Mutated along the connect path (negotiation results, server capability
/// sets) and by redirection.
#[derive(Debug, Clone)]
pub struct Config {
    pub hostname: String,
    pub port: u16,

    pub credentials: Credentials,
    /// Pre-encrypted logon cookie, preferred over the password when present
    /// (set by server redirection).
    pub password_cookie: Option<Vec<u8>>,

    /// Protocols offered in the X.224 Connection Request.
    pub rdp_security: bool,
    pub tls_security: bool,
    pub nla_security: bool,

    /// Legacy-encryption policy, meaningful when standard RDP security ends
    /// up selected.
    pub encryption_methods: EncryptionMethod,
    pub secure_checksum: bool,

    pub desktop_size: DesktopSize,
    pub color_depth: u32,

    pub compression: bool,

    pub bitmap_cache: BitmapCacheConfig,

    pub performance_flags: PerformanceFlags,
    pub client_time_zone: Option<TimezoneInfo>,
    pub ip_address: Option<String>,
    pub ipv6: bool,

    pub client_hostname: String,
    pub client_dir: String,
    pub client_build: u32,
    pub keyboard_layout: u32,
    pub keyboard_subtype: u32,
    pub keyboard_functional_keys_count: u32,
    pub ime_file_name: String,
    pub dig_product_id: String,
    pub platform: MajorPlatformType,

    pub autologon: bool,
    pub remote_app: bool,
    pub console_audio: bool,

    /// Static virtual channel names to announce and join.
    pub channels: Vec<String>,

    /// Reconnect hint carried in the Client Cluster Data.
    pub redirected_session_id: u32,
    /// Auto-reconnect cookie from a previous session's Save Session Info.
    pub reconnect_cookie: Option<[u8; RECONNECT_COOKIE_LEN]>,

    /// When set the session registers no drawing callbacks and the cache
    /// layer acts as a null sink.
    pub deactivate_client_decoding: bool,

    /// Explicit X.224 routing token or cookie; falls back to a cookie built
    /// from the username.
    pub request_data: Option<NegoRequestData>,
}

ferrodp_core::assert_impl!(Config: Send, Sync);

/// A state of one of the connection sequences.
pub trait State: Send + fmt::Debug + 'static {
    fn name(&self) -> &'static str;
    fn is_terminal(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

ferrodp_core::assert_obj_safe!(State);

pub fn state_downcast<T: State>(state: &dyn State) -> Option<&T> {
    state.as_any().downcast_ref()
}

pub fn state_is<T: State>(state: &dyn State) -> bool {
    state.as_any().is::<T>()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Written {
    Nothing,
    Size(core::num::NonZeroUsize),
}

impl Written {
    #[inline]
    pub fn from_size(value: usize) -> ConnectorResult<Self> {
        core::num::NonZeroUsize::new(value)
            .map(Self::Size)
            .ok_or_else(|| ConnectorError::general("invalid written length (can't be zero)"))
    }

    #[inline]
    pub fn is_nothing(self) -> bool {
        matches!(self, Self::Nothing)
    }

    #[inline]
    pub fn size(self) -> Option<usize> {
        if let Self::Size(size) = self {
            Some(size.get())
        } else {
            None
        }
    }
}

/// A resumable sub-sequence of the connection: the caller feeds one inbound
/// frame (or nothing) per step and flushes whatever lands in `output`.
pub trait Sequence: Send {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint>;

    fn state(&self) -> &dyn State;

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written>;

    fn step_no_input(&mut self, output: &mut WriteBuf) -> ConnectorResult<Written> {
        self.step(&[], output)
    }
}

ferrodp_core::assert_obj_safe!(Sequence);

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[non_exhaustive]
#[derive(Debug)]
pub enum ConnectorErrorKind {
    Encode(ferrodp_core::EncodeError),
    Decode(ferrodp_core::DecodeError),
    /// The server answered the Connection Request with a failure code.
    Negotiation(FailureCode),
    /// MAC mismatch, bad security header flags or certificate failure.
    Security(ferrodp_pdu::crypto::CryptoError),
    Reason(String),
    AccessDenied,
    General,
    Custom,
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConnectorErrorKind::Encode(_) => write!(f, "encode error"),
            ConnectorErrorKind::Decode(_) => write!(f, "decode error"),
            ConnectorErrorKind::Negotiation(code) => write!(f, "negotiation failure: {}", code.description()),
            ConnectorErrorKind::Security(_) => write!(f, "security failure"),
            ConnectorErrorKind::Reason(description) => write!(f, "reason: {description}"),
            ConnectorErrorKind::AccessDenied => write!(f, "access denied"),
            ConnectorErrorKind::General => write!(f, "general error"),
            ConnectorErrorKind::Custom => write!(f, "custom error"),
        }
    }
}

impl std::error::Error for ConnectorErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            ConnectorErrorKind::Encode(e) => Some(e),
            ConnectorErrorKind::Decode(e) => Some(e),
            ConnectorErrorKind::Security(e) => Some(e),
            _ => None,
        }
    }
}

pub type ConnectorError = ferrodp_error::Error<ConnectorErrorKind>;

pub trait ConnectorErrorExt {
    fn encode(error: ferrodp_core::EncodeError) -> Self;
    fn decode(error: ferrodp_core::DecodeError) -> Self;
    fn security(error: ferrodp_pdu::crypto::CryptoError) -> Self;
    fn negotiation(code: FailureCode) -> Self;
    fn general(context: &'static str) -> Self;
    fn reason(context: &'static str, reason: impl Into<String>) -> Self;
    fn custom<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static;
}

impl ConnectorErrorExt for ConnectorError {
    fn encode(error: ferrodp_core::EncodeError) -> Self {
        Self::new("encode error", ConnectorErrorKind::Encode(error))
    }

    fn decode(error: ferrodp_core::DecodeError) -> Self {
        Self::new("decode error", ConnectorErrorKind::Decode(error))
    }

    fn security(error: ferrodp_pdu::crypto::CryptoError) -> Self {
        Self::new("security failure", ConnectorErrorKind::Security(error))
    }

    fn negotiation(code: FailureCode) -> Self {
        Self::new("negotiation failure", ConnectorErrorKind::Negotiation(code))
    }

    fn general(context: &'static str) -> Self {
        Self::new(context, ConnectorErrorKind::General)
    }

    fn reason(context: &'static str, reason: impl Into<String>) -> Self {
        Self::new(context, ConnectorErrorKind::Reason(reason.into()))
    }

    fn custom<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        Self::new(context, ConnectorErrorKind::Custom).with_source(e)
    }
}

pub trait ConnectorResultExt {
    #[must_use]
    fn with_context(self, context: &'static str) -> Self;
}

impl<T> ConnectorResultExt for ConnectorResult<T> {
    fn with_context(self, context: &'static str) -> Self {
        self.map_err(|mut e| {
            e.context = context;
            e
        })
    }
}

/// Encodes a message as the user data of an X.224 Data TPDU.
pub fn encode_x224_packet<T>(x224_msg: &T, buf: &mut WriteBuf) -> ConnectorResult<usize>
where
    T: Encode,
{
    let x224_msg_buf = encode_vec(x224_msg).map_err(ConnectorError::encode)?;

    let pdu = X224Data {
        data: std::borrow::Cow::Owned(x224_msg_buf),
    };

    let written = encode_buf(&X224(pdu), buf).map_err(ConnectorError::encode)?;

    Ok(written)
}
