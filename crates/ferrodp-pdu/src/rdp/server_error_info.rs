use ferrodp_core::{
    ensure_fixed_part_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

/// Set Error Info PDU Data ([MS-RDPBCGR] 2.2.5.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSetErrorInfoPdu(pub ErrorInfo);

impl ServerSetErrorInfoPdu {
    const NAME: &'static str = "ServerSetErrorInfoPdu";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for ServerSetErrorInfoPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.0.raw_code());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for ServerSetErrorInfoPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self(ErrorInfo::from_raw_code(src.read_u32())))
    }
}

/// The MS-RDPBCGR error-info code space, reduced to the codes the client
/// reacts to; anything else is carried raw.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorInfo {
    None,
    RpcInitiatedDisconnect,
    RpcInitiatedLogoff,
    IdleTimeout,
    LogonTimeout,
    DisconnectedByOtherConnection,
    OutOfMemory,
    ServerDeniedConnection,
    ServerInsufficientPrivileges,
    ServerFreshCredentialsRequired,
    RpcInitiatedDisconnectByUser,
    LogoffByUser,
    LicenseInternal,
    LicenseNoLicenseServer,
    LicenseNoLicense,
    LicenseBadClientMsg,
    LicenseHwidDoesntMatchLicense,
    LicenseBadClientLicense,
    LicenseCantFinishProtocol,
    LicenseClientEndedProtocol,
    LicenseBadClientEncryption,
    LicenseCantUpgradeLicense,
    LicenseNoRemoteConnections,
    Other(u32),
}

impl ErrorInfo {
    pub fn from_raw_code(code: u32) -> Self {
        match code {
            0x0000_0000 => Self::None,
            0x0000_0001 => Self::RpcInitiatedDisconnect,
            0x0000_0002 => Self::RpcInitiatedLogoff,
            0x0000_0003 => Self::IdleTimeout,
            0x0000_0004 => Self::LogonTimeout,
            0x0000_0005 => Self::DisconnectedByOtherConnection,
            0x0000_0006 => Self::OutOfMemory,
            0x0000_0007 => Self::ServerDeniedConnection,
            0x0000_0009 => Self::ServerInsufficientPrivileges,
            0x0000_000A => Self::ServerFreshCredentialsRequired,
            0x0000_000B => Self::RpcInitiatedDisconnectByUser,
            0x0000_000C => Self::LogoffByUser,
            0x0000_0100 => Self::LicenseInternal,
            0x0000_0101 => Self::LicenseNoLicenseServer,
            0x0000_0102 => Self::LicenseNoLicense,
            0x0000_0103 => Self::LicenseBadClientMsg,
            0x0000_0104 => Self::LicenseHwidDoesntMatchLicense,
            0x0000_0105 => Self::LicenseBadClientLicense,
            0x0000_0106 => Self::LicenseCantFinishProtocol,
            0x0000_0107 => Self::LicenseClientEndedProtocol,
            0x0000_0108 => Self::LicenseBadClientEncryption,
            0x0000_0109 => Self::LicenseCantUpgradeLicense,
            0x0000_010A => Self::LicenseNoRemoteConnections,
            other => Self::Other(other),
        }
    }

    pub fn raw_code(self) -> u32 {
        match self {
            Self::None => 0x0000_0000,
            Self::RpcInitiatedDisconnect => 0x0000_0001,
            Self::RpcInitiatedLogoff => 0x0000_0002,
            Self::IdleTimeout => 0x0000_0003,
            Self::LogonTimeout => 0x0000_0004,
            Self::DisconnectedByOtherConnection => 0x0000_0005,
            Self::OutOfMemory => 0x0000_0006,
            Self::ServerDeniedConnection => 0x0000_0007,
            Self::ServerInsufficientPrivileges => 0x0000_0009,
            Self::ServerFreshCredentialsRequired => 0x0000_000A,
            Self::RpcInitiatedDisconnectByUser => 0x0000_000B,
            Self::LogoffByUser => 0x0000_000C,
            Self::LicenseInternal => 0x0000_0100,
            Self::LicenseNoLicenseServer => 0x0000_0101,
            Self::LicenseNoLicense => 0x0000_0102,
            Self::LicenseBadClientMsg => 0x0000_0103,
            Self::LicenseHwidDoesntMatchLicense => 0x0000_0104,
            Self::LicenseBadClientLicense => 0x0000_0105,
            Self::LicenseCantFinishProtocol => 0x0000_0106,
            Self::LicenseClientEndedProtocol => 0x0000_0107,
            Self::LicenseBadClientEncryption => 0x0000_0108,
            Self::LicenseCantUpgradeLicense => 0x0000_0109,
            Self::LicenseNoRemoteConnections => 0x0000_010A,
            Self::Other(other) => other,
        }
    }

    /// Whether this code marks a server-initiated but orderly session end.
    pub fn is_graceful_disconnect(self) -> bool {
        matches!(
            self,
            Self::RpcInitiatedDisconnect
                | Self::RpcInitiatedLogoff
                | Self::DisconnectedByOtherConnection
                | Self::RpcInitiatedDisconnectByUser
                | Self::LogoffByUser
                | Self::IdleTimeout
                | Self::LogonTimeout
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::None => "no error",
            Self::RpcInitiatedDisconnect => "the disconnection was initiated by an administrative tool",
            Self::RpcInitiatedLogoff => "the logoff was initiated by an administrative tool",
            Self::IdleTimeout => "the idle session limit was reached",
            Self::LogonTimeout => "the active session limit was reached",
            Self::DisconnectedByOtherConnection => "another user connected to the session",
            Self::OutOfMemory => "the server ran out of memory",
            Self::ServerDeniedConnection => "the server denied the connection",
            Self::ServerInsufficientPrivileges => "insufficient privileges for the session",
            Self::ServerFreshCredentialsRequired => "the server requires fresh credentials",
            Self::RpcInitiatedDisconnectByUser => "the disconnection was initiated by the user on the server",
            Self::LogoffByUser => "the user on the server logged off",
            Self::LicenseInternal => "internal licensing error",
            Self::LicenseNoLicenseServer => "no license server was available",
            Self::LicenseNoLicense => "no valid license was available",
            Self::LicenseBadClientMsg => "the client sent an invalid licensing message",
            Self::LicenseHwidDoesntMatchLicense => "the hardware id does not match the license",
            Self::LicenseBadClientLicense => "the client license is in an invalid format",
            Self::LicenseCantFinishProtocol => "the licensing protocol could not be completed",
            Self::LicenseClientEndedProtocol => "the client ended the licensing protocol prematurely",
            Self::LicenseBadClientEncryption => "a licensing message was incorrectly encrypted",
            Self::LicenseCantUpgradeLicense => "the client license could not be upgraded",
            Self::LicenseNoRemoteConnections => "the license server does not permit remote connections",
            Self::Other(_) => "unknown error code",
        }
    }
}
