use bitflags::bitflags;
use ferrodp_core::{ensure_fixed_part_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

const REDIRECTION_VERSION_MASK: u32 = 0x0000_003C;
const REDIRECTION_VERSION_SHIFT: u32 = 2;

/// TS_UD_CS_CLUSTER ([MS-RDPBCGR] 2.2.1.3.5), used for session reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientClusterData {
    pub flags: RedirectionFlags,
    pub redirection_version: RedirectionVersion,
    pub redirected_session_id: u32,
}

impl ClientClusterData {
    const NAME: &'static str = "ClientClusterData";

    const FIXED_PART_SIZE: usize = 4 /* flags */ + 4 /* redirectedSessionId */;
}

impl Encode for ClientClusterData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        let flags_with_version = self.flags.bits() | ((self.redirection_version as u32) << REDIRECTION_VERSION_SHIFT);

        dst.write_u32(flags_with_version);
        dst.write_u32(self.redirected_session_id);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for ClientClusterData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let flags_with_version = src.read_u32();
        let redirected_session_id = src.read_u32();

        let flags = RedirectionFlags::from_bits_truncate(flags_with_version & !REDIRECTION_VERSION_MASK);
        let redirection_version =
            RedirectionVersion::from_u8(((flags_with_version & REDIRECTION_VERSION_MASK) >> REDIRECTION_VERSION_SHIFT) as u8);

        Ok(Self {
            flags,
            redirection_version,
            redirected_session_id,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RedirectionFlags: u32 {
        const REDIRECTION_SUPPORTED = 0x0000_0001;
        const REDIRECTED_SESSION_FIELD_VALID = 0x0000_0002;
        const REDIRECTED_SMARTCARD = 0x0000_0040;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum RedirectionVersion {
    V1 = 0,
    V2 = 1,
    V3 = 2,
    V4 = 3,
    V5 = 4,
    V6 = 5,
}

impl RedirectionVersion {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::V2,
            2 => Self::V3,
            3 => Self::V4,
            4 => Self::V5,
            5 => Self::V6,
            _ => Self::V1,
        }
    }
}
