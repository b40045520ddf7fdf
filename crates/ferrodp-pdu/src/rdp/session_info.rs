//! Save Session Info PDU ([MS-RDPBCGR] 2.2.10.1): the server's post-logon
//! notifications, including the auto-reconnect cookie.

use ferrodp_core::{
    ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode, DecodeResult, Encode,
    EncodeResult, ReadCursor, WriteCursor,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};

use crate::utils::{self, CharacterSet};

const INFO_TYPE_SIZE: usize = 4;
const LOGON_INFO_V2_FIXED_SIZE: usize = 2 /* version */ + 4 /* size */ + 4 /* sessionId */ + 4 /* cbDomain */ + 4 /* cbUserName */ + 558 /* pad */;
const LOGON_INFO_V1_DOMAIN_SIZE: usize = 52;
const LOGON_INFO_V1_USERNAME_SIZE: usize = 512;
const LOGON_EX_FIXED_SIZE: usize = 2 /* cbFieldData */ + 4 /* fieldsPresent */;
const LOGON_EX_PADDING_SIZE: usize = 570;
const AUTO_RECONNECT_PACKET_SIZE: usize = 28;
const AUTO_RECONNECT_RANDOM_LEN: usize = 16;
const AUTO_RECONNECT_VERSION_1: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSessionInfoPdu {
    pub info_data: InfoData,
}

impl SaveSessionInfoPdu {
    const NAME: &'static str = "SaveSessionInfoPdu";

    const FIXED_PART_SIZE: usize = INFO_TYPE_SIZE;

    /// The auto-reconnect cookie, when this notification carries one.
    pub fn auto_reconnect(&self) -> Option<&AutoReconnectPacket> {
        match &self.info_data {
            InfoData::LogonExtended(extended) => extended.auto_reconnect.as_ref(),
            _ => None,
        }
    }
}

impl Encode for SaveSessionInfoPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        match &self.info_data {
            InfoData::LogonInfoV2(info) => {
                dst.write_u32(InfoType::LogonV2.to_u32().unwrap_or(1));
                info.encode(dst)?;
            }
            InfoData::LogonExtended(extended) => {
                dst.write_u32(InfoType::LogonExtended.to_u32().unwrap_or(3));
                extended.encode(dst)?;
            }
            InfoData::PlainNotify => {
                dst.write_u32(InfoType::PlainNotify.to_u32().unwrap_or(2));
                write_padding!(dst, 576);
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + match &self.info_data {
                InfoData::LogonInfoV2(info) => info.size(),
                InfoData::LogonExtended(extended) => extended.size(),
                InfoData::PlainNotify => 576,
            }
    }
}

impl<'de> Decode<'de> for SaveSessionInfoPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let info_type =
            InfoType::from_u32(src.read_u32()).ok_or_else(|| invalid_field_err!("infoType", "invalid info type"))?;

        let info_data = match info_type {
            InfoType::LogonV2 => InfoData::LogonInfoV2(LogonInfoV2::decode(src)?),
            InfoType::LogonExtended => InfoData::LogonExtended(LogonInfoExtended::decode(src)?),
            // Logon V1 carries fixed-size ANSI/UTF-16 fields this core does
            // not consume beyond validation.
            InfoType::Logon => {
                ensure_size!(ctx: Self::NAME, in: src, size: 4 + LOGON_INFO_V1_DOMAIN_SIZE + 4 + LOGON_INFO_V1_USERNAME_SIZE + 4);
                let _cb_domain = src.read_u32();
                read_padding!(src, LOGON_INFO_V1_DOMAIN_SIZE);
                let _cb_username = src.read_u32();
                read_padding!(src, LOGON_INFO_V1_USERNAME_SIZE);
                let _session_id = src.read_u32();
                InfoData::PlainNotify
            }
            InfoType::PlainNotify => {
                // 576 bytes of padding follow; tolerate short packets.
                let skip = src.len().min(576);
                read_padding!(src, skip);
                InfoData::PlainNotify
            }
        };

        Ok(Self { info_data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoData {
    LogonInfoV2(LogonInfoV2),
    LogonExtended(LogonInfoExtended),
    PlainNotify,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
enum InfoType {
    Logon = 0,
    LogonV2 = 1,
    PlainNotify = 2,
    LogonExtended = 3,
}

/// TS_LOGON_INFO_VERSION_2 ([MS-RDPBCGR] 2.2.10.1.1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonInfoV2 {
    pub session_id: u32,
    pub domain: String,
    pub username: String,
}

impl LogonInfoV2 {
    const NAME: &'static str = "LogonInfoV2";

    const VERSION: u16 = 1;
}

impl LogonInfoV2 {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let domain_size = utils::encoded_str_len(&self.domain, CharacterSet::Unicode) + 2;
        let username_size = utils::encoded_str_len(&self.username, CharacterSet::Unicode) + 2;

        dst.write_u16(Self::VERSION);
        dst.write_u32((LOGON_INFO_V2_FIXED_SIZE + domain_size + username_size) as u32);
        dst.write_u32(self.session_id);
        dst.write_u32(domain_size as u32);
        dst.write_u32(username_size as u32);
        write_padding!(dst, 558);
        utils::write_string_with_null_terminator(dst, &self.domain, CharacterSet::Unicode)?;
        utils::write_string_with_null_terminator(dst, &self.username, CharacterSet::Unicode)?;

        Ok(())
    }

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: LOGON_INFO_V2_FIXED_SIZE);

        let version = src.read_u16();
        if version != Self::VERSION {
            return Err(invalid_field_err(Self::NAME, "version", "unsupported logon info version"));
        }
        let _size = src.read_u32();
        let session_id = src.read_u32();
        let domain_size = usize::from(src.read_u32() as u16);
        let username_size = usize::from(src.read_u32() as u16);
        read_padding!(src, 558);

        let domain = utils::read_string_from_cursor(src, domain_size, CharacterSet::Unicode)?;
        let username = utils::read_string_from_cursor(src, username_size, CharacterSet::Unicode)?;

        Ok(Self {
            session_id,
            domain,
            username,
        })
    }

    fn size(&self) -> usize {
        LOGON_INFO_V2_FIXED_SIZE
            + utils::encoded_str_len(&self.domain, CharacterSet::Unicode)
            + 2
            + utils::encoded_str_len(&self.username, CharacterSet::Unicode)
            + 2
    }
}

/// TS_LOGON_INFO_EXTENDED ([MS-RDPBCGR] 2.2.10.1.1.4).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogonInfoExtended {
    pub auto_reconnect: Option<AutoReconnectPacket>,
    pub error_notification: Option<LogonErrorsInfo>,
}

impl LogonInfoExtended {
    const NAME: &'static str = "LogonInfoExtended";

    const AUTO_RECONNECT_PRESENT: u32 = 0x01;
    const ERROR_NOTIFICATION_PRESENT: u32 = 0x02;

    fn fields_present(&self) -> u32 {
        let mut present = 0;
        if self.auto_reconnect.is_some() {
            present |= Self::AUTO_RECONNECT_PRESENT;
        }
        if self.error_notification.is_some() {
            present |= Self::ERROR_NOTIFICATION_PRESENT;
        }
        present
    }

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u16(self.size() as u16 - LOGON_EX_PADDING_SIZE as u16);
        dst.write_u32(self.fields_present());

        if let Some(ref packet) = self.auto_reconnect {
            dst.write_u32(AUTO_RECONNECT_PACKET_SIZE as u32 + 4);
            packet.encode(dst)?;
        }
        if let Some(ref errors) = self.error_notification {
            dst.write_u32(8 + 4);
            dst.write_u32(errors.error_type);
            dst.write_u32(errors.error_data);
        }

        write_padding!(dst, LOGON_EX_PADDING_SIZE);

        Ok(())
    }

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: LOGON_EX_FIXED_SIZE);

        let _length = src.read_u16();
        let fields_present = src.read_u32();

        let auto_reconnect = if fields_present & Self::AUTO_RECONNECT_PRESENT != 0 {
            ensure_size!(ctx: Self::NAME, in: src, size: 4);
            let _cb_field_data = src.read_u32();
            Some(AutoReconnectPacket::decode(src)?)
        } else {
            None
        };

        let error_notification = if fields_present & Self::ERROR_NOTIFICATION_PRESENT != 0 {
            ensure_size!(ctx: Self::NAME, in: src, size: 4 + 8);
            let _cb_field_data = src.read_u32();
            let error_type = src.read_u32();
            let error_data = src.read_u32();
            Some(LogonErrorsInfo { error_type, error_data })
        } else {
            None
        };

        // Trailing padding; servers have been seen to truncate it.
        let skip = src.len().min(LOGON_EX_PADDING_SIZE);
        read_padding!(src, skip);

        Ok(Self {
            auto_reconnect,
            error_notification,
        })
    }

    fn size(&self) -> usize {
        let mut size = LOGON_EX_FIXED_SIZE + LOGON_EX_PADDING_SIZE;
        if self.auto_reconnect.is_some() {
            size += 4 + AUTO_RECONNECT_PACKET_SIZE;
        }
        if self.error_notification.is_some() {
            size += 4 + 8;
        }
        size
    }
}

/// ARC_SC_PRIVATE_PACKET ([MS-RDPBCGR] 2.2.4.2): the server-issued
/// auto-reconnect cookie. The client reads it here and echoes it (HMAC'd with
/// a fresh client random) in the next connection's Client Info PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoReconnectPacket {
    pub logon_id: u32,
    pub random_bits: [u8; AUTO_RECONNECT_RANDOM_LEN],
}

impl AutoReconnectPacket {
    const NAME: &'static str = "AutoReconnectPacket";

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u32(AUTO_RECONNECT_PACKET_SIZE as u32);
        dst.write_u32(AUTO_RECONNECT_VERSION_1);
        dst.write_u32(self.logon_id);
        dst.write_slice(&self.random_bits);

        Ok(())
    }

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: AUTO_RECONNECT_PACKET_SIZE);

        let length = src.read_u32();
        if length != AUTO_RECONNECT_PACKET_SIZE as u32 {
            return Err(invalid_field_err(Self::NAME, "cbLen", "invalid packet length"));
        }
        let version = src.read_u32();
        if version != AUTO_RECONNECT_VERSION_1 {
            return Err(invalid_field_err(Self::NAME, "version", "unsupported version"));
        }
        let logon_id = src.read_u32();
        let random_bits = src.read_array();

        Ok(Self { logon_id, random_bits })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonErrorsInfo {
    pub error_type: u32,
    pub error_data: u32,
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn logon_info_v2_roundtrip() {
        let pdu = SaveSessionInfoPdu {
            info_data: InfoData::LogonInfoV2(LogonInfoV2 {
                session_id: 3,
                domain: "CONTOSO".to_owned(),
                username: "jdoe".to_owned(),
            }),
        };

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: SaveSessionInfoPdu = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn logon_extended_carries_reconnect_cookie() {
        let pdu = SaveSessionInfoPdu {
            info_data: InfoData::LogonExtended(LogonInfoExtended {
                auto_reconnect: Some(AutoReconnectPacket {
                    logon_id: 7,
                    random_bits: [0x5A; AUTO_RECONNECT_RANDOM_LEN],
                }),
                error_notification: None,
            }),
        };

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: SaveSessionInfoPdu = decode(&encoded).unwrap();
        assert_eq!(decoded.auto_reconnect().unwrap().logon_id, 7);
    }
}
