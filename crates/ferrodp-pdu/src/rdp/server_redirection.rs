//! Server Redirection Packet ([MS-RDPBCGR] 2.2.13.1).
//!
//! Carried under a basic security header with the `REDIRECTION_PKT` flag.
//! Receipt tears the session down: the client reconnects to the designated
//! target with the patched settings.

use bitflags::bitflags;
use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

use crate::utils::{self, CharacterSet};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct RedirectionFields: u32 {
        const TARGET_NET_ADDRESS = 0x0000_0001;
        const LOAD_BALANCE_INFO = 0x0000_0002;
        const USERNAME = 0x0000_0004;
        const DOMAIN = 0x0000_0008;
        const PASSWORD = 0x0000_0010;
        const DONT_STORE_USERNAME = 0x0000_0020;
        const SMARTCARD_LOGON = 0x0000_0040;
        const NOREDIRECT = 0x0000_0080;
        const TARGET_FQDN = 0x0000_0100;
        const TARGET_NETBIOS_NAME = 0x0000_0200;
        const TARGET_NET_ADDRESSES = 0x0000_0800;
    }
}

/// RDP_SERVER_REDIRECTION_PACKET.
///
/// The `password` field is an opaque cookie (already encrypted by the server)
/// which the client passes back verbatim in the next Client Info PDU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerRedirectionPdu {
    pub session_id: u32,
    pub fields: RedirectionFields,
    pub target_net_address: Option<String>,
    pub load_balance_info: Option<Vec<u8>>,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub password_cookie: Option<Vec<u8>>,
    pub target_fqdn: Option<String>,
}

impl ServerRedirectionPdu {
    const NAME: &'static str = "ServerRedirectionPdu";

    const FIXED_PART_SIZE: usize = 2 /* flags */ + 2 /* length */ + 4 /* sessionId */ + 4 /* redirFlags */;

    const SERVER_REDIRECTION_FLAGS: u16 = 0x0400;
}

impl Encode for ServerRedirectionPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(Self::SERVER_REDIRECTION_FLAGS);
        dst.write_u16(cast_length!("length", self.size())?);
        dst.write_u32(self.session_id);
        dst.write_u32(self.fields.bits());

        if let Some(ref address) = self.target_net_address {
            write_unicode_blob(dst, address);
        }
        if let Some(ref info) = self.load_balance_info {
            dst.write_u32(cast_length!("loadBalanceInfoLen", info.len())?);
            dst.write_slice(info);
        }
        if let Some(ref username) = self.username {
            write_unicode_blob(dst, username);
        }
        if let Some(ref domain) = self.domain {
            write_unicode_blob(dst, domain);
        }
        if let Some(ref cookie) = self.password_cookie {
            dst.write_u32(cast_length!("passwordLen", cookie.len())?);
            dst.write_slice(cookie);
        }
        if let Some(ref fqdn) = self.target_fqdn {
            write_unicode_blob(dst, fqdn);
        }

        write_padding!(dst, 8);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let mut size = Self::FIXED_PART_SIZE;

        if let Some(ref address) = self.target_net_address {
            size += 4 + utils::encoded_str_len(address, CharacterSet::Unicode) + 2;
        }
        if let Some(ref info) = self.load_balance_info {
            size += 4 + info.len();
        }
        if let Some(ref username) = self.username {
            size += 4 + utils::encoded_str_len(username, CharacterSet::Unicode) + 2;
        }
        if let Some(ref domain) = self.domain {
            size += 4 + utils::encoded_str_len(domain, CharacterSet::Unicode) + 2;
        }
        if let Some(ref cookie) = self.password_cookie {
            size += 4 + cookie.len();
        }
        if let Some(ref fqdn) = self.target_fqdn {
            size += 4 + utils::encoded_str_len(fqdn, CharacterSet::Unicode) + 2;
        }

        size + 8 /* pad */
    }
}

impl<'de> Decode<'de> for ServerRedirectionPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let _flags = src.read_u16();
        let _length = src.read_u16();
        let session_id = src.read_u32();
        let fields = RedirectionFields::from_bits_truncate(src.read_u32());

        let mut pdu = Self {
            session_id,
            fields,
            ..Default::default()
        };

        if fields.contains(RedirectionFields::TARGET_NET_ADDRESS) {
            pdu.target_net_address = Some(read_unicode_blob(src)?);
        }
        if fields.contains(RedirectionFields::LOAD_BALANCE_INFO) {
            pdu.load_balance_info = Some(read_binary_blob(src)?);
        }
        if fields.contains(RedirectionFields::USERNAME) {
            pdu.username = Some(read_unicode_blob(src)?);
        }
        if fields.contains(RedirectionFields::DOMAIN) {
            pdu.domain = Some(read_unicode_blob(src)?);
        }
        if fields.contains(RedirectionFields::PASSWORD) {
            pdu.password_cookie = Some(read_binary_blob(src)?);
        }
        if fields.contains(RedirectionFields::TARGET_FQDN) {
            pdu.target_fqdn = Some(read_unicode_blob(src)?);
        }

        // Remaining optional fields and padding are not consumed.

        Ok(pdu)
    }
}

fn read_binary_blob<'a>(src: &mut ReadCursor<'a>) -> DecodeResult<Vec<u8>> {
    const CTX: &str = "RedirectionBlob";

    ensure_size!(ctx: CTX, in: src, size: 4);
    let length = usize::try_from(src.read_u32()).map_err(|_| invalid_field_err(CTX, "length", "too big"))?;
    ensure_size!(ctx: CTX, in: src, size: length);
    Ok(src.read_slice(length).to_vec())
}

fn read_unicode_blob(src: &mut ReadCursor<'_>) -> DecodeResult<String> {
    const CTX: &str = "RedirectionBlob";

    ensure_size!(ctx: CTX, in: src, size: 4);
    let length = usize::try_from(src.read_u32()).map_err(|_| invalid_field_err(CTX, "length", "too big"))?;
    utils::read_string_from_cursor(src, length, CharacterSet::Unicode)
}

fn write_unicode_blob(dst: &mut WriteCursor<'_>, value: &str) {
    let encoded = utils::to_utf16_bytes(value);
    dst.write_u32((encoded.len() + 2) as u32);
    dst.write_slice(&encoded);
    dst.write_u16(0);
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn redirection_roundtrip() {
        let pdu = ServerRedirectionPdu {
            session_id: 42,
            fields: RedirectionFields::TARGET_NET_ADDRESS
                | RedirectionFields::USERNAME
                | RedirectionFields::DOMAIN
                | RedirectionFields::PASSWORD,
            target_net_address: Some("10.0.0.7".to_owned()),
            username: Some("jdoe".to_owned()),
            domain: Some("CONTOSO".to_owned()),
            password_cookie: Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ..Default::default()
        };

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: ServerRedirectionPdu = decode(&encoded).unwrap();

        assert_eq!(decoded.session_id, 42);
        assert_eq!(decoded.target_net_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(decoded.username.as_deref(), Some("jdoe"));
        assert_eq!(decoded.domain.as_deref(), Some("CONTOSO"));
        assert_eq!(decoded.password_cookie, Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }
}
