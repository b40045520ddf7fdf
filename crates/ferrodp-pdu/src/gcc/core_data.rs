use bitflags::bitflags;
use ferrodp_core::{
    ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode, DecodeResult, Encode,
    EncodeResult, ReadCursor, WriteCursor,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};

use crate::nego::SecurityProtocol;
use crate::utils;

const VERSION_SIZE: usize = 4;
const DESKTOP_WIDTH_SIZE: usize = 2;
const DESKTOP_HEIGHT_SIZE: usize = 2;
const COLOR_DEPTH_SIZE: usize = 2;
const SAS_SEQUENCE_SIZE: usize = 2;
const KEYBOARD_LAYOUT_SIZE: usize = 4;
const CLIENT_BUILD_SIZE: usize = 4;
const CLIENT_NAME_SIZE: usize = 32;
const KEYBOARD_TYPE_SIZE: usize = 4;
const KEYBOARD_SUBTYPE_SIZE: usize = 4;
const KEYBOARD_FUNCTIONAL_KEYS_COUNT_SIZE: usize = 4;
const IME_FILE_NAME_SIZE: usize = 64;

const CLIENT_CORE_REQUIRED_FIELDS_SIZE: usize = VERSION_SIZE
    + DESKTOP_WIDTH_SIZE
    + DESKTOP_HEIGHT_SIZE
    + COLOR_DEPTH_SIZE
    + SAS_SEQUENCE_SIZE
    + KEYBOARD_LAYOUT_SIZE
    + CLIENT_BUILD_SIZE
    + CLIENT_NAME_SIZE
    + KEYBOARD_TYPE_SIZE
    + KEYBOARD_SUBTYPE_SIZE
    + KEYBOARD_FUNCTIONAL_KEYS_COUNT_SIZE
    + IME_FILE_NAME_SIZE;

const DIG_PRODUCT_ID_SIZE: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RdpVersion(pub u32);

impl RdpVersion {
    pub const V4: Self = Self(0x0008_0001);
    pub const V5_PLUS: Self = Self(0x0008_0004);
    pub const V10: Self = Self(0x0008_0005);
}

impl From<u32> for RdpVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<RdpVersion> for u32 {
    fn from(value: RdpVersion) -> Self {
        value.0
    }
}

/// TS_UD_CS_CORE required fields plus the optional tail ([MS-RDPBCGR] 2.2.1.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCoreData {
    pub version: RdpVersion,
    pub desktop_width: u16,
    pub desktop_height: u16,
    pub color_depth: ColorDepth,
    pub sec_access_sequence: SecureAccessSequence,
    pub keyboard_layout: u32,
    pub client_build: u32,
    /// Truncated to the first 15 characters on the wire.
    pub client_name: String,
    pub keyboard_type: KeyboardType,
    pub keyboard_subtype: u32,
    pub keyboard_functional_keys_count: u32,
    pub ime_file_name: String,
    pub optional_data: ClientCoreOptionalData,
}

impl ClientCoreData {
    const NAME: &'static str = "ClientCoreData";

    const FIXED_PART_SIZE: usize = CLIENT_CORE_REQUIRED_FIELDS_SIZE;
}

impl Encode for ClientCoreData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let mut client_name = utils::to_utf16_bytes(&self.client_name);
        client_name.truncate(CLIENT_NAME_SIZE - 2);
        client_name.resize(CLIENT_NAME_SIZE, 0);

        let mut ime_file_name = utils::to_utf16_bytes(&self.ime_file_name);
        ime_file_name.truncate(IME_FILE_NAME_SIZE - 2);
        ime_file_name.resize(IME_FILE_NAME_SIZE, 0);

        dst.write_u32(self.version.into());
        dst.write_u16(self.desktop_width);
        dst.write_u16(self.desktop_height);
        dst.write_u16(self.color_depth.to_u16().unwrap_or(0xCA01));
        dst.write_u16(self.sec_access_sequence.to_u16().unwrap_or(0xAA03));
        dst.write_u32(self.keyboard_layout);
        dst.write_u32(self.client_build);
        dst.write_slice(&client_name);
        dst.write_u32(self.keyboard_type.to_u32().unwrap_or(4));
        dst.write_u32(self.keyboard_subtype);
        dst.write_u32(self.keyboard_functional_keys_count);
        dst.write_slice(&ime_file_name);

        self.optional_data.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.optional_data.size()
    }
}

impl<'de> Decode<'de> for ClientCoreData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let version = RdpVersion(src.read_u32());
        let desktop_width = src.read_u16();
        let desktop_height = src.read_u16();
        let color_depth =
            ColorDepth::from_u16(src.read_u16()).ok_or_else(|| invalid_field_err!("colorDepth", "invalid"))?;
        let sec_access_sequence = SecureAccessSequence::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("SASSequence", "invalid"))?;
        let keyboard_layout = src.read_u32();
        let client_build = src.read_u32();
        let client_name = utils::from_utf16_bytes(src.read_slice(CLIENT_NAME_SIZE))
            .trim_end_matches('\0')
            .into();
        let keyboard_type =
            KeyboardType::from_u32(src.read_u32()).ok_or_else(|| invalid_field_err!("keyboardType", "invalid"))?;
        let keyboard_subtype = src.read_u32();
        let keyboard_functional_keys_count = src.read_u32();
        let ime_file_name = utils::from_utf16_bytes(src.read_slice(IME_FILE_NAME_SIZE))
            .trim_end_matches('\0')
            .into();

        let optional_data = ClientCoreOptionalData::decode(src)?;

        Ok(Self {
            version,
            desktop_width,
            desktop_height,
            color_depth,
            sec_access_sequence,
            keyboard_layout,
            client_build,
            client_name,
            keyboard_type,
            keyboard_subtype,
            keyboard_functional_keys_count,
            ime_file_name,
            optional_data,
        })
    }
}

/// Optional fields of TS_UD_CS_CORE.
///
/// Each field may only be present when all preceding fields are present; the
/// decoder stops at the first absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCoreOptionalData {
    pub post_beta2_color_depth: Option<ColorDepth>,
    pub client_product_id: Option<u16>,
    pub serial_number: Option<u32>,
    pub high_color_depth: Option<HighColorDepth>,
    pub supported_color_depths: Option<SupportedColorDepths>,
    pub early_capability_flags: Option<ClientEarlyCapabilityFlags>,
    pub dig_product_id: Option<String>,
    pub connection_type: Option<ConnectionType>,
    pub server_selected_protocol: Option<SecurityProtocol>,
}

impl ClientCoreOptionalData {
    const NAME: &'static str = "ClientCoreOptionalData";
}

impl Encode for ClientCoreOptionalData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        match self.post_beta2_color_depth {
            Some(value) => dst.write_u16(value.to_u16().unwrap_or(0xCA01)),
            None => return Ok(()),
        }
        match self.client_product_id {
            Some(value) => dst.write_u16(value),
            None => return Ok(()),
        }
        match self.serial_number {
            Some(value) => dst.write_u32(value),
            None => return Ok(()),
        }
        match self.high_color_depth {
            Some(value) => dst.write_u16(value.to_u16().unwrap_or(24)),
            None => return Ok(()),
        }
        match self.supported_color_depths {
            Some(value) => dst.write_u16(value.bits()),
            None => return Ok(()),
        }
        match self.early_capability_flags {
            Some(value) => dst.write_u16(value.bits()),
            None => return Ok(()),
        }

        if let Some(ref dig_product_id) = self.dig_product_id {
            let mut buffer = utils::to_utf16_bytes(dig_product_id);
            buffer.truncate(DIG_PRODUCT_ID_SIZE - 2);
            buffer.resize(DIG_PRODUCT_ID_SIZE, 0);
            dst.write_slice(&buffer);
        } else {
            return Ok(());
        }

        match self.connection_type {
            Some(value) => {
                dst.write_u8(value as u8);
                write_padding!(dst, 1);
            }
            None => return Ok(()),
        }
        match self.server_selected_protocol {
            Some(value) => dst.write_u32(value.bits()),
            None => return Ok(()),
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let mut size = 0;

        if self.post_beta2_color_depth.is_some() {
            size += 2;
        }
        if self.client_product_id.is_some() {
            size += 2;
        }
        if self.serial_number.is_some() {
            size += 4;
        }
        if self.high_color_depth.is_some() {
            size += 2;
        }
        if self.supported_color_depths.is_some() {
            size += 2;
        }
        if self.early_capability_flags.is_some() {
            size += 2;
        }
        if self.dig_product_id.is_some() {
            size += DIG_PRODUCT_ID_SIZE;
        }
        if self.connection_type.is_some() {
            size += 2; // connectionType + pad1octet
        }
        if self.server_selected_protocol.is_some() {
            size += 4;
        }

        size
    }
}

impl<'de> Decode<'de> for ClientCoreOptionalData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut data = Self::default();

        macro_rules! read_or_return {
            ($size:expr) => {
                if src.len() < $size {
                    return Ok(data);
                }
            };
        }

        read_or_return!(2);
        data.post_beta2_color_depth = Some(
            ColorDepth::from_u16(src.read_u16()).ok_or_else(|| invalid_field_err!("postBeta2ColorDepth", "invalid"))?,
        );

        read_or_return!(2);
        data.client_product_id = Some(src.read_u16());

        read_or_return!(4);
        data.serial_number = Some(src.read_u32());

        read_or_return!(2);
        data.high_color_depth =
            Some(HighColorDepth::from_u16(src.read_u16()).ok_or_else(|| invalid_field_err!("highColorDepth", "invalid"))?);

        read_or_return!(2);
        data.supported_color_depths = Some(SupportedColorDepths::from_bits_truncate(src.read_u16()));

        read_or_return!(2);
        data.early_capability_flags = Some(ClientEarlyCapabilityFlags::from_bits_truncate(src.read_u16()));

        read_or_return!(DIG_PRODUCT_ID_SIZE);
        data.dig_product_id = Some(
            utils::from_utf16_bytes(src.read_slice(DIG_PRODUCT_ID_SIZE))
                .trim_end_matches('\0')
                .into(),
        );

        read_or_return!(2);
        data.connection_type =
            Some(ConnectionType::from_u8(src.read_u8()).ok_or_else(|| invalid_field_err!("connectionType", "invalid"))?);
        read_padding!(src, 1);

        read_or_return!(4);
        data.server_selected_protocol = Some(SecurityProtocol::from_bits_truncate(src.read_u32()));

        Ok(data)
    }
}

/// TS_UD_SC_CORE ([MS-RDPBCGR] 2.2.1.4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCoreData {
    pub version: RdpVersion,
    pub optional_data: ServerCoreOptionalData,
}

impl ServerCoreData {
    const NAME: &'static str = "ServerCoreData";

    const FIXED_PART_SIZE: usize = VERSION_SIZE;
}

impl Encode for ServerCoreData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.version.into());
        self.optional_data.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.optional_data.size()
    }
}

impl<'de> Decode<'de> for ServerCoreData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let version = RdpVersion(src.read_u32());
        let optional_data = ServerCoreOptionalData::decode(src)?;

        Ok(Self { version, optional_data })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCoreOptionalData {
    pub client_requested_protocols: Option<SecurityProtocol>,
    pub early_capability_flags: Option<ServerEarlyCapabilityFlags>,
}

impl ServerCoreOptionalData {
    const NAME: &'static str = "ServerCoreOptionalData";
}

impl Encode for ServerCoreOptionalData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        if let Some(protocols) = self.client_requested_protocols {
            dst.write_u32(protocols.bits());
        } else {
            return Ok(());
        }

        if let Some(flags) = self.early_capability_flags {
            dst.write_u32(flags.bits());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let mut size = 0;

        if self.client_requested_protocols.is_some() {
            size += 4;
        }
        if self.early_capability_flags.is_some() {
            size += 4;
        }

        size
    }
}

impl<'de> Decode<'de> for ServerCoreOptionalData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut data = Self::default();

        if src.len() < 4 {
            return Ok(data);
        }
        data.client_requested_protocols = Some(SecurityProtocol::from_bits_truncate(src.read_u32()));

        if src.len() < 4 {
            return Ok(data);
        }
        data.early_capability_flags = Some(ServerEarlyCapabilityFlags::from_bits_truncate(src.read_u32()));

        Ok(data)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum ColorDepth {
    Bpp4 = 0xCA00,
    Bpp8 = 0xCA01,
    Rns16Bpp555 = 0xCA02,
    Rns16Bpp565 = 0xCA03,
    Rns24Bpp = 0xCA04,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum SecureAccessSequence {
    Del = 0xAA03,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum KeyboardType {
    IbmPcXt = 1,
    OlivettiIco = 2,
    IbmPcAt = 3,
    IbmEnhanced = 4,
    Nokia1050 = 5,
    Nokia9140 = 6,
    Japanese = 7,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum HighColorDepth {
    Bpp4 = 4,
    Bpp8 = 8,
    Bpp15 = 15,
    Bpp16 = 16,
    Bpp24 = 24,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ConnectionType {
    NotUsed = 0,
    Modem = 1,
    BroadbandLow = 2,
    Satellite = 3,
    BroadbandHigh = 4,
    Wan = 5,
    Lan = 6,
    AutoDetect = 7,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SupportedColorDepths: u16 {
        const BPP24 = 0x01;
        const BPP16 = 0x02;
        const BPP15 = 0x04;
        const BPP32 = 0x08;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ClientEarlyCapabilityFlags: u16 {
        const SUPPORT_ERR_INFO_PDU = 0x0001;
        const WANT_32_BPP_SESSION = 0x0002;
        const SUPPORT_STATUS_INFO_PDU = 0x0004;
        const STRONG_ASYMMETRIC_KEYS = 0x0008;
        const VALID_CONNECTION_TYPE = 0x0020;
        const SUPPORT_MONITOR_LAYOUT_PDU = 0x0040;
        const SUPPORT_NET_CHAR_AUTODETECT = 0x0080;
        const SUPPORT_DYN_VC_GFX_PROTOCOL = 0x0100;
        const SUPPORT_DYNAMIC_TIME_ZONE = 0x0200;
        const SUPPORT_HEARTBEAT_PDU = 0x0400;
        const SUPPORT_SKIP_CHANNELJOIN = 0x0800;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ServerEarlyCapabilityFlags: u32 {
        const EDGE_ACTIONS_SUPPORTED_V1 = 0x0000_0001;
        const DYNAMIC_DST_SUPPORTED = 0x0000_0002;
        const EDGE_ACTIONS_SUPPORTED_V2 = 0x0000_0004;
        const SKIP_CHANNELJOIN_SUPPORTED = 0x0000_0008;
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    fn sample_core_data() -> ClientCoreData {
        ClientCoreData {
            version: RdpVersion::V5_PLUS,
            desktop_width: 1280,
            desktop_height: 1024,
            color_depth: ColorDepth::Bpp8,
            sec_access_sequence: SecureAccessSequence::Del,
            keyboard_layout: 0x409,
            client_build: 2600,
            client_name: "workstation".to_owned(),
            keyboard_type: KeyboardType::IbmEnhanced,
            keyboard_subtype: 0,
            keyboard_functional_keys_count: 12,
            ime_file_name: String::new(),
            optional_data: ClientCoreOptionalData {
                post_beta2_color_depth: Some(ColorDepth::Bpp8),
                client_product_id: Some(1),
                serial_number: Some(0),
                high_color_depth: Some(HighColorDepth::Bpp24),
                supported_color_depths: Some(SupportedColorDepths::BPP16 | SupportedColorDepths::BPP24),
                early_capability_flags: Some(ClientEarlyCapabilityFlags::SUPPORT_ERR_INFO_PDU),
                dig_product_id: Some(String::new()),
                connection_type: Some(ConnectionType::Lan),
                server_selected_protocol: Some(SecurityProtocol::RDP),
            },
        }
    }

    #[test]
    fn client_core_data_roundtrip() {
        let data = sample_core_data();
        let encoded = encode_vec(&data).unwrap();
        assert_eq!(encoded.len(), data.size());

        let decoded: ClientCoreData = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn optional_tail_stops_at_first_absent_field() {
        let mut data = sample_core_data();
        data.optional_data = ClientCoreOptionalData {
            post_beta2_color_depth: Some(ColorDepth::Bpp8),
            client_product_id: Some(1),
            ..Default::default()
        };

        let encoded = encode_vec(&data).unwrap();
        let decoded: ClientCoreData = decode(&encoded).unwrap();
        assert_eq!(decoded.optional_data.serial_number, None);
        assert_eq!(decoded.optional_data.client_product_id, Some(1));
    }
}
