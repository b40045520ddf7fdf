//! Demand Active / Confirm Active PDUs and the capability sets they carry.

use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};

mod bitmap;
mod bitmap_cache;
mod general;
mod glyph_cache;
mod input;
mod misc;
mod offscreen_bitmap_cache;
mod order;
mod sound;
mod virtual_channel;

pub use self::bitmap::{Bitmap, BitmapDrawingFlags};
pub use self::bitmap_cache::{
    BitmapCache, BitmapCacheRev2, CacheEntry, CacheFlags, CellInfo, BITMAP_CACHE_ENTRIES_NUM,
    BITMAP_CACHE_REV2_CELL_INFO_NUM,
};
pub use self::general::{General, GeneralExtraFlags, MajorPlatformType, MinorPlatformType, PROTOCOL_VER};
pub use self::glyph_cache::{CacheDefinition, GlyphCache, GlyphSupportLevel, GLYPH_CACHE_NUM};
pub use self::input::{Input, InputFlags};
pub use self::misc::{
    Brush, BrushSupportLevel, ControlCaps, Font, FontSupportFlags, Pointer, Share, WindowActivation,
};
pub use self::offscreen_bitmap_cache::OffscreenBitmapCache;
pub use self::order::{Order, OrderFlags, OrderSupportExFlags, OrderSupportIndex};
pub use self::sound::{Sound, SoundFlags};
pub use self::virtual_channel::{VirtualChannel, VirtualChannelFlags};

pub const SERVER_CHANNEL_ID: u16 = 0x03ea;

const SOURCE_DESCRIPTOR_LENGTH_FIELD_SIZE: usize = 2;
const COMBINED_CAPABILITIES_LENGTH_FIELD_SIZE: usize = 2;
const NUMBER_CAPABILITIES_FIELD_SIZE: usize = 2;
const PADDING_SIZE: usize = 2;
const SESSION_ID_FIELD_SIZE: usize = 4;
const CAPABILITY_SET_TYPE_FIELD_SIZE: usize = 2;
const CAPABILITY_SET_LENGTH_FIELD_SIZE: usize = 2;
const ORIGINATOR_ID_FIELD_SIZE: usize = 2;

const CAPABILITY_HEADER_SIZE: usize = CAPABILITY_SET_TYPE_FIELD_SIZE + CAPABILITY_SET_LENGTH_FIELD_SIZE;

const NULL_TERMINATOR: &str = "\0";

/// Server Demand Active PDU ([MS-RDPBCGR] 2.2.1.13.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDemandActive {
    pub pdu: DemandActive,
}

impl ServerDemandActive {
    const NAME: &'static str = "ServerDemandActive";

    const FIXED_PART_SIZE: usize = SESSION_ID_FIELD_SIZE;
}

impl Encode for ServerDemandActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        self.pdu.encode(dst)?;
        dst.write_u32(0); // sessionId, ignored by the client

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.pdu.size()
    }
}

impl<'de> Decode<'de> for ServerDemandActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let pdu = DemandActive::decode(src)?;

        ensure_size!(in: src, size: 4);
        let _session_id = src.read_u32();

        Ok(Self { pdu })
    }
}

/// Client Confirm Active PDU ([MS-RDPBCGR] 2.2.1.13.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfirmActive {
    /// Nominally [`SERVER_CHANNEL_ID`]; the Microsoft client instead echoes
    /// the `pdu_source` of the Demand Active PDU, so this is left to callers.
    pub originator_id: u16,
    pub pdu: DemandActive,
}

impl ClientConfirmActive {
    const NAME: &'static str = "ClientConfirmActive";

    const FIXED_PART_SIZE: usize = ORIGINATOR_ID_FIELD_SIZE;
}

impl Encode for ClientConfirmActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.originator_id);

        self.pdu.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.pdu.size()
    }
}

impl<'de> Decode<'de> for ClientConfirmActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let originator_id = src.read_u16();
        let pdu = DemandActive::decode(src)?;

        Ok(Self { originator_id, pdu })
    }
}

/// Demand Active PDU Data (TS_DEMAND_ACTIVE_PDU, [MS-RDPBCGR] 2.2.1.13.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandActive {
    pub source_descriptor: String,
    pub capability_sets: Vec<CapabilitySet>,
}

impl DemandActive {
    const NAME: &'static str = "DemandActive";

    const FIXED_PART_SIZE: usize = SOURCE_DESCRIPTOR_LENGTH_FIELD_SIZE + COMBINED_CAPABILITIES_LENGTH_FIELD_SIZE;
}

impl Encode for DemandActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let combined_length = self.capability_sets.iter().map(Encode::size).sum::<usize>()
            + NUMBER_CAPABILITIES_FIELD_SIZE
            + PADDING_SIZE;

        dst.write_u16(cast_length!(
            "sourceDescLen",
            self.source_descriptor.len() + NULL_TERMINATOR.len()
        )?);
        dst.write_u16(cast_length!("combinedLen", combined_length)?);
        dst.write_slice(self.source_descriptor.as_ref());
        dst.write_slice(NULL_TERMINATOR.as_bytes());
        dst.write_u16(cast_length!("numberCapabilities", self.capability_sets.len())?);
        write_padding!(dst, 2);

        for capability_set in self.capability_sets.iter() {
            capability_set.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + self.source_descriptor.len()
            + NULL_TERMINATOR.len()
            + NUMBER_CAPABILITIES_FIELD_SIZE
            + PADDING_SIZE
            + self.capability_sets.iter().map(Encode::size).sum::<usize>()
    }
}

impl<'de> Decode<'de> for DemandActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let source_descriptor_length = usize::from(src.read_u16());
        let _combined_capabilities_length = usize::from(src.read_u16());

        ensure_size!(in: src, size: source_descriptor_length);
        let source_descriptor = String::from_utf8(src.read_slice(source_descriptor_length).to_vec())
            .map_err(|_| invalid_field_err!("sourceDescriptor", "not valid UTF-8"))?
            .trim_end_matches('\0')
            .to_owned();

        ensure_size!(in: src, size: NUMBER_CAPABILITIES_FIELD_SIZE + PADDING_SIZE);
        let capability_sets_count = usize::from(src.read_u16());
        read_padding!(src, 2);

        let mut capability_sets = Vec::with_capacity(capability_sets_count.min(64));
        for _ in 0..capability_sets_count {
            capability_sets.push(CapabilitySet::decode(src)?);
        }

        Ok(Self {
            source_descriptor,
            capability_sets,
        })
    }
}

/// A single capability set.
///
/// Sets this core does not interpret are carried opaquely so a Confirm Active
/// can echo them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilitySet {
    General(General),
    Bitmap(Bitmap),
    Order(Order),
    BitmapCache(BitmapCache),
    BitmapCacheRev2(BitmapCacheRev2),
    Control(ControlCaps),
    WindowActivation(WindowActivation),
    Pointer(Pointer),
    Share(Share),
    Input(Input),
    Font(Font),
    Brush(Brush),
    GlyphCache(GlyphCache),
    OffscreenBitmapCache(OffscreenBitmapCache),
    Sound(Sound),
    VirtualChannel(VirtualChannel),
    MultifragmentUpdate(MultifragmentUpdate),
    Unknown(Unknown),
}

impl CapabilitySet {
    const NAME: &'static str = "CapabilitySet";

    fn capability_type(&self) -> u16 {
        match self {
            CapabilitySet::General(_) => CapabilitySetType::General.as_u16(),
            CapabilitySet::Bitmap(_) => CapabilitySetType::Bitmap.as_u16(),
            CapabilitySet::Order(_) => CapabilitySetType::Order.as_u16(),
            CapabilitySet::BitmapCache(_) => CapabilitySetType::BitmapCache.as_u16(),
            CapabilitySet::BitmapCacheRev2(_) => CapabilitySetType::BitmapCacheRev2.as_u16(),
            CapabilitySet::Control(_) => CapabilitySetType::Control.as_u16(),
            CapabilitySet::WindowActivation(_) => CapabilitySetType::WindowActivation.as_u16(),
            CapabilitySet::Pointer(_) => CapabilitySetType::Pointer.as_u16(),
            CapabilitySet::Share(_) => CapabilitySetType::Share.as_u16(),
            CapabilitySet::Input(_) => CapabilitySetType::Input.as_u16(),
            CapabilitySet::Font(_) => CapabilitySetType::Font.as_u16(),
            CapabilitySet::Brush(_) => CapabilitySetType::Brush.as_u16(),
            CapabilitySet::GlyphCache(_) => CapabilitySetType::GlyphCache.as_u16(),
            CapabilitySet::OffscreenBitmapCache(_) => CapabilitySetType::OffscreenBitmapCache.as_u16(),
            CapabilitySet::Sound(_) => CapabilitySetType::Sound.as_u16(),
            CapabilitySet::VirtualChannel(_) => CapabilitySetType::VirtualChannel.as_u16(),
            CapabilitySet::MultifragmentUpdate(_) => CapabilitySetType::MultifragmentUpdate.as_u16(),
            CapabilitySet::Unknown(unknown) => unknown.capability_type,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            CapabilitySet::General(caps) => caps.size(),
            CapabilitySet::Bitmap(caps) => caps.size(),
            CapabilitySet::Order(caps) => caps.size(),
            CapabilitySet::BitmapCache(caps) => caps.size(),
            CapabilitySet::BitmapCacheRev2(caps) => caps.size(),
            CapabilitySet::Control(caps) => caps.size(),
            CapabilitySet::WindowActivation(caps) => caps.size(),
            CapabilitySet::Pointer(caps) => caps.size(),
            CapabilitySet::Share(caps) => caps.size(),
            CapabilitySet::Input(caps) => caps.size(),
            CapabilitySet::Font(caps) => caps.size(),
            CapabilitySet::Brush(caps) => caps.size(),
            CapabilitySet::GlyphCache(caps) => caps.size(),
            CapabilitySet::OffscreenBitmapCache(caps) => caps.size(),
            CapabilitySet::Sound(caps) => caps.size(),
            CapabilitySet::VirtualChannel(caps) => caps.size(),
            CapabilitySet::MultifragmentUpdate(caps) => caps.size(),
            CapabilitySet::Unknown(unknown) => unknown.payload.len(),
        }
    }
}

impl Encode for CapabilitySet {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.capability_type());
        dst.write_u16(cast_length!("lengthCapability", self.size())?);

        match self {
            CapabilitySet::General(caps) => caps.encode(dst),
            CapabilitySet::Bitmap(caps) => caps.encode(dst),
            CapabilitySet::Order(caps) => caps.encode(dst),
            CapabilitySet::BitmapCache(caps) => caps.encode(dst),
            CapabilitySet::BitmapCacheRev2(caps) => caps.encode(dst),
            CapabilitySet::Control(caps) => caps.encode(dst),
            CapabilitySet::WindowActivation(caps) => caps.encode(dst),
            CapabilitySet::Pointer(caps) => caps.encode(dst),
            CapabilitySet::Share(caps) => caps.encode(dst),
            CapabilitySet::Input(caps) => caps.encode(dst),
            CapabilitySet::Font(caps) => caps.encode(dst),
            CapabilitySet::Brush(caps) => caps.encode(dst),
            CapabilitySet::GlyphCache(caps) => caps.encode(dst),
            CapabilitySet::OffscreenBitmapCache(caps) => caps.encode(dst),
            CapabilitySet::Sound(caps) => caps.encode(dst),
            CapabilitySet::VirtualChannel(caps) => caps.encode(dst),
            CapabilitySet::MultifragmentUpdate(caps) => caps.encode(dst),
            CapabilitySet::Unknown(unknown) => {
                dst.write_slice(&unknown.payload);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        CAPABILITY_HEADER_SIZE + self.payload_size()
    }
}

impl<'de> Decode<'de> for CapabilitySet {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: CAPABILITY_HEADER_SIZE);

        let capability_type = src.read_u16();
        let length = usize::from(src.read_u16());

        if length < CAPABILITY_HEADER_SIZE {
            return Err(invalid_field_err!("lengthCapability", "shorter than its own header"));
        }

        let payload_length = length - CAPABILITY_HEADER_SIZE;
        ensure_size!(in: src, size: payload_length);
        let payload = src.read_slice(payload_length);
        let mut cur = ReadCursor::new(payload);
        let src = &mut cur;

        match CapabilitySetType::from_u16(capability_type) {
            Some(CapabilitySetType::General) => Ok(CapabilitySet::General(General::decode(src)?)),
            Some(CapabilitySetType::Bitmap) => Ok(CapabilitySet::Bitmap(Bitmap::decode(src)?)),
            Some(CapabilitySetType::Order) => Ok(CapabilitySet::Order(Order::decode(src)?)),
            Some(CapabilitySetType::BitmapCache) => Ok(CapabilitySet::BitmapCache(BitmapCache::decode(src)?)),
            Some(CapabilitySetType::BitmapCacheRev2) => {
                Ok(CapabilitySet::BitmapCacheRev2(BitmapCacheRev2::decode(src)?))
            }
            Some(CapabilitySetType::Control) => Ok(CapabilitySet::Control(ControlCaps::decode(src)?)),
            Some(CapabilitySetType::WindowActivation) => {
                Ok(CapabilitySet::WindowActivation(WindowActivation::decode(src)?))
            }
            Some(CapabilitySetType::Pointer) => Ok(CapabilitySet::Pointer(Pointer::decode(src)?)),
            Some(CapabilitySetType::Share) => Ok(CapabilitySet::Share(Share::decode(src)?)),
            Some(CapabilitySetType::Input) => Ok(CapabilitySet::Input(Input::decode(src)?)),
            Some(CapabilitySetType::Font) => Ok(CapabilitySet::Font(Font::decode(src)?)),
            Some(CapabilitySetType::Brush) => Ok(CapabilitySet::Brush(Brush::decode(src)?)),
            Some(CapabilitySetType::GlyphCache) => Ok(CapabilitySet::GlyphCache(GlyphCache::decode(src)?)),
            Some(CapabilitySetType::OffscreenBitmapCache) => {
                Ok(CapabilitySet::OffscreenBitmapCache(OffscreenBitmapCache::decode(src)?))
            }
            Some(CapabilitySetType::Sound) => Ok(CapabilitySet::Sound(Sound::decode(src)?)),
            Some(CapabilitySetType::VirtualChannel) => Ok(CapabilitySet::VirtualChannel(VirtualChannel::decode(src)?)),
            Some(CapabilitySetType::MultifragmentUpdate) => {
                Ok(CapabilitySet::MultifragmentUpdate(MultifragmentUpdate::decode(src)?))
            }
            _ => Ok(CapabilitySet::Unknown(Unknown {
                capability_type,
                payload: payload.to_vec(),
            })),
        }
    }
}

/// An uninterpreted capability set, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unknown {
    pub capability_type: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
enum CapabilitySetType {
    General = 0x01,
    Bitmap = 0x02,
    Order = 0x03,
    BitmapCache = 0x04,
    Control = 0x05,
    WindowActivation = 0x07,
    Pointer = 0x08,
    Share = 0x09,
    ColorCache = 0x0A,
    Sound = 0x0C,
    Input = 0x0D,
    Font = 0x0E,
    Brush = 0x0F,
    GlyphCache = 0x10,
    OffscreenBitmapCache = 0x11,
    BitmapCacheHostSupport = 0x12,
    BitmapCacheRev2 = 0x13,
    VirtualChannel = 0x14,
    DrawNineGridCache = 0x15,
    DrawGdiPlus = 0x16,
    Rail = 0x17,
    WindowList = 0x18,
    DesktopComposition = 0x19,
    MultifragmentUpdate = 0x1A,
    LargePointer = 0x1B,
    SurfaceCommands = 0x1C,
    BitmapCodecs = 0x1D,
    FrameAcknowledge = 0x1E,
}

impl CapabilitySetType {
    fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Multifragment Update Capability Set ([MS-RDPBCGR] 2.2.7.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultifragmentUpdate {
    pub max_request_size: u32,
}

impl MultifragmentUpdate {
    const NAME: &'static str = "MultifragmentUpdate";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for MultifragmentUpdate {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.max_request_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for MultifragmentUpdate {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let max_request_size = src.read_u32();

        Ok(Self { max_request_size })
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn unknown_capability_set_roundtrips_opaquely() {
        let unknown = CapabilitySet::Unknown(Unknown {
            capability_type: 0x1D,
            payload: vec![1, 2, 3, 4, 5, 6],
        });

        let encoded = encode_vec(&unknown).unwrap();
        let decoded: CapabilitySet = decode(&encoded).unwrap();
        assert_eq!(decoded, unknown);
    }

    #[test]
    fn demand_active_roundtrip() {
        let pdu = DemandActive {
            source_descriptor: "RDP".to_owned(),
            capability_sets: vec![
                CapabilitySet::General(General::default()),
                CapabilitySet::MultifragmentUpdate(MultifragmentUpdate {
                    max_request_size: 8 * 1024 * 1024,
                }),
            ],
        };

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: DemandActive = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }
}
