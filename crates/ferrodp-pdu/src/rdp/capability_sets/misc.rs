//! The small fixed-layout capability sets: Control, Window Activation,
//! Pointer, Share, Font and Brush.

use bitflags::bitflags;
use ferrodp_core::{
    ensure_fixed_part_size, ensure_size, read_padding, write_padding, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive as _;

/// Control Capability Set ([MS-RDPBCGR] 2.2.7.2.2). All fields carry the
/// fixed values the protocol mandates; the set only exists for backward
/// compatibility.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ControlCaps;

impl ControlCaps {
    const NAME: &'static str = "ControlCaps";

    const FIXED_PART_SIZE: usize = 8;
}

impl Encode for ControlCaps {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(0); // controlFlags, MUST be zero
        dst.write_u16(0); // remoteDetachFlag, MUST be FALSE
        dst.write_u16(2); // controlInterest, CONTROLPRIORITY_NEVER
        dst.write_u16(2); // detachInterest, CONTROLPRIORITY_NEVER

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for ControlCaps {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);
        read_padding!(src, Self::FIXED_PART_SIZE);

        Ok(Self)
    }
}

/// Window Activation Capability Set ([MS-RDPBCGR] 2.2.7.2.3). All four flags
/// MUST be FALSE.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct WindowActivation;

impl WindowActivation {
    const NAME: &'static str = "WindowActivation";

    const FIXED_PART_SIZE: usize = 8;
}

impl Encode for WindowActivation {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        write_padding!(dst, Self::FIXED_PART_SIZE);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for WindowActivation {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);
        read_padding!(src, Self::FIXED_PART_SIZE);

        Ok(Self)
    }
}

/// Pointer Capability Set ([MS-RDPBCGR] 2.2.7.1.5).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pointer {
    pub color_pointer_cache_size: u16,
    /// Optional on the wire; a non-zero value enables new pointer updates.
    pub pointer_cache_size: u16,
}

impl Pointer {
    const NAME: &'static str = "Pointer";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for Pointer {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(1); // colorPointerFlag, MUST be TRUE
        dst.write_u16(self.color_pointer_cache_size);
        dst.write_u16(self.pointer_cache_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + 2
    }
}

impl<'de> Decode<'de> for Pointer {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let _color_pointer_flag = src.read_u16();
        let color_pointer_cache_size = src.read_u16();
        let pointer_cache_size = if src.len() >= 2 { src.read_u16() } else { 0 };

        Ok(Self {
            color_pointer_cache_size,
            pointer_cache_size,
        })
    }
}

/// Share Capability Set ([MS-RDPBCGR] 2.2.7.2.4).
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Share {
    /// MCS channel id of the sender; zero when sent by the client.
    pub node_id: u16,
}

impl Share {
    const NAME: &'static str = "Share";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for Share {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.node_id);
        write_padding!(dst, 2);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for Share {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let node_id = src.read_u16();
        read_padding!(src, 2);

        Ok(Self { node_id })
    }
}

/// Font Capability Set ([MS-RDPBCGR] 2.2.7.2.5).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Font {
    pub font_support_flags: FontSupportFlags,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            font_support_flags: FontSupportFlags::FONTSUPPORT_FONTLIST,
        }
    }
}

impl Font {
    const NAME: &'static str = "Font";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for Font {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.font_support_flags.bits());
        write_padding!(dst, 2);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for Font {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        // Both fields are optional on the wire.
        let font_support_flags = if src.len() >= 2 {
            FontSupportFlags::from_bits_truncate(src.read_u16())
        } else {
            FontSupportFlags::empty()
        };
        if src.len() >= 2 {
            read_padding!(src, 2);
        }

        Ok(Self { font_support_flags })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FontSupportFlags: u16 {
        const FONTSUPPORT_FONTLIST = 0x0001;
    }
}

/// Brush Capability Set ([MS-RDPBCGR] 2.2.7.1.7).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Brush {
    pub support_level: BrushSupportLevel,
}

impl Brush {
    const NAME: &'static str = "Brush";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for Brush {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.support_level as u32);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for Brush {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let support_level = BrushSupportLevel::from_u32(src.read_u32()).unwrap_or(BrushSupportLevel::Default);

        Ok(Self { support_level })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum BrushSupportLevel {
    Default = 0,
    Color8x8 = 1,
    ColorFull = 2,
}
