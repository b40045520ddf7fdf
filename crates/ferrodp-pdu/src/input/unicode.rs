use ferrodp_core::{
    ensure_fixed_part_size, read_padding, write_padding, Decode, DecodeResult, Encode, EncodeResult, ReadCursor,
    WriteCursor,
};

use super::KeyboardFlags;

/// TS_UNICODE_KEYBOARD_EVENT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeEvent {
    /// Only the RELEASE flag is meaningful for Unicode input.
    pub flags: KeyboardFlags,
    pub unicode_code: u16,
}

impl UnicodeEvent {
    const NAME: &'static str = "UnicodeEvent";

    const FIXED_PART_SIZE: usize = 2 /* keyboardFlags */ + 2 /* unicodeCode */ + 2 /* pad */;
}

impl Encode for UnicodeEvent {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.flags.bits());
        dst.write_u16(self.unicode_code);
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

impl<'de> Decode<'de> for UnicodeEvent {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let flags = KeyboardFlags::from_bits_truncate(src.read_u16());
        let unicode_code = src.read_u16();
        read_padding!(src, 2);

        Ok(Self { flags, unicode_code })
    }
}
