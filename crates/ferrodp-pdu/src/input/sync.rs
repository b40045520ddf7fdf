use bitflags::bitflags;
use ferrodp_core::{
    ensure_fixed_part_size, read_padding, write_padding, Decode, DecodeResult, Encode, EncodeResult, ReadCursor,
    WriteCursor,
};

/// TS_SYNC_EVENT: reports the state of the toggle keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub flags: SyncToggleFlags,
}

impl SyncEvent {
    const NAME: &'static str = "SyncEvent";

    const FIXED_PART_SIZE: usize = 2 /* pad */ + 4 /* toggleFlags */;
}

impl Encode for SyncEvent {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        write_padding!(dst, 2);
        dst.write_u32(self.flags.bits());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for SyncEvent {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        read_padding!(src, 2);
        let flags = SyncToggleFlags::from_bits_truncate(src.read_u32());

        Ok(Self { flags })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SyncToggleFlags: u32 {
        const SCROLL_LOCK = 0x0000_0001;
        const NUM_LOCK = 0x0000_0002;
        const CAPS_LOCK = 0x0000_0004;
        const KANA_LOCK = 0x0000_0008;
    }
}
