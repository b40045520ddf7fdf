use bitflags::bitflags;
use ferrodp_core::{
    ensure_fixed_part_size, read_padding, write_padding, Decode, DecodeResult, Encode, EncodeResult, ReadCursor,
    WriteCursor,
};

const ORDER_LENGTH: usize = 84;
const TERMINAL_DESCRIPTOR_SIZE: usize = 16;
const ORDER_SUPPORT_SIZE: usize = 32;

/// Order Capability Set ([MS-RDPBCGR] 2.2.7.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_flags: OrderFlags,
    pub order_support: [u8; ORDER_SUPPORT_SIZE],
    pub order_support_ex_flags: OrderSupportExFlags,
    pub desktop_save_size: u32,
    pub text_ansi_code_page: u16,
}

impl Order {
    const NAME: &'static str = "Order";

    const FIXED_PART_SIZE: usize = ORDER_LENGTH;

    pub fn new(
        order_flags: OrderFlags,
        order_support_ex_flags: OrderSupportExFlags,
        desktop_save_size: u32,
        text_ansi_code_page: u16,
    ) -> Self {
        Self {
            order_flags,
            order_support: [0; ORDER_SUPPORT_SIZE],
            order_support_ex_flags,
            desktop_save_size,
            text_ansi_code_page,
        }
    }

    pub fn supports(&self, index: OrderSupportIndex) -> bool {
        self.order_support[index as usize] != 0
    }

    pub fn set_supported(&mut self, index: OrderSupportIndex, supported: bool) {
        self.order_support[index as usize] = u8::from(supported);
    }
}

impl Encode for Order {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        write_padding!(dst, TERMINAL_DESCRIPTOR_SIZE); // terminalDescriptor, ignored
        write_padding!(dst, 4);
        dst.write_u16(1); // desktopSaveXGranularity, ignored
        dst.write_u16(20); // desktopSaveYGranularity, ignored
        write_padding!(dst, 2);
        dst.write_u16(1); // maximumOrderLevel, ORD_LEVEL_1_ORDERS
        dst.write_u16(0); // numberFonts, ignored
        dst.write_u16(self.order_flags.bits());
        dst.write_slice(&self.order_support);
        dst.write_u16(0); // textFlags, ignored
        dst.write_u16(self.order_support_ex_flags.bits());
        write_padding!(dst, 4);
        dst.write_u32(self.desktop_save_size);
        write_padding!(dst, 4);
        dst.write_u16(self.text_ansi_code_page);
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

impl<'de> Decode<'de> for Order {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        read_padding!(src, TERMINAL_DESCRIPTOR_SIZE);
        read_padding!(src, 4);
        let _desktop_save_x_granularity = src.read_u16();
        let _desktop_save_y_granularity = src.read_u16();
        read_padding!(src, 2);
        let _maximum_order_level = src.read_u16();
        let _number_fonts = src.read_u16();
        let order_flags = OrderFlags::from_bits_truncate(src.read_u16());
        let order_support = src.read_array::<ORDER_SUPPORT_SIZE>();
        let _text_flags = src.read_u16();
        let order_support_ex_flags = OrderSupportExFlags::from_bits_truncate(src.read_u16());
        read_padding!(src, 4);
        let desktop_save_size = src.read_u32();
        read_padding!(src, 4);
        let text_ansi_code_page = src.read_u16();
        read_padding!(src, 2);

        Ok(Self {
            order_flags,
            order_support,
            order_support_ex_flags,
            desktop_save_size,
            text_ansi_code_page,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct OrderFlags: u16 {
        const NEGOTIATE_ORDER_SUPPORT = 0x0002;
        const ZERO_BOUNDS_DELTAS_SUPPORT = 0x0008;
        const COLOR_INDEX_SUPPORT = 0x0020;
        const SOLID_PATTERN_BRUSH_ONLY = 0x0040;
        const ORDER_FLAGS_EXTRA_FLAGS = 0x0080;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct OrderSupportExFlags: u16 {
        const CACHE_BITMAP_REV3_SUPPORT = 0x0002;
        const ALTSEC_FRAME_MARKER_SUPPORT = 0x0004;
    }
}

/// Indexes into the `orderSupport` array.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum OrderSupportIndex {
    DstBlt = 0x00,
    PatBlt = 0x01,
    ScrBlt = 0x02,
    MemBlt = 0x03,
    Mem3Blt = 0x04,
    DrawNineGrid = 0x07,
    LineTo = 0x08,
    MultiDrawNineGrid = 0x09,
    OpaqueRect = 0x0A,
    SaveBitmap = 0x0B,
    MultiDstBlt = 0x0F,
    MultiPatBlt = 0x10,
    MultiScrBlt = 0x11,
    MultiOpaqueRect = 0x12,
    Fast = 0x13,
    PolygonSC = 0x14,
    PolygonCB = 0x15,
    Polyline = 0x16,
    FastGlyph = 0x18,
    EllipseSC = 0x19,
    EllipseCB = 0x1A,
    Index = 0x1B,
}
