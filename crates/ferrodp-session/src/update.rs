//! The capability surface the session exposes to its host: drawing and
//! lifecycle callbacks, invoked synchronously during PDU dispatch.
//!
//! Buffers handed to a callback are borrowed for the duration of the call.

use ferrodp_graphics::Surface;
use ferrodp_pdu::rdp::orders::{
    DstBltOrder, GlyphIndexOrder, LineToOrder, Mem3BltOrder, MemBltOrder, MultiOpaqueRectOrder, OpaqueRectOrder,
    PatBltOrder, PolylineOrder, ScrBltOrder,
};

/// Host callbacks. Every method defaults to a no-op so a null sink is just
/// `impl UpdateHandler for T {}`.
#[allow(unused_variables)]
pub trait UpdateHandler {
    //== Lifecycle ==//

    /// The negotiated desktop size changed (reactivation with a different
    /// Bitmap capability set).
    fn desktop_resize(&mut self, width: u16, height: u16) {}

    /// The session (re-)entered the active state; drawing may begin.
    fn switch_surface(&mut self) {}

    fn surface_frame_acknowledge(&mut self, frame_id: u32) {}

    /// The server suppressed or restored display updates.
    fn suppress_output(&mut self, allow_updates: bool) {}

    //== Codec hook ==//

    /// Decodes a bitmap-data block into a surface.
    ///
    /// Bitmap decompression lives with the host graphics backend; `None`
    /// drops the bitmap from the current update while the session continues.
    fn decode_bitmap(&mut self, bpp: u8, width: u16, height: u16, codec_id: u8, data: &[u8]) -> Option<Surface> {
        None
    }

    //== Primary orders ==//

    fn dst_blt(&mut self, order: &DstBltOrder) {}
    fn pat_blt(&mut self, order: &PatBltOrder) {}
    fn scr_blt(&mut self, order: &ScrBltOrder) {}
    fn opaque_rect(&mut self, order: &OpaqueRectOrder) {}
    fn multi_opaque_rect(&mut self, order: &MultiOpaqueRectOrder) {}
    fn line_to(&mut self, order: &LineToOrder) {}
    fn polyline(&mut self, order: &PolylineOrder) {}
    fn mem_blt(&mut self, order: &MemBltOrder, source: &Surface) {}
    fn mem3_blt(&mut self, order: &Mem3BltOrder, source: &Surface) {}
    fn glyph_index(&mut self, order: &GlyphIndexOrder) {}
}

ferrodp_core::assert_obj_safe!(UpdateHandler);

/// The null sink installed when client decoding is deactivated.
#[derive(Debug, Default)]
pub struct NullUpdateHandler;

impl UpdateHandler for NullUpdateHandler {}
