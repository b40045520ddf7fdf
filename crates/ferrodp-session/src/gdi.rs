//! A software rasterizer implementing [`UpdateHandler`] on top of the GDI
//! primitives: orders are drawn into an in-memory XRGB surface the host can
//! present however it likes.

use ferrodp_graphics::{
    bit_blt, fill_rect, line_to, mem_blt, opaque_rect, pat_blt, polyline, BrushStyle, DeviceContext, Rect, Surface,
};
use ferrodp_pdu::rdp::orders::{
    Brush, DstBltOrder, LineToOrder, Mem3BltOrder, MemBltOrder, MultiOpaqueRectOrder, OpaqueRectOrder, PatBltOrder,
    PolylineOrder, ScrBltOrder,
};

use crate::update::UpdateHandler;

/// Software drawing backend over a [`Surface`].
#[derive(Debug)]
pub struct GdiHandler {
    surface: Surface,
    dc: DeviceContext,
    palette: [u32; 256],
}

impl GdiHandler {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            surface: Surface::new(width, height),
            dc: DeviceContext::new(),
            palette: [0; 256],
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn dc_mut(&mut self) -> &mut DeviceContext {
        &mut self.dc
    }

    fn resolve_brush(&self, brush: &Brush, fore_color: u32, back_color: u32) -> BrushStyle {
        match brush.style & !Brush::CACHED {
            Brush::STYLE_SOLID | Brush::STYLE_NULL => BrushStyle::Solid(fore_color),
            Brush::STYLE_HATCHED => {
                BrushStyle::hatched(brush.hatch, fore_color, back_color).unwrap_or(BrushStyle::Solid(fore_color))
            }
            _ => match &brush.data {
                Some(data) => BrushStyle::pattern(data, brush.bpp, fore_color, back_color, &self.palette)
                    .unwrap_or(BrushStyle::Solid(fore_color)),
                None => BrushStyle::Solid(fore_color),
            },
        }
    }
}

impl UpdateHandler for GdiHandler {
    fn desktop_resize(&mut self, width: u16, height: u16) {
        self.surface.resize(width, height);
    }

    fn decode_bitmap(&mut self, _bpp: u8, width: u16, height: u16, codec_id: u8, data: &[u8]) -> Option<Surface> {
        // Only raw 32-bit blocks are decoded here; codec blocks belong to
        // the host's graphics backend.
        if codec_id != 0 {
            return None;
        }

        let expected = usize::from(width) * usize::from(height) * 4;
        if data.len() < expected {
            return None;
        }

        let pixels = data
            .chunks_exact(4)
            .take(usize::from(width) * usize::from(height))
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Some(Surface::from_pixels(width, height, pixels))
    }

    fn dst_blt(&mut self, order: &DstBltOrder) {
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        // Destination-only operations go through the pattern path with a
        // null brush.
        pat_blt(&mut self.surface, &self.dc, rect, &BrushStyle::Solid(0), order.rop);
    }

    fn pat_blt(&mut self, order: &PatBltOrder) {
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        let brush = self.resolve_brush(&order.brush, order.fore_color, order.back_color);

        let mut dc = self.dc.clone();
        dc.brush_origin = (i32::from(order.brush.org_x), i32::from(order.brush.org_y));

        pat_blt(&mut self.surface, &dc, rect, &brush, order.rop);
    }

    fn scr_blt(&mut self, order: &ScrBltOrder) {
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        let snapshot = self.surface.clone();
        bit_blt(&mut self.surface, &self.dc, rect, &snapshot, order.src_x, order.src_y, order.rop);
    }

    fn opaque_rect(&mut self, order: &OpaqueRectOrder) {
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        opaque_rect(&mut self.surface, &self.dc, rect, order.color);
    }

    fn multi_opaque_rect(&mut self, order: &MultiOpaqueRectOrder) {
        for rectangle in &order.rectangles {
            let rect = Rect::new(
                i32::from(rectangle.left),
                i32::from(rectangle.top),
                i32::from(rectangle.width()),
                i32::from(rectangle.height()),
            );
            fill_rect(&mut self.surface, &self.dc, rect, &BrushStyle::Solid(order.color));
        }
    }

    fn line_to(&mut self, order: &LineToOrder) {
        let mut dc = self.dc.clone();
        dc.pen.color = order.pen_color;
        dc.pen.width = order.pen_width;
        dc.pen.style = order.pen_style;

        line_to(
            &mut self.surface,
            &dc,
            (order.start_x, order.start_y),
            (order.end_x, order.end_y),
            order.rop2,
        );
    }

    fn polyline(&mut self, order: &PolylineOrder) {
        let mut dc = self.dc.clone();
        dc.pen.color = order.color;

        polyline(&mut self.surface, &dc, (order.start_x, order.start_y), &order.points, order.rop2);
    }

    fn mem_blt(&mut self, order: &MemBltOrder, source: &Surface) {
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        mem_blt(&mut self.surface, &self.dc, rect, source, order.src_x, order.src_y, order.rop);
    }

    fn mem3_blt(&mut self, order: &Mem3BltOrder, source: &Surface) {
        // The brush operand of the ternary blit is sampled per pixel by the
        // raster layer; the common SRCCOPY-style codes ignore it.
        let rect = Rect::new(order.left, order.top, order.width, order.height);
        mem_blt(&mut self.surface, &self.dc, rect, source, order.src_x, order.src_y, order.rop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_rect_paints_the_surface() {
        let mut handler = GdiHandler::new(8, 8);
        handler.opaque_rect(&OpaqueRectOrder {
            left: 2,
            top: 2,
            width: 3,
            height: 3,
            color: 0x0012_3456,
        });

        assert_eq!(handler.surface().pixel(2, 2), 0x0012_3456);
        assert_eq!(handler.surface().pixel(4, 4), 0x0012_3456);
        assert_eq!(handler.surface().pixel(5, 5), 0);
    }

    #[test]
    fn desktop_resize_recreates_the_surface() {
        let mut handler = GdiHandler::new(4, 4);
        handler.desktop_resize(16, 2);
        assert_eq!(handler.surface().width(), 16);
        assert_eq!(handler.surface().height(), 2);
    }

    #[test]
    fn raw_bitmap_decode_produces_a_surface() {
        let mut handler = GdiHandler::new(1, 1);
        let data: Vec<u8> = (0..4u32 * 4).flat_map(|i| (i % 255).to_le_bytes()).collect();
        let surface = handler.decode_bitmap(32, 2, 2, 0, &data).unwrap();
        assert_eq!(surface.width(), 2);
        assert_eq!(surface.height(), 2);
    }

    #[test]
    fn unknown_codec_is_refused() {
        let mut handler = GdiHandler::new(1, 1);
        assert!(handler.decode_bitmap(32, 2, 2, 3, &[0u8; 64]).is_none());
    }
}
