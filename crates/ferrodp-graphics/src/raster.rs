//! The raster primitives invoked by the order dispatcher.
//!
//! Every primitive clips its destination against the device context and the
//! surface extents first, shifting source coordinates by the same delta, then
//! walks the clipped rectangle applying the raster operation per pixel.

use crate::brush::BrushStyle;
use crate::dc::DeviceContext;
use crate::rop::{rop2, rop3};
use crate::surface::{Rect, Surface};

/// General bit-blit from a source surface.
pub fn bit_blt(
    dst: &mut Surface,
    dc: &DeviceContext,
    dest_rect: Rect,
    src: &Surface,
    src_x: i32,
    src_y: i32,
    rop: u8,
) {
    let clipped = dc.clip_rect(dest_rect, dst.extents());
    if clipped.is_empty() {
        return;
    }

    // Shift the source origin by the clipping delta.
    let dx = clipped.left - dest_rect.left;
    let dy = clipped.top - dest_rect.top;
    let src_x = src_x + dx;
    let src_y = src_y + dy;

    let src_extents = src.extents();

    for y in 0..clipped.height() {
        for x in 0..clipped.width() {
            let sx = src_x + x;
            let sy = src_y + y;
            let source = if src_extents.contains_point(sx, sy) {
                src.pixel(sx, sy)
            } else {
                0
            };

            let dest_x = clipped.left + x;
            let dest_y = clipped.top + y;
            let dest = dst.pixel(dest_x, dest_y);

            dst.set_pixel(dest_x, dest_y, rop3(rop, dest, source, 0) & 0x00FF_FFFF);
        }
    }
}

/// MemBlt: blit from a cached bitmap.
pub fn mem_blt(dst: &mut Surface, dc: &DeviceContext, dest_rect: Rect, cached: &Surface, src_x: i32, src_y: i32, rop: u8) {
    bit_blt(dst, dc, dest_rect, cached, src_x, src_y, rop);
}

/// PatBlt: pattern blit combining destination and brush.
pub fn pat_blt(dst: &mut Surface, dc: &DeviceContext, dest_rect: Rect, brush: &BrushStyle, rop: u8) {
    let clipped = dc.clip_rect(dest_rect, dst.extents());
    if clipped.is_empty() {
        return;
    }

    for y in clipped.top..clipped.bottom {
        for x in clipped.left..clipped.right {
            let pattern = brush.sample(x, y, dc.brush_origin);
            let dest = dst.pixel(x, y);
            dst.set_pixel(x, y, rop3(rop, dest, 0, pattern) & 0x00FF_FFFF);
        }
    }
}

/// OpaqueRect: solid fill with no raster operation.
pub fn opaque_rect(dst: &mut Surface, dc: &DeviceContext, dest_rect: Rect, color: u32) {
    fill_rect(dst, dc, dest_rect, &BrushStyle::Solid(color));
}

/// FillRect: fill with an arbitrary brush style.
pub fn fill_rect(dst: &mut Surface, dc: &DeviceContext, dest_rect: Rect, brush: &BrushStyle) {
    let clipped = dc.clip_rect(dest_rect, dst.extents());
    if clipped.is_empty() {
        return;
    }

    for y in clipped.top..clipped.bottom {
        for x in clipped.left..clipped.right {
            dst.set_pixel(x, y, brush.sample(x, y, dc.brush_origin) & 0x00FF_FFFF);
        }
    }
}

/// LineTo: Bresenham line respecting the R2 code and the DC pen.
pub fn line_to(dst: &mut Surface, dc: &DeviceContext, start: (i32, i32), end: (i32, i32), rop2_code: u8) {
    let extents = dst.extents();
    let clip = dc.clip_rect(extents, extents);
    let pen_color = dc.pen.color;

    let (mut x, mut y) = start;
    let (x1, y1) = end;

    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if clip.contains_point(x, y) {
            let dest = dst.pixel(x, y);
            dst.set_pixel(x, y, rop2(rop2_code, dest, pen_color) & 0x00FF_FFFF);
        }

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Polyline: a chain of Bresenham segments through delta-encoded points.
pub fn polyline(dst: &mut Surface, dc: &DeviceContext, start: (i32, i32), deltas: &[(i32, i32)], rop2_code: u8) {
    let mut current = start;
    for delta in deltas {
        let next = (current.0 + delta.0, current.1 + delta.1);
        line_to(dst, dc, current, next, rop2_code);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::codes;
    use crate::rop::rop2_codes;

    fn solid_surface(width: u16, height: u16, color: u32) -> Surface {
        let pixels = vec![color; usize::from(width) * usize::from(height)];
        Surface::from_pixels(width, height, pixels)
    }

    #[test]
    fn srccopy_blit_copies_the_clipped_region() {
        let mut dst = Surface::new(4, 4);
        let src = solid_surface(4, 4, 0x0000_FF00);
        let dc = DeviceContext::new();

        // Destination rectangle hangs off the right edge: only the in-bounds
        // half may be written.
        bit_blt(&mut dst, &dc, Rect::new(2, 0, 4, 2), &src, 0, 0, codes::SRCCOPY);

        assert_eq!(dst.pixel(2, 0), 0x0000_FF00);
        assert_eq!(dst.pixel(3, 1), 0x0000_FF00);
        assert_eq!(dst.pixel(1, 0), 0);
    }

    #[test]
    fn clip_region_shifts_the_source() {
        let mut dst = Surface::new(8, 1);
        let mut src = Surface::new(8, 1);
        for x in 0..8 {
            src.set_pixel(x, 0, x as u32 + 1);
        }

        let mut dc = DeviceContext::new();
        dc.set_clip(Some(Rect::new(4, 0, 4, 1)));

        // The left half of the destination is clipped away, so the copy must
        // start four pixels into the source.
        bit_blt(&mut dst, &dc, Rect::new(0, 0, 8, 1), &src, 0, 0, codes::SRCCOPY);

        assert_eq!(dst.pixel(3, 0), 0);
        assert_eq!(dst.pixel(4, 0), 5);
        assert_eq!(dst.pixel(7, 0), 8);
    }

    #[test]
    fn patblt_with_patcopy_writes_the_brush() {
        let mut dst = Surface::new(8, 8);
        let dc = DeviceContext::new();
        let brush = BrushStyle::hatched(1, 0x00FF_FFFF, 0x0000_0000).unwrap(); // HS_VERTICAL

        pat_blt(&mut dst, &dc, Rect::new(0, 0, 8, 8), &brush, codes::PATCOPY);

        assert_eq!(dst.pixel(3, 5), 0x00FF_FFFF);
        assert_eq!(dst.pixel(4, 5), 0);
    }

    #[test]
    fn dstinvert_inverts_in_place() {
        let mut dst = solid_surface(2, 2, 0x00F0_F0F0);
        let dc = DeviceContext::new();
        let src = Surface::new(2, 2);

        bit_blt(&mut dst, &dc, Rect::new(0, 0, 2, 2), &src, 0, 0, codes::DSTINVERT);

        assert_eq!(dst.pixel(0, 0), 0x000F_0F0F);
    }

    #[test]
    fn line_to_draws_a_diagonal_with_the_pen() {
        let mut dst = Surface::new(4, 4);
        let mut dc = DeviceContext::new();
        dc.pen.color = 0x0000_00FF;

        line_to(&mut dst, &dc, (0, 0), (3, 3), rop2_codes::R2_COPYPEN);

        for i in 0..4 {
            assert_eq!(dst.pixel(i, i), 0x0000_00FF);
        }
        assert_eq!(dst.pixel(1, 0), 0);
    }

    #[test]
    fn polyline_chains_segments() {
        let mut dst = Surface::new(5, 5);
        let mut dc = DeviceContext::new();
        dc.pen.color = 0x0000_0001;

        polyline(&mut dst, &dc, (0, 0), &[(4, 0), (0, 4)], rop2_codes::R2_COPYPEN);

        assert_eq!(dst.pixel(4, 0), 1);
        assert_eq!(dst.pixel(4, 4), 1);
        assert_eq!(dst.pixel(0, 4), 0);
    }
}
