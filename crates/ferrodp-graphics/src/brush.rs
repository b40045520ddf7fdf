//! Brushes for the pattern-capable primitives.

use crate::color::PixelFormat;
use crate::GraphicsError;

/// The standard 8x8 monochrome hatch patterns (HS_HORIZONTAL through
/// HS_DIAGCROSS), one byte per row, MSB left.
pub const HATCH_PATTERNS: [[u8; 8]; 6] = [
    [0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00], // HS_HORIZONTAL
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10], // HS_VERTICAL
    [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01], // HS_FDIAGONAL
    [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80], // HS_BDIAGONAL
    [0x10, 0x10, 0x10, 0xFF, 0x10, 0x10, 0x10, 0x10], // HS_CROSS
    [0x81, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x81], // HS_DIAGCROSS
];

/// A resolved brush, ready to be sampled per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrushStyle {
    /// Every pixel takes the brush color.
    Solid(u32),
    /// An 8x8 monochrome pattern: 0-bits take the background color, 1-bits
    /// the text (foreground) color.
    Hatched { pattern: [u8; 8], fore_color: u32, back_color: u32 },
    /// An 8x8 bitmap in the brush pixel format, color-converted per pixel.
    Pattern { pixels: [u32; 64] },
}

impl BrushStyle {
    /// Builds a hatched brush from the wire hatch index.
    pub fn hatched(hatch: u8, fore_color: u32, back_color: u32) -> Result<Self, GraphicsError> {
        let pattern = *HATCH_PATTERNS
            .get(usize::from(hatch))
            .ok_or(GraphicsError::InvalidBrush("unknown hatch index"))?;

        Ok(Self::Hatched {
            pattern,
            fore_color,
            back_color,
        })
    }

    /// Builds a pattern brush from raw 8x8 brush data in the given format.
    ///
    /// Monochrome (1 bpp) brush data falls back to the hatched expansion with
    /// the provided colors, matching how servers encode simple patterns.
    pub fn pattern(
        data: &[u8],
        bpp: u8,
        fore_color: u32,
        back_color: u32,
        palette: &[u32; 256],
    ) -> Result<Self, GraphicsError> {
        if bpp == 1 {
            if data.len() < 8 {
                return Err(GraphicsError::InvalidBrush("monochrome brush shorter than 8 rows"));
            }
            let mut pattern = [0u8; 8];
            pattern.copy_from_slice(&data[..8]);
            return Ok(Self::Hatched {
                pattern,
                fore_color,
                back_color,
            });
        }

        let format = PixelFormat::from_bpp(bpp).ok_or(GraphicsError::InvalidBrush("unsupported brush depth"))?;
        if data.len() < 64 * format.bytes_per_pixel() {
            return Err(GraphicsError::InvalidBrush("pattern brush smaller than 8x8"));
        }

        let mut pixels = [0u32; 64];
        for (index, pixel) in pixels.iter_mut().enumerate() {
            *pixel = format.read_pixel(data, index, palette)?;
        }

        Ok(Self::Pattern { pixels })
    }

    /// Samples the brush at surface coordinates, honoring the pattern origin.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, origin: (i32, i32)) -> u32 {
        match self {
            Self::Solid(color) => *color,
            Self::Hatched {
                pattern,
                fore_color,
                back_color,
            } => {
                let row = (y - origin.1).rem_euclid(8) as usize;
                let column = (x - origin.0).rem_euclid(8) as usize;
                if pattern[row] & (0x80 >> column) != 0 {
                    *fore_color
                } else {
                    *back_color
                }
            }
            Self::Pattern { pixels } => {
                let row = (y - origin.1).rem_euclid(8) as usize;
                let column = (x - origin.0).rem_euclid(8) as usize;
                pixels[row * 8 + column]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hatched_brush_selects_colors_by_bit() {
        let brush = BrushStyle::hatched(1, 0xFF_0000, 0x00_00FF).unwrap(); // HS_VERTICAL
        // Column 3 is set for every row of HS_VERTICAL (0x10 = 0001_0000).
        assert_eq!(brush.sample(3, 0, (0, 0)), 0xFF_0000);
        assert_eq!(brush.sample(4, 0, (0, 0)), 0x00_00FF);
    }

    #[test]
    fn pattern_origin_shifts_sampling() {
        let brush = BrushStyle::hatched(1, 1, 0).unwrap();
        // Shifting the origin right by one moves the hit column.
        assert_eq!(brush.sample(4, 0, (1, 0)), 1);
    }

    #[test]
    fn unknown_hatch_is_rejected() {
        assert!(BrushStyle::hatched(6, 0, 0).is_err());
    }
}
