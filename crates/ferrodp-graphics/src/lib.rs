//! GDI raster primitives ([MS-RDPEGDI]): raster-operation evaluation,
//! bit-blit, pattern fills, lines and clipping over an in-memory surface.

mod brush;
mod color;
mod dc;
mod raster;
mod rop;
mod surface;

pub use self::brush::{BrushStyle, HATCH_PATTERNS};
pub use self::color::PixelFormat;
pub use self::dc::{BackgroundMode, DeviceContext, Pen};
pub use self::raster::{bit_blt, fill_rect, line_to, mem_blt, opaque_rect, pat_blt, polyline};
pub use self::rop::{rop2, rop3};
pub use self::surface::{Rect, Surface};

#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    #[error("source bitmap is smaller than the requested region")]
    SourceOutOfBounds,
    #[error("invalid brush data: {0}")]
    InvalidBrush(&'static str),
    #[error("unsupported pixel format conversion")]
    UnsupportedConversion,
}
