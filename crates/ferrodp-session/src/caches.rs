//! Client-side caches: the multi-cell bitmap cache with its waiting-list
//! slot and optional persistence, plus the fixed-capacity glyph, brush,
//! offscreen-surface and palette caches.

mod bitmap;
mod brush;
mod glyph;
mod offscreen;
mod palette;
pub mod persistent;
mod slots;

pub use self::bitmap::{BitmapCache, CachedBitmap};
pub use self::brush::{BrushCache, CachedBrush};
pub use self::glyph::{CachedGlyph, GlyphCache};
pub use self::offscreen::OffscreenCache;
pub use self::palette::PaletteCache;

use ferrodp_connector::BitmapCacheConfig;

/// All the caches a session owns.
///
/// With `deactivate_client_decoding` set the whole structure is skipped and
/// the session acts as a null sink.
#[derive(Debug)]
pub struct Caches {
    pub bitmap: BitmapCache,
    pub glyph: GlyphCache,
    pub brush: BrushCache,
    pub offscreen: OffscreenCache,
    pub palette: PaletteCache,
}

impl Caches {
    pub fn new(bitmap_config: &BitmapCacheConfig) -> Self {
        Self {
            bitmap: BitmapCache::new(bitmap_config),
            glyph: GlyphCache::new(),
            brush: BrushCache::new(),
            offscreen: OffscreenCache::new(),
            palette: PaletteCache::new(),
        }
    }
}
