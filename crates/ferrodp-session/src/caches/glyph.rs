use super::slots::SlotMap;

const GLYPH_CACHE_NUM: usize = 10;
const GLYPH_CACHE_ENTRIES: usize = 254;
const FRAGMENT_CACHE_ENTRIES: usize = 256;

/// A rasterized glyph: a 1-bpp bitmap with its metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedGlyph {
    pub origin_x: i32,
    pub origin_y: i32,
    pub width: u16,
    pub height: u16,
    pub aj: Vec<u8>,
}

/// The ten glyph caches plus the fragment cache.
#[derive(Debug)]
pub struct GlyphCache {
    caches: Vec<SlotMap<CachedGlyph>>,
    fragments: SlotMap<Vec<u8>>,
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphCache {
    pub fn new() -> Self {
        let mut caches = Vec::with_capacity(GLYPH_CACHE_NUM);
        caches.resize_with(GLYPH_CACHE_NUM, || SlotMap::new(GLYPH_CACHE_ENTRIES));

        Self {
            caches,
            fragments: SlotMap::new(FRAGMENT_CACHE_ENTRIES),
        }
    }

    pub fn get(&self, cache_id: u8, index: u8) -> Option<&CachedGlyph> {
        self.caches.get(usize::from(cache_id))?.get(usize::from(index))
    }

    pub fn put(&mut self, cache_id: u8, index: u8, glyph: CachedGlyph) -> bool {
        match self.caches.get_mut(usize::from(cache_id)) {
            Some(cache) => cache.put(usize::from(index), glyph),
            None => {
                warn!(cache_id, "invalid glyph cache id");
                false
            }
        }
    }

    pub fn get_fragment(&self, index: u8) -> Option<&Vec<u8>> {
        self.fragments.get(usize::from(index))
    }

    pub fn put_fragment(&mut self, index: u8, fragment: Vec<u8>) -> bool {
        self.fragments.put(usize::from(index), fragment)
    }
}
