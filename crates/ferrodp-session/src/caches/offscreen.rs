use ferrodp_graphics::Surface;

use super::slots::SlotMap;

const OFFSCREEN_CACHE_ENTRIES: usize = 2000;

/// Offscreen surfaces created by the server; a MemBlt with cache id `0xFF`
/// sources from here instead of the bitmap cache.
#[derive(Debug)]
pub struct OffscreenCache {
    entries: SlotMap<Surface>,
}

impl Default for OffscreenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OffscreenCache {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::new(OFFSCREEN_CACHE_ENTRIES),
        }
    }

    pub fn get(&self, index: u16) -> Option<&Surface> {
        self.entries.get(usize::from(index))
    }

    pub fn put(&mut self, index: u16, surface: Surface) -> bool {
        let stored = self.entries.put(usize::from(index), surface);
        if !stored {
            warn!(index, "invalid offscreen cache index");
        }
        stored
    }
}
