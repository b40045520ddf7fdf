use super::slots::SlotMap;

const PALETTE_CACHE_ENTRIES: usize = 6;

/// Cached 256-entry color tables for palette-indexed sessions.
#[derive(Debug)]
pub struct PaletteCache {
    entries: SlotMap<Box<[u32; 256]>>,
}

impl Default for PaletteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteCache {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::new(PALETTE_CACHE_ENTRIES),
        }
    }

    pub fn get(&self, index: u8) -> Option<&[u32; 256]> {
        self.entries.get(usize::from(index)).map(Box::as_ref)
    }

    pub fn put(&mut self, index: u8, colors: Box<[u32; 256]>) -> bool {
        let stored = self.entries.put(usize::from(index), colors);
        if !stored {
            warn!(index, "invalid palette cache index");
        }
        stored
    }
}
