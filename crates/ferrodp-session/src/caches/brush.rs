use super::slots::SlotMap;

const BRUSH_CACHE_ENTRIES: usize = 64;

/// A cached 8x8 brush bitmap in its original depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBrush {
    pub bpp: u8,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct BrushCache {
    entries: SlotMap<CachedBrush>,
}

impl Default for BrushCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BrushCache {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::new(BRUSH_CACHE_ENTRIES),
        }
    }

    pub fn get(&self, index: u8) -> Option<&CachedBrush> {
        self.entries.get(usize::from(index))
    }

    pub fn put(&mut self, index: u8, brush: CachedBrush) -> bool {
        let stored = self.entries.put(usize::from(index), brush);
        if !stored {
            warn!(index, "invalid brush cache index");
        }
        stored
    }
}
