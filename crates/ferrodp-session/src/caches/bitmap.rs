//! The multi-cell bitmap cache ([MS-RDPBCGR] 3.2.2.1, [MS-RDPEGDI] cache
//! orders) with the waiting-list slot and version-2 persistence.

use ferrodp_connector::BitmapCacheConfig;
use ferrodp_graphics::Surface;
use ferrodp_pdu::rdp::orders::BITMAP_CACHE_WAITING_LIST_INDEX;

use super::persistent::{self, PersistentCacheEntry};
use super::slots::SlotMap;

/// Upper bound on the number of cells a server may negotiate.
const MAX_CELLS: usize = 5;

/// A decoded bitmap owned by a cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBitmap {
    /// Persistent content key, `key1 | (key2 << 32)` from the wire; zero for
    /// non-persistent entries.
    pub key64: u64,
    pub surface: Surface,
}

#[derive(Debug)]
struct Cell {
    /// Negotiated entry count; the extra waiting-list slot sits at this
    /// index.
    number: usize,
    entries: SlotMap<CachedBitmap>,
}

/// The bitmap cache, keyed by `(cell_id, cell_index)`.
///
/// Each cell owns `number + 1` slots; the sentinel index
/// [`BITMAP_CACHE_WAITING_LIST_INDEX`] is rewritten to `number` by the
/// accessors, never by callers.
#[derive(Debug)]
pub struct BitmapCache {
    cells: Vec<Cell>,
    version: u8,
    persist_file: Option<std::path::PathBuf>,
}

impl BitmapCache {
    pub fn new(config: &BitmapCacheConfig) -> Self {
        let cells = config
            .cell_info
            .iter()
            .take(MAX_CELLS)
            .map(|info| {
                let number = info.num_entries as usize;
                Cell {
                    number,
                    // One extra slot for the waiting list.
                    entries: SlotMap::new(number + 1),
                }
            })
            .collect();

        Self {
            cells,
            version: config.version,
            persist_file: config.persist_enabled.then(|| config.persist_file.clone()).flatten(),
        }
    }

    fn resolve(&self, cell_id: u8, index: u16) -> Option<(usize, usize)> {
        let cell_id = usize::from(cell_id);
        let Some(cell) = self.cells.get(cell_id) else {
            warn!(cell_id, "invalid bitmap cell id");
            return None;
        };

        let index = if index == BITMAP_CACHE_WAITING_LIST_INDEX {
            cell.number
        } else {
            usize::from(index)
        };

        if index > cell.number {
            warn!(index, cell_id, "invalid bitmap index in cell");
            return None;
        }

        Some((cell_id, index))
    }

    /// Looks a bitmap up. Out-of-range ids return `None` (logged); an empty
    /// slot is a tolerated cache miss left to the caller.
    pub fn get(&self, cell_id: u8, index: u16) -> Option<&CachedBitmap> {
        let (cell_id, index) = self.resolve(cell_id, index)?;
        self.cells[cell_id].entries.get(index)
    }

    /// Installs a bitmap, dropping whatever occupied the slot. Out-of-range
    /// ids are rejected (logged).
    pub fn put(&mut self, cell_id: u8, index: u16, bitmap: CachedBitmap) -> bool {
        let Some((cell_id, index)) = self.resolve(cell_id, index) else {
            return false;
        };
        self.cells[cell_id].entries.put(index, bitmap)
    }

    /// The non-zero content keys of every occupied slot, for the Persistent
    /// Key List PDU.
    pub fn persistent_keys(&self) -> Vec<u64> {
        self.cells
            .iter()
            .flat_map(|cell| cell.entries.iter())
            .filter(|bitmap| bitmap.key64 != 0)
            .map(|bitmap| bitmap.key64)
            .collect()
    }

    fn save_persistent(&self) {
        // Version 1 caches are never persisted.
        if self.version != 2 {
            return;
        }

        let Some(path) = self.persist_file.as_deref() else {
            return;
        };

        let entries: Vec<PersistentCacheEntry> = self
            .cells
            .iter()
            .flat_map(|cell| cell.entries.iter())
            .filter(|bitmap| bitmap.key64 != 0)
            .map(|bitmap| PersistentCacheEntry {
                key64: bitmap.key64,
                width: u32::from(bitmap.surface.width()),
                height: u32::from(bitmap.surface.height()),
                flags: 0,
                data: bitmap
                    .surface
                    .pixels()
                    .iter()
                    .flat_map(|pixel| pixel.to_le_bytes())
                    .collect(),
            })
            .collect();

        if let Err(error) = persistent::write_entries(path, &entries) {
            warn!(%error, path = %path.display(), "could not save the persistent bitmap cache");
        }
    }
}

impl Drop for BitmapCache {
    fn drop(&mut self) {
        self.save_persistent();
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_pdu::rdp::capability_sets::CellInfo;

    use super::*;

    fn cache_with_cell0(number: u32) -> BitmapCache {
        let mut config = BitmapCacheConfig {
            persist_enabled: false,
            persist_file: None,
            version: 2,
            ..Default::default()
        };
        config.cell_info[0] = CellInfo {
            num_entries: number,
            is_cache_persistent: false,
        };
        BitmapCache::new(&config)
    }

    fn bitmap(key64: u64) -> CachedBitmap {
        CachedBitmap {
            key64,
            surface: Surface::new(4, 4),
        }
    }

    #[test]
    fn get_after_put_returns_the_latest_bitmap() {
        let mut cache = cache_with_cell0(8);

        assert!(cache.put(0, 3, bitmap(1)));
        assert!(cache.put(0, 3, bitmap(2)));

        assert_eq!(cache.get(0, 3).unwrap().key64, 2);
    }

    #[test]
    fn waiting_list_sentinel_aliases_the_extra_slot() {
        let mut cache = cache_with_cell0(100);

        assert!(cache.put(0, BITMAP_CACHE_WAITING_LIST_INDEX, bitmap(7)));

        assert_eq!(cache.get(0, 100).unwrap().key64, 7);
        assert_eq!(cache.get(0, BITMAP_CACHE_WAITING_LIST_INDEX).unwrap().key64, 7);
    }

    #[test]
    fn out_of_range_access_is_a_tolerated_miss() {
        let mut cache = cache_with_cell0(4);

        assert!(cache.get(9, 0).is_none());
        assert!(cache.get(0, 6).is_none());
        assert!(!cache.put(9, 0, bitmap(1)));
        assert!(!cache.put(0, 6, bitmap(1)));
    }

    #[test]
    fn persistent_keys_skip_empty_and_keyless_slots() {
        let mut cache = cache_with_cell0(8);

        cache.put(0, 0, bitmap(0));
        cache.put(0, 1, bitmap(42));
        cache.put(0, 2, bitmap(43));

        let mut keys = cache.persistent_keys();
        keys.sort_unstable();
        assert_eq!(keys, vec![42, 43]);
    }
}
