/// Max capacity to keep for the inner `Vec<u8>` when [`WriteBuf::clear`] is called.
const MAX_CAPACITY_WHEN_CLEARED: usize = 16384;

/// Growable buffer backed by a `Vec<u8>` that is incrementally filled.
///
/// Tracks the filled region and provides methods to grow and write into the
/// unfilled region:
///
/// ```not_rust
/// [          Vec capacity             ]
/// [ filled | unfilled |               ]
/// [    initialized    | uninitialized ]
/// ```
#[derive(Debug, Default)]
pub struct WriteBuf {
    inner: Vec<u8>,
    filled: usize,
}

impl WriteBuf {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: Vec::new(),
            filled: 0,
        }
    }

    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }

    /// Length of the filled region.
    #[inline]
    pub const fn filled_len(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Shared reference to the filled portion of the buffer.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.inner[..self.filled]
    }

    /// Ensures the initialized, unfilled portion is big enough for `additional` more bytes.
    #[inline]
    pub fn initialize(&mut self, additional: usize) {
        if self.inner.len() < self.filled + additional {
            self.inner.resize(self.filled + additional, 0);
        }
    }

    /// Mutable reference to the first `n` bytes of the unfilled part,
    /// allocating additional memory as necessary.
    #[inline]
    pub fn unfilled_to(&mut self, n: usize) -> &mut [u8] {
        self.initialize(n);
        &mut self.inner[self.filled..self.filled + n]
    }

    #[inline]
    pub fn write_slice(&mut self, slice: &[u8]) {
        let n = slice.len();
        self.initialize(n);
        self.inner[self.filled..self.filled + n].copy_from_slice(slice);
        self.filled += n;
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_le_bytes());
    }

    /// Advances the filled cursor by `n` bytes.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.filled += n;
    }

    /// Resets the filled region, shrinking the allocation when oversized.
    #[inline]
    pub fn clear(&mut self) {
        if self.inner.capacity() > MAX_CAPACITY_WHEN_CLEARED {
            self.inner = Vec::with_capacity(MAX_CAPACITY_WHEN_CLEARED);
        }
        self.inner.clear();
        self.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_tracks_writes() {
        let mut buf = WriteBuf::new();
        buf.write_slice(b"abc");
        buf.write_u16(0x0201);
        assert_eq!(buf.filled(), &[b'a', b'b', b'c', 0x01, 0x02]);
        assert_eq!(buf.filled_len(), 5);
    }

    #[test]
    fn unfilled_to_grows_and_advance_commits() {
        let mut buf = WriteBuf::new();
        let dst = buf.unfilled_to(4);
        dst.copy_from_slice(&[1, 2, 3, 4]);
        buf.advance(4);
        assert_eq!(buf.filled(), &[1, 2, 3, 4]);
    }
}
