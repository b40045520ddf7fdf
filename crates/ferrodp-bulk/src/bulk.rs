//! Bulk compression coordinator: routes frames to the MPPC contexts and
//! applies the size policy for outbound compression.

use crate::error::BulkError;
use crate::flags;
use crate::mppc::{MppcCompressor, MppcDecompressor, MppcFrame};

/// Below this payload size compression is not worth the header overhead.
const COMPRESS_MIN_SIZE: usize = 50;

/// Above this payload size the frame no longer fits the compressor contract.
const COMPRESS_MAX_SIZE: usize = 16384;

/// A frame produced by [`BulkCompressor::compress`].
pub type CompressedFrame = MppcFrame;

/// Outcome of a decompression call; borrowed slices alias the receive
/// context's history arena until the next call.
pub type Decompressed<'a> = &'a [u8];

/// Send/receive bulk-compression context pair for one session.
pub struct BulkCompressor {
    send: Option<MppcCompressor>,
    receive: MppcDecompressor,
}

impl BulkCompressor {
    /// `compression_level` is the negotiated client-info compression type:
    /// 0 selects the 8K dialect, anything above the 64K dialect. Outbound
    /// compression is only armed for level 1 and above; the RDP4 encoder fork
    /// is intentionally absent.
    pub fn new(compression_level: u8) -> Self {
        Self {
            send: (compression_level >= 1).then(MppcCompressor::new),
            receive: MppcDecompressor::new(compression_level >= 1),
        }
    }

    /// Whether the payload size is inside the compressible window.
    pub fn compressible(src_size: usize) -> bool {
        src_size > COMPRESS_MIN_SIZE && src_size < COMPRESS_MAX_SIZE
    }

    /// Compresses an outbound payload, or returns `None` when the payload
    /// should be sent as-is (size policy, or compression not armed).
    pub fn compress(&mut self, src: &[u8]) -> Result<Option<CompressedFrame>, BulkError> {
        if !Self::compressible(src.len()) {
            return Ok(None);
        }

        match self.send.as_mut() {
            Some(compressor) => compressor.compress(src).map(Some),
            None => Ok(None),
        }
    }

    /// Decompresses an inbound payload according to its compression byte.
    pub fn decompress(&mut self, ctype: u8, src: &[u8]) -> Result<Decompressed<'_>, BulkError> {
        match ctype & flags::COMPRESSION_TYPE_MASK {
            flags::PACKET_COMPR_TYPE_8K | flags::PACKET_COMPR_TYPE_64K => self.receive.decompress(ctype, src),
            other => Err(BulkError::UnsupportedCompressionType(other)),
        }
    }
}

impl core::fmt::Debug for BulkCompressor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BulkCompressor")
            .field("send_armed", &self.send.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_and_huge_payloads_skip_compression() {
        assert!(!BulkCompressor::compressible(50));
        assert!(!BulkCompressor::compressible(16384));
        assert!(BulkCompressor::compressible(51));
        assert!(BulkCompressor::compressible(16383));
    }

    #[test]
    fn level_zero_never_compresses_outbound() {
        let mut bulk = BulkCompressor::new(0);
        let payload = vec![b'x'; 512];
        assert!(bulk.compress(&payload).unwrap().is_none());
    }

    #[test]
    fn level_one_roundtrips_through_the_receive_context() {
        let mut sender = BulkCompressor::new(1);
        let mut receiver = BulkCompressor::new(1);

        let payload = b"the quick brown fox jumps over the lazy dog, the quick brown fox".to_vec();
        let frame = sender.compress(&payload).unwrap().expect("compressible size");
        let output = receiver.decompress(frame.flags, &frame.data).unwrap();
        assert_eq!(output, payload);
    }

    #[test]
    fn rdp6_type_bits_are_rejected() {
        let mut bulk = BulkCompressor::new(1);
        assert!(matches!(
            bulk.decompress(flags::PACKET_COMPR_TYPE_RDP61, &[]),
            Err(BulkError::UnsupportedCompressionType(_))
        ));
    }
}
