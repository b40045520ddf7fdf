//! The persistent bitmap cache file.
//!
//! Layout: a header (magic, version, entry count), then for each entry the
//! 64-bit content key, width, height, byte size, flags and the raw pixel
//! bytes. Readers tolerate trailing garbage; the writer flushes and fsyncs on
//! close.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const FILE_MAGIC: u32 = 0x5044_4243; // "CBDP"
pub const FILE_VERSION: u32 = 2;

const HEADER_SIZE: usize = 4 + 4 + 4;
const ENTRY_FIXED_SIZE: usize = 8 + 4 + 4 + 4 + 4;

/// Largest plausible pixel payload for one entry; guards against a corrupted
/// size field allocating unbounded memory.
const MAX_ENTRY_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentCacheEntry {
    pub key64: u64,
    pub width: u32,
    pub height: u32,
    pub flags: u32,
    pub data: Vec<u8>,
}

/// Reads every entry of a persistence file. Short or corrupted trailing data
/// ends the read without error.
pub fn read_entries(path: &Path) -> io::Result<Vec<PersistentCacheEntry>> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let magic = u32::from_le_bytes(header[0..4].try_into().expect("4-byte slice"));
    let version = u32::from_le_bytes(header[4..8].try_into().expect("4-byte slice"));
    let count = u32::from_le_bytes(header[8..12].try_into().expect("4-byte slice"));

    if magic != FILE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad cache file magic"));
    }
    if version != FILE_VERSION {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "unsupported cache file version"));
    }

    let mut entries = Vec::new();

    for _ in 0..count {
        let mut fixed = [0u8; ENTRY_FIXED_SIZE];
        if reader.read_exact(&mut fixed).is_err() {
            break;
        }

        let key64 = u64::from_le_bytes(fixed[0..8].try_into().expect("8-byte slice"));
        let width = u32::from_le_bytes(fixed[8..12].try_into().expect("4-byte slice"));
        let height = u32::from_le_bytes(fixed[12..16].try_into().expect("4-byte slice"));
        let size = u32::from_le_bytes(fixed[16..20].try_into().expect("4-byte slice"));
        let flags = u32::from_le_bytes(fixed[20..24].try_into().expect("4-byte slice"));

        if size > MAX_ENTRY_SIZE {
            break;
        }

        let mut data = vec![0u8; size as usize];
        if reader.read_exact(&mut data).is_err() {
            break;
        }

        entries.push(PersistentCacheEntry {
            key64,
            width,
            height,
            flags,
            data,
        });
    }

    Ok(entries)
}

/// Only the content keys, for priming the Persistent Key List PDU.
pub fn read_keys(path: &Path) -> io::Result<Vec<u64>> {
    Ok(read_entries(path)?.into_iter().map(|entry| entry.key64).collect())
}

/// Writes the whole persistence file, flushing and fsyncing before returning.
pub fn write_entries(path: &Path, entries: &[PersistentCacheEntry]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&FILE_MAGIC.to_le_bytes())?;
    writer.write_all(&FILE_VERSION.to_le_bytes())?;
    writer.write_all(&(entries.len() as u32).to_le_bytes())?;

    for entry in entries {
        writer.write_all(&entry.key64.to_le_bytes())?;
        writer.write_all(&entry.width.to_le_bytes())?;
        writer.write_all(&entry.height.to_le_bytes())?;
        writer.write_all(&(entry.data.len() as u32).to_le_bytes())?;
        writer.write_all(&entry.flags.to_le_bytes())?;
        writer.write_all(&entry.data)?;
    }

    writer.flush()?;
    writer.into_inner().map_err(io::Error::other)?.sync_all()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<PersistentCacheEntry> {
        vec![
            PersistentCacheEntry {
                key64: 0x0102_0304_0506_0708,
                width: 2,
                height: 2,
                flags: 0,
                data: vec![0xAA; 16],
            },
            PersistentCacheEntry {
                key64: 0xFFFF_0000_FFFF_0000,
                width: 1,
                height: 1,
                flags: 1,
                data: vec![0x55; 4],
            },
        ]
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitmap.bin");

        let entries = sample_entries();
        write_entries(&path, &entries).unwrap();

        assert_eq!(read_entries(&path).unwrap(), entries);
        assert_eq!(
            read_keys(&path).unwrap(),
            vec![0x0102_0304_0506_0708, 0xFFFF_0000_FFFF_0000]
        );
    }

    #[test]
    fn trailing_garbage_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitmap.bin");

        write_entries(&path, &sample_entries()).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(b"junk at the end of the file");
        std::fs::write(&path, raw).unwrap();

        assert_eq!(read_entries(&path).unwrap().len(), 2);
    }

    #[test]
    fn truncated_entry_ends_the_read_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitmap.bin");

        write_entries(&path, &sample_entries()).unwrap();

        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..raw.len() - 3]).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn bad_magic_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitmap.bin");
        std::fs::write(&path, [0u8; 32]).unwrap();
        assert!(read_entries(&path).is_err());
    }
}
