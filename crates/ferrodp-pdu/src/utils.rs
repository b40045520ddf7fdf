use ferrodp_core::{ensure_size, invalid_field_err, DecodeResult, EncodeResult, ReadCursor, WriteCursor};
use num_derive::{FromPrimitive, ToPrimitive};

pub fn split_u64(value: u64) -> (u32, u32) {
    ((value & 0xFFFF_FFFF) as u32, (value >> 32) as u32)
}

pub fn combine_u64(lo: u32, hi: u32) -> u64 {
    u64::from(lo) | (u64::from(hi) << 32)
}

pub fn to_utf16_bytes(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn from_utf16_bytes(value: &[u8]) -> String {
    let units: Vec<u16> = value
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16_lossy(&units)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CharacterSet {
    Ansi = 1,
    Unicode = 2,
}

impl CharacterSet {
    /// Size in bytes of one code unit (and of the null terminator).
    pub fn unit_size(self) -> usize {
        match self {
            CharacterSet::Ansi => 1,
            CharacterSet::Unicode => 2,
        }
    }
}

/// Encoded length of `value` in the given character set, without terminator.
pub fn encoded_str_len(value: &str, character_set: CharacterSet) -> usize {
    match character_set {
        CharacterSet::Ansi => value.len(),
        CharacterSet::Unicode => value.encode_utf16().count() * 2,
    }
}

/// Reads exactly `size` bytes and decodes them as a string in the given
/// character set, trimming any trailing null terminators.
pub fn read_string_from_cursor(
    src: &mut ReadCursor<'_>,
    size: usize,
    character_set: CharacterSet,
) -> DecodeResult<String> {
    ensure_size!(ctx: "read string", in: src, size: size);
    let slice = src.read_slice(size);

    let result = match character_set {
        CharacterSet::Unicode => from_utf16_bytes(slice),
        CharacterSet::Ansi => String::from_utf8(slice.to_vec())
            .map_err(|_| invalid_field_err("read string", "buffer", "not valid UTF-8"))?,
    };

    Ok(result.trim_end_matches('\0').into())
}

/// Writes `value` in the given character set, followed by a null terminator.
pub fn write_string_with_null_terminator(
    dst: &mut WriteCursor<'_>,
    value: &str,
    character_set: CharacterSet,
) -> EncodeResult<()> {
    let size = encoded_str_len(value, character_set) + character_set.unit_size();
    ensure_size!(ctx: "write string", in: dst, size: size);

    match character_set {
        CharacterSet::Ansi => {
            dst.write_slice(value.as_bytes());
            dst.write_u8(0);
        }
        CharacterSet::Unicode => {
            for unit in value.encode_utf16() {
                dst.write_u16(unit);
            }
            dst.write_u16(0);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_halves_roundtrip() {
        let value = 0x0123_4567_89AB_CDEF;
        let (lo, hi) = split_u64(value);
        assert_eq!(lo, 0x89AB_CDEF);
        assert_eq!(hi, 0x0123_4567);
        assert_eq!(combine_u64(lo, hi), value);
    }

    #[test]
    fn utf16_roundtrip_trims_terminator() {
        let mut bytes = to_utf16_bytes("user");
        bytes.extend_from_slice(&[0, 0]);

        let mut src = ReadCursor::new(&bytes);
        let decoded = read_string_from_cursor(&mut src, bytes.len(), CharacterSet::Unicode).unwrap();
        assert_eq!(decoded, "user");
    }
}
