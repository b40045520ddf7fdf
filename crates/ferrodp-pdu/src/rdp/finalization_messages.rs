use bitflags::bitflags;
use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

const SYNCHRONIZE_PDU_SIZE: usize = 2 + 2;
const CONTROL_PDU_SIZE: usize = 2 + 2 + 4;
const FONT_PDU_SIZE: usize = 2 * 4;
const SYNCHRONIZE_MESSAGE_TYPE: u16 = 1;

/// Largest number of keys a single Persistent Key List PDU may carry.
pub const MAX_PERSISTENT_KEYS_PER_PDU: usize = 169;

const PERSISTENT_KEY_LIST_FIXED_SIZE: usize = 2 * 5 /* numEntriesCacheX */
    + 2 * 5 /* totalEntriesCacheX */
    + 1 /* bBitMask */
    + 3 /* pad */;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizePdu {
    pub target_user_id: u16,
}

impl SynchronizePdu {
    const NAME: &'static str = "SynchronizePdu";

    const FIXED_PART_SIZE: usize = SYNCHRONIZE_PDU_SIZE;
}

impl Encode for SynchronizePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(SYNCHRONIZE_MESSAGE_TYPE);
        dst.write_u16(self.target_user_id);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for SynchronizePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let message_type = src.read_u16();
        if message_type != SYNCHRONIZE_MESSAGE_TYPE {
            return Err(invalid_field_err!("messageType", "invalid message type"));
        }

        let target_user_id = src.read_u16();

        Ok(Self { target_user_id })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPdu {
    pub action: ControlAction,
    pub grant_id: u16,
    pub control_id: u32,
}

impl ControlPdu {
    const NAME: &'static str = "ControlPdu";

    const FIXED_PART_SIZE: usize = CONTROL_PDU_SIZE;
}

impl Encode for ControlPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.action.as_u16());
        dst.write_u16(self.grant_id);
        dst.write_u32(self.control_id);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for ControlPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let action = ControlAction::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("action", "invalid control action"))?;
        let grant_id = src.read_u16();
        let control_id = src.read_u32();

        Ok(Self {
            action,
            grant_id,
            control_id,
        })
    }
}

/// TS_FONT_LIST_PDU / TS_FONT_MAP_PDU shared layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPdu {
    pub number: u16,
    pub total_number: u16,
    pub flags: SequenceFlags,
    pub entry_size: u16,
}

impl Default for FontPdu {
    fn default() -> Self {
        // Values recommended by [MS-RDPBCGR] 2.2.1.18.1.
        Self {
            number: 0,
            total_number: 0,
            flags: SequenceFlags::FIRST | SequenceFlags::LAST,
            entry_size: 0x0032,
        }
    }
}

impl FontPdu {
    const NAME: &'static str = "FontPdu";

    const FIXED_PART_SIZE: usize = FONT_PDU_SIZE;
}

impl Encode for FontPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.number);
        dst.write_u16(self.total_number);
        dst.write_u16(self.flags.bits());
        dst.write_u16(self.entry_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for FontPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let number = src.read_u16();
        let total_number = src.read_u16();
        let flags =
            SequenceFlags::from_bits(src.read_u16()).ok_or_else(|| invalid_field_err!("flags", "invalid sequence flags"))?;
        let entry_size = src.read_u16();

        Ok(Self {
            number,
            total_number,
            flags,
            entry_size,
        })
    }
}

/// Persistent Key List PDU Data ([MS-RDPBCGR] 2.2.1.17.1).
///
/// Announces the 64-bit keys the client kept in its persistent bitmap cache
/// so the server can prime the session with already-cached bitmaps. Keys are
/// grouped per cell; at most [`MAX_PERSISTENT_KEYS_PER_PDU`] keys fit in one
/// PDU, the first/last chunk carries the matching sequence flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentKeyListPdu {
    pub num_entries: [u16; 5],
    pub total_entries: [u16; 5],
    pub flags: SequenceFlags,
    pub keys: Vec<u64>,
}

impl PersistentKeyListPdu {
    const NAME: &'static str = "PersistentKeyListPdu";

    const FIXED_PART_SIZE: usize = PERSISTENT_KEY_LIST_FIXED_SIZE;

    /// Single-chunk list with every key assigned to cell 0.
    pub fn single_chunk(keys: Vec<u64>) -> Self {
        let count = keys.len().min(MAX_PERSISTENT_KEYS_PER_PDU) as u16;
        Self {
            num_entries: [count, 0, 0, 0, 0],
            total_entries: [count, 0, 0, 0, 0],
            flags: SequenceFlags::FIRST | SequenceFlags::LAST,
            keys,
        }
    }
}

impl Encode for PersistentKeyListPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        for num in self.num_entries {
            dst.write_u16(num);
        }
        for total in self.total_entries {
            dst.write_u16(total);
        }
        dst.write_u8(self.flags.bits() as u8);
        write_padding!(dst, 3);

        for key in self.keys.iter() {
            // Keys go out as (low, high) 32-bit halves.
            dst.write_u32((key & 0xFFFF_FFFF) as u32);
            dst.write_u32((key >> 32) as u32);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.keys.len() * 8
    }
}

impl<'de> Decode<'de> for PersistentKeyListPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let mut num_entries = [0u16; 5];
        for num in num_entries.iter_mut() {
            *num = src.read_u16();
        }
        let mut total_entries = [0u16; 5];
        for total in total_entries.iter_mut() {
            *total = src.read_u16();
        }
        let flags = SequenceFlags::from_bits_truncate(u16::from(src.read_u8()));
        read_padding!(src, 3);

        let key_count: usize = num_entries.iter().map(|&n| usize::from(n)).sum();
        if key_count > MAX_PERSISTENT_KEYS_PER_PDU {
            return Err(invalid_field_err!("numEntries", "too many keys for a single PDU"));
        }

        ensure_size!(in: src, size: key_count * 8);
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let low = src.read_u32();
            let high = src.read_u32();
            keys.push(u64::from(low) | (u64::from(high) << 32));
        }

        Ok(Self {
            num_entries,
            total_entries,
            flags,
            keys,
        })
    }
}

#[repr(u16)]
#[derive(Debug, Clone, PartialEq, Eq, FromPrimitive)]
pub enum ControlAction {
    RequestControl = 1,
    GrantedControl = 2,
    Detach = 3,
    Cooperate = 4,
}

impl ControlAction {
    fn as_u16(&self) -> u16 {
        match self {
            Self::RequestControl => 1,
            Self::GrantedControl => 2,
            Self::Detach => 3,
            Self::Cooperate => 4,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SequenceFlags: u16 {
        const FIRST = 1;
        const LAST = 2;
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn control_pdu_granted_action_code() {
        // action 0x0002 is Granted Control.
        let encoded = [0x02, 0x00, 0xEC, 0x03, 0xEA, 0x03, 0x00, 0x00];
        let decoded: ControlPdu = decode(&encoded).unwrap();

        assert_eq!(decoded.action, ControlAction::GrantedControl);
        assert_eq!(decoded.grant_id, 0x03EC);
        assert_eq!(decoded.control_id, 0x03EA);
    }

    #[test]
    fn persistent_key_list_roundtrip() {
        let pdu = PersistentKeyListPdu::single_chunk(vec![0x0123_4567_89AB_CDEF, 0xFFFF_0000_1111_2222]);
        let encoded = encode_vec(&pdu).unwrap();
        let decoded: PersistentKeyListPdu = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }
}
