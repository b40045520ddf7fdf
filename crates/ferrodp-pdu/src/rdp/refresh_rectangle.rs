use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, read_padding, write_padding, Decode, DecodeResult, Encode,
    EncodeResult, ReadCursor, WriteCursor,
};

use crate::geometry::InclusiveRectangle;

/// Refresh Rect PDU Data ([MS-RDPBCGR] 2.2.11.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRectanglePdu {
    pub areas: Vec<InclusiveRectangle>,
}

impl RefreshRectanglePdu {
    const NAME: &'static str = "RefreshRectanglePdu";

    const FIXED_PART_SIZE: usize = 1 /* numberOfAreas */ + 3 /* pad */;
}

impl Encode for RefreshRectanglePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u8(cast_length!("numberOfAreas", self.areas.len())?);
        write_padding!(dst, 3);

        for area in self.areas.iter() {
            area.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.areas.len() * InclusiveRectangle::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for RefreshRectanglePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let number_of_areas = usize::from(src.read_u8());
        read_padding!(src, 3);

        let mut areas = Vec::with_capacity(number_of_areas);
        for _ in 0..number_of_areas {
            areas.push(InclusiveRectangle::decode(src)?);
        }

        Ok(Self { areas })
    }
}
