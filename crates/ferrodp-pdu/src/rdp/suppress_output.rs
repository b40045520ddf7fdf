use ferrodp_core::{
    ensure_size, invalid_field_err, read_padding, write_padding, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};

use crate::geometry::InclusiveRectangle;

/// Suppress Output PDU Data ([MS-RDPBCGR] 2.2.11.3.1).
///
/// `None` asks the server to stop sending display updates entirely; `Some`
/// re-enables updates for the given desktop rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressOutputPdu {
    pub desktop_rect: Option<InclusiveRectangle>,
}

impl SuppressOutputPdu {
    const NAME: &'static str = "SuppressOutputPdu";

    const FIXED_PART_SIZE: usize = 1 /* allowDisplayUpdates */ + 3 /* pad */;
}

impl Encode for SuppressOutputPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u8(u8::from(self.desktop_rect.is_some()));
        write_padding!(dst, 3);

        if let Some(ref rect) = self.desktop_rect {
            rect.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + self
                .desktop_rect
                .as_ref()
                .map(|_| InclusiveRectangle::FIXED_PART_SIZE)
                .unwrap_or(0)
    }
}

impl<'de> Decode<'de> for SuppressOutputPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::FIXED_PART_SIZE);

        let allow_display_updates = src.read_u8();
        read_padding!(src, 3);

        let desktop_rect = match allow_display_updates {
            0 => None,
            1 => Some(InclusiveRectangle::decode(src)?),
            _ => return Err(invalid_field_err!("allowDisplayUpdates", "invalid value")),
        };

        Ok(Self { desktop_rect })
    }
}
