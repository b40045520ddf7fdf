//! Security Exchange PDU ([MS-RDPBCGR] 2.2.1.10): the client random encrypted
//! under the server certificate's RSA public key.

use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor,
    WriteCursor,
};

/// Number of zero bytes appended after the encrypted client random.
const SECURITY_EXCHANGE_PADDING: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityExchangePdu {
    /// Encrypted client random, little-endian, without the trailing padding.
    pub encrypted_client_random: Vec<u8>,
}

impl SecurityExchangePdu {
    const NAME: &'static str = "SecurityExchangePdu";

    const FIXED_PART_SIZE: usize = 4 /* length */;
}

impl Encode for SecurityExchangePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(cast_length!(
            "length",
            self.encrypted_client_random.len() + SECURITY_EXCHANGE_PADDING
        )?);
        dst.write_slice(&self.encrypted_client_random);

        for _ in 0..SECURITY_EXCHANGE_PADDING {
            dst.write_u8(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.encrypted_client_random.len() + SECURITY_EXCHANGE_PADDING
    }
}

impl<'de> Decode<'de> for SecurityExchangePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let length = usize::try_from(src.read_u32()).unwrap_or(usize::MAX);
        ensure_size!(in: src, size: length);

        let encrypted_client_random = src.read_slice(length.saturating_sub(SECURITY_EXCHANGE_PADDING)).to_vec();
        let _padding = src.read_slice(length.min(SECURITY_EXCHANGE_PADDING));

        Ok(Self {
            encrypted_client_random,
        })
    }
}
