use std::borrow::Cow;

use ferrodp_core::{
    ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

use crate::tpdu::{TpduCode, TpduHeader};
use crate::tpkt::TpktHeader;

/// An X.224 message: a PDU nested inside a TPKT header and a TPDU header.
///
/// Wrapping a type implementing this trait into [`X224`] yields
/// `Encode`/`Decode` implementations adding and stripping both framing
/// headers.
pub trait X224Pdu<'de>: Sized {
    const X224_NAME: &'static str;

    const TPDU_CODE: TpduCode;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()>;

    fn x224_body_decode(src: &mut ReadCursor<'de>, tpkt: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self>;

    fn tpdu_header_variable_part_size(&self) -> usize;

    fn tpdu_user_data_size(&self) -> usize;
}

/// Wrapper adding the TPKT and TPDU framing headers around an [`X224Pdu`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X224<T>(pub T);

impl<'de, T> Encode for X224<T>
where
    T: X224Pdu<'de>,
{
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let packet_length = self.size();

        ensure_size!(ctx: T::X224_NAME, in: dst, size: packet_length);

        TpktHeader {
            packet_length: u16::try_from(packet_length)
                .map_err(|_| invalid_field_err(T::X224_NAME, "packetLength", "bigger than u16"))?,
        }
        .write(dst)?;

        TpduHeader {
            li: u8::try_from(T::TPDU_CODE.header_fixed_part_size() + self.0.tpdu_header_variable_part_size() - 1)
                .map_err(|_| invalid_field_err(T::X224_NAME, "li", "bigger than u8"))?,
            code: T::TPDU_CODE,
        }
        .write(dst)?;

        self.0.x224_body_encode(dst)
    }

    fn name(&self) -> &'static str {
        T::X224_NAME
    }

    fn size(&self) -> usize {
        TpktHeader::SIZE
            + T::TPDU_CODE.header_fixed_part_size()
            + self.0.tpdu_header_variable_part_size()
            + self.0.tpdu_user_data_size()
    }
}

impl<'de, T> Decode<'de> for X224<T>
where
    T: X224Pdu<'de>,
{
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let tpkt = TpktHeader::read(src)?;

        ensure_size!(ctx: T::X224_NAME, in: src, size: tpkt.packet_length().saturating_sub(TpktHeader::SIZE));

        let tpdu = TpduHeader::read(src, &tpkt)?;
        tpdu.code.check_expected(T::TPDU_CODE)?;

        if tpdu.size() < tpdu.fixed_part_size() {
            return Err(invalid_field_err(
                "TpduHeader",
                "li",
                "fixed part bigger than total header size",
            ));
        }

        T::x224_body_decode(src, &tpkt, &tpdu).map(X224)
    }
}

/// Raw user data carried by an X.224 Data TPDU.
pub struct X224Data<'a> {
    pub data: Cow<'a, [u8]>,
}

impl<'de> X224Pdu<'de> for X224Data<'de> {
    const X224_NAME: &'static str = "X.224 Data";

    const TPDU_CODE: TpduCode = TpduCode::DATA;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(ctx: Self::X224_NAME, in: dst, size: self.data.len());
        dst.write_slice(&self.data);

        Ok(())
    }

    fn x224_body_decode(src: &mut ReadCursor<'de>, tpkt: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self> {
        let user_data_size = user_data_size(tpkt, tpdu);

        ensure_size!(ctx: Self::X224_NAME, in: src, size: user_data_size);
        let data = src.read_slice(user_data_size);

        Ok(Self {
            data: Cow::Borrowed(data),
        })
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        0
    }

    fn tpdu_user_data_size(&self) -> usize {
        self.data.len()
    }
}

pub fn user_data_size(tpkt: &TpktHeader, tpdu: &TpduHeader) -> usize {
    tpkt.packet_length() - TpktHeader::SIZE - tpdu.size()
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    // TPKT + X.224 data header followed by the 4-byte payload.
    const FRAMED: [u8; 11] = [0x03, 0x00, 0x00, 0x0B, 0x06, 0xF0, 0x80, 0xDE, 0xAD, 0xBE, 0xEF];

    #[test]
    fn x224_data_decode_strips_headers() {
        let pdu: X224<X224Data<'_>> = decode(&FRAMED).unwrap();
        assert_eq!(pdu.0.data.as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn x224_data_encode_prepends_headers() {
        let pdu = X224(X224Data {
            data: Cow::Borrowed(&[0xDE, 0xAD, 0xBE, 0xEF]),
        });
        assert_eq!(encode_vec(&pdu).unwrap(), FRAMED);
    }

    #[test]
    fn frame_length_field_accounts_for_headers() {
        for len in [0usize, 1, 512, 65531 - 512] {
            let payload = vec![0xA5u8; len];
            let pdu = X224(X224Data {
                data: Cow::Borrowed(&payload),
            });
            let encoded = encode_vec(&pdu).unwrap();
            let tpkt_len = usize::from(u16::from_be_bytes([encoded[2], encoded[3]]));
            assert_eq!(tpkt_len, len + 7);

            let decoded: X224<X224Data<'_>> = decode(&encoded).unwrap();
            assert_eq!(decoded.0.data.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn bad_tpkt_version_is_rejected() {
        let mut frame = FRAMED;
        frame[0] = 0x04;
        assert!(decode::<X224<X224Data<'_>>>(&frame).is_err());
    }

    #[test]
    fn unexpected_tpdu_code_is_rejected() {
        let mut frame = FRAMED;
        frame[5] = 0xE0; // connection request where data was expected
        assert!(decode::<X224<X224Data<'_>>>(&frame).is_err());
    }
}
