//! Client input events ([MS-RDPBCGR] 2.2.8.1.1.3): the slow-path Input Event
//! PDU and its five event payloads.

use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

mod mouse;
mod mouse_x;
mod scan_code;
mod sync;
mod unicode;

pub use self::mouse::{MouseEvent, PointerFlags};
pub use self::mouse_x::{MouseXEvent, PointerXFlags};
pub use self::scan_code::{KeyboardFlags, ScanCodeEvent};
pub use self::sync::{SyncEvent, SyncToggleFlags};
pub use self::unicode::UnicodeEvent;

const INPUT_EVENT_SIZE: usize = 4 /* eventTime */ + 2 /* messageType */;

/// TS_INPUT_PDU_DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEventPdu(pub Vec<InputEvent>);

impl InputEventPdu {
    const NAME: &'static str = "InputEventPdu";

    const FIXED_PART_SIZE: usize = 2 /* numEvents */ + 2 /* pad */;
}

impl Encode for InputEventPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(cast_length!("numEvents", self.0.len())?);
        write_padding!(dst, 2);

        for event in self.0.iter() {
            event.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.0.iter().map(Encode::size).sum::<usize>()
    }
}

impl<'de> Decode<'de> for InputEventPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let number_of_events = src.read_u16();
        read_padding!(src, 2);

        let events = (0..number_of_events)
            .map(|_| InputEvent::decode(src))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(events))
    }
}

/// TS_INPUT_EVENT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Sync(SyncEvent),
    ScanCode(ScanCodeEvent),
    Unicode(UnicodeEvent),
    Mouse(MouseEvent),
    MouseX(MouseXEvent),
}

impl InputEvent {
    const NAME: &'static str = "InputEvent";

    fn event_type(&self) -> InputEventType {
        match self {
            Self::Sync(_) => InputEventType::Sync,
            Self::ScanCode(_) => InputEventType::ScanCode,
            Self::Unicode(_) => InputEventType::Unicode,
            Self::Mouse(_) => InputEventType::Mouse,
            Self::MouseX(_) => InputEventType::MouseX,
        }
    }
}

impl Encode for InputEvent {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(0); // eventTime, ignored by the server
        dst.write_u16(self.event_type() as u16);

        match self {
            Self::Sync(event) => event.encode(dst),
            Self::ScanCode(event) => event.encode(dst),
            Self::Unicode(event) => event.encode(dst),
            Self::Mouse(event) => event.encode(dst),
            Self::MouseX(event) => event.encode(dst),
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        INPUT_EVENT_SIZE
            + match self {
                Self::Sync(event) => event.size(),
                Self::ScanCode(event) => event.size(),
                Self::Unicode(event) => event.size(),
                Self::Mouse(event) => event.size(),
                Self::MouseX(event) => event.size(),
            }
    }
}

impl<'de> Decode<'de> for InputEvent {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: INPUT_EVENT_SIZE);

        let _event_time = src.read_u32();
        let event_type = src.read_u16();

        match event_type {
            x if x == InputEventType::Sync as u16 => Ok(Self::Sync(SyncEvent::decode(src)?)),
            x if x == InputEventType::ScanCode as u16 => Ok(Self::ScanCode(ScanCodeEvent::decode(src)?)),
            x if x == InputEventType::Unicode as u16 => Ok(Self::Unicode(UnicodeEvent::decode(src)?)),
            x if x == InputEventType::Mouse as u16 => Ok(Self::Mouse(MouseEvent::decode(src)?)),
            x if x == InputEventType::MouseX as u16 => Ok(Self::MouseX(MouseXEvent::decode(src)?)),
            _ => Err(invalid_field_err!("messageType", "unknown input event type")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
enum InputEventType {
    Sync = 0x0000,
    ScanCode = 0x0004,
    Unicode = 0x0005,
    Mouse = 0x8001,
    MouseX = 0x8002,
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn input_pdu_roundtrip_with_all_event_kinds() {
        let pdu = InputEventPdu(vec![
            InputEvent::Sync(SyncEvent {
                flags: SyncToggleFlags::NUM_LOCK,
            }),
            InputEvent::ScanCode(ScanCodeEvent {
                flags: KeyboardFlags::RELEASE,
                key_code: 0x1C,
            }),
            InputEvent::Unicode(UnicodeEvent {
                flags: KeyboardFlags::empty(),
                unicode_code: 0x0041,
            }),
            InputEvent::Mouse(MouseEvent {
                flags: PointerFlags::LEFT_BUTTON | PointerFlags::DOWN,
                x_position: 100,
                y_position: 200,
            }),
            InputEvent::MouseX(MouseXEvent {
                flags: PointerXFlags::BUTTON1 | PointerXFlags::DOWN,
                x_position: 1,
                y_position: 2,
            }),
        ]);

        let encoded = encode_vec(&pdu).unwrap();
        assert_eq!(encoded.len(), pdu.size());

        let decoded: InputEventPdu = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }
}
