use core::fmt;

use bitflags::bitflags;
use ferrodp_core::{
    ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};

use crate::utils::{self, CharacterSet};

pub const RECONNECT_COOKIE_LEN: usize = 28;
const TIMEZONE_INFO_NAME_LEN: usize = 64;
const TIMEZONE_INFO_NAME_PAYLOAD_MAX: usize = 62;
const COMPRESSION_TYPE_MASK: u32 = 0x0000_1E00;
const COMPRESSION_TYPE_SHIFT: u32 = 9;

const CODE_PAGE_SIZE: usize = 4;
const FLAGS_SIZE: usize = 4;
const STRING_LENGTHS_SIZE: usize = 2 * 5;

const CLIENT_ADDRESS_FAMILY_SIZE: usize = 2;
const SESSION_ID_SIZE: usize = 4;
const PERFORMANCE_FLAGS_SIZE: usize = 4;
const RECONNECT_COOKIE_LENGTH_SIZE: usize = 2;
const BIAS_SIZE: usize = 4;
const SYSTEM_TIME_SIZE: usize = 16;
const TIMEZONE_INFO_SIZE: usize = BIAS_SIZE * 3 + TIMEZONE_INFO_NAME_LEN * 2 + SYSTEM_TIME_SIZE * 2;

/// Info Packet (TS_INFO_PACKET, [MS-RDPBCGR] 2.2.1.11.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub credentials: Credentials,
    pub code_page: u32,
    pub flags: ClientInfoFlags,
    pub compression_type: CompressionType,
    pub alternate_shell: String,
    pub work_dir: String,
    pub extra_info: ExtendedClientInfo,
}

impl ClientInfo {
    const NAME: &'static str = "ClientInfo";

    const FIXED_PART_SIZE: usize = CODE_PAGE_SIZE + FLAGS_SIZE + STRING_LENGTHS_SIZE;

    fn character_set(&self) -> CharacterSet {
        if self.flags.contains(ClientInfoFlags::UNICODE) {
            CharacterSet::Unicode
        } else {
            CharacterSet::Ansi
        }
    }
}

impl Encode for ClientInfo {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let character_set = self.character_set();

        dst.write_u32(self.code_page);

        let compression_bits = self
            .compression_type
            .to_u32()
            .ok_or_else(|| invalid_field_err!("compressionType", "unrepresentable"))?
            << COMPRESSION_TYPE_SHIFT;
        dst.write_u32(self.flags.bits() | compression_bits);

        let domain = self.credentials.domain.clone().unwrap_or_default();

        // Sizes exclude the mandatory null terminator.
        dst.write_u16(utils::encoded_str_len(&domain, character_set) as u16);
        dst.write_u16(utils::encoded_str_len(&self.credentials.username, character_set) as u16);
        dst.write_u16(utils::encoded_str_len(&self.credentials.password, character_set) as u16);
        dst.write_u16(utils::encoded_str_len(&self.alternate_shell, character_set) as u16);
        dst.write_u16(utils::encoded_str_len(&self.work_dir, character_set) as u16);

        utils::write_string_with_null_terminator(dst, &domain, character_set)?;
        utils::write_string_with_null_terminator(dst, &self.credentials.username, character_set)?;
        utils::write_string_with_null_terminator(dst, &self.credentials.password, character_set)?;
        utils::write_string_with_null_terminator(dst, &self.alternate_shell, character_set)?;
        utils::write_string_with_null_terminator(dst, &self.work_dir, character_set)?;

        self.extra_info.encode(dst, character_set)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let character_set = self.character_set();
        let domain = self.credentials.domain.as_deref().unwrap_or("");

        Self::FIXED_PART_SIZE
            + utils::encoded_str_len(domain, character_set)
            + utils::encoded_str_len(&self.credentials.username, character_set)
            + utils::encoded_str_len(&self.credentials.password, character_set)
            + utils::encoded_str_len(&self.alternate_shell, character_set)
            + utils::encoded_str_len(&self.work_dir, character_set)
            + character_set.unit_size() * 5
            + self.extra_info.size(character_set)
    }
}

impl<'de> Decode<'de> for ClientInfo {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let code_page = src.read_u32();
        let flags_with_compression_type = src.read_u32();

        let flags = ClientInfoFlags::from_bits(flags_with_compression_type & !COMPRESSION_TYPE_MASK)
            .ok_or_else(|| invalid_field_err!("flags", "invalid client info flags"))?;
        let compression_type = CompressionType::from_u32(
            (flags_with_compression_type & COMPRESSION_TYPE_MASK) >> COMPRESSION_TYPE_SHIFT,
        )
        .ok_or_else(|| invalid_field_err!("flags", "invalid compression type"))?;

        let character_set = if flags.contains(ClientInfoFlags::UNICODE) {
            CharacterSet::Unicode
        } else {
            CharacterSet::Ansi
        };
        let terminator = character_set.unit_size();

        let domain_size = usize::from(src.read_u16());
        let user_name_size = usize::from(src.read_u16());
        let password_size = usize::from(src.read_u16());
        let alternate_shell_size = usize::from(src.read_u16());
        let work_dir_size = usize::from(src.read_u16());

        let domain = utils::read_string_from_cursor(src, domain_size + terminator, character_set)?;
        let username = utils::read_string_from_cursor(src, user_name_size + terminator, character_set)?;
        let password = utils::read_string_from_cursor(src, password_size + terminator, character_set)?;

        let domain = if domain.is_empty() { None } else { Some(domain) };
        let credentials = Credentials {
            username,
            password,
            domain,
        };

        let alternate_shell = utils::read_string_from_cursor(src, alternate_shell_size + terminator, character_set)?;
        let work_dir = utils::read_string_from_cursor(src, work_dir_size + terminator, character_set)?;

        let extra_info = ExtendedClientInfo::decode(src, character_set)?;

        Ok(Self {
            credentials,
            code_page,
            flags,
            compression_type,
            alternate_shell,
            work_dir,
            extra_info,
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not show the password.
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Extended Info Packet (TS_EXTENDED_INFO_PACKET, [MS-RDPBCGR] 2.2.1.11.1.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedClientInfo {
    pub address_family: AddressFamily,
    pub address: String,
    pub dir: String,
    pub optional_data: ExtendedClientOptionalInfo,
}

impl ExtendedClientInfo {
    const NAME: &'static str = "ExtendedClientInfo";

    fn decode(src: &mut ReadCursor<'_>, character_set: CharacterSet) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: CLIENT_ADDRESS_FAMILY_SIZE + 2);

        let address_family = AddressFamily::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err(Self::NAME, "clientAddressFamily", "invalid"))?;

        // These sizes include the null terminator.
        let address_size = usize::from(src.read_u16());
        let address = utils::read_string_from_cursor(src, address_size, character_set)?;

        ensure_size!(ctx: Self::NAME, in: src, size: 2);
        let dir_size = usize::from(src.read_u16());
        let dir = utils::read_string_from_cursor(src, dir_size, character_set)?;

        let optional_data = ExtendedClientOptionalInfo::decode(src)?;

        Ok(Self {
            address_family,
            address,
            dir,
            optional_data,
        })
    }

    fn encode(&self, dst: &mut WriteCursor<'_>, character_set: CharacterSet) -> EncodeResult<()> {
        dst.write_u16(
            self.address_family
                .to_u16()
                .ok_or_else(|| invalid_field_err(Self::NAME, "clientAddressFamily", "unrepresentable"))?,
        );

        let terminator = character_set.unit_size() as u16;

        dst.write_u16(utils::encoded_str_len(&self.address, character_set) as u16 + terminator);
        utils::write_string_with_null_terminator(dst, &self.address, character_set)?;

        dst.write_u16(utils::encoded_str_len(&self.dir, character_set) as u16 + terminator);
        utils::write_string_with_null_terminator(dst, &self.dir, character_set)?;

        self.optional_data.encode(dst)
    }

    fn size(&self, character_set: CharacterSet) -> usize {
        CLIENT_ADDRESS_FAMILY_SIZE
            + 2
            + utils::encoded_str_len(&self.address, character_set)
            + character_set.unit_size()
            + 2
            + utils::encoded_str_len(&self.dir, character_set)
            + character_set.unit_size()
            + self.optional_data.size()
    }
}

/// Optional tail of the extended info packet. Fields are strictly ordered: a
/// field may only be present when all preceding fields are.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedClientOptionalInfo {
    pub timezone: Option<TimezoneInfo>,
    pub session_id: Option<u32>,
    pub performance_flags: Option<PerformanceFlags>,
    pub reconnect_cookie: Option<[u8; RECONNECT_COOKIE_LEN]>,
}

impl ExtendedClientOptionalInfo {
    const NAME: &'static str = "ExtendedClientOptionalInfo";

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        let mut data = Self::default();

        if src.len() < TIMEZONE_INFO_SIZE {
            return Ok(data);
        }
        data.timezone = Some(TimezoneInfo::decode(src)?);

        if src.len() < SESSION_ID_SIZE {
            return Ok(data);
        }
        data.session_id = Some(src.read_u32());

        if src.len() < PERFORMANCE_FLAGS_SIZE {
            return Ok(data);
        }
        data.performance_flags = Some(
            PerformanceFlags::from_bits(src.read_u32())
                .ok_or_else(|| invalid_field_err(Self::NAME, "performanceFlags", "invalid"))?,
        );

        if src.len() < RECONNECT_COOKIE_LENGTH_SIZE {
            return Ok(data);
        }
        let reconnect_cookie_size = usize::from(src.read_u16());
        if reconnect_cookie_size != 0 {
            if reconnect_cookie_size != RECONNECT_COOKIE_LEN {
                return Err(invalid_field_err(Self::NAME, "cbAutoReconnectCookie", "invalid length"));
            }
            ensure_size!(ctx: Self::NAME, in: src, size: RECONNECT_COOKIE_LEN);
            data.reconnect_cookie = Some(src.read_array());
        }

        if src.len() >= 4 {
            read_padding!(src, 4); // reserved1 + reserved2
        }

        Ok(data)
    }

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        if let Some(ref timezone) = self.timezone {
            timezone.encode(dst)?;
        } else {
            return Ok(());
        }

        if let Some(session_id) = self.session_id {
            dst.write_u32(session_id);
        } else {
            return Ok(());
        }

        if let Some(performance_flags) = self.performance_flags {
            dst.write_u32(performance_flags.bits());
        } else {
            return Ok(());
        }

        if let Some(ref cookie) = self.reconnect_cookie {
            dst.write_u16(RECONNECT_COOKIE_LEN as u16);
            dst.write_slice(cookie.as_ref());
        }

        Ok(())
    }

    fn size(&self) -> usize {
        let mut size = 0;

        if self.timezone.is_some() {
            size += TIMEZONE_INFO_SIZE;
        }
        if self.session_id.is_some() {
            size += SESSION_ID_SIZE;
        }
        if self.performance_flags.is_some() {
            size += PERFORMANCE_FLAGS_SIZE;
        }
        if self.reconnect_cookie.is_some() {
            size += RECONNECT_COOKIE_LENGTH_SIZE + RECONNECT_COOKIE_LEN;
        }

        size
    }
}

/// TS_TIME_ZONE_INFORMATION ([MS-RDPBCGR] 2.2.1.11.1.1.1.1).
///
/// Biases are minutes, with the sign convention of the Windows
/// TIME_ZONE_INFORMATION structure: `UTC = local time + bias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneInfo {
    pub bias: u32,
    pub standard_name: String,
    pub standard_date: Option<SystemTime>,
    pub standard_bias: u32,
    pub daylight_name: String,
    pub daylight_date: Option<SystemTime>,
    pub daylight_bias: u32,
}

impl TimezoneInfo {
    const NAME: &'static str = "TimezoneInfo";

    /// Builds the wire structure from the local UTC offset in minutes
    /// (negative west of Greenwich) and whether daylight saving is in effect.
    pub fn from_local_offset(offset_minutes: i32, dst_active: bool, standard_name: &str, daylight_name: &str) -> Self {
        let bias = (-offset_minutes) as u32;

        let (standard_bias, daylight_bias) = if dst_active {
            (bias.wrapping_sub(60), bias)
        } else {
            (bias, bias.wrapping_add(60))
        };

        Self {
            bias,
            standard_name: standard_name.to_owned(),
            standard_date: None,
            standard_bias,
            daylight_name: daylight_name.to_owned(),
            daylight_date: None,
            daylight_bias,
        }
    }

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(ctx: Self::NAME, in: src, size: TIMEZONE_INFO_SIZE);

        let bias = src.read_u32();

        let standard_name = utils::read_string_from_cursor(src, TIMEZONE_INFO_NAME_LEN, CharacterSet::Unicode)?;
        let standard_date = SystemTime::decode(src)?;
        let standard_bias = src.read_u32();

        let daylight_name = utils::read_string_from_cursor(src, TIMEZONE_INFO_NAME_LEN, CharacterSet::Unicode)?;
        let daylight_date = SystemTime::decode(src)?;
        let daylight_bias = src.read_u32();

        Ok(Self {
            bias,
            standard_name,
            standard_date,
            standard_bias,
            daylight_name,
            daylight_date,
            daylight_bias,
        })
    }

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(ctx: Self::NAME, in: dst, size: TIMEZONE_INFO_SIZE);

        dst.write_u32(self.bias);

        write_timezone_name(dst, &self.standard_name);
        SystemTime::encode(self.standard_date.as_ref(), dst)?;
        dst.write_u32(self.standard_bias);

        write_timezone_name(dst, &self.daylight_name);
        SystemTime::encode(self.daylight_date.as_ref(), dst)?;
        dst.write_u32(self.daylight_bias);

        Ok(())
    }
}

/// Writes a 64-byte zero-padded UTF-16 name field, truncated to 62 bytes of
/// payload.
fn write_timezone_name(dst: &mut WriteCursor<'_>, name: &str) {
    let mut buffer = utils::to_utf16_bytes(name);
    buffer.truncate(TIMEZONE_INFO_NAME_PAYLOAD_MAX);
    buffer.resize(TIMEZONE_INFO_NAME_LEN, 0);
    dst.write_slice(&buffer);
}

/// TS_SYSTEMTIME: a transition date in day-of-week-occurrence form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTime {
    pub month: Month,
    pub day_of_week: DayOfWeek,
    pub day: DayOfWeekOccurrence,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub milliseconds: u16,
}

impl SystemTime {
    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Option<Self>> {
        let _year = src.read_u16(); // MUST be zero
        let month = src.read_u16();
        let day_of_week = src.read_u16();
        let day = src.read_u16();
        let hour = src.read_u16();
        let minute = src.read_u16();
        let second = src.read_u16();
        let milliseconds = src.read_u16();

        match (
            Month::from_u16(month),
            DayOfWeek::from_u16(day_of_week),
            DayOfWeekOccurrence::from_u16(day),
        ) {
            (Some(month), Some(day_of_week), Some(day)) => Ok(Some(SystemTime {
                month,
                day_of_week,
                day,
                hour,
                minute,
                second,
                milliseconds,
            })),
            // An all-zero date marks "no transition"; treat anything unparsable the same way.
            _ => Ok(None),
        }
    }

    fn encode(this: Option<&Self>, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        dst.write_u16(0); // year
        match this {
            Some(time) => {
                dst.write_u16(time.month.to_u16().unwrap_or(0));
                dst.write_u16(time.day_of_week.to_u16().unwrap_or(0));
                dst.write_u16(time.day.to_u16().unwrap_or(0));
                dst.write_u16(time.hour);
                dst.write_u16(time.minute);
                dst.write_u16(time.second);
                dst.write_u16(time.milliseconds);
            }
            None => {
                for _ in 0..7 {
                    dst.write_u16(0);
                }
            }
        }

        Ok(())
    }
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Month {
    January = 1,
    February = 2,
    March = 3,
    April = 4,
    May = 5,
    June = 6,
    July = 7,
    August = 8,
    September = 9,
    October = 10,
    November = 11,
    December = 12,
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum DayOfWeekOccurrence {
    First = 1,
    Second = 2,
    Third = 3,
    Fourth = 4,
    Last = 5,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PerformanceFlags: u32 {
        const DISABLE_WALLPAPER = 0x0000_0001;
        const DISABLE_FULLWINDOWDRAG = 0x0000_0002;
        const DISABLE_MENUANIMATIONS = 0x0000_0004;
        const DISABLE_THEMING = 0x0000_0008;
        const RESERVED1 = 0x0000_0010;
        const DISABLE_CURSOR_SHADOW = 0x0000_0020;
        const DISABLE_CURSORSETTINGS = 0x0000_0040;
        const ENABLE_FONT_SMOOTHING = 0x0000_0080;
        const ENABLE_DESKTOP_COMPOSITION = 0x0000_0100;
        const RESERVED2 = 0x8000_0000;
    }
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum AddressFamily {
    INet = 0x0002,
    INet6 = 0x0017,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ClientInfoFlags: u32 {
        const MOUSE = 0x0000_0001;
        const DISABLE_CTRL_ALT_DEL = 0x0000_0002;
        const AUTOLOGON = 0x0000_0008;
        const UNICODE = 0x0000_0010;
        const MAXIMIZE_SHELL = 0x0000_0020;
        const LOGON_NOTIFY = 0x0000_0040;
        const COMPRESSION = 0x0000_0080;
        const ENABLE_WINDOWS_KEY = 0x0000_0100;
        const REMOTE_CONSOLE_AUDIO = 0x0000_2000;
        const FORCE_ENCRYPTED_CS_PDU = 0x0000_4000;
        const RAIL = 0x0000_8000;
        const LOGON_ERRORS = 0x0001_0000;
        const MOUSE_HAS_WHEEL = 0x0002_0000;
        const PASSWORD_IS_SC_PIN = 0x0004_0000;
        const NO_AUDIO_PLAYBACK = 0x0008_0000;
        const USING_SAVED_CREDS = 0x0010_0000;
        const AUDIO_CAPTURE = 0x0020_0000;
        const VIDEO_DISABLE = 0x0040_0000;
        const RESERVED1 = 0x0080_0000;
        const RESERVED2 = 0x0100_0000;
        const HIDEF_RAIL_SUPPORTED = 0x0200_0000;
    }
}

/// Bulk compression dialect negotiated through the client info flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CompressionType {
    K8 = 0,
    K64 = 1,
    Rdp6 = 2,
    Rdp61 = 3,
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    fn sample_client_info() -> ClientInfo {
        ClientInfo {
            credentials: Credentials {
                username: "jdoe".to_owned(),
                password: "hunter2".to_owned(),
                domain: Some("CONTOSO".to_owned()),
            },
            code_page: 0,
            flags: ClientInfoFlags::MOUSE | ClientInfoFlags::UNICODE | ClientInfoFlags::LOGON_NOTIFY,
            compression_type: CompressionType::K64,
            alternate_shell: String::new(),
            work_dir: String::new(),
            extra_info: ExtendedClientInfo {
                address_family: AddressFamily::INet,
                address: "192.168.1.100".to_owned(),
                dir: "C:\\client".to_owned(),
                optional_data: ExtendedClientOptionalInfo {
                    timezone: Some(TimezoneInfo::from_local_offset(-300, false, "Eastern Standard Time", "Eastern Daylight Time")),
                    session_id: Some(0),
                    performance_flags: Some(PerformanceFlags::DISABLE_WALLPAPER),
                    reconnect_cookie: None,
                },
            },
        }
    }

    #[test]
    fn client_info_roundtrip() {
        let info = sample_client_info();
        let encoded = encode_vec(&info).unwrap();
        assert_eq!(encoded.len(), info.size());

        let decoded: ClientInfo = decode(&encoded).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn timezone_bias_for_utc_minus_5_without_dst() {
        let tz = TimezoneInfo::from_local_offset(-300, false, "EST", "EDT");
        assert_eq!(tz.bias, 300);
        assert_eq!(tz.standard_bias, 300);
        assert_eq!(tz.daylight_bias, 360);
    }

    #[test]
    fn timezone_bias_with_dst_active() {
        let tz = TimezoneInfo::from_local_offset(-240, true, "EST", "EDT");
        assert_eq!(tz.bias, 240);
        assert_eq!(tz.standard_bias, 180);
        assert_eq!(tz.daylight_bias, 240);
    }

    #[test]
    fn reconnect_cookie_is_read_from_the_stream() {
        let mut info = sample_client_info();
        info.extra_info.optional_data.reconnect_cookie = Some([0xA5; RECONNECT_COOKIE_LEN]);

        let encoded = encode_vec(&info).unwrap();
        let decoded: ClientInfo = decode(&encoded).unwrap();
        assert_eq!(
            decoded.extra_info.optional_data.reconnect_cookie,
            Some([0xA5; RECONNECT_COOKIE_LEN])
        );
    }
}
