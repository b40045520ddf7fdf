use bitflags::bitflags;
use ferrodp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

const CHANNEL_NAME_SIZE: usize = 8;
const CHANNEL_DEF_SIZE: usize = CHANNEL_NAME_SIZE + 4 /* options */;
const MAX_CHANNELS: usize = 31;

/// TS_UD_CS_NET ([MS-RDPBCGR] 2.2.1.3.4): the static virtual channels the
/// client wants joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientNetworkData {
    pub channels: Vec<ChannelDef>,
}

impl ClientNetworkData {
    const NAME: &'static str = "ClientNetworkData";

    const FIXED_PART_SIZE: usize = 4 /* channelCount */;
}

impl Encode for ClientNetworkData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(cast_length!("channelCount", self.channels.len())?);

        for channel in self.channels.iter() {
            let mut name = [0u8; CHANNEL_NAME_SIZE];
            let len = channel.name.len().min(CHANNEL_NAME_SIZE - 1);
            name[..len].copy_from_slice(&channel.name.as_bytes()[..len]);

            dst.write_slice(&name);
            dst.write_u32(channel.options.bits());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.channels.len() * CHANNEL_DEF_SIZE
    }
}

impl<'de> Decode<'de> for ClientNetworkData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let channel_count: usize = cast_length!("channelCount", src.read_u32())?;

        if channel_count > MAX_CHANNELS {
            return Err(invalid_field_err!("channelCount", "too many static channels"));
        }

        ensure_size!(in: src, size: channel_count * CHANNEL_DEF_SIZE);

        let mut channels = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let name_bytes = src.read_slice(CHANNEL_NAME_SIZE);
            let name = name_bytes
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| char::from(b))
                .collect();
            let options = ChannelOptions::from_bits_truncate(src.read_u32());

            channels.push(ChannelDef { name, options });
        }

        Ok(Self { channels })
    }
}

/// CHANNEL_DEF ([MS-RDPBCGR] 2.2.1.3.4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDef {
    /// ANSI name, at most seven characters plus the implicit terminator.
    pub name: String,
    pub options: ChannelOptions,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ChannelOptions: u32 {
        const INITIALIZED = 0x8000_0000;
        const ENCRYPT_RDP = 0x4000_0000;
        const ENCRYPT_SC = 0x2000_0000;
        const ENCRYPT_CS = 0x1000_0000;
        const PRI_HIGH = 0x0800_0000;
        const PRI_MED = 0x0400_0000;
        const PRI_LOW = 0x0200_0000;
        const COMPRESS_RDP = 0x0080_0000;
        const COMPRESS = 0x0040_0000;
        const SHOW_PROTOCOL = 0x0020_0000;
        const REMOTE_CONTROL_PERSISTENT = 0x0010_0000;
    }
}

/// TS_UD_SC_NET ([MS-RDPBCGR] 2.2.1.4.4): the channel ids the server
/// allocated, in the same order the client requested them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNetworkData {
    pub io_channel: u16,
    pub channel_ids: Vec<u16>,
}

impl ServerNetworkData {
    const NAME: &'static str = "ServerNetworkData";

    const FIXED_PART_SIZE: usize = 2 /* MCSChannelId */ + 2 /* channelCount */;

    fn write_padding_size(&self) -> usize {
        self.channel_ids.len() % 2 * 2
    }
}

impl Encode for ServerNetworkData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.io_channel);
        dst.write_u16(cast_length!("channelCount", self.channel_ids.len())?);

        for channel_id in self.channel_ids.iter() {
            dst.write_u16(*channel_id);
        }

        // Pad to a multiple of four bytes.
        write_padding!(dst, self.write_padding_size());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.channel_ids.len() * 2 + self.write_padding_size()
    }
}

impl<'de> Decode<'de> for ServerNetworkData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let io_channel = src.read_u16();
        let channel_count: usize = cast_length!("channelCount", src.read_u16())?;

        if channel_count > MAX_CHANNELS {
            return Err(invalid_field_err!("channelCount", "too many static channels"));
        }

        ensure_size!(in: src, size: channel_count * 2);

        let mut channel_ids = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            channel_ids.push(src.read_u16());
        }

        let padding = channel_count % 2 * 2;
        if src.len() >= padding {
            read_padding!(src, padding);
        }

        Ok(Self {
            io_channel,
            channel_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use ferrodp_core::{decode, encode_vec};

    use super::*;

    #[test]
    fn client_network_data_roundtrip() {
        let data = ClientNetworkData {
            channels: vec![
                ChannelDef {
                    name: "cliprdr".to_owned(),
                    options: ChannelOptions::INITIALIZED | ChannelOptions::SHOW_PROTOCOL,
                },
                ChannelDef {
                    name: "rdpsnd".to_owned(),
                    options: ChannelOptions::INITIALIZED,
                },
            ],
        };

        let encoded = encode_vec(&data).unwrap();
        let decoded: ClientNetworkData = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn server_network_data_pads_odd_channel_count() {
        let data = ServerNetworkData {
            io_channel: 1003,
            channel_ids: vec![1004, 1005, 1006],
        };

        let encoded = encode_vec(&data).unwrap();
        assert_eq!(encoded.len() % 4, 0);

        let decoded: ServerNetworkData = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }
}
