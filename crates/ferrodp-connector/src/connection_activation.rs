//! Capability Exchange and Connection Finalization ([MS-RDPBCGR] 1.3.1.1).
//!
//! Split out of the main connector so the same sequence can drive both the
//! initial connection and the Deactivation-Reactivation sequence entered when
//! a Server Deactivate All PDU arrives mid-session.

use core::mem;

use ferrodp_core::WriteBuf;
use ferrodp_pdu::rdp::capability_sets::{self, CapabilitySet, ClientConfirmActive, DemandActive};
use ferrodp_pdu::rdp::headers::ShareControlPdu;

use crate::legacy::{self, SecurityState};
use crate::{Config, ConnectionFinalizationSequence, ConnectorResult, DesktopSize, Sequence, State, Written};

#[derive(Debug)]
pub struct ConnectionActivationSequence {
    pub state: ConnectionActivationState,
    config: Config,
}

impl ConnectionActivationSequence {
    pub fn new(config: Config, io_channel_id: u16, user_channel_id: u16, persistent_keys: Vec<u64>) -> Self {
        Self {
            state: ConnectionActivationState::CapabilitiesExchange {
                io_channel_id,
                user_channel_id,
                persistent_keys,
            },
            config,
        }
    }

    /// A fresh sequence over the same channel pair, for reactivation.
    #[must_use]
    pub fn reset(&self) -> Self {
        match &self.state {
            ConnectionActivationState::CapabilitiesExchange {
                io_channel_id,
                user_channel_id,
                ..
            }
            | ConnectionActivationState::ConnectionFinalization {
                io_channel_id,
                user_channel_id,
                ..
            }
            | ConnectionActivationState::Finalized {
                io_channel_id,
                user_channel_id,
                ..
            } => Self::new(self.config.clone(), *io_channel_id, *user_channel_id, Vec::new()),
            ConnectionActivationState::Consumed => Self::new(self.config.clone(), 0, 0, Vec::new()),
        }
    }

    pub fn state(&self) -> &ConnectionActivationState {
        &self.state
    }

    /// Runs one step with the session security context threaded through.
    pub fn step_with_security(
        &mut self,
        input: &[u8],
        output: &mut WriteBuf,
        security: &mut SecurityState,
    ) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            ConnectionActivationState::Consumed | ConnectionActivationState::Finalized { .. } => {
                return Err(general_err!(
                    "connection activation sequence state is finalized or consumed (this is a bug)"
                ));
            }

            ConnectionActivationState::CapabilitiesExchange {
                io_channel_id,
                user_channel_id,
                persistent_keys,
            } => {
                debug!("Capabilities Exchange");

                let send_data_indication_ctx = legacy::decode_send_data_indication(input)?;
                let share_control_ctx = legacy::decode_share_control(send_data_indication_ctx, security)?;

                debug!(message = ?share_control_ctx.pdu.as_short_name(), "Received");

                if share_control_ctx.channel_id != io_channel_id {
                    warn!(
                        io_channel_id,
                        share_control_ctx.channel_id, "Unexpected channel ID for received Share Control PDU"
                    );
                }

                let capability_sets = match share_control_ctx.pdu {
                    ShareControlPdu::ServerDemandActive(server_demand_active) => {
                        server_demand_active.pdu.capability_sets
                    }
                    // A stray Deactivate All before the Demand Active simply
                    // restarts this state; anything else is out of sequence.
                    ShareControlPdu::ServerDeactivateAll(_) => {
                        debug!("Server Deactivate All while waiting for Demand Active");
                        self.state = ConnectionActivationState::CapabilitiesExchange {
                            io_channel_id,
                            user_channel_id,
                            persistent_keys,
                        };
                        return Ok(Written::Nothing);
                    }
                    _ => {
                        return Err(general_err!(
                            "unexpected Share Control PDU (expected Server Demand Active)",
                        ))
                    }
                };

                for capability_set in &capability_sets {
                    if let CapabilitySet::General(general) = capability_set {
                        if general.protocol_version != capability_sets::PROTOCOL_VER {
                            warn!(version = general.protocol_version, "Unexpected protocol version");
                        }
                        break;
                    }
                }

                // The server's Bitmap capability set carries the negotiated
                // desktop size; it wins over the requested one.
                let desktop_size = capability_sets
                    .iter()
                    .find_map(|capability_set| match capability_set {
                        CapabilitySet::Bitmap(bitmap) => Some(DesktopSize {
                            width: bitmap.desktop_width,
                            height: bitmap.desktop_height,
                        }),
                        _ => None,
                    })
                    .unwrap_or(self.config.desktop_size);

                let client_confirm_active = ShareControlPdu::ClientConfirmActive(create_client_confirm_active(
                    &self.config,
                    capability_sets,
                    desktop_size,
                ));

                debug!(message = ?client_confirm_active.as_short_name(), "Send");

                let written = legacy::encode_share_control(
                    user_channel_id,
                    io_channel_id,
                    share_control_ctx.share_id,
                    client_confirm_active,
                    security,
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ConnectionActivationState::ConnectionFinalization {
                        io_channel_id,
                        user_channel_id,
                        desktop_size,
                        connection_finalization: ConnectionFinalizationSequence::new(
                            io_channel_id,
                            user_channel_id,
                            share_control_ctx.share_id,
                            persistent_keys,
                        ),
                    },
                )
            }

            ConnectionActivationState::ConnectionFinalization {
                io_channel_id,
                user_channel_id,
                desktop_size,
                mut connection_finalization,
            } => {
                debug!("Connection Finalization");

                let share_id = connection_finalization.share_id;

                let written = connection_finalization.step_with_security(input, output, security)?;

                let next_state = if !connection_finalization.state.is_terminal() {
                    ConnectionActivationState::ConnectionFinalization {
                        io_channel_id,
                        user_channel_id,
                        desktop_size,
                        connection_finalization,
                    }
                } else {
                    ConnectionActivationState::Finalized {
                        io_channel_id,
                        user_channel_id,
                        desktop_size,
                        share_id,
                    }
                };

                (written, next_state)
            }
        };

        self.state = next_state;

        Ok(written)
    }
}

impl Sequence for ConnectionActivationSequence {
    fn next_pdu_hint(&self) -> Option<&dyn ferrodp_pdu::PduHint> {
        match &self.state {
            ConnectionActivationState::Consumed => None,
            ConnectionActivationState::Finalized { .. } => None,
            ConnectionActivationState::CapabilitiesExchange { .. } => Some(&ferrodp_pdu::X224_HINT),
            ConnectionActivationState::ConnectionFinalization {
                connection_finalization,
                ..
            } => connection_finalization.next_pdu_hint(),
        }
    }

    fn state(&self) -> &dyn State {
        &self.state
    }

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written> {
        let mut security = None;
        self.step_with_security(input, output, &mut security)
    }
}

#[derive(Default, Debug)]
pub enum ConnectionActivationState {
    #[default]
    Consumed,
    CapabilitiesExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        persistent_keys: Vec<u64>,
    },
    ConnectionFinalization {
        io_channel_id: u16,
        user_channel_id: u16,
        desktop_size: DesktopSize,
        connection_finalization: ConnectionFinalizationSequence,
    },
    Finalized {
        io_channel_id: u16,
        user_channel_id: u16,
        desktop_size: DesktopSize,
        share_id: u32,
    },
}

impl State for ConnectionActivationState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionActivationState::Consumed => "Consumed",
            ConnectionActivationState::CapabilitiesExchange { .. } => "CapabilitiesExchange",
            ConnectionActivationState::ConnectionFinalization { .. } => "ConnectionFinalization",
            ConnectionActivationState::Finalized { .. } => "Finalized",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ConnectionActivationState::Finalized { .. })
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

const DEFAULT_POINTER_CACHE_SIZE: u16 = 32;

fn create_client_confirm_active(
    config: &Config,
    mut server_capability_sets: Vec<CapabilitySet>,
    desktop_size: DesktopSize,
) -> ClientConfirmActive {
    use ferrodp_pdu::gcc::KeyboardType;
    use ferrodp_pdu::rdp::capability_sets::{
        Bitmap, BitmapCache, BitmapCacheRev2, BitmapDrawingFlags, Brush, BrushSupportLevel, CacheDefinition,
        CacheEntry, CacheFlags, ControlCaps, Font, General, GeneralExtraFlags, GlyphCache, GlyphSupportLevel, Input,
        InputFlags, MultifragmentUpdate, OffscreenBitmapCache, Order, OrderFlags, OrderSupportExFlags,
        OrderSupportIndex, Pointer, Share, Sound, SoundFlags, VirtualChannel, VirtualChannelFlags, WindowActivation,
        BITMAP_CACHE_ENTRIES_NUM, GLYPH_CACHE_NUM, SERVER_CHANNEL_ID,
    };

    // The Multifragment Update set is echoed back; everything else is
    // replaced by the client's own capabilities.
    server_capability_sets.retain(|capability_set| matches!(capability_set, CapabilitySet::MultifragmentUpdate(_)));

    let mut order = Order::new(
        OrderFlags::NEGOTIATE_ORDER_SUPPORT | OrderFlags::ZERO_BOUNDS_DELTAS_SUPPORT | OrderFlags::COLOR_INDEX_SUPPORT,
        OrderSupportExFlags::empty(),
        0,
        0,
    );
    for index in [
        OrderSupportIndex::DstBlt,
        OrderSupportIndex::PatBlt,
        OrderSupportIndex::ScrBlt,
        OrderSupportIndex::MemBlt,
        OrderSupportIndex::Mem3Blt,
        OrderSupportIndex::OpaqueRect,
        OrderSupportIndex::LineTo,
        OrderSupportIndex::Polyline,
        OrderSupportIndex::MultiOpaqueRect,
        OrderSupportIndex::Index,
    ] {
        order.set_supported(index, true);
    }

    let bitmap_cache = if config.bitmap_cache.version >= 2 {
        CapabilitySet::BitmapCacheRev2(BitmapCacheRev2 {
            cache_flags: if config.bitmap_cache.persist_enabled {
                CacheFlags::PERSISTENT_KEYS_EXPECTED_FLAG | CacheFlags::ALLOW_CACHE_WAITING_LIST_FLAG
            } else {
                CacheFlags::ALLOW_CACHE_WAITING_LIST_FLAG
            },
            num_cell_caches: config
                .bitmap_cache
                .cell_info
                .iter()
                .filter(|cell| cell.num_entries > 0)
                .count() as u8,
            cache_cell_info: config.bitmap_cache.cell_info,
        })
    } else {
        CapabilitySet::BitmapCache(BitmapCache {
            caches: [
                CacheEntry {
                    entries: 600,
                    max_cell_size: 256,
                },
                CacheEntry {
                    entries: 300,
                    max_cell_size: 1024,
                },
                CacheEntry {
                    entries: 262,
                    max_cell_size: 4096,
                },
            ],
        })
    };

    server_capability_sets.extend_from_slice(&[
        CapabilitySet::General(General {
            major_platform_type: config.platform,
            extra_flags: GeneralExtraFlags::LONG_CREDENTIALS_SUPPORTED | GeneralExtraFlags::AUTORECONNECT_SUPPORTED,
            refresh_rect_support: true,
            suppress_output_support: true,
            ..Default::default()
        }),
        CapabilitySet::Bitmap(Bitmap {
            pref_bits_per_pix: config.color_depth as u16,
            desktop_width: desktop_size.width,
            desktop_height: desktop_size.height,
            desktop_resize_flag: true,
            drawing_flags: BitmapDrawingFlags::ALLOW_SKIP_ALPHA,
        }),
        CapabilitySet::Order(order),
        bitmap_cache,
        CapabilitySet::Control(ControlCaps),
        CapabilitySet::WindowActivation(WindowActivation),
        CapabilitySet::Pointer(Pointer {
            color_pointer_cache_size: DEFAULT_POINTER_CACHE_SIZE,
            pointer_cache_size: DEFAULT_POINTER_CACHE_SIZE,
        }),
        CapabilitySet::Share(Share::default()),
        CapabilitySet::Input(Input {
            input_flags: InputFlags::SCANCODES | InputFlags::MOUSEX | InputFlags::UNICODE,
            keyboard_layout: config.keyboard_layout,
            keyboard_type: Some(KeyboardType::IbmEnhanced),
            keyboard_subtype: config.keyboard_subtype,
            keyboard_function_key: config.keyboard_functional_keys_count,
            keyboard_ime_filename: config.ime_file_name.clone(),
        }),
        CapabilitySet::Font(Font::default()),
        CapabilitySet::Brush(Brush {
            support_level: BrushSupportLevel::Color8x8,
        }),
        CapabilitySet::GlyphCache(GlyphCache {
            glyph_cache: [CacheDefinition {
                entries: 254,
                max_cell_size: 4,
            }; GLYPH_CACHE_NUM],
            frag_cache: CacheDefinition {
                entries: 256,
                max_cell_size: 256,
            },
            glyph_support_level: GlyphSupportLevel::None,
        }),
        CapabilitySet::OffscreenBitmapCache(OffscreenBitmapCache {
            is_supported: true,
            cache_size: 7680,
            cache_entries: 2000,
        }),
        CapabilitySet::Sound(Sound {
            flags: SoundFlags::BEEPS,
        }),
        CapabilitySet::VirtualChannel(VirtualChannel {
            flags: VirtualChannelFlags::NO_COMPRESSION,
            chunk_size: None,
        }),
    ]);

    if !server_capability_sets
        .iter()
        .any(|capability_set| matches!(capability_set, CapabilitySet::MultifragmentUpdate(_)))
    {
        server_capability_sets.push(CapabilitySet::MultifragmentUpdate(MultifragmentUpdate {
            max_request_size: 8 * 1024 * 1024,
        }));
    }

    ClientConfirmActive {
        originator_id: SERVER_CHANNEL_ID,
        pdu: DemandActive {
            source_descriptor: "FERRODP".to_owned(),
            capability_sets: server_capability_sets,
        },
    }
}
