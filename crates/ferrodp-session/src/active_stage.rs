//! The active stage: inbound share-PDU dispatch, the cache orders, the
//! deactivation-reactivation loop, server redirection and input sending.

use ferrodp_bulk::BulkCompressor;
use ferrodp_connector::connection_activation::{ConnectionActivationSequence, ConnectionActivationState};
use ferrodp_connector::legacy::{self, SecurityState};
use ferrodp_connector::{Config, ConnectionResult, DesktopSize, Sequence as _, State as _};
use ferrodp_core::{decode, encode_vec, ReadCursor, WriteBuf};
use ferrodp_graphics::Surface;
use ferrodp_pdu::input::{InputEvent, InputEventPdu};
use ferrodp_pdu::mcs::{DisconnectProviderUltimatum, DisconnectReason, McsMessage};
use ferrodp_pdu::rdp::client_info::RECONNECT_COOKIE_LEN;
use ferrodp_pdu::rdp::headers::{
    BasicSecurityHeaderFlags, CompressionFlags, ShareControlHeaderFixed, ShareControlPduType, ShareDataHeaderFixed,
    ShareDataPdu, ShareDataPduType, StreamPriority,
};
use ferrodp_pdu::rdp::orders::{
    CacheBitmapV2Order, CacheBitmapV3Order, CacheBrushOrder, CacheColorTableOrder, Mem3BltOrder, MemBltOrder,
    OFFSCREEN_CACHE_ID,
};
use ferrodp_pdu::rdp::server_error_info::{ErrorInfo, ServerSetErrorInfoPdu};
use ferrodp_pdu::rdp::server_redirection::ServerRedirectionPdu;
use ferrodp_pdu::x224::X224;

use crate::caches::{CachedBitmap, Caches};
use crate::update::UpdateHandler;
use crate::{session_general_err, session_reason_err, SessionError, SessionErrorExt as _, SessionResult};

/// What the host must do with the outcome of a processed frame.
#[derive(Debug)]
pub enum ActiveStageOutput {
    /// Encoded bytes to send to the server.
    ResponseFrame(Vec<u8>),
    /// Static virtual channel payload, addressed by channel id.
    ChannelData { channel_id: u16, data: Vec<u8> },
    /// Orderly session end.
    Disconnect(DisconnectReason),
    /// Server redirection: tear the session down, patch the settings from
    /// the record and reconnect from the initial state.
    Redirect(ServerRedirectionPdu),
}

enum StageState {
    Active,
    /// A Server Deactivate All returned the session to capability exchange.
    Reactivation(Box<ConnectionActivationSequence>),
}

/// Drives one connected session.
pub struct ActiveStage {
    io_channel_id: u16,
    user_channel_id: u16,
    share_id: u32,
    desktop_size: DesktopSize,
    security: SecurityState,
    bulk: BulkCompressor,
    compression_enabled: bool,
    caches: Option<Caches>,
    activation: ConnectionActivationSequence,
    state: StageState,
    reconnect_cookie: Option<[u8; RECONNECT_COOKIE_LEN]>,
}

impl ActiveStage {
    /// Takes over from the connector once its activation sequence finished.
    ///
    /// The server's Font Map PDU moved the session to the active state, so
    /// the switch-surface callback fires here for the initial activation;
    /// reactivations fire it again on their own Font Map.
    pub fn new(connection_result: ConnectionResult, config: &Config, handler: &mut dyn UpdateHandler) -> Self {
        // A deactivated client registers no drawing callbacks; the cache
        // layer is a null sink.
        let caches = (!config.deactivate_client_decoding).then(|| Caches::new(&config.bitmap_cache));

        handler.switch_surface();

        Self {
            io_channel_id: connection_result.io_channel_id,
            user_channel_id: connection_result.user_channel_id,
            share_id: connection_result.share_id,
            desktop_size: connection_result.desktop_size,
            security: connection_result.security,
            bulk: BulkCompressor::new(1),
            compression_enabled: config.compression,
            caches,
            activation: connection_result.connection_activation,
            state: StageState::Active,
            reconnect_cookie: None,
        }
    }

    pub fn desktop_size(&self) -> DesktopSize {
        self.desktop_size
    }

    /// The auto-reconnect cookie received in a Save Session Info PDU, to be
    /// placed in the next connection's Client Info.
    pub fn reconnect_cookie(&self) -> Option<[u8; RECONNECT_COOKIE_LEN]> {
        self.reconnect_cookie
    }

    pub fn caches(&self) -> Option<&Caches> {
        self.caches.as_ref()
    }

    /// Processes one complete inbound frame.
    pub fn process(&mut self, frame: &[u8], handler: &mut dyn UpdateHandler) -> SessionResult<Vec<ActiveStageOutput>> {
        if matches!(self.state, StageState::Reactivation(_)) {
            return self.process_reactivation(frame, handler);
        }

        let data_ctx = legacy::decode_send_data_indication(frame).map_err(SessionError::connector)?;

        if data_ctx.channel_id != self.io_channel_id {
            return Ok(vec![ActiveStageOutput::ChannelData {
                channel_id: data_ctx.channel_id,
                data: data_ctx.user_data.to_vec(),
            }]);
        }

        let (security_flags, body) =
            legacy::unwrap_security(&mut self.security, data_ctx.user_data, false).map_err(SessionError::connector)?;

        if security_flags.contains(BasicSecurityHeaderFlags::REDIRECTION_PKT) {
            let redirection: ServerRedirectionPdu = decode(body.as_ref()).map_err(SessionError::decode)?;
            debug!(message = ?redirection, "Server redirection");
            return Ok(vec![ActiveStageOutput::Redirect(redirection)]);
        }

        let mut src = ReadCursor::new(body.as_ref());
        let control_header = ShareControlHeaderFixed::decode(&mut src).map_err(SessionError::decode)?;

        match control_header.pdu_type {
            ShareControlPduType::DeactivateAllPdu => {
                debug!("Server Deactivate All: returning to capability exchange");
                self.state = StageState::Reactivation(Box::new(self.activation.reset()));
                Ok(Vec::new())
            }
            ShareControlPduType::DataPdu => self.process_share_data(&mut src, handler),
            unexpected => Err(session_reason_err!(
                "ActiveStage",
                "PDU not legal in the active state: {unexpected:?}",
            )),
        }
    }

    fn process_share_data(
        &mut self,
        src: &mut ReadCursor<'_>,
        handler: &mut dyn UpdateHandler,
    ) -> SessionResult<Vec<ActiveStageOutput>> {
        let data_header = ShareDataHeaderFixed::decode(src).map_err(SessionError::decode)?;

        let payload = src.read_remaining();

        // Decompressed output aliases the bulk history arena; it must be
        // consumed before the next decompression call.
        let plaintext: Vec<u8> = if data_header.compression_flags.contains(CompressionFlags::COMPRESSED) {
            self.bulk
                .decompress(data_header.compression_byte(), payload)
                .map_err(SessionError::bulk)?
                .to_vec()
        } else {
            payload.to_vec()
        };

        let mut cursor = ReadCursor::new(&plaintext);
        let pdu = match data_header.pdu_type {
            // Unsupported data PDUs are skipped rather than torn down; the
            // distinction from malformed input is the known type id.
            ShareDataPduType::Update
            | ShareDataPduType::Pointer
            | ShareDataPduType::PlaySound
            | ShareDataPduType::SetKeyboardIndicators
            | ShareDataPduType::SetKeyboardImeStatus
            | ShareDataPduType::BitmapCacheErrorPdu
            | ShareDataPduType::OffscreenCacheErrorPdu
            | ShareDataPduType::DrawNineGridErrorPdu
            | ShareDataPduType::DrawGdiPlusErrorPdu
            | ShareDataPduType::ArcStatusPdu
            | ShareDataPduType::StatusInfoPdu
            | ShareDataPduType::MonitorLayoutPdu
            | ShareDataPduType::FrameAcknowledgePdu => {
                debug!(pdu_type = ?data_header.pdu_type, "Skipping unhandled data PDU");
                return Ok(Vec::new());
            }
            other => ShareDataPdu::from_type(&mut cursor, other).map_err(SessionError::decode)?,
        };

        match pdu {
            ShareDataPdu::SaveSessionInfo(session_info) => {
                debug!("Save Session Info");
                if let Some(packet) = session_info.auto_reconnect() {
                    let mut cookie = [0u8; RECONNECT_COOKIE_LEN];
                    cookie[..4].copy_from_slice(&1u32.to_le_bytes()); // version
                    cookie[4..8].copy_from_slice(&packet.logon_id.to_le_bytes());
                    cookie[8..24].copy_from_slice(&packet.random_bits);
                    self.reconnect_cookie = Some(cookie);
                }
                Ok(Vec::new())
            }
            ShareDataPdu::ServerSetErrorInfo(ServerSetErrorInfoPdu(ErrorInfo::None)) => Ok(Vec::new()),
            ShareDataPdu::ServerSetErrorInfo(ServerSetErrorInfoPdu(error_info)) => {
                if error_info.is_graceful_disconnect() {
                    debug!(description = error_info.description(), "Server-side graceful disconnect");
                    Ok(vec![ActiveStageOutput::Disconnect(DisconnectReason::ProviderInitiated)])
                } else {
                    Err(session_reason_err!("ServerSetErrorInfo", "{}", error_info.description()))
                }
            }
            ShareDataPdu::ShutdownDenied => {
                debug!("Shutdown denied; sending the disconnect ultimatum");
                let ultimatum = McsMessage::DisconnectProviderUltimatum(DisconnectProviderUltimatum::from_reason(
                    DisconnectReason::UserRequested,
                ));
                let encoded = encode_vec(&X224(ultimatum)).map_err(SessionError::encode)?;

                Ok(vec![
                    ActiveStageOutput::ResponseFrame(encoded),
                    ActiveStageOutput::Disconnect(DisconnectReason::UserRequested),
                ])
            }
            ShareDataPdu::SuppressOutput(pdu) => {
                handler.suppress_output(pdu.desktop_rect.is_some());
                Ok(Vec::new())
            }
            ShareDataPdu::Synchronize(_) | ShareDataPdu::Control(_) | ShareDataPdu::FontMap(_) => Ok(Vec::new()),
            other => {
                debug!(name = other.as_short_name(), "Ignoring server data PDU");
                Ok(Vec::new())
            }
        }
    }

    fn process_reactivation(
        &mut self,
        frame: &[u8],
        handler: &mut dyn UpdateHandler,
    ) -> SessionResult<Vec<ActiveStageOutput>> {
        let StageState::Reactivation(activation) = &mut self.state else {
            return Err(session_general_err!("not in reactivation (this is a bug)"));
        };

        let mut buf = WriteBuf::new();
        let mut outputs = Vec::new();

        activation
            .step_with_security(frame, &mut buf, &mut self.security)
            .map_err(SessionError::connector)?;
        if !buf.filled().is_empty() {
            outputs.push(ActiveStageOutput::ResponseFrame(buf.filled().to_vec()));
        }

        // Drain the client-driven sends of the finalization batch.
        while activation.next_pdu_hint().is_none() && !activation.state().is_terminal() {
            buf.clear();
            activation
                .step_with_security(&[], &mut buf, &mut self.security)
                .map_err(SessionError::connector)?;
            if !buf.filled().is_empty() {
                outputs.push(ActiveStageOutput::ResponseFrame(buf.filled().to_vec()));
            }
        }

        let finalized = match activation.state() {
            ConnectionActivationState::Finalized {
                desktop_size, share_id, ..
            } => Some((*desktop_size, *share_id)),
            _ => None,
        };

        if let Some((desktop_size, share_id)) = finalized {
            // Exactly one resize notification when the new Demand Active
            // carried a different desktop size.
            if desktop_size != self.desktop_size {
                handler.desktop_resize(desktop_size.width, desktop_size.height);
                self.desktop_size = desktop_size;
            }
            handler.switch_surface();

            self.share_id = share_id;

            if let StageState::Reactivation(finished) = std::mem::replace(&mut self.state, StageState::Active) {
                self.activation = *finished;
            }
        }

        Ok(outputs)
    }

    /// Whether the stage is waiting on server PDUs for a reactivation.
    pub fn is_reactivating(&self) -> bool {
        matches!(self.state, StageState::Reactivation(_))
    }

    //== Outbound ==//

    /// Encodes client input events as a share-data PDU, compressed when the
    /// payload warrants it.
    pub fn encode_input_events(&mut self, events: Vec<InputEvent>) -> SessionResult<Vec<u8>> {
        self.encode_outbound_data(ShareDataPdu::Input(InputEventPdu(events)))
    }

    /// Asks the server to stop or resume display updates.
    pub fn encode_suppress_output(
        &mut self,
        desktop_rect: Option<ferrodp_pdu::geometry::InclusiveRectangle>,
    ) -> SessionResult<Vec<u8>> {
        self.encode_outbound_data(ShareDataPdu::SuppressOutput(
            ferrodp_pdu::rdp::suppress_output::SuppressOutputPdu { desktop_rect },
        ))
    }

    /// A graceful client-initiated shutdown request.
    pub fn encode_shutdown_request(&mut self) -> SessionResult<Vec<u8>> {
        self.encode_outbound_data(ShareDataPdu::ShutdownRequest)
    }

    fn encode_outbound_data(&mut self, pdu: ShareDataPdu) -> SessionResult<Vec<u8>> {
        let body = encode_vec(&pdu).map_err(SessionError::encode)?;

        let compressed = if self.compression_enabled {
            self.bulk.compress(&body).map_err(SessionError::bulk)?
        } else {
            None
        };

        let (compression_byte, payload) = match &compressed {
            Some(frame) => (frame.flags, frame.data.as_slice()),
            None => (0, body.as_slice()),
        };

        let pdu_type = pdu.share_header_type() as u8;
        let inner = assemble_share_data(
            self.user_channel_id,
            self.share_id,
            pdu_type,
            body.len(),
            compression_byte,
            payload,
        );

        let sealed = legacy::wrap_security(&mut self.security, BasicSecurityHeaderFlags::empty(), &inner)
            .map_err(SessionError::connector)?;

        let mut buf = WriteBuf::new();
        legacy::encode_send_data_request_raw(self.user_channel_id, self.io_channel_id, &sealed, &mut buf)
            .map_err(SessionError::connector)?;

        Ok(buf.filled().to_vec())
    }

    //== Cache orders ==//

    /// Cache Bitmap (Revision 2) secondary order.
    ///
    /// On a failed decode the previous slot content is retained and the
    /// session continues.
    pub fn cache_bitmap_v2(&mut self, order: &CacheBitmapV2Order, handler: &mut dyn UpdateHandler) {
        let Some(caches) = self.caches.as_mut() else {
            return;
        };

        let codec_id = if order.compressed { 1 } else { 0 };
        match handler.decode_bitmap(order.bitmap_bpp, order.bitmap_width, order.bitmap_height, codec_id, &order.bitmap_data) {
            Some(surface) => {
                caches.bitmap.put(
                    order.cache_id,
                    order.cache_index,
                    CachedBitmap {
                        key64: order.key64(),
                        surface,
                    },
                );
            }
            None => {
                warn!(
                    cache_id = order.cache_id,
                    cache_index = order.cache_index,
                    "bitmap decode failed; previous cache entry retained"
                );
            }
        }
    }

    /// Cache Bitmap (Revision 3): the pre-composed bitmap-data block is
    /// handed through to the decoder together with its codec id.
    pub fn cache_bitmap_v3(&mut self, order: &CacheBitmapV3Order, handler: &mut dyn UpdateHandler) {
        let Some(caches) = self.caches.as_mut() else {
            return;
        };

        match handler.decode_bitmap(order.bpp, order.width, order.height, order.codec_id, &order.data) {
            Some(surface) => {
                caches.bitmap.put(
                    order.cache_id,
                    order.cache_index,
                    CachedBitmap {
                        key64: order.key64(),
                        surface,
                    },
                );
            }
            None => {
                warn!(
                    cache_id = order.cache_id,
                    cache_index = order.cache_index,
                    "bitmap decode failed; previous cache entry retained"
                );
            }
        }
    }

    pub fn cache_color_table(&mut self, order: &CacheColorTableOrder) {
        let Some(caches) = self.caches.as_mut() else {
            return;
        };

        if order.colors.len() != 256 {
            warn!(len = order.colors.len(), "color table is not 256 entries");
            return;
        }

        let mut colors = Box::new([0u32; 256]);
        colors.copy_from_slice(&order.colors);
        caches.palette.put(order.cache_index, colors);
    }

    pub fn cache_brush(&mut self, order: &CacheBrushOrder) {
        let Some(caches) = self.caches.as_mut() else {
            return;
        };

        caches.brush.put(
            order.cache_index,
            crate::caches::CachedBrush {
                bpp: order.bpp,
                data: order.data.clone(),
            },
        );
    }

    /// MemBlt: draws from the cached bitmap. An unknown key is a tolerated
    /// no-op (some servers reference entries they never defined); cache id
    /// `0xFF` addresses the offscreen surface cache.
    pub fn mem_blt(&self, order: &MemBltOrder, handler: &mut dyn UpdateHandler) {
        let Some(caches) = self.caches.as_ref() else {
            return;
        };

        let source: Option<&Surface> = if order.cache_id == OFFSCREEN_CACHE_ID {
            caches.offscreen.get(order.cache_index)
        } else {
            caches.bitmap.get(order.cache_id, order.cache_index).map(|b| &b.surface)
        };

        match source {
            Some(surface) => handler.mem_blt(order, surface),
            None => {
                warn!(
                    cache_id = order.cache_id,
                    cache_index = order.cache_index,
                    "MemBlt for an undefined cache entry; skipping the draw"
                );
            }
        }
    }

    pub fn mem3_blt(&self, order: &Mem3BltOrder, handler: &mut dyn UpdateHandler) {
        let Some(caches) = self.caches.as_ref() else {
            return;
        };

        let source: Option<&Surface> = if order.cache_id == OFFSCREEN_CACHE_ID {
            caches.offscreen.get(order.cache_index)
        } else {
            caches.bitmap.get(order.cache_id, order.cache_index).map(|b| &b.surface)
        };

        match source {
            Some(surface) => handler.mem3_blt(order, surface),
            None => {
                warn!(
                    cache_id = order.cache_id,
                    cache_index = order.cache_index,
                    "Mem3Blt for an undefined cache entry; skipping the draw"
                );
            }
        }
    }
}

/// Hand-assembles a share-data unit so a compressed payload can be spliced in
/// behind the fixed header.
fn assemble_share_data(
    pdu_source: u16,
    share_id: u32,
    pdu_type: u8,
    uncompressed_len: usize,
    compression_byte: u8,
    payload: &[u8],
) -> Vec<u8> {
    const PROTOCOL_VERSION: u16 = 0x10;
    const DATA_PDU_TYPE: u16 = 0x7;
    const CONTROL_HEADER_SIZE: usize = 10;
    const DATA_HEADER_SIZE: usize = 8;

    let total = CONTROL_HEADER_SIZE + DATA_HEADER_SIZE + payload.len();
    let mut out = Vec::with_capacity(total);

    out.extend_from_slice(&(total as u16).to_le_bytes());
    out.extend_from_slice(&(PROTOCOL_VERSION | DATA_PDU_TYPE).to_le_bytes());
    out.extend_from_slice(&pdu_source.to_le_bytes());
    out.extend_from_slice(&share_id.to_le_bytes());

    out.push(0); // padding
    out.push(StreamPriority::Medium as u8);
    out.extend_from_slice(&((uncompressed_len + 4) as u16).to_le_bytes());
    out.push(pdu_type);
    out.push(compression_byte);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);

    out
}
