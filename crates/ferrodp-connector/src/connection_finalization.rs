use std::mem;

use ferrodp_core::WriteBuf;
use ferrodp_pdu::rdp::capability_sets::SERVER_CHANNEL_ID;
use ferrodp_pdu::rdp::finalization_messages::{
    ControlAction, ControlPdu, FontPdu, PersistentKeyListPdu, SynchronizePdu, MAX_PERSISTENT_KEYS_PER_PDU,
};
use ferrodp_pdu::rdp::headers::ShareDataPdu;
use ferrodp_pdu::rdp::server_error_info::{ErrorInfo, ServerSetErrorInfoPdu};
use ferrodp_pdu::PduHint;

use crate::legacy::{self, SecurityState};
use crate::{ConnectorResult, Sequence, State, Written};

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum ConnectionFinalizationState {
    #[default]
    Consumed,

    SendSynchronize,
    SendControlCooperate,
    SendRequestControl,
    SendPersistentKeyList,
    SendFontList,

    WaitForResponse,

    Finished,
}

impl State for ConnectionFinalizationState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::SendSynchronize => "SendSynchronize",
            Self::SendControlCooperate => "SendControlCooperate",
            Self::SendRequestControl => "SendRequestControl",
            Self::SendPersistentKeyList => "SendPersistentKeyList",
            Self::SendFontList => "SendFontList",
            Self::WaitForResponse => "WaitForResponse",
            Self::Finished => "Finished",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// The client finalization batch (Synchronize, Control Cooperate, Request
/// Control, optional Persistent Key List, Font List) and the wait for the
/// server's replies, ending at the Font Map PDU.
///
/// The client PDUs carry no inter-dependency on server replies and may end up
/// in a single write, but their order is preserved.
#[derive(Debug)]
pub struct ConnectionFinalizationSequence {
    pub state: ConnectionFinalizationState,
    pub io_channel_id: u16,
    pub user_channel_id: u16,
    pub share_id: u32,
    /// `targetUser` for the Synchronize PDU; configuration-driven, defaults
    /// to the MCS user id.
    pub target_user_id: u16,
    /// 64-bit keys recovered from the persistent bitmap cache file.
    pub persistent_keys: Vec<u64>,
}

impl ConnectionFinalizationSequence {
    pub fn new(io_channel_id: u16, user_channel_id: u16, share_id: u32, persistent_keys: Vec<u64>) -> Self {
        Self {
            state: ConnectionFinalizationState::SendSynchronize,
            io_channel_id,
            user_channel_id,
            share_id,
            target_user_id: user_channel_id,
            persistent_keys,
        }
    }

    /// Runs one step with the session security context threaded through.
    pub fn step_with_security(
        &mut self,
        input: &[u8],
        output: &mut WriteBuf,
        security: &mut SecurityState,
    ) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            ConnectionFinalizationState::Consumed => {
                return Err(general_err!(
                    "connection finalization sequence state is consumed (this is a bug)",
                ))
            }

            ConnectionFinalizationState::SendSynchronize => {
                let message = ShareDataPdu::Synchronize(SynchronizePdu {
                    target_user_id: self.target_user_id,
                });

                debug!(?message, "Send");

                let written = legacy::encode_share_data(
                    self.user_channel_id,
                    self.io_channel_id,
                    self.share_id,
                    message,
                    security,
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ConnectionFinalizationState::SendControlCooperate,
                )
            }

            ConnectionFinalizationState::SendControlCooperate => {
                let message = ShareDataPdu::Control(ControlPdu {
                    action: ControlAction::Cooperate,
                    grant_id: 0,
                    control_id: 0,
                });

                debug!(?message, "Send");

                let written = legacy::encode_share_data(
                    self.user_channel_id,
                    self.io_channel_id,
                    self.share_id,
                    message,
                    security,
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ConnectionFinalizationState::SendRequestControl,
                )
            }

            ConnectionFinalizationState::SendRequestControl => {
                let message = ShareDataPdu::Control(ControlPdu {
                    action: ControlAction::RequestControl,
                    grant_id: 0,
                    control_id: 0,
                });

                debug!(?message, "Send");

                let written = legacy::encode_share_data(
                    self.user_channel_id,
                    self.io_channel_id,
                    self.share_id,
                    message,
                    security,
                    output,
                )?;

                let next_state = if self.persistent_keys.is_empty() {
                    ConnectionFinalizationState::SendFontList
                } else {
                    ConnectionFinalizationState::SendPersistentKeyList
                };

                (Written::from_size(written)?, next_state)
            }

            ConnectionFinalizationState::SendPersistentKeyList => {
                // A single chunk suffices for the keys one persistence file
                // realistically holds; the chunking limit still applies.
                let mut keys = mem::take(&mut self.persistent_keys);
                keys.truncate(MAX_PERSISTENT_KEYS_PER_PDU);

                let message = ShareDataPdu::PersistentKeyList(PersistentKeyListPdu::single_chunk(keys));

                debug!(?message, "Send");

                let written = legacy::encode_share_data(
                    self.user_channel_id,
                    self.io_channel_id,
                    self.share_id,
                    message,
                    security,
                    output,
                )?;

                (Written::from_size(written)?, ConnectionFinalizationState::SendFontList)
            }

            ConnectionFinalizationState::SendFontList => {
                let message = ShareDataPdu::FontList(FontPdu::default());

                debug!(?message, "Send");

                let written = legacy::encode_share_data(
                    self.user_channel_id,
                    self.io_channel_id,
                    self.share_id,
                    message,
                    security,
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ConnectionFinalizationState::WaitForResponse,
                )
            }

            ConnectionFinalizationState::WaitForResponse => {
                let ctx = legacy::decode_send_data_indication(input)?;
                let ctx = legacy::decode_share_data(ctx, security)?;

                debug!(message = ?ctx.pdu, "Received");

                let next_state = match ctx.pdu {
                    ShareDataPdu::Synchronize(_) => {
                        debug!("Server Synchronize");
                        ConnectionFinalizationState::WaitForResponse
                    }
                    ShareDataPdu::Control(control_pdu) => match control_pdu.action {
                        ControlAction::Cooperate => {
                            if control_pdu.grant_id == 0 && control_pdu.control_id == 0 {
                                debug!("Server Control (Cooperate)");
                                ConnectionFinalizationState::WaitForResponse
                            } else {
                                return Err(general_err!("invalid Control Cooperate PDU"));
                            }
                        }
                        ControlAction::GrantedControl => {
                            if control_pdu.grant_id == self.user_channel_id
                                && control_pdu.control_id == u32::from(SERVER_CHANNEL_ID)
                            {
                                debug!("Server Control (Granted Control)");
                                ConnectionFinalizationState::WaitForResponse
                            } else {
                                return Err(general_err!("invalid Granted Control PDU"));
                            }
                        }
                        _ => return Err(general_err!("unexpected control action")),
                    },
                    ShareDataPdu::ServerSetErrorInfo(ServerSetErrorInfoPdu(ErrorInfo::None)) => {
                        ConnectionFinalizationState::WaitForResponse
                    }
                    ShareDataPdu::ServerSetErrorInfo(ServerSetErrorInfoPdu(error_info)) => {
                        return Err(reason_err!("ServerSetErrorInfo", "{}", error_info.description()));
                    }
                    ShareDataPdu::FontMap(_) => {
                        // Upon the Font Map the server may start sending
                        // graphics output; the sequence is done.
                        ConnectionFinalizationState::Finished
                    }
                    _ => return Err(general_err!("unexpected server message during finalization")),
                };

                (Written::Nothing, next_state)
            }

            ConnectionFinalizationState::Finished => return Err(general_err!("finalization already finished")),
        };

        self.state = next_state;

        Ok(written)
    }
}

impl Sequence for ConnectionFinalizationSequence {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match self.state {
            ConnectionFinalizationState::WaitForResponse => Some(&ferrodp_pdu::X224_HINT),
            _ => None,
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
