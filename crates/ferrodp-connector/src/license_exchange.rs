//! Client licensing exchange ([MS-RDPELE] 3.1.5.3.1).
//!
//! Servers without a licensing requirement short-circuit immediately with a
//! `STATUS_VALID_CLIENT` error alert; otherwise the client walks Request →
//! Challenge → New License.

use std::mem;

use ferrodp_core::{decode, encode_vec, WriteBuf};
use ferrodp_pdu::rdp::headers::BasicSecurityHeaderFlags;
use ferrodp_pdu::rdp::server_license::{
    ClientNewLicenseRequest, ClientPlatformChallengeResponse, LicenseEncryptionData, LicenseErrorCode, LicensePdu,
    PREMASTER_SECRET_SIZE, RANDOM_NUMBER_SIZE,
};
use ferrodp_pdu::PduHint;
use rand::RngCore as _;

use crate::legacy::{self, SecurityState};
use crate::{ConnectorError, ConnectorErrorExt as _, ConnectorResult, Sequence, State, Written};

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum LicenseExchangeState {
    #[default]
    Consumed,

    NewLicenseRequest,
    PlatformChallenge {
        encryption_data: LicenseEncryptionData,
    },
    UpgradeLicense {
        encryption_data: LicenseEncryptionData,
    },
    LicenseExchanged,
}

impl State for LicenseExchangeState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::NewLicenseRequest => "NewLicenseRequest",
            Self::PlatformChallenge { .. } => "PlatformChallenge",
            Self::UpgradeLicense { .. } => "UpgradeLicense",
            Self::LicenseExchanged => "LicenseExchanged",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::LicenseExchanged)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

#[derive(Debug)]
pub struct LicenseExchangeSequence {
    pub state: LicenseExchangeState,
    pub io_channel_id: u16,
    pub user_channel_id: u16,
    pub username: String,
    pub machine_name: String,
    pub hardware_id: [u32; 4],
}

impl LicenseExchangeSequence {
    pub fn new(
        io_channel_id: u16,
        user_channel_id: u16,
        username: String,
        machine_name: String,
        hardware_id: [u32; 4],
    ) -> Self {
        Self {
            state: LicenseExchangeState::NewLicenseRequest,
            io_channel_id,
            user_channel_id,
            username,
            machine_name,
            hardware_id,
        }
    }

    fn send_license_pdu(&self, pdu: &LicensePdu, security: &mut SecurityState, output: &mut WriteBuf) -> ConnectorResult<usize> {
        let body = encode_vec(pdu).map_err(ConnectorError::encode)?;
        let sealed = legacy::wrap_security(security, BasicSecurityHeaderFlags::LICENSE_PKT, &body)?;
        legacy::encode_send_data_request_raw(self.user_channel_id, self.io_channel_id, &sealed, output)
    }

    /// Runs one step with the session security context threaded through.
    pub fn step_with_security(
        &mut self,
        input: &[u8],
        output: &mut WriteBuf,
        security: &mut SecurityState,
    ) -> ConnectorResult<Written> {
        let send_data_indication_ctx = legacy::decode_send_data_indication(input)?;
        let (header_flags, body) = legacy::unwrap_security(security, send_data_indication_ctx.user_data, true)?;

        if !header_flags.contains(BasicSecurityHeaderFlags::LICENSE_PKT) {
            return Err(general_err!("expected a licensing PDU on the io channel"));
        }

        let license_pdu: LicensePdu = decode(body.as_ref()).map_err(ConnectorError::decode)?;

        let (written, next_state) = match mem::take(&mut self.state) {
            LicenseExchangeState::Consumed => {
                return Err(general_err!(
                    "license exchange sequence state is consumed (this is a bug)",
                ))
            }

            LicenseExchangeState::NewLicenseRequest => match license_pdu {
                LicensePdu::ServerLicenseRequest(license_request) => {
                    let mut rng = rand::thread_rng();
                    let mut client_random = [0u8; RANDOM_NUMBER_SIZE];
                    rng.fill_bytes(&mut client_random);

                    let mut premaster_secret = [0u8; PREMASTER_SECRET_SIZE];
                    rng.fill_bytes(&mut premaster_secret);

                    match ClientNewLicenseRequest::from_server_license_request(
                        &license_request,
                        &client_random,
                        &premaster_secret,
                        &self.username,
                        &self.machine_name,
                    ) {
                        Ok((new_license_request, encryption_data)) => {
                            debug!(message = ?new_license_request, "Send");

                            let written = self.send_license_pdu(
                                &LicensePdu::ClientNewLicenseRequest(new_license_request),
                                security,
                                output,
                            )?;

                            (
                                Written::from_size(written)?,
                                LicenseExchangeState::PlatformChallenge { encryption_data },
                            )
                        }
                        Err(error) => {
                            error!(%error, "Could not generate the Client New License Request");
                            return Err(custom_err!("ClientNewLicenseRequest", error));
                        }
                    }
                }
                LicensePdu::LicensingErrorMessage(error_message) => {
                    if error_message.error_code != LicenseErrorCode::StatusValidClient {
                        return Err(reason_err!(
                            "LicensingErrorMessage",
                            "server aborted licensing: {:?}",
                            error_message.error_code,
                        ));
                    }

                    info!("Server did not initiate license exchange");
                    (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                }
                _ => {
                    return Err(general_err!(
                        "unexpected PDU received while waiting for the Server License Request"
                    ));
                }
            },

            LicenseExchangeState::PlatformChallenge { encryption_data } => match license_pdu {
                LicensePdu::ServerPlatformChallenge(challenge) => {
                    debug!(message = ?challenge, "Received");

                    let challenge_response = ClientPlatformChallengeResponse::from_server_platform_challenge(
                        &challenge,
                        self.hardware_id,
                        &encryption_data,
                    )
                    .map_err(|e| custom_err!("ClientPlatformChallengeResponse", e))?;

                    debug!(message = ?challenge_response, "Send");

                    let written = self.send_license_pdu(
                        &LicensePdu::ClientPlatformChallengeResponse(challenge_response),
                        security,
                        output,
                    )?;

                    (
                        Written::from_size(written)?,
                        LicenseExchangeState::UpgradeLicense { encryption_data },
                    )
                }
                LicensePdu::LicensingErrorMessage(error_message) => {
                    if error_message.error_code != LicenseErrorCode::StatusValidClient {
                        return Err(reason_err!(
                            "LicensingErrorMessage",
                            "server aborted licensing: {:?}",
                            error_message.error_code,
                        ));
                    }
                    (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                }
                _ => {
                    return Err(general_err!(
                        "unexpected PDU received while waiting for the Platform Challenge"
                    ));
                }
            },

            LicenseExchangeState::UpgradeLicense { encryption_data } => match license_pdu {
                LicensePdu::ServerNewLicense(new_license) => {
                    // The license content itself is not persisted; the MAC
                    // check still guards the exchange.
                    match new_license.decrypt_license_info(&encryption_data) {
                        Ok(license_info) => {
                            debug!(len = license_info.len(), "Received new license");
                        }
                        Err(error) => {
                            return Err(custom_err!("ServerNewLicense", error));
                        }
                    }

                    (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                }
                LicensePdu::LicensingErrorMessage(error_message) => {
                    if error_message.error_code != LicenseErrorCode::StatusValidClient {
                        return Err(reason_err!(
                            "LicensingErrorMessage",
                            "server aborted licensing: {:?}",
                            error_message.error_code,
                        ));
                    }
                    (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                }
                _ => {
                    return Err(general_err!(
                        "unexpected PDU received while waiting for the New License"
                    ));
                }
            },

            LicenseExchangeState::LicenseExchanged => return Err(general_err!("license already exchanged")),
        };

        self.state = next_state;

        Ok(written)
    }
}

impl Sequence for LicenseExchangeSequence {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match self.state {
            LicenseExchangeState::Consumed => None,
            LicenseExchangeState::NewLicenseRequest => Some(&ferrodp_pdu::X224_HINT),
            LicenseExchangeState::PlatformChallenge { .. } => Some(&ferrodp_pdu::X224_HINT),
            LicenseExchangeState::UpgradeLicense { .. } => Some(&ferrodp_pdu::X224_HINT),
            LicenseExchangeState::LicenseExchanged => None,
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
