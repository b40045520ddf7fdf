use core::mem;

use ferrodp_core::{decode, encode_vec, WriteBuf};
use ferrodp_pdu::crypto::{self, SecurityContext};
use ferrodp_pdu::gcc::{
    ChannelDef, ChannelOptions, ClientClusterData, ClientCoreData, ClientCoreOptionalData, ClientEarlyCapabilityFlags,
    ClientGccBlocks, ClientNetworkData, ClientSecurityData, ColorDepth, ConnectionType, EncryptionMethod, HighColorDepth,
    KeyboardType, RdpVersion, RedirectionFlags, RedirectionVersion, SecureAccessSequence, ServerSecurityData,
    SupportedColorDepths,
};
use ferrodp_pdu::nego::{self, SecurityProtocol};
use ferrodp_pdu::rdp::client_info::{
    AddressFamily, ClientInfo, ClientInfoFlags, CompressionType, Credentials as InfoCredentials, ExtendedClientInfo,
    ExtendedClientOptionalInfo, TimezoneInfo,
};
use ferrodp_pdu::rdp::headers::BasicSecurityHeaderFlags;
use ferrodp_pdu::rdp::security_exchange::SecurityExchangePdu;
use ferrodp_pdu::rdp::ClientInfoPdu;
use ferrodp_pdu::x224::{X224, X224Data};
use ferrodp_pdu::{mcs, PduHint};
use rand::RngCore as _;

use crate::channel_connection::{ChannelConnectionSequence, ChannelConnectionState};
use crate::connection_activation::{ConnectionActivationSequence, ConnectionActivationState};
use crate::legacy::{self, SecurityState};
use crate::license_exchange::LicenseExchangeSequence;
use crate::{
    encode_x224_packet, Config, ConnectorError, ConnectorErrorExt as _, ConnectorResult, DesktopSize, Sequence, State,
    Written,
};

/// Static channel names mapped to the MCS ids the server allocated.
pub type StaticChannels = Vec<(String, u16)>;

/// Everything the active session needs once the connector finished.
#[derive(Debug)]
pub struct ConnectionResult {
    pub io_channel_id: u16,
    pub user_channel_id: u16,
    pub static_channels: StaticChannels,
    pub desktop_size: DesktopSize,
    pub share_id: u32,
    /// Standard RDP security context; `None` under enhanced security.
    pub security: SecurityState,
    pub connection_activation: ConnectionActivationSequence,
}

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum ClientConnectorState {
    #[default]
    Consumed,

    ConnectionInitiationSendRequest,
    ConnectionInitiationWaitConfirm {
        requested_protocol: SecurityProtocol,
    },
    EnhancedSecurityUpgrade {
        selected_protocol: SecurityProtocol,
    },
    BasicSettingsExchangeSendInitial {
        selected_protocol: SecurityProtocol,
    },
    BasicSettingsExchangeWaitResponse {
        connect_initial: Box<mcs::ConnectInitial>,
    },
    ChannelConnection {
        io_channel_id: u16,
        server_security: Box<ServerSecurityData>,
        channel_connection: ChannelConnectionSequence,
    },
    SecurityExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        server_security: Box<ServerSecurityData>,
    },
    SecureSettingsExchange {
        io_channel_id: u16,
        user_channel_id: u16,
    },
    LicensingExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        license_exchange: Box<LicenseExchangeSequence>,
    },
    CapabilitiesExchange {
        connection_activation: Box<ConnectionActivationSequence>,
    },
    ConnectionFinalization {
        connection_activation: Box<ConnectionActivationSequence>,
    },
    Connected {
        result: Box<ConnectionResult>,
    },
}

impl State for ClientConnectorState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::ConnectionInitiationSendRequest => "ConnectionInitiationSendRequest",
            Self::ConnectionInitiationWaitConfirm { .. } => "ConnectionInitiationWaitConfirm",
            Self::EnhancedSecurityUpgrade { .. } => "EnhancedSecurityUpgrade",
            Self::BasicSettingsExchangeSendInitial { .. } => "BasicSettingsExchangeSendInitial",
            Self::BasicSettingsExchangeWaitResponse { .. } => "BasicSettingsExchangeWaitResponse",
            Self::ChannelConnection { .. } => "ChannelConnection",
            Self::SecurityExchange { .. } => "SecurityExchange",
            Self::SecureSettingsExchange { .. } => "SecureSettingsExchange",
            Self::LicensingExchange { .. } => "LicensingExchange",
            Self::CapabilitiesExchange { .. } => "CapabilitiesExchange",
            Self::ConnectionFinalization { .. } => "ConnectionFinalization",
            Self::Connected { .. } => "Connected",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// The client connection sequence, from the X.224 Connection Request to the
/// Font Map PDU.
#[derive(Debug)]
pub struct ClientConnector {
    pub config: Config,
    pub state: ClientConnectorState,
    /// Standard-security context, established in the SecurityExchange state.
    pub security: SecurityState,
    /// Keys recovered from the persistent bitmap cache, announced during
    /// finalization.
    persistent_keys: Vec<u64>,
    static_channel_names: Vec<String>,
    static_channel_ids: Vec<u16>,
}

impl ClientConnector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: ClientConnectorState::ConnectionInitiationSendRequest,
            security: None,
            persistent_keys: Vec::new(),
            static_channel_names: Vec::new(),
            static_channel_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_persistent_keys(mut self, keys: Vec<u64>) -> Self {
        self.persistent_keys = keys;
        self
    }

    /// Whether the host must upgrade the transport (TLS handshake, NLA)
    /// before the sequence can continue.
    pub fn should_perform_security_upgrade(&self) -> bool {
        match &self.state {
            ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol } => {
                !selected_protocol.is_standard_rdp_security()
            }
            _ => false,
        }
    }

    pub fn mark_security_upgrade_as_done(&mut self) {
        debug_assert!(self.should_perform_security_upgrade());
        if let ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol } = mem::take(&mut self.state) {
            self.state = ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol };
        }
    }
}

impl Sequence for ClientConnector {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match &self.state {
            ClientConnectorState::Consumed => None,
            ClientConnectorState::ConnectionInitiationSendRequest => None,
            ClientConnectorState::ConnectionInitiationWaitConfirm { .. } => Some(&ferrodp_pdu::X224_HINT),
            ClientConnectorState::EnhancedSecurityUpgrade { .. } => None,
            ClientConnectorState::BasicSettingsExchangeSendInitial { .. } => None,
            ClientConnectorState::BasicSettingsExchangeWaitResponse { .. } => Some(&ferrodp_pdu::X224_HINT),
            ClientConnectorState::ChannelConnection { channel_connection, .. } => channel_connection.next_pdu_hint(),
            ClientConnectorState::SecurityExchange { .. } => None,
            ClientConnectorState::SecureSettingsExchange { .. } => None,
            ClientConnectorState::LicensingExchange { license_exchange, .. } => license_exchange.next_pdu_hint(),
            ClientConnectorState::CapabilitiesExchange {
                connection_activation, ..
            }
            | ClientConnectorState::ConnectionFinalization {
                connection_activation, ..
            } => connection_activation.next_pdu_hint(),
            ClientConnectorState::Connected { .. } => None,
        }
    }

    fn state(&self) -> &dyn State {
        &self.state
    }

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            ClientConnectorState::Consumed => {
                return Err(general_err!("connector sequence state is consumed (this is a bug)"))
            }

            //== Connection Initiation ==//
            ClientConnectorState::ConnectionInitiationSendRequest => {
                debug!("Connection Initiation");

                let mut security_protocol = SecurityProtocol::empty();

                if self.config.tls_security {
                    security_protocol.insert(SecurityProtocol::SSL);
                }

                if self.config.nla_security {
                    security_protocol.insert(SecurityProtocol::HYBRID | SecurityProtocol::HYBRID_EX);
                }

                if security_protocol.is_standard_rdp_security() && !self.config.rdp_security {
                    return Err(reason_err!("Initiation", "no security protocol is enabled"));
                }

                let connection_request = nego::ConnectionRequest {
                    nego_data: self.config.request_data.clone().or_else(|| {
                        Some(nego::NegoRequestData::cookie(
                            self.config.credentials.username.clone(),
                        ))
                    }),
                    flags: nego::RequestFlags::empty(),
                    protocol: security_protocol,
                };

                debug!(message = ?connection_request, "Send");

                let written =
                    ferrodp_core::encode_buf(&X224(connection_request), output).map_err(ConnectorError::encode)?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::ConnectionInitiationWaitConfirm {
                        requested_protocol: security_protocol,
                    },
                )
            }

            ClientConnectorState::ConnectionInitiationWaitConfirm { requested_protocol } => {
                let connection_confirm = decode::<X224<nego::ConnectionConfirm>>(input)
                    .map_err(ConnectorError::decode)?
                    .0;

                debug!(message = ?connection_confirm, "Received");

                let (flags, selected_protocol) = match connection_confirm {
                    nego::ConnectionConfirm::Response { flags, protocol } => (flags, protocol),
                    nego::ConnectionConfirm::Failure { code } => {
                        error!(?code, "Received connection failure code");
                        return Err(ConnectorError::negotiation(code));
                    }
                };

                info!(?selected_protocol, ?flags, "Server confirmed connection");

                if !selected_protocol.is_standard_rdp_security()
                    && !selected_protocol.intersects(requested_protocol)
                {
                    return Err(reason_err!(
                        "Initiation",
                        "client advertised {requested_protocol:?}, but server selected {selected_protocol:?}",
                    ));
                }

                if selected_protocol.is_standard_rdp_security() && !self.config.rdp_security {
                    return Err(reason_err!(
                        "Initiation",
                        "server selected standard RDP security, which is not enabled",
                    ));
                }

                (
                    Written::Nothing,
                    ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol },
                )
            }

            //== Upgrade to Enhanced RDP Security ==//
            // The transport upgrade itself (TLS handshake, CredSSP) is the
            // host's concern; standard RDP security needs none.
            ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol } => (
                Written::Nothing,
                ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol },
            ),

            //== Basic Settings Exchange ==//
            ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol } => {
                debug!("Basic Settings Exchange");

                let client_gcc_blocks = create_gcc_blocks(&self.config, selected_protocol);

                let connect_initial = mcs::ConnectInitial::with_gcc_blocks(client_gcc_blocks);

                debug!(message = ?connect_initial, "Send");

                let written = encode_x224_packet(&connect_initial, output)?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::BasicSettingsExchangeWaitResponse {
                        connect_initial: Box::new(connect_initial),
                    },
                )
            }

            ClientConnectorState::BasicSettingsExchangeWaitResponse { connect_initial } => {
                let x224_payload = decode::<X224<X224Data<'_>>>(input)
                    .map_err(ConnectorError::decode)?
                    .0;
                let connect_response =
                    decode::<mcs::ConnectResponse>(x224_payload.data.as_ref()).map_err(ConnectorError::decode)?;

                debug!(message = ?connect_response, "Received");

                let client_gcc_blocks = &connect_initial.conference_create_request.gcc_blocks;
                let server_gcc_blocks = connect_response.conference_create_response.gcc_blocks;

                if client_gcc_blocks.security == ClientSecurityData::no_security()
                    && server_gcc_blocks.security != ServerSecurityData::no_security()
                {
                    return Err(general_err!("can't satisfy server security settings"));
                }

                let static_channel_ids = server_gcc_blocks.network.channel_ids.clone();
                let io_channel_id = server_gcc_blocks.network.io_channel;

                debug!(?static_channel_ids, io_channel_id);

                let names: Vec<String> = self.config.channels.clone();
                self.static_channel_names = names;
                self.static_channel_ids = static_channel_ids.clone();

                (
                    Written::Nothing,
                    ClientConnectorState::ChannelConnection {
                        io_channel_id,
                        server_security: Box::new(server_gcc_blocks.security),
                        channel_connection: ChannelConnectionSequence::new(io_channel_id, static_channel_ids),
                    },
                )
            }

            //== Channel Connection ==//
            ClientConnectorState::ChannelConnection {
                io_channel_id,
                server_security,
                mut channel_connection,
            } => {
                debug!("Channel Connection");
                let written = channel_connection.step(input, output)?;

                let next_state =
                    if let ChannelConnectionState::AllJoined { user_channel_id } = channel_connection.state {
                        if server_security.encryption_method.is_empty() {
                            ClientConnectorState::SecureSettingsExchange {
                                io_channel_id,
                                user_channel_id,
                            }
                        } else {
                            ClientConnectorState::SecurityExchange {
                                io_channel_id,
                                user_channel_id,
                                server_security,
                            }
                        }
                    } else {
                        ClientConnectorState::ChannelConnection {
                            io_channel_id,
                            server_security,
                            channel_connection,
                        }
                    };

                (written, next_state)
            }

            //== RDP Security Commencement ==//
            // With standard RDP security selected the client random is
            // encrypted under the server certificate and both sides derive
            // the session keys.
            ClientConnectorState::SecurityExchange {
                io_channel_id,
                user_channel_id,
                server_security,
            } => {
                debug!("Security Exchange");

                let server_random = server_security
                    .server_random
                    .ok_or_else(|| general_err!("server did not provide a server random"))?;

                let public_key = crypto::cert::extract_rsa_public_key(&server_security.server_cert)
                    .map_err(ConnectorError::security)?;

                let mut client_random = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut client_random);

                let encrypted_client_random = crypto::rsa_public_encrypt(&client_random, &public_key);

                self.security = Some(
                    SecurityContext::new(
                        server_security.encryption_method,
                        self.config.secure_checksum,
                        &client_random,
                        &server_random,
                    )
                    .map_err(ConnectorError::security)?,
                );

                let security_exchange = SecurityExchangePdu {
                    encrypted_client_random,
                };

                debug!(message = ?security_exchange, "Send");

                let header = ferrodp_pdu::rdp::headers::BasicSecurityHeader {
                    flags: BasicSecurityHeaderFlags::EXCHANGE_PKT,
                };
                let mut payload = encode_vec(&header).map_err(ConnectorError::encode)?;
                payload.extend_from_slice(&encode_vec(&security_exchange).map_err(ConnectorError::encode)?);

                let written =
                    legacy::encode_send_data_request_raw(user_channel_id, io_channel_id, &payload, output)?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::SecureSettingsExchange {
                        io_channel_id,
                        user_channel_id,
                    },
                )
            }

            //== Secure Settings Exchange ==//
            ClientConnectorState::SecureSettingsExchange {
                io_channel_id,
                user_channel_id,
            } => {
                debug!("Secure Settings Exchange");

                let client_info = create_client_info(&self.config);

                debug!(message = ?client_info, "Send");

                let written = if self.security.is_some() {
                    let body = encode_vec(&client_info).map_err(ConnectorError::encode)?;
                    let sealed =
                        legacy::wrap_security(&mut self.security, BasicSecurityHeaderFlags::INFO_PKT, &body)?;
                    legacy::encode_send_data_request_raw(user_channel_id, io_channel_id, &sealed, output)?
                } else {
                    let pdu = ClientInfoPdu {
                        security_header: ferrodp_pdu::rdp::headers::BasicSecurityHeader {
                            flags: BasicSecurityHeaderFlags::INFO_PKT,
                        },
                        client_info,
                    };
                    legacy::encode_send_data_request(user_channel_id, io_channel_id, &pdu, output)?
                };

                (
                    Written::from_size(written)?,
                    ClientConnectorState::LicensingExchange {
                        io_channel_id,
                        user_channel_id,
                        license_exchange: Box::new(LicenseExchangeSequence::new(
                            io_channel_id,
                            user_channel_id,
                            self.config.credentials.username.clone(),
                            self.config.client_hostname.clone(),
                            [0, 0, 0, 0],
                        )),
                    },
                )
            }

            //== Licensing ==//
            ClientConnectorState::LicensingExchange {
                io_channel_id,
                user_channel_id,
                mut license_exchange,
            } => {
                debug!("Licensing Exchange");

                let written = license_exchange.step_with_security(input, output, &mut self.security)?;

                let next_state = if license_exchange.state.is_terminal() {
                    ClientConnectorState::CapabilitiesExchange {
                        connection_activation: Box::new(ConnectionActivationSequence::new(
                            self.config.clone(),
                            io_channel_id,
                            user_channel_id,
                            mem::take(&mut self.persistent_keys),
                        )),
                    }
                } else {
                    ClientConnectorState::LicensingExchange {
                        io_channel_id,
                        user_channel_id,
                        license_exchange,
                    }
                };

                (written, next_state)
            }

            //== Capabilities Exchange ==//
            ClientConnectorState::CapabilitiesExchange {
                mut connection_activation,
            } => {
                let written = connection_activation.step_with_security(input, output, &mut self.security)?;

                let in_finalization = matches!(
                    connection_activation.state(),
                    ConnectionActivationState::ConnectionFinalization { .. }
                );
                let still_in_capabilities = matches!(
                    connection_activation.state(),
                    ConnectionActivationState::CapabilitiesExchange { .. }
                );

                if in_finalization {
                    (
                        written,
                        ClientConnectorState::ConnectionFinalization { connection_activation },
                    )
                } else if still_in_capabilities {
                    (
                        written,
                        ClientConnectorState::CapabilitiesExchange { connection_activation },
                    )
                } else {
                    return Err(general_err!("invalid state (this is a bug)"));
                }
            }

            //== Connection Finalization ==//
            ClientConnectorState::ConnectionFinalization {
                mut connection_activation,
            } => {
                let written = connection_activation.step_with_security(input, output, &mut self.security)?;

                let next_state = if !connection_activation.state().is_terminal() {
                    ClientConnectorState::ConnectionFinalization { connection_activation }
                } else {
                    let (io_channel_id, user_channel_id, desktop_size, share_id) =
                        match connection_activation.state() {
                            ConnectionActivationState::Finalized {
                                io_channel_id,
                                user_channel_id,
                                desktop_size,
                                share_id,
                            } => (*io_channel_id, *user_channel_id, *desktop_size, *share_id),
                            _ => return Err(general_err!("invalid state (this is a bug)")),
                        };

                    let static_channels = self
                        .static_channel_names
                        .iter()
                        .cloned()
                        .zip(self.static_channel_ids.iter().copied())
                        .collect();

                    ClientConnectorState::Connected {
                        result: Box::new(ConnectionResult {
                            io_channel_id,
                            user_channel_id,
                            static_channels,
                            desktop_size,
                            share_id,
                            security: self.security.take(),
                            connection_activation: *connection_activation,
                        }),
                    }
                };

                (written, next_state)
            }

            //== Connected ==//
            ClientConnectorState::Connected { .. } => return Err(general_err!("already connected")),
        };

        self.state = next_state;

        Ok(written)
    }
}

fn create_gcc_blocks(config: &Config, selected_protocol: SecurityProtocol) -> ClientGccBlocks {
    let supported_color_depths = match config.color_depth {
        15 => SupportedColorDepths::BPP15,
        16 => SupportedColorDepths::BPP16,
        24 => SupportedColorDepths::BPP24,
        _ => SupportedColorDepths::BPP32 | SupportedColorDepths::BPP24 | SupportedColorDepths::BPP16,
    };

    let channels = config
        .channels
        .iter()
        .map(|name| ChannelDef {
            name: name.clone(),
            options: ChannelOptions::INITIALIZED | ChannelOptions::COMPRESS_RDP,
        })
        .collect::<Vec<_>>();

    let encryption_methods = if config.rdp_security {
        config.encryption_methods
    } else {
        EncryptionMethod::empty()
    };

    ClientGccBlocks {
        core: ClientCoreData {
            version: RdpVersion::V5_PLUS,
            desktop_width: config.desktop_size.width,
            desktop_height: config.desktop_size.height,
            // Ignored thanks to the optional post-beta2 and high color fields.
            color_depth: ColorDepth::Bpp8,
            sec_access_sequence: SecureAccessSequence::Del,
            keyboard_layout: config.keyboard_layout,
            client_build: config.client_build,
            client_name: config.client_hostname.clone(),
            keyboard_type: KeyboardType::IbmEnhanced,
            keyboard_subtype: config.keyboard_subtype,
            keyboard_functional_keys_count: config.keyboard_functional_keys_count,
            ime_file_name: config.ime_file_name.clone(),
            optional_data: ClientCoreOptionalData {
                post_beta2_color_depth: Some(ColorDepth::Bpp8),
                client_product_id: Some(1),
                serial_number: Some(0),
                high_color_depth: Some(match config.color_depth {
                    15 => HighColorDepth::Bpp15,
                    16 => HighColorDepth::Bpp16,
                    _ => HighColorDepth::Bpp24,
                }),
                supported_color_depths: Some(supported_color_depths),
                early_capability_flags: Some(
                    ClientEarlyCapabilityFlags::VALID_CONNECTION_TYPE
                        | ClientEarlyCapabilityFlags::SUPPORT_ERR_INFO_PDU,
                ),
                dig_product_id: Some(config.dig_product_id.clone()),
                connection_type: Some(ConnectionType::Lan),
                server_selected_protocol: Some(selected_protocol),
            },
        },
        security: ClientSecurityData {
            encryption_methods,
            ext_encryption_methods: 0,
        },
        network: if channels.is_empty() {
            None
        } else {
            Some(ClientNetworkData { channels })
        },
        cluster: (config.redirected_session_id != 0).then_some(ClientClusterData {
            flags: RedirectionFlags::REDIRECTION_SUPPORTED | RedirectionFlags::REDIRECTED_SESSION_FIELD_VALID,
            redirection_version: RedirectionVersion::V4,
            redirected_session_id: config.redirected_session_id,
        }),
        monitor: None,
    }
}

fn create_client_info(config: &Config) -> ClientInfo {
    let mut flags = ClientInfoFlags::MOUSE
        | ClientInfoFlags::MOUSE_HAS_WHEEL
        | ClientInfoFlags::UNICODE
        | ClientInfoFlags::DISABLE_CTRL_ALT_DEL
        | ClientInfoFlags::LOGON_NOTIFY
        | ClientInfoFlags::LOGON_ERRORS
        | ClientInfoFlags::ENABLE_WINDOWS_KEY
        | ClientInfoFlags::MAXIMIZE_SHELL;

    if config.autologon {
        flags |= ClientInfoFlags::AUTOLOGON;
    }

    if config.remote_app {
        flags |= ClientInfoFlags::RAIL;
    }

    if config.console_audio {
        flags |= ClientInfoFlags::REMOTE_CONSOLE_AUDIO;
    }

    if config.compression {
        flags |= ClientInfoFlags::COMPRESSION;
    }

    // A pre-encrypted cookie (from redirection) substitutes for the password.
    let password = match &config.password_cookie {
        Some(cookie) => {
            flags |= ClientInfoFlags::USING_SAVED_CREDS;
            ferrodp_pdu::utils::from_utf16_bytes(cookie).trim_end_matches('\0').to_owned()
        }
        None => config.credentials.password.clone(),
    };

    let timezone = config
        .client_time_zone
        .clone()
        .unwrap_or_else(|| TimezoneInfo::from_local_offset(0, false, "UTC", "UTC"));

    ClientInfo {
        credentials: InfoCredentials {
            username: config.credentials.username.clone(),
            password,
            domain: config.credentials.domain.clone(),
        },
        code_page: 0,
        flags,
        compression_type: CompressionType::K64,
        alternate_shell: String::new(),
        work_dir: String::new(),
        extra_info: ExtendedClientInfo {
            address_family: if config.ipv6 {
                AddressFamily::INet6
            } else {
                AddressFamily::INet
            },
            address: config.ip_address.clone().unwrap_or_default(),
            dir: config.client_dir.clone(),
            optional_data: ExtendedClientOptionalInfo {
                timezone: Some(timezone),
                session_id: Some(0),
                performance_flags: Some(config.performance_flags),
                reconnect_cookie: config.reconnect_cookie,
            },
        },
    }
}
