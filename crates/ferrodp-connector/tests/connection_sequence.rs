//! Drives the whole client connection sequence against a scripted server
//! trace and checks it reaches the connected state exactly once.

use std::borrow::Cow;

use ferrodp_connector::{
    BitmapCacheConfig, ClientConnector, ClientConnectorState, Config, Credentials, DesktopSize, Sequence as _,
    State as _,
};
use ferrodp_pdu::rdp::client_info::PerformanceFlags;
use ferrodp_core::{encode_vec, WriteBuf};
use ferrodp_pdu::gcc::{
    ConferenceCreateResponse, EncryptionLevel, EncryptionMethod, RdpVersion, ServerCoreData, ServerCoreOptionalData,
    ServerGccBlocks, ServerNetworkData, ServerSecurityData,
};
use ferrodp_pdu::mcs::{
    AttachUserConfirm, ChannelJoinConfirm, ConnectResponse, DomainParameters, SendDataIndication, GLOBAL_CHANNEL_ID,
};
use ferrodp_pdu::nego::{ConnectionConfirm, ResponseFlags, SecurityProtocol};
use ferrodp_pdu::rdp::capability_sets::{
    Bitmap, BitmapDrawingFlags, CapabilitySet, DemandActive, General, ServerDemandActive, SERVER_CHANNEL_ID,
};
use ferrodp_pdu::rdp::client_info::CompressionType;
use ferrodp_pdu::rdp::finalization_messages::{ControlAction, ControlPdu, FontPdu, SynchronizePdu};
use ferrodp_pdu::rdp::headers::{
    BasicSecurityHeader, BasicSecurityHeaderFlags, CompressionFlags, ShareControlHeader, ShareControlPdu,
    ShareDataHeader, ShareDataPdu, StreamPriority,
};
use ferrodp_pdu::rdp::server_license::{LicensePdu, LicensingErrorMessage};
use ferrodp_pdu::x224::X224;

const USER_CHANNEL_ID: u16 = 1004;
const STATIC_CHANNEL_ID: u16 = 1005;
const SHARE_ID: u32 = 0x0001_000A;

fn test_config() -> Config {
    Config {
        hostname: "server.example".to_owned(),
        port: 3389,
        credentials: Credentials {
            username: "jdoe".to_owned(),
            password: "hunter2".to_owned(),
            domain: None,
        },
        password_cookie: None,
        rdp_security: false,
        tls_security: true,
        nla_security: false,
        encryption_methods: EncryptionMethod::empty(),
        secure_checksum: false,
        desktop_size: DesktopSize {
            width: 1024,
            height: 768,
        },
        color_depth: 32,
        compression: false,
        bitmap_cache: BitmapCacheConfig::default(),
        performance_flags: PerformanceFlags::empty(),
        client_time_zone: None,
        ip_address: None,
        ipv6: false,
        client_hostname: "testbox".to_owned(),
        client_dir: "C:\\".to_owned(),
        client_build: 2600,
        keyboard_layout: 0x409,
        keyboard_subtype: 0,
        keyboard_functional_keys_count: 12,
        ime_file_name: String::new(),
        dig_product_id: String::new(),
        platform: ferrodp_pdu::rdp::capability_sets::MajorPlatformType::Unix,
        autologon: false,
        remote_app: false,
        console_audio: false,
        channels: vec!["cliprdr".to_owned()],
        redirected_session_id: 0,
        reconnect_cookie: None,
        deactivate_client_decoding: false,
        request_data: None,
    }
}

fn connection_confirm_frame() -> Vec<u8> {
    encode_vec(&X224(ConnectionConfirm::Response {
        flags: ResponseFlags::empty(),
        protocol: SecurityProtocol::SSL,
    }))
    .unwrap()
}

fn connect_response_frame() -> Vec<u8> {
    let response = ConnectResponse {
        conference_create_response: ConferenceCreateResponse {
            user_id: USER_CHANNEL_ID,
            gcc_blocks: ServerGccBlocks {
                core: ServerCoreData {
                    version: RdpVersion::V5_PLUS,
                    optional_data: ServerCoreOptionalData::default(),
                },
                network: ServerNetworkData {
                    io_channel: GLOBAL_CHANNEL_ID,
                    channel_ids: vec![STATIC_CHANNEL_ID],
                },
                security: ServerSecurityData {
                    encryption_method: EncryptionMethod::empty(),
                    encryption_level: EncryptionLevel::None,
                    server_random: None,
                    server_cert: Vec::new(),
                },
            },
        },
        called_connect_id: 0,
        domain_parameters: DomainParameters::target(),
    };

    let body = encode_vec(&response).unwrap();
    encode_vec(&X224(ferrodp_pdu::x224::X224Data {
        data: Cow::Owned(body),
    }))
    .unwrap()
}

fn attach_user_confirm_frame() -> Vec<u8> {
    encode_vec(&X224(AttachUserConfirm {
        result: 0,
        initiator_id: USER_CHANNEL_ID,
    }))
    .unwrap()
}

fn channel_join_confirm_frame(channel_id: u16) -> Vec<u8> {
    encode_vec(&X224(ChannelJoinConfirm {
        result: 0,
        initiator_id: USER_CHANNEL_ID,
        requested_channel_id: channel_id,
        channel_id,
    }))
    .unwrap()
}

fn send_data_indication_frame(user_data: Vec<u8>) -> Vec<u8> {
    encode_vec(&X224(SendDataIndication {
        initiator_id: USER_CHANNEL_ID,
        channel_id: GLOBAL_CHANNEL_ID,
        user_data: Cow::Owned(user_data),
    }))
    .unwrap()
}

fn license_valid_client_frame() -> Vec<u8> {
    let header = BasicSecurityHeader {
        flags: BasicSecurityHeaderFlags::LICENSE_PKT,
    };
    let mut body = encode_vec(&header).unwrap();
    body.extend_from_slice(
        &encode_vec(&LicensePdu::LicensingErrorMessage(LicensingErrorMessage::valid_client())).unwrap(),
    );
    send_data_indication_frame(body)
}

fn demand_active_frame(width: u16, height: u16) -> Vec<u8> {
    let demand_active = ShareControlPdu::ServerDemandActive(ServerDemandActive {
        pdu: DemandActive {
            source_descriptor: "RDP".to_owned(),
            capability_sets: vec![
                CapabilitySet::General(General::default()),
                CapabilitySet::Bitmap(Bitmap {
                    pref_bits_per_pix: 32,
                    desktop_width: width,
                    desktop_height: height,
                    desktop_resize_flag: true,
                    drawing_flags: BitmapDrawingFlags::ALLOW_SKIP_ALPHA,
                }),
            ],
        },
    });

    let header = ShareControlHeader {
        share_control_pdu: demand_active,
        pdu_source: SERVER_CHANNEL_ID,
        share_id: SHARE_ID,
    };

    send_data_indication_frame(encode_vec(&header).unwrap())
}

fn share_data_frame(pdu: ShareDataPdu) -> Vec<u8> {
    let header = ShareControlHeader {
        share_control_pdu: ShareControlPdu::Data(ShareDataHeader {
            share_data_pdu: pdu,
            stream_priority: StreamPriority::Medium,
            compression_flags: CompressionFlags::empty(),
            compression_type: CompressionType::K8,
        }),
        pdu_source: SERVER_CHANNEL_ID,
        share_id: SHARE_ID,
    };

    send_data_indication_frame(encode_vec(&header).unwrap())
}

fn server_trace() -> Vec<Vec<u8>> {
    vec![
        connection_confirm_frame(),
        connect_response_frame(),
        attach_user_confirm_frame(),
        channel_join_confirm_frame(USER_CHANNEL_ID),
        channel_join_confirm_frame(GLOBAL_CHANNEL_ID),
        channel_join_confirm_frame(STATIC_CHANNEL_ID),
        license_valid_client_frame(),
        demand_active_frame(1024, 768),
        share_data_frame(ShareDataPdu::Synchronize(SynchronizePdu { target_user_id: 0 })),
        share_data_frame(ShareDataPdu::Control(ControlPdu {
            action: ControlAction::Cooperate,
            grant_id: 0,
            control_id: 0,
        })),
        share_data_frame(ShareDataPdu::Control(ControlPdu {
            action: ControlAction::GrantedControl,
            grant_id: USER_CHANNEL_ID,
            control_id: u32::from(SERVER_CHANNEL_ID),
        })),
        share_data_frame(ShareDataPdu::FontMap(FontPdu::default())),
    ]
}

#[test]
fn scripted_trace_reaches_connected_exactly_once() {
    let mut connector = ClientConnector::new(test_config());
    let mut trace = server_trace().into_iter();
    let mut output = WriteBuf::new();

    let mut connected_transitions = 0;
    let mut steps = 0;

    while !connector.state.is_terminal() {
        steps += 1;
        assert!(steps < 64, "connection sequence does not make progress");

        output.clear();

        if connector.should_perform_security_upgrade() {
            connector.mark_security_upgrade_as_done();
            continue;
        }

        if connector.next_pdu_hint().is_some() {
            let frame = trace.next().expect("server trace exhausted prematurely");
            connector.step(&frame, &mut output).expect("connector step");
        } else {
            connector.step_no_input(&mut output).expect("connector step");
        }

        if matches!(connector.state, ClientConnectorState::Connected { .. }) {
            connected_transitions += 1;
        }
    }

    assert_eq!(connected_transitions, 1);
    assert!(trace.next().is_none(), "server trace should be fully consumed");

    match &connector.state {
        ClientConnectorState::Connected { result } => {
            assert_eq!(result.io_channel_id, GLOBAL_CHANNEL_ID);
            assert_eq!(result.user_channel_id, USER_CHANNEL_ID);
            assert_eq!(result.desktop_size.width, 1024);
            assert_eq!(result.desktop_size.height, 768);
            assert_eq!(result.static_channels, vec![("cliprdr".to_owned(), STATIC_CHANNEL_ID)]);
            assert!(result.security.is_none());
        }
        other => panic!("unexpected terminal state: {other:?}"),
    }
}

#[test]
fn negotiation_failure_is_terminal_for_the_attempt() {
    let mut connector = ClientConnector::new(test_config());
    let mut output = WriteBuf::new();

    connector.step_no_input(&mut output).unwrap();

    let failure = encode_vec(&X224(ConnectionConfirm::Failure {
        code: ferrodp_pdu::nego::FailureCode::HYBRID_REQUIRED_BY_SERVER,
    }))
    .unwrap();

    output.clear();
    let err = connector.step(&failure, &mut output).unwrap_err();
    assert!(matches!(
        err.kind(),
        ferrodp_connector::ConnectorErrorKind::Negotiation(_)
    ));
}
