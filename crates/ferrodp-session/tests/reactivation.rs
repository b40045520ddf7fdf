//! Deactivation-reactivation: a Server Deactivate All returns the session to
//! capability exchange; a subsequent Demand Active, finalization and Font Map
//! bring it back to the active state, firing the resize callback exactly once
//! when the desktop size changed.

use std::borrow::Cow;

use ferrodp_connector::connection_activation::ConnectionActivationSequence;
use ferrodp_connector::{
    BitmapCacheConfig, Config, ConnectionResult, Credentials, DesktopSize,
};
use ferrodp_core::encode_vec;
use ferrodp_pdu::gcc::EncryptionMethod;
use ferrodp_pdu::mcs::{SendDataIndication, GLOBAL_CHANNEL_ID};
use ferrodp_pdu::rdp::capability_sets::{
    Bitmap, BitmapDrawingFlags, CapabilitySet, DemandActive, General, MajorPlatformType, ServerDemandActive,
    SERVER_CHANNEL_ID,
};
use ferrodp_pdu::rdp::client_info::{CompressionType, PerformanceFlags};
use ferrodp_pdu::rdp::finalization_messages::{ControlAction, ControlPdu, FontPdu, SynchronizePdu};
use ferrodp_pdu::rdp::headers::{
    CompressionFlags, ServerDeactivateAll, ShareControlHeader, ShareControlPdu, ShareDataHeader, ShareDataPdu,
    StreamPriority,
};
use ferrodp_pdu::x224::X224;
use ferrodp_session::{ActiveStage, ActiveStageOutput, UpdateHandler};

const USER_CHANNEL_ID: u16 = 1004;
const SHARE_ID: u32 = 0x0001_000A;

#[derive(Default)]
struct RecordingHandler {
    resizes: Vec<(u16, u16)>,
    surface_switches: usize,
}

impl UpdateHandler for RecordingHandler {
    fn desktop_resize(&mut self, width: u16, height: u16) {
        self.resizes.push((width, height));
    }

    fn switch_surface(&mut self) {
        self.surface_switches += 1;
    }
}

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
        platform: MajorPlatformType::Unix,
        autologon: false,
        remote_app: false,
        console_audio: false,
        channels: Vec::new(),
        redirected_session_id: 0,
        reconnect_cookie: None,
        deactivate_client_decoding: false,
        request_data: None,
    }
}

fn stage(handler: &mut dyn UpdateHandler) -> ActiveStage {
    let config = test_config();
    let result = ConnectionResult {
        io_channel_id: GLOBAL_CHANNEL_ID,
        user_channel_id: USER_CHANNEL_ID,
        static_channels: Vec::new(),
        desktop_size: config.desktop_size,
        share_id: SHARE_ID,
        security: None,
        connection_activation: ConnectionActivationSequence::new(
            config.clone(),
            GLOBAL_CHANNEL_ID,
            USER_CHANNEL_ID,
            Vec::new(),
        ),
    };

    ActiveStage::new(result, &config, handler)
}

fn io_frame(user_data: Vec<u8>) -> Vec<u8> {
    encode_vec(&X224(SendDataIndication {
        initiator_id: USER_CHANNEL_ID,
        channel_id: GLOBAL_CHANNEL_ID,
        user_data: Cow::Owned(user_data),
    }))
    .unwrap()
}

fn deactivate_all_frame() -> Vec<u8> {
    let header = ShareControlHeader {
        share_control_pdu: ShareControlPdu::ServerDeactivateAll(ServerDeactivateAll),
        pdu_source: SERVER_CHANNEL_ID,
        share_id: SHARE_ID,
    };
    io_frame(encode_vec(&header).unwrap())
}

fn demand_active_frame(width: u16, height: u16) -> Vec<u8> {
    let header = ShareControlHeader {
        share_control_pdu: ShareControlPdu::ServerDemandActive(ServerDemandActive {
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
        }),
        pdu_source: SERVER_CHANNEL_ID,
        share_id: SHARE_ID,
    };
    io_frame(encode_vec(&header).unwrap())
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
    io_frame(encode_vec(&header).unwrap())
}

#[test]
fn deactivation_reactivation_with_resize() {
    let mut handler = RecordingHandler::default();
    let mut stage = stage(&mut handler);

    // The initial activation already switched surfaces once.
    assert_eq!(handler.surface_switches, 1);

    // Active -> Capability
    let outputs = stage.process(&deactivate_all_frame(), &mut handler).unwrap();
    assert!(outputs.is_empty());
    assert!(stage.is_reactivating());

    // Capability: the new Demand Active carries a different desktop size.
    let outputs = stage.process(&demand_active_frame(1280, 1024), &mut handler).unwrap();
    // Confirm Active plus the client finalization batch go out.
    assert!(outputs
        .iter()
        .all(|output| matches!(output, ActiveStageOutput::ResponseFrame(_))));
    assert!(!outputs.is_empty());
    assert!(stage.is_reactivating());
    assert_eq!(handler.resizes.len(), 0);

    // Finalization: server synchronize, cooperate, granted control, font map.
    for frame in [
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
    ] {
        stage.process(&frame, &mut handler).unwrap();
        assert!(stage.is_reactivating());
    }

    stage
        .process(&share_data_frame(ShareDataPdu::FontMap(FontPdu::default())), &mut handler)
        .unwrap();

    assert!(!stage.is_reactivating());
    assert_eq!(handler.resizes, vec![(1280, 1024)]);
    assert_eq!(handler.surface_switches, 2);
    assert_eq!(stage.desktop_size().width, 1280);
}

#[test]
fn reactivation_without_size_change_fires_no_resize() {
    let mut handler = RecordingHandler::default();
    let mut stage = stage(&mut handler);

    stage.process(&deactivate_all_frame(), &mut handler).unwrap();
    stage.process(&demand_active_frame(1024, 768), &mut handler).unwrap();

    for frame in [
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
    ] {
        stage.process(&frame, &mut handler).unwrap();
    }

    assert!(!stage.is_reactivating());
    assert!(handler.resizes.is_empty());
    assert_eq!(handler.surface_switches, 2);
}

#[test]
fn input_events_encode_into_a_frame() {
    use ferrodp_pdu::input::{InputEvent, MouseEvent, PointerFlags};

    let mut handler = RecordingHandler::default();
    let mut stage = stage(&mut handler);
    let frame = stage
        .encode_input_events(vec![InputEvent::Mouse(MouseEvent {
            flags: PointerFlags::MOVE,
            x_position: 10,
            y_position: 20,
        })])
        .unwrap();

    // TPKT framed, X.224 data, MCS send data request.
    assert_eq!(frame[0], 0x03);
    assert!(frame.len() > 20);
}
