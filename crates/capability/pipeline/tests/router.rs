use std::sync::Arc;

use apb_control::{CommandDispatcher, CommandService, CommandServiceConfig, ControlError};
use apb_ingest::RawMessage;
use apb_pipeline::{IdentityResolver, Router};
use apb_protocol::{encode_response, wire, CommandReply, FrameCodec, OutboundCommand};
use apb_realtime::LiveStore;
use apb_storage::{
    DeviceStore, InMemoryAlarmEventStore, InMemoryCommandLogStore, InMemoryDeviceStore,
    InMemoryTelemetryStore, NewDevice,
};
use apb_telemetry::StageFeed;
use async_trait::async_trait;
use domain::{CounterField, MessageKind};
use prost::Message;
use tokio::sync::mpsc;

struct RecordingDispatcher {
    frames: mpsc::UnboundedSender<(String, Vec<u8>)>,
}

#[async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn dispatch(&self, hostname: &str, frame: Vec<u8>) -> Result<(), ControlError> {
        let _ = self.frames.send((hostname.to_string(), frame));
        Ok(())
    }
}

struct Fixture {
    router: Router,
    codec: FrameCodec,
    devices: Arc<InMemoryDeviceStore>,
    alarms: Arc<InMemoryAlarmEventStore>,
    telemetry: Arc<InMemoryTelemetryStore>,
    control: Arc<CommandService>,
    live: Arc<LiveStore>,
    frames: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
}

fn fixture() -> Fixture {
    let codec = FrameCodec::new(b"test-key").expect("codec");
    let devices = Arc::new(InMemoryDeviceStore::new());
    let alarms = Arc::new(InMemoryAlarmEventStore::new());
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let control = Arc::new(CommandService::new(
        codec.clone(),
        Arc::new(RecordingDispatcher { frames: frames_tx }),
        Arc::new(InMemoryCommandLogStore::new()),
        CommandServiceConfig::default(),
    ));
    let live = Arc::new(LiveStore::new(100));
    let resolver = IdentityResolver::new(devices.clone(), control.clone(), live.clone(), 5_000);
    let router = Router::new(
        codec.clone(),
        devices.clone(),
        alarms.clone(),
        telemetry.clone(),
        control.clone(),
        live.clone(),
        resolver,
        StageFeed::default(),
    );
    Fixture {
        router,
        codec,
        devices,
        alarms,
        telemetry,
        control,
        live,
        frames: frames_rx,
    }
}

fn message(codec: &FrameCodec, kind: MessageKind, payload: Vec<u8>) -> RawMessage {
    RawMessage {
        hostname: "panel-01".to_string(),
        kind,
        payload: codec.wrap(&payload, 1).expect("frame"),
        received_at_ms: 1_000,
    }
}

fn login_payload(reported_id: i64) -> Vec<u8> {
    wire::StatusReport {
        mac: vec![0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22],
        hostname: "panel-01".to_string(),
        device_id: reported_id,
        firmware: "1.4.0".to_string(),
        boot_count: 3,
        ip: "10.0.0.7".to_string(),
        ssid: "site-wifi".to_string(),
        rssi: -58,
        temperature: 22.5,
        humidity: 41.0,
        panic1: false,
        panic2: false,
        tamper: false,
        siren: false,
        turret: false,
        error_flags: 0,
        uptime_s: 42,
    }
    .encode_to_vec()
}

fn heartbeat_payload(device_id: i64) -> Vec<u8> {
    wire::Heartbeat {
        timestamp: 1_700_000_100,
        uptime_s: 120,
        free_heap: 180_000,
        rssi: -61,
        temperature: 23.0,
        humidity: 42.0,
        panic1: false,
        panic2: false,
        tamper: false,
        siren: false,
        turret: false,
        error_flags: 0,
        device_id,
    }
    .encode_to_vec()
}

fn panic1_alarm_payload() -> Vec<u8> {
    wire::AlarmEventMsg {
        sequence: 9,
        timestamp: 1_700_000_200,
        alarm_type: 0,
        state: 1,
        priority: 3,
        physical_state: true,
        output_type: 0,
        pattern: 0,
        duration_on_ms: 0,
        duration_off_ms: 0,
        device_id: 1,
    }
    .encode_to_vec()
}

#[tokio::test(start_paused = true)]
async fn unsynchronized_heartbeat_is_dropped() {
    let fx = fixture();

    fx.router
        .process(message(&fx.codec, MessageKind::Heartbeat, heartbeat_payload(0)))
        .await;

    assert_eq!(fx.devices.status_update_count(), 0);
    assert!(fx.telemetry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn known_device_heartbeat_survives_cache_loss() {
    let fx = fixture();

    // 设备已落库但实时快照为空（等价于后端刚重启）
    let record = fx
        .devices
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:22".to_string(),
            hostname: "panel-01".to_string(),
        })
        .await
        .expect("create device");
    assert!(fx.live.snapshot("panel-01").is_none());

    fx.router
        .process(message(
            &fx.codec,
            MessageKind::Heartbeat,
            heartbeat_payload(record.device_id),
        ))
        .await;

    assert_eq!(fx.devices.status_update_count(), 1);
    assert_eq!(fx.telemetry.len(), 1);
    let snapshot = fx.live.snapshot("panel-01").expect("snapshot");
    assert_eq!(snapshot.uptime_s, Some(120));
}

#[tokio::test(start_paused = true)]
async fn login_then_heartbeat_updates_state_and_telemetry() {
    let fx = fixture();

    fx.router
        .process(message(&fx.codec, MessageKind::Login, login_payload(0)))
        .await;
    assert_eq!(fx.devices.len(), 1);

    fx.router
        .process(message(&fx.codec, MessageKind::Heartbeat, heartbeat_payload(1)))
        .await;

    assert_eq!(fx.telemetry.len(), 1);
    let sample = fx.telemetry.last().expect("sample");
    assert_eq!(sample.device_id, 1);
    assert_eq!(sample.uptime_s, 120);

    let snapshot = fx.live.snapshot("panel-01").expect("snapshot");
    assert_eq!(snapshot.uptime_s, Some(120));
    assert_eq!(snapshot.network.rssi, Some(-61));
    // login 写入的字段未被心跳覆盖
    assert_eq!(snapshot.firmware.as_deref(), Some("1.4.0"));
}

#[tokio::test(start_paused = true)]
async fn panic_alarm_flips_flag_and_counts() {
    let fx = fixture();

    fx.router
        .process(message(&fx.codec, MessageKind::Login, login_payload(0)))
        .await;
    fx.router
        .process(message(&fx.codec, MessageKind::Alarm, panic1_alarm_payload()))
        .await;

    assert_eq!(fx.devices.counter(1, CounterField::Panic1), 1);
    assert_eq!(fx.alarms.count_for(1), 1);
    let snapshot = fx.live.snapshot("panel-01").expect("snapshot");
    assert!(snapshot.inputs.panic1);
    let recent = fx.live.recent_alarms("panel-01");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].sequence, 9);
}

#[tokio::test(start_paused = true)]
async fn tampered_frame_is_rejected() {
    let fx = fixture();

    fx.router
        .process(message(&fx.codec, MessageKind::Login, login_payload(0)))
        .await;

    let mut raw = message(&fx.codec, MessageKind::Heartbeat, heartbeat_payload(1));
    let last = raw.payload.len() - 1;
    raw.payload[last] ^= 0x01;
    fx.router.process(raw).await;

    assert!(fx.telemetry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn response_resolves_inflight_command() {
    let mut fx = fixture();

    fx.router
        .process(message(&fx.codec, MessageKind::Login, login_payload(0)))
        .await;
    // 清掉 login 触发的身份同步命令帧
    let _ = fx.frames.recv().await.expect("sync frame");

    let control = fx.control.clone();
    let sender = tokio::spawn(async move {
        control
            .send_command(
                1,
                "panel-01",
                OutboundCommand::Diagnostic {
                    action: apb_protocol::DiagnosticAction::ReportStatus,
                },
            )
            .await
    });
    let (_, frame) = fx.frames.recv().await.expect("command frame");
    let unwrapped = fx.codec.unwrap(&frame).expect("valid frame");
    let envelope = apb_protocol::decode_envelope(&unwrapped.payload).expect("envelope");

    let reply = CommandReply {
        request_id: envelope.request_id,
        timestamp: 1_700_000_300,
        success: true,
        error_code: 0,
        message: "ok".to_string(),
        payload: Vec::new(),
    };
    fx.router
        .process(message(&fx.codec, MessageKind::Response, encode_response(&reply)))
        .await;

    let reply = sender.await.expect("join").expect("send ok");
    assert!(reply.success);
}
