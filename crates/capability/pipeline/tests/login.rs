use std::sync::Arc;

use apb_control::{CommandDispatcher, CommandService, CommandServiceConfig, ControlError};
use apb_pipeline::IdentityResolver;
use apb_protocol::{decode_envelope, FrameCodec, OutboundCommand, StatusObservation};
use apb_realtime::LiveStore;
use apb_storage::{InMemoryCommandLogStore, InMemoryDeviceStore};
use async_trait::async_trait;
use domain::{InputFlags, OutputFlags};
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
    devices: Arc<InMemoryDeviceStore>,
    resolver: IdentityResolver,
    codec: FrameCodec,
    frames: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
}

fn fixture_with_window(dedup_window_ms: u64) -> Fixture {
    let codec = FrameCodec::new(b"test-key").expect("codec");
    let devices = Arc::new(InMemoryDeviceStore::new());
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let control = Arc::new(CommandService::new(
        codec.clone(),
        Arc::new(RecordingDispatcher { frames: frames_tx }),
        Arc::new(InMemoryCommandLogStore::new()),
        CommandServiceConfig::default(),
    ));
    let live = Arc::new(LiveStore::new(100));
    let resolver = IdentityResolver::new(devices.clone(), control, live, dedup_window_ms);
    Fixture {
        devices,
        resolver,
        codec,
        frames: frames_rx,
    }
}

fn fixture() -> Fixture {
    fixture_with_window(5_000)
}

fn login_observation(reported_id: i64) -> StatusObservation {
    StatusObservation {
        mac: [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22],
        hostname: "panel-01".to_string(),
        reported_id,
        firmware: "1.4.0".to_string(),
        boot_count: 3,
        ip: "10.0.0.7".to_string(),
        ssid: "site-wifi".to_string(),
        rssi: -58,
        temperature_c: 22.5,
        humidity_pct: 41.0,
        inputs: InputFlags::default(),
        outputs: OutputFlags::default(),
        error_flags: 0,
        uptime_s: 42,
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_mac_creates_device_and_syncs() {
    let mut fx = fixture();

    let outcome = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &login_observation(0))
        .await
        .expect("resolve");

    assert!(outcome.created);
    assert!(outcome.needs_sync);
    assert_eq!(outcome.device_id, 1);
    assert_eq!(fx.devices.len(), 1);
    assert_eq!(fx.devices.status_update_count(), 1);

    // 恰好下发一条身份同步命令，载荷携带后端 ID
    let (hostname, frame) = fx.frames.recv().await.expect("sync command");
    assert_eq!(hostname, "panel-01");
    let unwrapped = fx.codec.unwrap(&frame).expect("valid frame");
    let envelope = decode_envelope(&unwrapped.payload).expect("envelope");
    assert_eq!(envelope.command, OutboundCommand::identity_sync(1, "panel-01"));
}

#[tokio::test(start_paused = true)]
async fn identical_payload_within_window_reuses_result() {
    let mut fx = fixture();
    let observation = login_observation(0);

    let first = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &observation)
        .await
        .expect("first");
    let second = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &observation)
        .await
        .expect("second");

    // 第二次直接复用结果，不重复任何副作用
    assert_eq!(first, second);
    assert_eq!(fx.devices.len(), 1);
    assert_eq!(fx.devices.status_update_count(), 1);
    let _ = fx.frames.recv().await.expect("single sync command");
    assert!(fx.frames.try_recv().is_err());
}

// 去重缓存按墙钟计龄，用真实短窗口验证过期
#[tokio::test]
async fn identical_payload_after_window_reevaluates() {
    let mut fx = fixture_with_window(200);
    let observation = login_observation(0);

    let first = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &observation)
        .await
        .expect("first");
    assert!(first.needs_sync);
    let _ = fx.frames.recv().await.expect("sync command");

    let second = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &observation)
        .await
        .expect("second");
    assert_eq!(first, second);
    assert_eq!(fx.devices.status_update_count(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // 窗口已过，第三次同载荷重新走完整流程
    let third = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &observation)
        .await
        .expect("third");
    assert!(!third.created);
    assert_eq!(fx.devices.status_update_count(), 2);
    // 命令去重窗口（10 秒）仍抑制重复的身份同步
    assert!(!third.needs_sync);
    assert!(fx.frames.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn changed_payload_reevaluates_but_sync_is_suppressed() {
    let mut fx = fixture();

    let first = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &login_observation(0))
        .await
        .expect("first");
    assert!(first.needs_sync);
    let _ = fx.frames.recv().await.expect("sync command");

    // 载荷不同（设备仍未同步），重新评估；但命令去重窗口内抑制重发
    let mut observation = login_observation(0);
    observation.uptime_s = 43;
    let second = fx
        .resolver
        .resolve("panel-01", b"login-payload-2", &observation)
        .await
        .expect("second");

    assert!(!second.created);
    assert!(!second.needs_sync);
    assert_eq!(fx.devices.status_update_count(), 2);
    assert!(fx.frames.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn reported_id_match_needs_no_sync() {
    let mut fx = fixture();

    let first = fx
        .resolver
        .resolve("panel-01", b"login-payload-1", &login_observation(0))
        .await
        .expect("first");
    let _ = fx.frames.recv().await.expect("sync command");

    // 设备回报了已同步的 ID
    let synced = fx
        .resolver
        .resolve(
            "panel-01",
            b"login-payload-3",
            &login_observation(first.device_id),
        )
        .await
        .expect("synced login");

    assert!(!synced.created);
    assert!(!synced.needs_sync);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_logins_serialize() {
    let fx = fixture();
    let resolver = Arc::new(fx.resolver);
    let mut frames = fx.frames;

    let left = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move {
            resolver
                .resolve("panel-01", b"login-payload-1", &login_observation(0))
                .await
        })
    };
    let right = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move {
            resolver
                .resolve("panel-01", b"login-payload-1", &login_observation(0))
                .await
        })
    };

    let left = left.await.expect("join").expect("resolve");
    let right = right.await.expect("join").expect("resolve");

    // 后到者等待并复用先到者的结果：只建一条档案、只发一条命令
    assert_eq!(left.device_id, right.device_id);
    assert_eq!(fx.devices.len(), 1);
    let _ = frames.recv().await.expect("single sync command");
    assert!(frames.try_recv().is_err());
}
