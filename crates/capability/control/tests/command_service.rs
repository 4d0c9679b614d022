use std::sync::Arc;

use apb_control::{CommandDispatcher, CommandService, CommandServiceConfig, ControlError};
use apb_protocol::{decode_envelope, CommandReply, FrameCodec, OutboundCommand, SystemAction};
use apb_storage::{CommandLogStore, InMemoryCommandLogStore};
use apb_telemetry::now_epoch_ms;
use async_trait::async_trait;
use domain::{CommandKind, CommandStatus};
use tokio::sync::mpsc;
use uuid::Uuid;

/// 把发布的帧转发给测试方的下发器。
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

struct FailingDispatcher;

#[async_trait]
impl CommandDispatcher for FailingDispatcher {
    async fn dispatch(&self, _hostname: &str, _frame: Vec<u8>) -> Result<(), ControlError> {
        Err(ControlError::Dispatch("broker unavailable".to_string()))
    }
}

fn service_with_recorder() -> (
    Arc<CommandService>,
    Arc<InMemoryCommandLogStore>,
    FrameCodec,
    mpsc::UnboundedReceiver<(String, Vec<u8>)>,
) {
    let codec = FrameCodec::new(b"test-key").expect("codec");
    let store = Arc::new(InMemoryCommandLogStore::new());
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let service = Arc::new(CommandService::new(
        codec.clone(),
        Arc::new(RecordingDispatcher { frames: frames_tx }),
        store.clone(),
        CommandServiceConfig::default(),
    ));
    (service, store, codec, frames_rx)
}

fn reply_for(request_id: Uuid, success: bool) -> CommandReply {
    CommandReply {
        request_id,
        timestamp: 1_700_000_000,
        success,
        error_code: if success { 0 } else { 12 },
        message: if success { "ok" } else { "relay fault" }.to_string(),
        payload: Vec::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn reply_resolves_pending_command() {
    let (service, store, codec, mut frames) = service_with_recorder();

    let sender = Arc::clone(&service);
    let handle = tokio::spawn(async move {
        sender
            .send_command(
                7,
                "panel-01",
                OutboundCommand::System {
                    action: SystemAction::Reboot,
                    delay_s: 5,
                },
            )
            .await
    });

    let (hostname, frame) = frames.recv().await.expect("published frame");
    assert_eq!(hostname, "panel-01");
    let unwrapped = codec.unwrap(&frame).expect("valid frame");
    let envelope = decode_envelope(&unwrapped.payload).expect("envelope");

    service.handle_reply(reply_for(envelope.request_id, true)).await;

    let reply = handle.await.expect("join").expect("send ok");
    assert!(reply.success);
    let logged = store.find(envelope.request_id).expect("command logged");
    assert_eq!(logged.status, CommandStatus::Success);
    assert_eq!(logged.device_id, 7);
    assert_eq!(store.response_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_reply_times_out() {
    let (service, store, codec, mut frames) = service_with_recorder();

    let sender = Arc::clone(&service);
    let handle = tokio::spawn(async move {
        sender
            .send_command(
                7,
                "panel-01",
                OutboundCommand::Diagnostic {
                    action: apb_protocol::DiagnosticAction::SelfTest,
                },
            )
            .await
    });

    let (_, frame) = frames.recv().await.expect("published frame");
    let unwrapped = codec.unwrap(&frame).expect("valid frame");
    let envelope = decode_envelope(&unwrapped.payload).expect("envelope");

    // 无响应，虚拟时钟推进到超时
    let err = handle.await.expect("join").expect_err("timeout surfaces as error");
    assert!(
        matches!(err, ControlError::Timeout { request_id } if request_id == envelope.request_id)
    );
    let logged = store.find(envelope.request_id).expect("command logged");
    assert_eq!(logged.status, CommandStatus::Timeout);

    // 迟到的响应按孤儿留档，不改写 timeout 状态之外的在途状态
    service.handle_reply(reply_for(envelope.request_id, true)).await;
    assert_eq!(store.response_count(), 1);
}

#[tokio::test]
async fn unknown_reply_is_archived_as_orphan() {
    let (service, store, _codec, _frames) = service_with_recorder();

    service.handle_reply(reply_for(Uuid::new_v4(), false)).await;

    assert_eq!(store.response_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dedup_window_tracks_recent_sends() {
    let (service, _store, _codec, mut frames) = service_with_recorder();

    let sender = Arc::clone(&service);
    let handle = tokio::spawn(async move {
        sender
            .send_command(3, "panel-02", OutboundCommand::identity_sync(3, "panel-02"))
            .await
    });
    let _ = frames.recv().await.expect("published frame");

    let now = now_epoch_ms();
    assert!(service.recently_sent("panel-02", CommandKind::Config, now));
    assert!(!service.recently_sent("panel-02", CommandKind::Output, now));
    // 窗口过期后不再去重
    assert!(!service.recently_sent("panel-02", CommandKind::Config, now + 11_000));

    let _ = handle.await.expect("join");
}

#[tokio::test]
async fn publish_failure_marks_command_failed() {
    let store = Arc::new(InMemoryCommandLogStore::new());
    let service = CommandService::new(
        FrameCodec::new(b"test-key").expect("codec"),
        Arc::new(FailingDispatcher),
        store.clone(),
        CommandServiceConfig::default(),
    );

    let result = service
        .send_command(
            9,
            "panel-03",
            OutboundCommand::Output {
                output: domain::OutputKind::Siren,
                activate: true,
                pattern: domain::OutputPattern::Pulse,
                duration_on_ms: 500,
                duration_off_ms: 500,
            },
        )
        .await;

    assert!(matches!(result, Err(ControlError::Dispatch(_))));
    // 发布失败不得占用发送去重窗口
    assert!(!service.recently_sent("panel-03", CommandKind::Output, now_epoch_ms()));
    let logged = store
        .list_commands(9, 10)
        .await
        .expect("list");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, CommandStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn prune_reclaims_stale_pending_entries() {
    let (service, _store, _codec, mut frames) = service_with_recorder();

    let sender = Arc::clone(&service);
    let handle = tokio::spawn(async move {
        sender
            .send_command(5, "panel-04", OutboundCommand::identity_sync(5, "panel-04"))
            .await
    });
    let _ = frames.recv().await.expect("published frame");

    let removed = service.prune_stale(now_epoch_ms() + 7_200_000, 3_600_000);
    assert_eq!(removed, 1);
    // 去重缓存同样过期
    assert!(!service.recently_sent("panel-04", CommandKind::Config, now_epoch_ms() + 7_200_000));

    let err = handle.await.expect("join").expect_err("reclaimed entry times out");
    assert!(matches!(err, ControlError::Timeout { .. }));
}
