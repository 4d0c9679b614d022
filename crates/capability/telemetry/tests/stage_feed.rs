use apb_telemetry::{now_epoch_ms, Stage, StageEvent, StageFeed};

#[tokio::test]
async fn subscriber_receives_emitted_stages() {
    let feed = StageFeed::new(16);
    let mut receiver = feed.subscribe();

    feed.emit(StageEvent {
        hostname: "panel-01".to_string(),
        kind: "hb",
        stage: Stage::Authenticated,
        detail: None,
        ts_ms: now_epoch_ms(),
    });
    feed.emit(StageEvent {
        hostname: "panel-01".to_string(),
        kind: "hb",
        stage: Stage::Completed,
        detail: Some("delta applied".to_string()),
        ts_ms: now_epoch_ms(),
    });

    let first = receiver.recv().await.expect("first event");
    assert_eq!(first.stage, Stage::Authenticated);
    let second = receiver.recv().await.expect("second event");
    assert_eq!(second.stage, Stage::Completed);
    assert_eq!(second.detail.as_deref(), Some("delta applied"));
}

#[tokio::test]
async fn emit_without_subscribers_is_noop() {
    let feed = StageFeed::new(4);
    // 不应 panic，也不应阻塞
    feed.emit(StageEvent {
        hostname: "panel-02".to_string(),
        kind: "alarm",
        stage: Stage::Received,
        detail: None,
        ts_ms: now_epoch_ms(),
    });
}

#[test]
fn metrics_counters_accumulate() {
    apb_telemetry::record_frame_received();
    apb_telemetry::record_frame_received();
    apb_telemetry::record_frame_auth_failure();
    let snapshot = apb_telemetry::metrics().snapshot();
    assert!(snapshot.frames_received >= 2);
    assert!(snapshot.frame_auth_failures >= 1);
}
