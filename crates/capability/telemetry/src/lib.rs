//! 追踪初始化、处理指标与处理阶段事件广播。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frame_auth_failures: u64,
    pub decode_failures: u64,
    pub messages_routed: u64,
    pub messages_dropped: u64,
    pub commands_issued: u64,
    pub command_responses: u64,
    pub command_timeouts: u64,
    pub orphan_responses: u64,
    pub logins_processed: u64,
    pub logins_deduped: u64,
    pub sync_commands_sent: u64,
    pub sync_commands_suppressed: u64,
    pub alarm_events_recorded: u64,
    pub telemetry_samples: u64,
    pub devices_marked_offline: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    frames_received: AtomicU64,
    frame_auth_failures: AtomicU64,
    decode_failures: AtomicU64,
    messages_routed: AtomicU64,
    messages_dropped: AtomicU64,
    commands_issued: AtomicU64,
    command_responses: AtomicU64,
    command_timeouts: AtomicU64,
    orphan_responses: AtomicU64,
    logins_processed: AtomicU64,
    logins_deduped: AtomicU64,
    sync_commands_sent: AtomicU64,
    sync_commands_suppressed: AtomicU64,
    alarm_events_recorded: AtomicU64,
    telemetry_samples: AtomicU64,
    devices_marked_offline: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frame_auth_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            messages_routed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            command_responses: AtomicU64::new(0),
            command_timeouts: AtomicU64::new(0),
            orphan_responses: AtomicU64::new(0),
            logins_processed: AtomicU64::new(0),
            logins_deduped: AtomicU64::new(0),
            sync_commands_sent: AtomicU64::new(0),
            sync_commands_suppressed: AtomicU64::new(0),
            alarm_events_recorded: AtomicU64::new(0),
            telemetry_samples: AtomicU64::new(0),
            devices_marked_offline: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frame_auth_failures: self.frame_auth_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            command_responses: self.command_responses.load(Ordering::Relaxed),
            command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
            orphan_responses: self.orphan_responses.load(Ordering::Relaxed),
            logins_processed: self.logins_processed.load(Ordering::Relaxed),
            logins_deduped: self.logins_deduped.load(Ordering::Relaxed),
            sync_commands_sent: self.sync_commands_sent.load(Ordering::Relaxed),
            sync_commands_suppressed: self.sync_commands_suppressed.load(Ordering::Relaxed),
            alarm_events_recorded: self.alarm_events_recorded.load(Ordering::Relaxed),
            telemetry_samples: self.telemetry_samples.load(Ordering::Relaxed),
            devices_marked_offline: self.devices_marked_offline.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录收到的帧数。
pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录帧鉴别失败次数。
pub fn record_frame_auth_failure() {
    metrics().frame_auth_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录消息解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功路由的消息数。
pub fn record_message_routed() {
    metrics().messages_routed.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的消息数（未知类型 / 未解析设备等）。
pub fn record_message_dropped() {
    metrics().messages_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令下发次数。
pub fn record_command_issued() {
    metrics().commands_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录关联成功的命令响应次数。
pub fn record_command_response() {
    metrics().command_responses.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令超时次数。
pub fn record_command_timeout() {
    metrics().command_timeouts.fetch_add(1, Ordering::Relaxed);
}

/// 记录孤儿响应次数。
pub fn record_orphan_response() {
    metrics().orphan_responses.fetch_add(1, Ordering::Relaxed);
}

/// 记录处理完成的登录观测次数。
pub fn record_login_processed() {
    metrics().logins_processed.fetch_add(1, Ordering::Relaxed);
}

/// 记录窗口内去重的登录次数。
pub fn record_login_deduped() {
    metrics().logins_deduped.fetch_add(1, Ordering::Relaxed);
}

/// 记录已下发的身份同步命令次数。
pub fn record_sync_command_sent() {
    metrics().sync_commands_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录被去重窗口抑制的身份同步命令次数。
pub fn record_sync_command_suppressed() {
    metrics()
        .sync_commands_suppressed
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录留档的报警事件数。
pub fn record_alarm_event() {
    metrics().alarm_events_recorded.fetch_add(1, Ordering::Relaxed);
}

/// 记录留档的遥测样本数。
pub fn record_telemetry_sample() {
    metrics().telemetry_samples.fetch_add(1, Ordering::Relaxed);
}

/// 记录被判定离线的设备数。
pub fn record_device_offline() {
    metrics().devices_marked_offline.fetch_add(1, Ordering::Relaxed);
}

/// 消息处理阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    Decoded,
    DeviceResolved,
    DeviceNotFound,
    StateUpdated,
    Persisted,
    Completed,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Authenticated => "authenticated",
            Stage::Decoded => "decoded",
            Stage::DeviceResolved => "device_resolved",
            Stage::DeviceNotFound => "device_not_found",
            Stage::StateUpdated => "state_updated",
            Stage::Persisted => "persisted",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }
}

/// 处理阶段事件（供外部观测工具消费，单向广播）。
#[derive(Debug, Clone)]
pub struct StageEvent {
    pub hostname: String,
    /// 消息类型（topic 末段）
    pub kind: &'static str,
    pub stage: Stage,
    pub detail: Option<String>,
    pub ts_ms: i64,
}

/// 处理阶段事件广播源。
///
/// 没有订阅方时发送是无害的空操作；慢订阅方只会丢自己的事件，
/// 不会反压处理管线。
#[derive(Clone)]
pub struct StageFeed {
    sender: broadcast::Sender<StageEvent>,
}

impl StageFeed {
    /// 创建指定缓冲容量的广播源。
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅处理阶段事件。
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }

    /// 广播一条阶段事件。
    pub fn emit(&self, event: StageEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for StageFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
