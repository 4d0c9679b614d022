//! 下行命令控制链路。
//!
//! ## 职责
//! - 编码命令信封、封帧并发布到设备命令 topic
//! - 以 request_id 关联在途命令与设备响应（oneshot，至多交付一次）
//! - 等待响应超时后把命令流转为 `timeout`
//! - 维护 `(主机名, 命令类型)` 发送去重窗口，供身份同步抑制重复下发
//! - 周期清扫滞留的在途条目与过期的去重缓存

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apb_protocol::{encode_envelope, now_epoch_s, CommandReply, FrameCodec, OutboundCommand};
use apb_storage::{CommandLogRecord, CommandLogStore, CommandResponseRecord};
use apb_telemetry::now_epoch_ms;
use async_trait::async_trait;
use domain::{CommandKind, CommandStatus};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("protocol error: {0}")]
    Protocol(#[from] apb_protocol::ProtocolError),
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("storage error: {0}")]
    Storage(String),
    /// 等待设备响应超时（命令日志已流转为 timeout）
    #[error("command timed out: {request_id}")]
    Timeout { request_id: Uuid },
}

/// 已封帧命令的发布抽象。
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, hostname: &str, frame: Vec<u8>) -> Result<(), ControlError>;
}

/// 空下发器（用于占位）。
#[derive(Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl CommandDispatcher for NoopDispatcher {
    async fn dispatch(&self, _hostname: &str, _frame: Vec<u8>) -> Result<(), ControlError> {
        Ok(())
    }
}

/// MQTT Dispatcher 配置。
#[derive(Debug, Clone)]
pub struct MqttDispatcherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// topic 根（命令发布到 `{base}/pb/d/{hostname}/cmd`）
    pub topic_base: String,
    pub qos: u8,
}

/// MQTT Dispatcher 实现（发布已封帧命令）。
#[derive(Clone)]
pub struct MqttDispatcher {
    client: AsyncClient,
    topic_base: String,
    qos: QoS,
}

impl MqttDispatcher {
    pub fn connect(
        config: MqttDispatcherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), ControlError> {
        let client_id = format!("apb-control-dispatch-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "apb.control", "mqtt dispatch eventloop error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        Ok((
            Self {
                client,
                topic_base: config.topic_base.trim_end_matches('/').to_string(),
                qos: qos_from_u8(config.qos),
            },
            handle,
        ))
    }

    fn topic_for(&self, hostname: &str) -> String {
        format!("{}/pb/d/{}/cmd", self.topic_base, hostname)
    }
}

#[async_trait]
impl CommandDispatcher for MqttDispatcher {
    async fn dispatch(&self, hostname: &str, frame: Vec<u8>) -> Result<(), ControlError> {
        let topic = self.topic_for(hostname);
        info!(
            target: "apb.control",
            hostname = %hostname,
            topic = %topic,
            frame_size = frame.len(),
            "command_publish"
        );
        self.client
            .publish(topic, self.qos, false, frame)
            .await
            .map_err(|err| ControlError::Dispatch(err.to_string()))?;
        Ok(())
    }
}

/// 命令服务配置。
#[derive(Debug, Clone)]
pub struct CommandServiceConfig {
    /// 信封携带的权限级别
    pub auth_level: u8,
    /// 等待设备响应的超时（毫秒）
    pub response_timeout_ms: u64,
    /// `(主机名, 命令类型)` 发送去重窗口（毫秒）
    pub dedup_window_ms: u64,
}

impl Default for CommandServiceConfig {
    fn default() -> Self {
        Self {
            auth_level: 1,
            response_timeout_ms: 30_000,
            dedup_window_ms: 10_000,
        }
    }
}

/// 在途命令条目。
struct PendingEntry {
    reply: oneshot::Sender<CommandReply>,
    issued_at_ms: i64,
}

/// 命令服务（编码 + 封帧 + 下发 + 响应关联 + 超时）。
pub struct CommandService {
    codec: FrameCodec,
    dispatcher: Arc<dyn CommandDispatcher>,
    command_log: Arc<dyn CommandLogStore>,
    pending: Mutex<HashMap<Uuid, PendingEntry>>,
    /// `(主机名, 命令类型)` -> 最近下发时间（毫秒）
    recent: Mutex<HashMap<(String, CommandKind), i64>>,
    sequence: AtomicU32,
    config: CommandServiceConfig,
}

impl CommandService {
    pub fn new(
        codec: FrameCodec,
        dispatcher: Arc<dyn CommandDispatcher>,
        command_log: Arc<dyn CommandLogStore>,
        config: CommandServiceConfig,
    ) -> Self {
        Self {
            codec,
            dispatcher,
            command_log,
            pending: Mutex::new(HashMap::new()),
            recent: Mutex::new(HashMap::new()),
            sequence: AtomicU32::new(1),
            config,
        }
    }

    /// 下发命令并等待设备响应。
    ///
    /// 发布成功后命令日志记为 `sent`；响应到达流转为 `success`/`failed`，
    /// 超时流转为 `timeout` 并返回 [`ControlError::Timeout`]。
    /// 发布失败时流转为 `failed` 并返回错误，不占用发送去重窗口。
    pub async fn send_command(
        &self,
        device_id: i64,
        hostname: &str,
        command: OutboundCommand,
    ) -> Result<CommandReply, ControlError> {
        let request_id = Uuid::new_v4();
        let kind = command.kind();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let payload = encode_envelope(
            sequence,
            now_epoch_s(),
            request_id,
            self.config.auth_level,
            &command,
        );
        let frame = self.codec.wrap(&payload, sequence)?;

        let issued_at_ms = now_epoch_ms();
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending).insert(
            request_id,
            PendingEntry {
                reply: reply_tx,
                issued_at_ms,
            },
        );

        self.command_log
            .log_command(CommandLogRecord {
                request_id,
                device_id,
                hostname: hostname.to_string(),
                kind,
                status: CommandStatus::Sent,
                issued_at_ms,
            })
            .await
            .map_err(|err| ControlError::Storage(err.to_string()))?;
        apb_telemetry::record_command_issued();
        info!(
            target: "apb.control",
            hostname = %hostname,
            device_id,
            request_id = %request_id,
            kind = kind.as_str(),
            sequence,
            "command_issued"
        );

        if let Err(err) = self.dispatcher.dispatch(hostname, frame).await {
            lock(&self.pending).remove(&request_id);
            let _ = self
                .command_log
                .update_command_status(request_id, CommandStatus::Failed)
                .await;
            warn!(
                target: "apb.control",
                hostname = %hostname,
                request_id = %request_id,
                error = %err,
                "command_publish_failed"
            );
            return Err(err);
        }
        // 发布成功才进入发送去重窗口
        lock(&self.recent).insert((hostname.to_string(), kind), now_epoch_ms());

        let timeout = Duration::from_millis(self.config.response_timeout_ms);
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // 在途条目被清扫任务回收，按超时处理
            Ok(Err(_)) | Err(_) => {
                if lock(&self.pending).remove(&request_id).is_some() {
                    let _ = self
                        .command_log
                        .update_command_status(request_id, CommandStatus::Timeout)
                        .await;
                    apb_telemetry::record_command_timeout();
                    warn!(
                        target: "apb.control",
                        hostname = %hostname,
                        request_id = %request_id,
                        timeout_ms = self.config.response_timeout_ms,
                        "command_timed_out"
                    );
                }
                Err(ControlError::Timeout { request_id })
            }
        }
    }

    /// 处理设备命令响应。
    ///
    /// 命中在途命令时交付给等待方并流转日志状态；未命中（迟到 /
    /// 重复 / 未知）按孤儿响应留档，`device_id` 置 None。
    pub async fn handle_reply(&self, reply: CommandReply) {
        let received_at_ms = now_epoch_ms();
        let entry = lock(&self.pending).remove(&reply.request_id);
        let Some(entry) = entry else {
            apb_telemetry::record_orphan_response();
            warn!(
                target: "apb.control",
                request_id = %reply.request_id,
                success = reply.success,
                "orphan_response"
            );
            let _ = self
                .command_log
                .save_response(CommandResponseRecord {
                    request_id: reply.request_id,
                    device_id: None,
                    success: reply.success,
                    error_code: reply.error_code,
                    message: reply.message,
                    timestamp: reply.timestamp,
                    received_at_ms,
                })
                .await;
            return;
        };

        let status = if reply.success {
            CommandStatus::Success
        } else {
            CommandStatus::Failed
        };
        let updated = self
            .command_log
            .update_command_status(reply.request_id, status)
            .await
            .ok()
            .flatten();
        let _ = self
            .command_log
            .save_response(CommandResponseRecord {
                request_id: reply.request_id,
                device_id: updated.as_ref().map(|record| record.device_id),
                success: reply.success,
                error_code: reply.error_code,
                message: reply.message.clone(),
                timestamp: reply.timestamp,
                received_at_ms,
            })
            .await;
        apb_telemetry::record_command_response();
        info!(
            target: "apb.control",
            request_id = %reply.request_id,
            success = reply.success,
            error_code = reply.error_code,
            latency_ms = received_at_ms.saturating_sub(entry.issued_at_ms),
            "command_response"
        );
        // 等待方可能已超时返回，交付失败无需处理
        let _ = entry.reply.send(reply);
    }

    /// 去重窗口内是否刚向该主机名下发过同类命令。
    pub fn recently_sent(&self, hostname: &str, kind: CommandKind, now_ms: i64) -> bool {
        lock(&self.recent)
            .get(&(hostname.to_string(), kind))
            .is_some_and(|issued_at_ms| {
                now_ms.saturating_sub(*issued_at_ms) < self.config.dedup_window_ms as i64
            })
    }

    /// 回收滞留的在途条目与过期的去重缓存，返回回收的在途条目数。
    pub fn prune_stale(&self, now_ms: i64, stale_after_ms: u64) -> usize {
        let mut pending = lock(&self.pending);
        let before = pending.len();
        pending.retain(|_, entry| {
            now_ms.saturating_sub(entry.issued_at_ms) < stale_after_ms as i64
        });
        let removed = before - pending.len();
        drop(pending);

        lock(&self.recent).retain(|_, issued_at_ms| {
            now_ms.saturating_sub(*issued_at_ms) < self.config.dedup_window_ms as i64
        });
        removed
    }
}

/// 启动在途队列清扫任务。
pub fn spawn_queue_pruner(
    service: Arc<CommandService>,
    interval_ms: u64,
    stale_after_ms: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = service.prune_stale(now_epoch_ms(), stale_after_ms);
            if removed > 0 {
                info!(target: "apb.control", removed, "pending_commands_pruned");
            }
        }
    })
}

// 锁被毒化时继续使用内部数据
fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
