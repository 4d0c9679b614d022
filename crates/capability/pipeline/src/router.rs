//! 消息路由器。
//!
//! 对每条上行消息：拆帧鉴别 → 按类型解码 → 分发处理器。
//! 每条消息在独立任务中处理，慢的持久化调用只拖慢自己，
//! 不阻塞后续消息的分发。

use std::sync::Arc;

use apb_control::CommandService;
use apb_ingest::{InboundHandler, IngestError, RawMessage};
use apb_protocol::{
    decode_alarm, decode_heartbeat, decode_last_will, decode_response, decode_status, FrameCodec,
    ProtocolError,
};
use apb_realtime::LiveStore;
use apb_storage::{AlarmEventStore, DeviceStore, TelemetryStore};
use apb_telemetry::{Stage, StageEvent, StageFeed};
use async_trait::async_trait;
use domain::MessageKind;
use tracing::warn;

use crate::handlers::Handlers;
use crate::resolver::IdentityResolver;

/// 消息路由器。
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    codec: FrameCodec,
    handlers: Handlers,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        codec: FrameCodec,
        devices: Arc<dyn DeviceStore>,
        alarms: Arc<dyn AlarmEventStore>,
        telemetry: Arc<dyn TelemetryStore>,
        control: Arc<CommandService>,
        live: Arc<LiveStore>,
        resolver: IdentityResolver,
        stages: StageFeed,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                codec,
                handlers: Handlers {
                    devices,
                    alarms,
                    telemetry,
                    control,
                    live,
                    resolver,
                    stages,
                },
            }),
        }
    }

    /// 处理一条上行消息（拆帧 → 解码 → 处理器）。
    pub async fn process(&self, message: RawMessage) {
        self.inner.process(message).await;
    }
}

#[async_trait]
impl InboundHandler for Router {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError> {
        let inner = Arc::clone(&self.inner);
        // 独立任务处理，分发立即返回
        tokio::spawn(async move {
            inner.process(message).await;
        });
        Ok(())
    }
}

impl RouterInner {
    async fn process(&self, message: RawMessage) {
        let hostname = message.hostname.as_str();
        let kind = message.kind;
        apb_telemetry::record_frame_received();
        self.stage(hostname, kind, Stage::Received, None);

        let frame = match self.codec.unwrap(&message.payload) {
            Ok(frame) => frame,
            Err(err) => {
                // 鉴别失败的帧静默丢弃，只留一条日志
                apb_telemetry::record_frame_auth_failure();
                warn!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    kind = kind.as_str(),
                    error = %err,
                    "frame_rejected"
                );
                self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
                return;
            }
        };
        self.stage(hostname, kind, Stage::Authenticated, None);

        if let Err(err) = self.dispatch(&message, &frame.payload).await {
            apb_telemetry::record_decode_failure();
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                kind = kind.as_str(),
                error = %err,
                "message_decode_failed"
            );
            self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
        }
    }

    /// 解码并交给对应处理器；解码失败只影响这一条消息。
    async fn dispatch(&self, message: &RawMessage, payload: &[u8]) -> Result<(), ProtocolError> {
        let hostname = message.hostname.as_str();
        let kind = message.kind;
        match kind {
            MessageKind::Heartbeat => {
                let observation = decode_heartbeat(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers
                    .heartbeat(hostname, observation, message.received_at_ms)
                    .await;
            }
            MessageKind::Login => {
                let observation = decode_status(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers.login(hostname, payload, observation).await;
            }
            MessageKind::Status => {
                let observation = decode_status(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers
                    .status(hostname, observation, message.received_at_ms)
                    .await;
            }
            MessageKind::Alarm => {
                let observation = decode_alarm(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers
                    .alarm(hostname, observation, message.received_at_ms)
                    .await;
            }
            MessageKind::Response => {
                let reply = decode_response(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers.response(hostname, reply).await;
            }
            MessageKind::LastWill => {
                let observation = decode_last_will(payload)?;
                self.stage(hostname, kind, Stage::Decoded, None);
                self.handlers
                    .last_will(hostname, observation, message.received_at_ms)
                    .await;
            }
        }
        Ok(())
    }

    fn stage(&self, hostname: &str, kind: MessageKind, stage: Stage, detail: Option<String>) {
        self.handlers.stages.emit(StageEvent {
            hostname: hostname.to_string(),
            kind: kind.as_str(),
            stage,
            detail,
            ts_ms: apb_telemetry::now_epoch_ms(),
        });
    }
}
