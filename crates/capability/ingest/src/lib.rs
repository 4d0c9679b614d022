//! 设备上行消息接入。
//!
//! 订阅 `{base}/pb/d/+/+`，从 topic 解析主机名与消息类型，
//! 原始帧字节不在这一层拆封，交给处理管线统一鉴别与解码。

use apb_telemetry::now_epoch_ms;
use async_trait::async_trait;
use domain::MessageKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// 接入错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("handler error: {0}")]
    Handler(String),
    #[error("source error: {0}")]
    Source(String),
}

/// 未拆封的上行消息。
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// 主机名（topic 第 4 段）
    pub hostname: String,
    /// 消息类型（topic 末段）
    pub kind: MessageKind,
    /// 完整帧字节（含帧头与标签）
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

/// 上行消息处理器。
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError>;
}

/// 接入源抽象。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(&self, handler: Arc<dyn InboundHandler>) -> Result<(), IngestError>;
}

/// 占位源（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopSource;

#[async_trait]
impl Source for NoopSource {
    async fn run(&self, _handler: Arc<dyn InboundHandler>) -> Result<(), IngestError> {
        Ok(())
    }
}

/// MQTT 接入源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// topic 根（订阅 `{base}/pb/d/+/+`）
    pub topic_base: String,
}

/// MQTT 接入源。
#[derive(Debug, Clone)]
pub struct MqttSource {
    config: MqttSourceConfig,
}

impl MqttSource {
    pub fn new(config: MqttSourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }
}

#[async_trait]
impl Source for MqttSource {
    async fn run(&self, handler: Arc<dyn InboundHandler>) -> Result<(), IngestError> {
        let client_id = format!("apb-ingest-{}", now_epoch_ms());
        let mut options =
            rumqttc::MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = rumqttc::AsyncClient::new(options, 10);
        let base = self.config.topic_base.trim_end_matches('/');
        let topic = format!("{}/pb/d/+/+", base);
        client
            .subscribe(topic, rumqttc::QoS::AtLeastOnce)
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;

        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                    let Some((hostname, kind)) =
                        extract_scope(&self.config.topic_base, &publish.topic)
                    else {
                        warn!(target: "apb.ingest", "mqtt topic skipped: {}", publish.topic);
                        continue;
                    };
                    let message = RawMessage {
                        hostname,
                        kind,
                        payload: publish.payload.to_vec(),
                        received_at_ms: now_epoch_ms(),
                    };
                    if let Err(err) = handler.handle(message).await {
                        warn!(target: "apb.ingest", "inbound handler failed: {}", err);
                    }
                }
                Ok(_) => {}
                Err(err) => return Err(IngestError::Source(err.to_string())),
            }
        }
    }
}

/// 从上行 topic 解析主机名与消息类型。
///
/// 期望形如 `{base}/pb/d/{hostname}/{type}`；下行 `cmd` 段与
/// 未知类型一律返回 None（由调用方计入丢弃）。
fn extract_scope(base: &str, topic: &str) -> Option<(String, MessageKind)> {
    let base = base.trim_matches('/');
    let topic = topic.trim_matches('/');
    let rest = if base.is_empty() {
        topic
    } else {
        topic.strip_prefix(base)?
    };
    let rest = rest.trim_start_matches('/');
    let mut parts = rest.split('/');
    if parts.next()? != "pb" || parts.next()? != "d" {
        return None;
    }
    let hostname = parts.next()?;
    let segment = parts.next()?;
    if parts.next().is_some() || hostname.is_empty() {
        return None;
    }
    let kind = MessageKind::parse(segment)?;
    Some((hostname.to_string(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parses_uplink_topics() {
        let scope = extract_scope("apb", "apb/pb/d/panel-01/hb").expect("scope");
        assert_eq!(scope.0, "panel-01");
        assert_eq!(scope.1, MessageKind::Heartbeat);

        // resp 与 response 等价
        let scope = extract_scope("apb", "apb/pb/d/panel-01/response").expect("scope");
        assert_eq!(scope.1, MessageKind::Response);
    }

    #[test]
    fn scope_rejects_foreign_topics() {
        // 下行命令段不是上行消息
        assert!(extract_scope("apb", "apb/pb/d/panel-01/cmd").is_none());
        assert!(extract_scope("apb", "apb/pb/d/panel-01/hb/extra").is_none());
        assert!(extract_scope("apb", "apb/pb/d//hb").is_none());
        assert!(extract_scope("apb", "other/pb/d/panel-01/hb").is_none());
        assert!(extract_scope("apb", "apb/json/d/panel-01/hb").is_none());
    }

    #[test]
    fn scope_tolerates_slash_noise_in_base() {
        let scope = extract_scope("apb/", "/apb/pb/d/panel-01/lw").expect("scope");
        assert_eq!(scope.0, "panel-01");
        assert_eq!(scope.1, MessageKind::LastWill);
    }
}
