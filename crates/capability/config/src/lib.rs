//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// topic 根（完整上行 topic 为 `{base}/pb/d/{hostname}/{type}`）
    pub topic_base: String,
    /// 帧 HMAC 共享密钥（APB_FRAME_KEY，十六进制）
    pub frame_key: Vec<u8>,
    /// 命令下发 QoS
    pub command_qos: u8,
    /// 命令信封权限级别
    pub command_auth_level: u8,
    /// 命令响应等待超时（毫秒）
    pub command_timeout_ms: u64,
    /// 设备静默判离线时长（毫秒）
    pub offline_timeout_ms: u64,
    /// 离线扫描周期（毫秒）
    pub offline_sweep_interval_ms: u64,
    /// 登录去重窗口（毫秒）
    pub login_dedup_window_ms: u64,
    /// 已发命令去重窗口（毫秒）
    pub command_dedup_window_ms: u64,
    /// 每设备报警环形缓冲容量
    pub alarm_buffer_capacity: usize,
    /// 命令队列清扫周期（毫秒）
    pub queue_prune_interval_ms: u64,
    /// 命令队列条目视为陈旧的时长（毫秒）
    pub queue_stale_after_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let frame_key_hex = env::var("APB_FRAME_KEY")
            .map_err(|_| ConfigError::Missing("APB_FRAME_KEY".to_string()))?;
        let frame_key = hex::decode(&frame_key_hex)
            .map_err(|_| ConfigError::Invalid("APB_FRAME_KEY".to_string(), frame_key_hex.clone()))?;
        if frame_key.is_empty() {
            return Err(ConfigError::Invalid(
                "APB_FRAME_KEY".to_string(),
                frame_key_hex,
            ));
        }

        let mqtt_host = env::var("APB_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("APB_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("APB_MQTT_USERNAME");
        let mqtt_password = read_optional("APB_MQTT_PASSWORD");
        let topic_base = env::var("APB_TOPIC_BASE").unwrap_or_else(|_| "apb".to_string());
        let command_qos = read_u8_with_default("APB_COMMAND_QOS", 1)?;
        let command_auth_level = read_u8_with_default("APB_COMMAND_AUTH_LEVEL", 1)?;
        let command_timeout_ms = read_u64_with_default("APB_COMMAND_TIMEOUT_MS", 30_000)?;
        let offline_timeout_ms = read_u64_with_default("APB_OFFLINE_TIMEOUT_MS", 90_000)?;
        let offline_sweep_interval_ms =
            read_u64_with_default("APB_OFFLINE_SWEEP_INTERVAL_MS", 1_000)?;
        let login_dedup_window_ms = read_u64_with_default("APB_LOGIN_DEDUP_WINDOW_MS", 5_000)?;
        let command_dedup_window_ms =
            read_u64_with_default("APB_COMMAND_DEDUP_WINDOW_MS", 10_000)?;
        let alarm_buffer_capacity =
            read_u64_with_default("APB_ALARM_BUFFER_CAPACITY", 100)? as usize;
        let queue_prune_interval_ms =
            read_u64_with_default("APB_QUEUE_PRUNE_INTERVAL_MS", 300_000)?;
        let queue_stale_after_ms = read_u64_with_default("APB_QUEUE_STALE_AFTER_MS", 3_600_000)?;

        Ok(Self {
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            topic_base,
            frame_key,
            command_qos,
            command_auth_level,
            command_timeout_ms,
            offline_timeout_ms,
            offline_sweep_interval_ms,
            login_dedup_window_ms,
            command_dedup_window_ms,
            alarm_buffer_capacity,
            queue_prune_interval_ms,
            queue_stale_after_ms,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
