//! 规范化观测类型与下行命令模型
//!
//! 处理器与控制链路只消费这里的类型，线上编号细节全部留在 `wire`/`codec`。

use domain::{AlarmRecord, CommandKind, InputFlags, OutputFlags, OutputKind, OutputPattern};
use uuid::Uuid;

/// 系统命令动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Reboot,
    FactoryReset,
    Sleep,
    Unknown,
}

/// 诊断命令动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticAction {
    SelfTest,
    ReportStatus,
    Unknown,
}

/// 配置段标识（config-read 用）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Wifi,
    Mqtt,
    Device,
    Location,
    Ntp,
    Ble,
    All,
    Unknown,
}

/// 断连原因（遗言消息）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Unexpected,
    PowerLoss,
    FirmwareUpdate,
    Unknown,
}

/// 配置命令载荷（恰好一个配置段）。
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPayload {
    Wifi {
        ssid: String,
        password: String,
    },
    Mqtt {
        host: String,
        port: u16,
        username: String,
        password: String,
    },
    /// 设备身份配置：身份同步命令的载体
    Device {
        device_id: i64,
        hostname: String,
    },
    Location {
        site: String,
        zone: String,
        latitude: f64,
        longitude: f64,
    },
    Ntp {
        server: String,
        sync_interval_s: u32,
    },
    Ble {
        enabled: bool,
        tx_power: i32,
    },
}

/// 下行命令（领域表示，编码边界做穷尽匹配）。
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    System {
        action: SystemAction,
        delay_s: u32,
    },
    Config(ConfigPayload),
    Output {
        output: OutputKind,
        activate: bool,
        pattern: OutputPattern,
        duration_on_ms: u32,
        duration_off_ms: u32,
    },
    Diagnostic {
        action: DiagnosticAction,
    },
    Ota {
        url: String,
        version: String,
        checksum: String,
    },
    ConfigRead {
        section: ConfigSection,
    },
}

impl OutboundCommand {
    /// 命令类型（用于持久化记录与去重窗口）。
    pub fn kind(&self) -> CommandKind {
        match self {
            OutboundCommand::System { .. } => CommandKind::System,
            OutboundCommand::Config(_) => CommandKind::Config,
            OutboundCommand::Output { .. } => CommandKind::Output,
            OutboundCommand::Diagnostic { .. } => CommandKind::Diagnostic,
            OutboundCommand::Ota { .. } => CommandKind::Ota,
            OutboundCommand::ConfigRead { .. } => CommandKind::ConfigRead,
        }
    }

    /// 构造身份同步命令。
    pub fn identity_sync(device_id: i64, hostname: impl Into<String>) -> Self {
        OutboundCommand::Config(ConfigPayload::Device {
            device_id,
            hostname: hostname.into(),
        })
    }
}

/// 解码后的命令信封字段。
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeFields {
    pub sequence: u32,
    pub timestamp: u32,
    pub request_id: Uuid,
    pub auth_level: u8,
    pub command: OutboundCommand,
}

/// 规范化心跳观测。
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatObservation {
    pub timestamp: u32,
    /// 设备当前认为的自身 ID（0 = 未同步）
    pub reported_id: i64,
    pub uptime_s: u64,
    pub free_heap: u32,
    pub rssi: i32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub inputs: InputFlags,
    pub outputs: OutputFlags,
    pub error_flags: u32,
}

/// 规范化状态观测（login 与 status 共用）。
#[derive(Debug, Clone, PartialEq)]
pub struct StatusObservation {
    pub mac: [u8; 6],
    pub hostname: String,
    /// 设备当前认为的自身 ID（0 = 未同步）
    pub reported_id: i64,
    pub firmware: String,
    pub boot_count: u32,
    pub ip: String,
    pub ssid: String,
    pub rssi: i32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub inputs: InputFlags,
    pub outputs: OutputFlags,
    pub error_flags: u32,
    pub uptime_s: u64,
}

/// 规范化遗言观测。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWillObservation {
    pub timestamp: u32,
    /// 设备当前认为的自身 ID（0 = 未同步）
    pub reported_id: i64,
    pub reason: DisconnectReason,
}

/// 规范化命令响应。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub request_id: Uuid,
    pub timestamp: u32,
    pub success: bool,
    pub error_code: u32,
    pub message: String,
    pub payload: Vec<u8>,
}

/// 规范化报警观测：设备上报 ID + 事件记录。
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmObservation {
    /// 设备当前认为的自身 ID（0 = 未同步）
    pub reported_id: i64,
    pub record: AlarmRecord,
}

/// 获取当前时间戳（unix 秒）。
pub fn now_epoch_s() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}
