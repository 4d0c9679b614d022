//! 报警事件、命令枚举与实时广播事件。

use crate::device::DeviceSnapshot;
use serde::{Deserialize, Serialize};

/// 上行消息类型（topic 末段）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Heartbeat,
    Login,
    Status,
    Alarm,
    Response,
    LastWill,
}

impl MessageKind {
    /// 从 topic 末段解析消息类型（`resp` 与 `response` 等价）。
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "hb" => Some(MessageKind::Heartbeat),
            "login" => Some(MessageKind::Login),
            "status" => Some(MessageKind::Status),
            "alarm" => Some(MessageKind::Alarm),
            "resp" | "response" => Some(MessageKind::Response),
            "lw" => Some(MessageKind::LastWill),
            _ => None,
        }
    }

    /// topic 末段表示。
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Heartbeat => "hb",
            MessageKind::Login => "login",
            MessageKind::Status => "status",
            MessageKind::Alarm => "alarm",
            MessageKind::Response => "resp",
            MessageKind::LastWill => "lw",
        }
    }
}

/// 报警事件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmType {
    Panic1,
    Panic2,
    Tamper,
    Siren,
    Turret,
    Unknown,
}

impl AlarmType {
    /// 是否为输入类报警（触发状态翻转与计数器自增）。
    pub fn is_input(&self) -> bool {
        matches!(self, AlarmType::Panic1 | AlarmType::Panic2 | AlarmType::Tamper)
    }

    /// 是否为输出类事件（警笛 / 警灯状态变化）。
    pub fn is_output(&self) -> bool {
        matches!(self, AlarmType::Siren | AlarmType::Turret)
    }
}

/// 报警事件状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Inactive,
    Active,
    Unknown,
}

/// 报警优先级。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPriority {
    Low,
    Normal,
    High,
    Critical,
    Unknown,
}

/// 输出类型（输出事件附带）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Siren,
    Turret,
    Unknown,
}

/// 输出动作模式（输出事件附带）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPattern {
    Steady,
    Pulse,
    Strobe,
    Unknown,
}

/// 规范化后的报警事件记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    /// 设备侧帧序号
    pub sequence: u32,
    /// 设备侧时间戳（unix 秒）
    pub timestamp: u32,
    /// 事件类型
    pub alarm_type: AlarmType,
    /// 事件状态
    pub state: AlarmState,
    /// 优先级
    pub priority: AlarmPriority,
    /// 物理输入电平
    pub physical_state: bool,
    /// 输出类型（仅输出事件）
    pub output_type: Option<OutputKind>,
    /// 输出模式（仅输出事件）
    pub pattern: Option<OutputPattern>,
    /// 输出激活时长（毫秒，仅输出事件）
    pub duration_on_ms: Option<u32>,
    /// 输出间歇时长（毫秒，仅输出事件）
    pub duration_off_ms: Option<u32>,
}

/// 心跳样本变化类型（仅用于标注存储的遥测样本）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// 周期性上报，无显著变化
    Periodic,
    /// 报警输入状态变化
    AlarmTransition,
    /// 输出状态变化
    OutputTransition,
    /// 温度 >2°C 或湿度 >5% 的显著传感器变化
    SensorDelta,
}

/// 下行命令类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    System,
    Config,
    Output,
    Diagnostic,
    Ota,
    ConfigRead,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::System => "system",
            CommandKind::Config => "config",
            CommandKind::Output => "output",
            CommandKind::Diagnostic => "diagnostic",
            CommandKind::Ota => "ota",
            CommandKind::ConfigRead => "config_read",
        }
    }
}

/// 命令生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// 已发布到传输层
    Sent,
    /// 收到成功响应
    Success,
    /// 收到失败响应
    Failed,
    /// 等待响应超时
    Timeout,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Sent => "sent",
            CommandStatus::Success => "success",
            CommandStatus::Failed => "failed",
            CommandStatus::Timeout => "timeout",
        }
    }
}

/// 实时事件（广播给订阅方：观测工具、其他处理器）。
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// 设备快照更新
    Updated {
        hostname: String,
        snapshot: DeviceSnapshot,
    },
    /// 设备离线（超时未观测）
    Offline {
        hostname: String,
        last_seen_ms: i64,
    },
    /// 新报警事件
    Alarm {
        hostname: String,
        record: AlarmRecord,
    },
}
