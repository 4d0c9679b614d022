//! 设备实时快照与增量更新类型。

use serde::{Deserialize, Serialize};

/// 输入状态标志（报警输入）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFlags {
    /// 紧急按钮 1
    pub panic1: bool,
    /// 紧急按钮 2
    pub panic2: bool,
    /// 防拆开关
    pub tamper: bool,
}

/// 输出状态标志（警报输出）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFlags {
    /// 警笛
    pub siren: bool,
    /// 警灯
    pub turret: bool,
}

/// 累计计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub panic1: u32,
    pub panic2: u32,
    pub tamper: u32,
    pub disconnect: u32,
    pub error: u32,
}

/// 计数器字段标识（用于持久化层按字段自增）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    Panic1,
    Panic2,
    Tamper,
    Disconnect,
    Error,
}

impl CounterField {
    /// 字段名（持久化列名 / 日志字段）。
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::Panic1 => "panic1_count",
            CounterField::Panic2 => "panic2_count",
            CounterField::Tamper => "tamper_count",
            CounterField::Disconnect => "disconnect_count",
            CounterField::Error => "error_count",
        }
    }
}

/// 网络信息。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub ip: Option<String>,
    pub ssid: Option<String>,
    pub rssi: Option<i32>,
}

/// 环境传感器读数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    /// 温度（摄氏度）
    pub temperature_c: Option<f32>,
    /// 相对湿度（百分比）
    pub humidity_pct: Option<f32>,
}

/// 设备实时快照（每个主机名一份，首次观测时懒创建）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// 主机名（快照主键）
    pub hostname: String,
    /// 后端设备 ID（0 = 未知）
    pub device_id: i64,
    /// 是否在线
    pub online: bool,
    /// 最后一次观测时间（毫秒）
    pub last_seen_ms: i64,
    /// 固件版本
    pub firmware: Option<String>,
    /// 运行时长（秒）
    pub uptime_s: Option<u64>,
    /// 启动次数
    pub boot_count: Option<u32>,
    /// 网络信息
    pub network: NetworkInfo,
    /// 传感器读数
    pub sensors: SensorReadings,
    /// 输入状态
    pub inputs: InputFlags,
    /// 输出状态
    pub outputs: OutputFlags,
    /// 累计计数器
    pub counters: Counters,
    /// 错误标志位
    pub error_flags: u32,
}

/// 输入状态增量（仅设置已知字段）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputDelta {
    pub panic1: Option<bool>,
    pub panic2: Option<bool>,
    pub tamper: Option<bool>,
}

/// 输出状态增量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputDelta {
    pub siren: Option<bool>,
    pub turret: Option<bool>,
}

/// 网络信息增量。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkDelta {
    pub ip: Option<String>,
    pub ssid: Option<String>,
    pub rssi: Option<i32>,
}

/// 传感器读数增量。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorDelta {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
}

/// 设备快照增量更新。
///
/// 处理器只填充自己观测到的字段；嵌套子结构逐字段合并，
/// 未设置的字段不会覆盖快照中的既有值。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceDelta {
    pub device_id: Option<i64>,
    pub online: Option<bool>,
    pub firmware: Option<String>,
    pub uptime_s: Option<u64>,
    pub boot_count: Option<u32>,
    pub network: NetworkDelta,
    pub sensors: SensorDelta,
    pub inputs: InputDelta,
    pub outputs: OutputDelta,
    pub error_flags: Option<u32>,
}

impl DeviceDelta {
    /// 仅标记在线的最小增量。
    pub fn online() -> Self {
        Self {
            online: Some(true),
            ..Self::default()
        }
    }
}
