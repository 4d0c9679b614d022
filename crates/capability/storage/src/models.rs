//! 持久化记录模型。

use domain::{ChangeKind, CommandKind, CommandStatus};
use uuid::Uuid;

/// 设备档案记录。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// 后端分配的设备 ID（创建时分配，> 0）
    pub device_id: i64,
    /// MAC 地址（`aa:bb:cc:dd:ee:ff`）
    pub mac_address: String,
    /// 主机名
    pub hostname: String,
    /// 创建时间（毫秒）
    pub created_at_ms: i64,
}

/// 新设备档案（ID 由存储层分配）。
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub mac_address: String,
    pub hostname: String,
}

/// 遥测样本记录（每条心跳都会落一条）。
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySampleRecord {
    pub device_id: i64,
    /// 设备侧时间戳（unix 秒）
    pub timestamp: u32,
    /// 变化类型标注（不影响是否落库）
    pub change: ChangeKind,
    pub uptime_s: u64,
    pub free_heap: u32,
    pub rssi: i32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub error_flags: u32,
}

/// 命令日志记录。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLogRecord {
    pub request_id: Uuid,
    pub device_id: i64,
    pub hostname: String,
    pub kind: CommandKind,
    pub status: CommandStatus,
    pub issued_at_ms: i64,
}

/// 命令响应留档记录。
///
/// 孤儿响应（找不到在途命令）也留档，`device_id` 置 None。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponseRecord {
    pub request_id: Uuid,
    pub device_id: Option<i64>,
    pub success: bool,
    pub error_code: u32,
    pub message: String,
    /// 设备侧时间戳（unix 秒）
    pub timestamp: u32,
    /// 接收时间（毫秒）
    pub received_at_ms: i64,
}
