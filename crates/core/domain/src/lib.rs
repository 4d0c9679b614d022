//! # 核心领域模型
//!
//! 报警主机接入网关共享的领域类型：
//! - 设备身份（MAC 地址 / 主机名 / 后端 ID 与设备上报 ID）
//! - 设备实时快照与增量更新
//! - 报警事件与各类领域枚举
//! - 实时事件广播类型
//!
//! 本 crate 不做任何 I/O，所有能力模块通过它交换数据。

pub mod device;
pub mod events;

pub use device::{
    CounterField, Counters, DeviceDelta, DeviceSnapshot, InputDelta, InputFlags, NetworkDelta,
    NetworkInfo, OutputDelta, OutputFlags, SensorDelta, SensorReadings,
};
pub use events::{
    AlarmPriority, AlarmRecord, AlarmState, AlarmType, ChangeKind, CommandKind, CommandStatus,
    DeviceEvent, MessageKind, OutputKind, OutputPattern,
};

/// 设备身份：物理标识与后端分配标识的组合。
///
/// `backend_id` 为 0 表示尚未分配；设备与后端达成一致
/// （`backend_id == reported_id`）时视为已同步。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// 设备 MAC 地址（6 字节）
    pub mac_address: [u8; 6],
    /// 设备主机名（topic 中的唯一标识）
    pub hostname: String,
    /// 后端分配的设备 ID（0 = 未分配）
    pub backend_id: i64,
    /// 设备自身上报的 ID
    pub reported_id: i64,
}

impl DeviceIdentity {
    /// 判断设备身份是否已同步。
    pub fn is_synced(&self) -> bool {
        self.backend_id == self.reported_id
    }
}

/// 格式化 MAC 地址为 `aa:bb:cc:dd:ee:ff` 形式。
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

/// 解析 `aa:bb:cc:dd:ee:ff` 形式的 MAC 地址。
pub fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut count = 0;
    for (index, part) in text.split(':').enumerate() {
        if index >= 6 {
            return None;
        }
        mac[index] = u8::from_str_radix(part, 16).ok()?;
        count += 1;
    }
    if count == 6 { Some(mac) } else { None }
}

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
