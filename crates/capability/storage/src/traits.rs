//! 存储接口 Trait 定义
//!
//! 定义管线消费的全部持久化操作：
//! - DeviceStore：设备档案与状态
//! - AlarmEventStore：报警事件留档
//! - TelemetryStore：心跳遥测样本
//! - CommandLogStore：命令日志与响应留档
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    CommandLogRecord, CommandResponseRecord, DeviceRecord, NewDevice, TelemetrySampleRecord,
};
use async_trait::async_trait;
use domain::{AlarmRecord, CommandStatus, CounterField, DeviceDelta};
use uuid::Uuid;

/// 设备档案存储接口。
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 按 MAC 地址查找设备
    async fn find_by_mac(&self, mac_address: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 按后端 ID 查找设备
    async fn find_by_id(&self, device_id: i64) -> Result<Option<DeviceRecord>, StorageError>;

    /// 创建新设备并分配后端 ID
    async fn create_device(&self, device: NewDevice) -> Result<DeviceRecord, StorageError>;

    /// 按增量更新设备状态（仅写入已设置字段）
    async fn update_status(
        &self,
        device_id: i64,
        update: &DeviceDelta,
    ) -> Result<(), StorageError>;

    /// 指定计数器自增 1
    async fn increment_counter(
        &self,
        device_id: i64,
        field: CounterField,
    ) -> Result<(), StorageError>;
}

/// 报警事件存储接口。
#[async_trait]
pub trait AlarmEventStore: Send + Sync {
    /// 留档一条报警事件
    async fn save_alarm_event(
        &self,
        device_id: i64,
        record: &AlarmRecord,
    ) -> Result<(), StorageError>;
}

/// 遥测样本存储接口。
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// 留档一条心跳遥测样本
    async fn save_sample(&self, sample: TelemetrySampleRecord) -> Result<(), StorageError>;
}

/// 命令日志存储接口。
#[async_trait]
pub trait CommandLogStore: Send + Sync {
    /// 记录已下发命令
    async fn log_command(&self, record: CommandLogRecord) -> Result<(), StorageError>;

    /// 更新命令状态（按 request_id 定位；未找到返回 None）
    async fn update_command_status(
        &self,
        request_id: Uuid,
        status: CommandStatus,
    ) -> Result<Option<CommandLogRecord>, StorageError>;

    /// 留档命令响应（孤儿响应同样留档）
    async fn save_response(&self, record: CommandResponseRecord) -> Result<(), StorageError>;

    /// 列出某设备最近的命令日志（按下发时间倒序）
    async fn list_commands(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<CommandLogRecord>, StorageError>;
}
