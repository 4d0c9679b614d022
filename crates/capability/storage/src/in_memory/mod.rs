//! 内存存储实现
//!
//! 仅用于本地测试和占位，进程重启后数据丢失。

mod alarm;
mod command;
mod device;
mod telemetry;

pub use alarm::InMemoryAlarmEventStore;
pub use command::InMemoryCommandLogStore;
pub use device::InMemoryDeviceStore;
pub use telemetry::InMemoryTelemetryStore;
