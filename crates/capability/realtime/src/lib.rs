//! 设备实时状态能力。
//!
//! ## 职责
//! - 维护以主机名为键的内存快照（[`LiveStore`]），供处理管线做增量合并
//! - 每设备保留最近报警事件的环形缓冲（新事件在前）
//! - 周期扫描静默设备并标记离线（[`spawn_offline_sweeper`]）
//! - 通过 broadcast 向订阅方推送 [`DeviceEvent`]

mod store;
mod sweeper;

pub use store::LiveStore;
pub use sweeper::spawn_offline_sweeper;

pub use domain::DeviceEvent;
