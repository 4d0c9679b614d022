//! # 持久化边界模块
//!
//! 核心管线与持久化之间的唯一边界。管线不内嵌任何 SQL/ORM 逻辑，
//! 只调用这里定义的异步接口；关系型实现由外部协作方提供。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：设备 / 报警事件 / 遥测样本 / 命令日志
//!    的异步 Trait 接口
//! 2. **数据模型层** (`models.rs`)：持久化记录结构
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **实现层** (`in_memory/`)：内存实现（测试与默认接线使用）
//!
//! ## 设计约束
//!
//! - 处理器层禁止直接写 SQL，统一通过本层接口
//! - 非关键路径（计数器自增、遥测写入、响应留档）的存储失败由调用方
//!   记录日志后吞掉，不得中断消息管线

pub mod error;
pub mod in_memory;
pub mod models;
pub mod traits;

pub use error::*;
pub use models::*;
pub use traits::*;

pub use in_memory::{
    InMemoryAlarmEventStore, InMemoryCommandLogStore, InMemoryDeviceStore, InMemoryTelemetryStore,
};
