//! 上行消息处理管线。
//!
//! ## 处理链
//!
//! ```text
//! RawMessage (接入层)
//!       │
//!       ▼
//! Router：拆帧鉴别 → 按消息类型解码 → 分发处理器（每条消息独立任务）
//!       │
//!       ├─ hb     → 心跳处理器（变化分类 + 遥测留档）
//!       ├─ login  → 身份解析器（建档 / 身份同步 / 去重）
//!       ├─ status → 状态处理器（全量状态合并）
//!       ├─ alarm  → 报警处理器（输入/输出分类 + 事件留档）
//!       ├─ resp   → 命令响应（交给控制链路关联）
//!       └─ lw     → 遗言处理器（离线标记 + 断连计数）
//!       │
//!       ▼
//! 持久化接口 + 实时快照存储 + 处理阶段事件广播
//! ```
//!
//! 处理器共享同一骨架：未同步设备（快照缺失或 ID 为 0）的消息
//! 记录日志后丢弃，绝不让单条坏消息影响其他在途消息。

mod handlers;
mod resolver;
mod router;

pub use resolver::{IdentityResolver, LoginOutcome};
pub use router::Router;

/// 管线处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("protocol error: {0}")]
    Protocol(#[from] apb_protocol::ProtocolError),
    #[error("storage error: {0}")]
    Storage(String),
}
