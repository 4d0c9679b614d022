//! # 协议编解码能力模块
//!
//! 报警主机与后端之间的双层协议：
//! - **帧层**（`frame`）：长度前缀 + 序号 + HMAC-SHA256 截断标签的二进制信封，
//!   与设备固件逐比特一致
//! - **消息层**（`wire` + `codec`）：protobuf 消息（命令信封 / 命令响应 /
//!   心跳 / 状态 / 报警 / 遗言），解码后统一规范化为领域类型
//!
//! ## 架构设计
//!
//! ```text
//! MQTT payload
//!       │
//!       ▼
//! FrameCodec::unwrap (鉴别 + 拆帧，校验失败即拒绝)
//!       │
//!       ▼
//! wire::* (prost 解码)
//!       │
//!       ▼
//! codec::* (线上枚举 → 领域枚举，总映射 + Unknown 兜底)
//!       │
//!       ▼
//! 处理器仅消费规范化后的观测类型
//! ```
//!
//! ## 帧格式（逐比特固定）
//!
//! ```text
//! [len: u16 BE][sequence: u32 BE][payload: len 字节][tag: 8 字节]
//! tag = HMAC-SHA256(len ‖ sequence ‖ payload, key) 的末 8 字节
//! 最小总长度 15 字节
//! ```

mod codec;
mod error;
mod frame;
mod types;
pub mod wire;

pub use codec::{
    decode_alarm, decode_envelope, decode_heartbeat, decode_last_will, decode_response,
    decode_status, encode_envelope, encode_response,
};
pub use error::ProtocolError;
pub use frame::{Frame, FrameCodec, FRAME_HEADER_LEN, FRAME_MIN_LEN, FRAME_TAG_LEN};
pub use types::*;
