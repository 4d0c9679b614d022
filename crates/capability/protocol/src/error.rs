//! 协议错误类型定义

/// 协议编解码错误
///
/// 帧校验失败属于预期内输入，调用方记录日志后丢弃，不向上传播。
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 帧长度不足最小帧
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// 声明长度与实际缓冲不一致
    #[error("frame length mismatch: declared {declared}, actual payload {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// HMAC 标签校验失败
    #[error("frame tag mismatch")]
    TagMismatch,

    /// 帧密钥非法（空密钥）
    #[error("invalid frame key")]
    InvalidKey,

    /// payload 长度超出帧格式允许范围
    #[error("payload size out of range: {0} bytes")]
    PayloadSize(usize),

    /// protobuf 解码错误
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// request_id 字段非法（须为 16 字节 UUID）
    #[error("invalid request id: {0}")]
    RequestId(String),

    /// MAC 地址字段非法（须为 6 字节）
    #[error("invalid mac address: {0} bytes")]
    MacAddress(usize),

    /// 命令信封缺少 oneof 变体
    #[error("envelope missing command variant")]
    MissingCommand,
}
