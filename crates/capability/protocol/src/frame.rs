//! 帧层编解码
//!
//! 封装与拆封设备固件使用的认证二进制信封。编解码是纯函数，
//! 仅依赖共享密钥；拆封对一切非法输入关闭失败（返回错误，绝不 panic）。

use crate::error::ProtocolError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 帧头长度：len(u16) + sequence(u32)。
pub const FRAME_HEADER_LEN: usize = 6;
/// 截断 HMAC 标签长度。
pub const FRAME_TAG_LEN: usize = 8;
/// 最小帧总长度（头 + 1 字节 payload + 标签）。
pub const FRAME_MIN_LEN: usize = FRAME_HEADER_LEN + 1 + FRAME_TAG_LEN;

/// 拆封后的帧内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 帧序号
    pub sequence: u32,
    /// 内层消息字节
    pub payload: Vec<u8>,
}

/// 帧编解码器（持有共享密钥的 HMAC 原型）。
#[derive(Clone)]
pub struct FrameCodec {
    mac: HmacSha256,
}

impl FrameCodec {
    /// 用共享密钥构建编解码器。
    pub fn new(key: &[u8]) -> Result<Self, ProtocolError> {
        if key.is_empty() {
            return Err(ProtocolError::InvalidKey);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| ProtocolError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// 封帧：`[len u16 BE][sequence u32 BE][payload][tag 8 字节]`。
    pub fn wrap(&self, payload: &[u8], sequence: u32) -> Result<Vec<u8>, ProtocolError> {
        if payload.is_empty() || payload.len() > u16::MAX as usize {
            return Err(ProtocolError::PayloadSize(payload.len()));
        }
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len() + FRAME_TAG_LEN);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(&sequence.to_be_bytes());
        frame.extend_from_slice(payload);

        let mut mac = self.mac.clone();
        mac.update(&frame);
        let digest = mac.finalize().into_bytes();
        frame.extend_from_slice(&digest[digest.len() - FRAME_TAG_LEN..]);
        Ok(frame)
    }

    /// 拆帧并校验标签。
    ///
    /// 长度不足、声明长度不符、标签不一致均返回错误；
    /// 标签比较为常量时间（`verify_truncated_right`）。
    pub fn unwrap(&self, raw: &[u8]) -> Result<Frame, ProtocolError> {
        if raw.len() < FRAME_MIN_LEN {
            return Err(ProtocolError::FrameTooShort(raw.len()));
        }
        let declared = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        let actual = raw.len() - FRAME_HEADER_LEN - FRAME_TAG_LEN;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        let body_len = FRAME_HEADER_LEN + declared;
        let mut mac = self.mac.clone();
        mac.update(&raw[..body_len]);
        mac.verify_truncated_right(&raw[body_len..])
            .map_err(|_| ProtocolError::TagMismatch)?;

        let sequence = u32::from_be_bytes([raw[2], raw[3], raw[4], raw[5]]);
        Ok(Frame {
            sequence,
            payload: raw[FRAME_HEADER_LEN..body_len].to_vec(),
        })
    }
}
