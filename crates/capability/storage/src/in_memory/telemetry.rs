//! 遥测样本内存实现
//!
//! 仅用于本地测试和占位。

use crate::error::StorageError;
use crate::models::TelemetrySampleRecord;
use crate::traits::TelemetryStore;
use std::sync::RwLock;

/// 遥测样本内存存储
pub struct InMemoryTelemetryStore {
    samples: RwLock<Vec<TelemetrySampleRecord>>,
}

impl InMemoryTelemetryStore {
    /// 创建新的遥测存储
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
        }
    }

    /// 样本总数（用于测试）
    pub fn len(&self) -> usize {
        self.samples.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最近一条样本（用于测试）
    pub fn last(&self) -> Option<TelemetrySampleRecord> {
        self.samples
            .read()
            .ok()
            .and_then(|samples| samples.last().cloned())
    }
}

impl Default for InMemoryTelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn save_sample(&self, sample: TelemetrySampleRecord) -> Result<(), StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        samples.push(sample);
        Ok(())
    }
}
