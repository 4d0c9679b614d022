//! 报警事件内存实现
//!
//! 仅用于本地测试和占位。

use crate::error::StorageError;
use crate::traits::AlarmEventStore;
use domain::AlarmRecord;
use std::sync::RwLock;

/// 报警事件内存存储
pub struct InMemoryAlarmEventStore {
    events: RwLock<Vec<(i64, AlarmRecord)>>,
}

impl InMemoryAlarmEventStore {
    /// 创建新的报警事件存储
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// 某设备已留档的事件数（用于测试）
    pub fn count_for(&self, device_id: i64) -> usize {
        self.events
            .read()
            .map(|events| {
                events
                    .iter()
                    .filter(|(id, _)| *id == device_id)
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for InMemoryAlarmEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AlarmEventStore for InMemoryAlarmEventStore {
    async fn save_alarm_event(
        &self,
        device_id: i64,
        record: &AlarmRecord,
    ) -> Result<(), StorageError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        events.push((device_id, record.clone()));
        Ok(())
    }
}
