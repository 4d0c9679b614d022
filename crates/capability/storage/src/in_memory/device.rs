//! 设备档案内存实现
//!
//! 仅用于本地测试和占位。

use crate::error::StorageError;
use crate::models::{DeviceRecord, NewDevice};
use crate::traits::DeviceStore;
use domain::{now_epoch_ms, CounterField, DeviceDelta};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

/// 设备档案内存存储
pub struct InMemoryDeviceStore {
    devices: RwLock<Vec<DeviceRecord>>,
    status_updates: RwLock<Vec<(i64, DeviceDelta)>>,
    counters: RwLock<HashMap<(i64, &'static str), u32>>,
    next_id: AtomicI64,
}

impl InMemoryDeviceStore {
    /// 创建新的设备存储（ID 从 1 开始分配）
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            status_updates: RwLock::new(Vec::new()),
            counters: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// 已记录的状态更新次数（用于测试）
    pub fn status_update_count(&self) -> usize {
        self.status_updates.read().map(|v| v.len()).unwrap_or(0)
    }

    /// 读取计数器当前值（用于测试）
    pub fn counter(&self, device_id: i64, field: CounterField) -> u32 {
        self.counters
            .read()
            .ok()
            .and_then(|map| map.get(&(device_id, field.as_str())).copied())
            .unwrap_or(0)
    }

    /// 设备数量（用于测试）
    pub fn len(&self) -> usize {
        self.devices.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find_by_mac(&self, mac_address: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(devices
            .iter()
            .find(|item| item.mac_address == mac_address)
            .cloned())
    }

    async fn find_by_id(&self, device_id: i64) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(devices
            .iter()
            .find(|item| item.device_id == device_id)
            .cloned())
    }

    async fn create_device(&self, device: NewDevice) -> Result<DeviceRecord, StorageError> {
        let mut devices = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if devices
            .iter()
            .any(|item| item.mac_address == device.mac_address)
        {
            return Err(StorageError::new("mac address already registered"));
        }
        let record = DeviceRecord {
            device_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            mac_address: device.mac_address,
            hostname: device.hostname,
            created_at_ms: now_epoch_ms(),
        };
        devices.push(record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        device_id: i64,
        update: &DeviceDelta,
    ) -> Result<(), StorageError> {
        let devices = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        if !devices.iter().any(|item| item.device_id == device_id) {
            return Err(StorageError::new("device not found"));
        }
        drop(devices);
        let mut updates = self
            .status_updates
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        updates.push((device_id, update.clone()));
        Ok(())
    }

    async fn increment_counter(
        &self,
        device_id: i64,
        field: CounterField,
    ) -> Result<(), StorageError> {
        let mut counters = self
            .counters
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        *counters.entry((device_id, field.as_str())).or_insert(0) += 1;
        Ok(())
    }
}
