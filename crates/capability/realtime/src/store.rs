//! 内存实时快照存储。

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use domain::{AlarmRecord, DeviceDelta, DeviceEvent, DeviceSnapshot};
use tokio::sync::broadcast;

/// 单设备条目：快照 + 最近报警环形缓冲。
struct DeviceEntry {
    snapshot: DeviceSnapshot,
    recent_alarms: VecDeque<AlarmRecord>,
}

/// 设备实时状态存储。
///
/// 以主机名为键；首次观测到的主机名懒创建条目。所有变更
/// 通过 broadcast 推送 [`DeviceEvent`]，无订阅方时发送为空操作。
pub struct LiveStore {
    devices: RwLock<HashMap<String, DeviceEntry>>,
    /// 每设备报警环形缓冲容量
    alarm_capacity: usize,
    events: broadcast::Sender<DeviceEvent>,
}

impl LiveStore {
    pub fn new(alarm_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            devices: RwLock::new(HashMap::new()),
            alarm_capacity: alarm_capacity.max(1),
            events,
        }
    }

    /// 订阅实时事件。
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// 合并增量并刷新在线状态 / 最后观测时间，返回合并后的快照。
    ///
    /// 增量中未设置的字段保留快照既有值；嵌套子结构逐字段合并。
    pub fn apply_delta(&self, hostname: &str, delta: &DeviceDelta, now_ms: i64) -> DeviceSnapshot {
        let mut devices = lock_write(&self.devices);
        let entry = devices
            .entry(hostname.to_string())
            .or_insert_with(|| DeviceEntry {
                snapshot: DeviceSnapshot {
                    hostname: hostname.to_string(),
                    ..DeviceSnapshot::default()
                },
                recent_alarms: VecDeque::new(),
            });

        let snapshot = &mut entry.snapshot;
        snapshot.last_seen_ms = now_ms;
        // 任何观测都意味着设备在线，除非增量显式置为离线
        snapshot.online = delta.online.unwrap_or(true);

        if let Some(device_id) = delta.device_id {
            snapshot.device_id = device_id;
        }
        if let Some(firmware) = &delta.firmware {
            snapshot.firmware = Some(firmware.clone());
        }
        if let Some(uptime_s) = delta.uptime_s {
            snapshot.uptime_s = Some(uptime_s);
        }
        if let Some(boot_count) = delta.boot_count {
            snapshot.boot_count = Some(boot_count);
        }
        if let Some(ip) = &delta.network.ip {
            snapshot.network.ip = Some(ip.clone());
        }
        if let Some(ssid) = &delta.network.ssid {
            snapshot.network.ssid = Some(ssid.clone());
        }
        if let Some(rssi) = delta.network.rssi {
            snapshot.network.rssi = Some(rssi);
        }
        if let Some(temperature_c) = delta.sensors.temperature_c {
            snapshot.sensors.temperature_c = Some(temperature_c);
        }
        if let Some(humidity_pct) = delta.sensors.humidity_pct {
            snapshot.sensors.humidity_pct = Some(humidity_pct);
        }
        if let Some(panic1) = delta.inputs.panic1 {
            snapshot.inputs.panic1 = panic1;
        }
        if let Some(panic2) = delta.inputs.panic2 {
            snapshot.inputs.panic2 = panic2;
        }
        if let Some(tamper) = delta.inputs.tamper {
            snapshot.inputs.tamper = tamper;
        }
        if let Some(siren) = delta.outputs.siren {
            snapshot.outputs.siren = siren;
        }
        if let Some(turret) = delta.outputs.turret {
            snapshot.outputs.turret = turret;
        }
        if let Some(error_flags) = delta.error_flags {
            snapshot.error_flags = error_flags;
        }

        let merged = snapshot.clone();
        let _ = self.events.send(DeviceEvent::Updated {
            hostname: hostname.to_string(),
            snapshot: merged.clone(),
        });
        merged
    }

    /// 追加一条报警事件（新事件在前，超出容量丢弃最旧）。
    pub fn record_alarm(&self, hostname: &str, record: AlarmRecord) {
        let mut devices = lock_write(&self.devices);
        let entry = devices
            .entry(hostname.to_string())
            .or_insert_with(|| DeviceEntry {
                snapshot: DeviceSnapshot {
                    hostname: hostname.to_string(),
                    ..DeviceSnapshot::default()
                },
                recent_alarms: VecDeque::new(),
            });
        entry.recent_alarms.push_front(record.clone());
        entry.recent_alarms.truncate(self.alarm_capacity);

        let _ = self.events.send(DeviceEvent::Alarm {
            hostname: hostname.to_string(),
            record,
        });
    }

    /// 获取设备快照。
    pub fn snapshot(&self, hostname: &str) -> Option<DeviceSnapshot> {
        lock_read(&self.devices)
            .get(hostname)
            .map(|entry| entry.snapshot.clone())
    }

    /// 获取全部设备快照。
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        lock_read(&self.devices)
            .values()
            .map(|entry| entry.snapshot.clone())
            .collect()
    }

    /// 获取设备最近报警事件（新事件在前）。
    pub fn recent_alarms(&self, hostname: &str) -> Vec<AlarmRecord> {
        lock_read(&self.devices)
            .get(hostname)
            .map(|entry| entry.recent_alarms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 标记静默超时的在线设备为离线，返回被标记的设备列表。
    pub fn mark_offline_stale(&self, now_ms: i64, timeout_ms: u64) -> Vec<(String, i64)> {
        let mut marked = Vec::new();
        let mut devices = lock_write(&self.devices);
        for (hostname, entry) in devices.iter_mut() {
            if !entry.snapshot.online {
                continue;
            }
            let silent_ms = now_ms.saturating_sub(entry.snapshot.last_seen_ms);
            if silent_ms >= 0 && silent_ms as u64 >= timeout_ms {
                entry.snapshot.online = false;
                marked.push((hostname.clone(), entry.snapshot.last_seen_ms));
            }
        }
        drop(devices);

        for (hostname, last_seen_ms) in &marked {
            let _ = self.events.send(DeviceEvent::Offline {
                hostname: hostname.clone(),
                last_seen_ms: *last_seen_ms,
            });
        }
        marked
    }
}

// 锁被毒化时继续使用内部数据
fn lock_read<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_write<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
