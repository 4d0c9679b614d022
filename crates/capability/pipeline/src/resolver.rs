//! 设备身份解析器（login 握手状态机）。
//!
//! 核心职责是把设备侧上报的 `reported_id` 与后端分配的
//! `backend_id` 对账：未建档的 MAC 建档并标记待同步，
//! ID 不一致时下发身份同步命令。两层防风暴措施：
//! - `(主机名, 载荷哈希)` 5 秒去重窗口，窗口内直接复用上次结果
//! - 同一 MAC 的并发 login 串行化，后到者等待并复用先到者的结果

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use apb_control::{CommandService, ControlError};
use apb_protocol::{OutboundCommand, StatusObservation};
use apb_realtime::LiveStore;
use apb_storage::{DeviceStore, NewDevice};
use apb_telemetry::now_epoch_ms;
use domain::{
    format_mac, CommandKind, DeviceDelta, InputDelta, NetworkDelta, OutputDelta, SensorDelta,
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::PipelineError;

/// login 处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    /// 后端设备 ID
    pub device_id: i64,
    /// 本次观测是否新建了设备档案
    pub created: bool,
    /// 是否（实际）下发了身份同步命令；窗口内被抑制时为 false
    pub needs_sync: bool,
}

struct DedupEntry {
    ts_ms: i64,
    outcome: LoginOutcome,
}

/// 设备身份解析器。
pub struct IdentityResolver {
    devices: Arc<dyn DeviceStore>,
    control: Arc<CommandService>,
    live: Arc<LiveStore>,
    /// 同一 MAC 的 login 串行化锁
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// `(主机名, 载荷哈希)` -> 最近一次处理结果
    dedup: Mutex<HashMap<(String, [u8; 32]), DedupEntry>>,
    dedup_window_ms: u64,
}

impl IdentityResolver {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        control: Arc<CommandService>,
        live: Arc<LiveStore>,
        dedup_window_ms: u64,
    ) -> Self {
        Self {
            devices,
            control,
            live,
            locks: Mutex::new(HashMap::new()),
            dedup: Mutex::new(HashMap::new()),
            dedup_window_ms,
        }
    }

    /// 处理一条 login 观测。
    ///
    /// `payload` 是解码前的消息字节，用于逐比特去重。
    pub async fn resolve(
        &self,
        hostname: &str,
        payload: &[u8],
        observation: &StatusObservation,
    ) -> Result<LoginOutcome, PipelineError> {
        let payload_hash: [u8; 32] = Sha256::digest(payload).into();
        let dedup_key = (hostname.to_string(), payload_hash);

        if let Some(outcome) = self.cached_outcome(&dedup_key) {
            apb_telemetry::record_login_deduped();
            info!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id = outcome.device_id,
                "login_deduped"
            );
            return Ok(outcome);
        }

        let mac_key = format_mac(&observation.mac);
        let device_lock = self.lock_for(&mac_key);
        let _guard = device_lock.lock().await;

        // 等锁期间先到的 login 可能已完成，复用其结果
        if let Some(outcome) = self.cached_outcome(&dedup_key) {
            apb_telemetry::record_login_deduped();
            return Ok(outcome);
        }

        let (device_id, created) = match self
            .devices
            .find_by_mac(&mac_key)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?
        {
            Some(record) => (record.device_id, false),
            None => {
                let record = self
                    .devices
                    .create_device(NewDevice {
                        mac_address: mac_key.clone(),
                        hostname: hostname.to_string(),
                    })
                    .await
                    .map_err(|err| PipelineError::Storage(err.to_string()))?;
                info!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    mac = %mac_key,
                    device_id = record.device_id,
                    "device_created"
                );
                (record.device_id, true)
            }
        };

        // 同步与否都先落观测到的状态字段
        let delta = status_delta(device_id, observation);
        self.devices
            .update_status(device_id, &delta)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        let now_ms = now_epoch_ms();
        self.live.apply_delta(hostname, &delta, now_ms);

        let mut needs_sync = created || device_id != observation.reported_id;
        if needs_sync {
            if self
                .control
                .recently_sent(hostname, CommandKind::Config, now_ms)
            {
                apb_telemetry::record_sync_command_suppressed();
                info!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    device_id,
                    "identity_sync_suppressed"
                );
                needs_sync = false;
            } else {
                apb_telemetry::record_sync_command_sent();
                info!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    device_id,
                    reported_id = observation.reported_id,
                    "identity_sync_issued"
                );
                let control = Arc::clone(&self.control);
                let sync_hostname = hostname.to_string();
                // 不阻塞 login 处理等设备响应
                tokio::spawn(async move {
                    match control
                        .send_command(
                            device_id,
                            &sync_hostname,
                            OutboundCommand::identity_sync(device_id, sync_hostname.clone()),
                        )
                        .await
                    {
                        Ok(_) => {}
                        // 设备可能不回执身份同步，超时单独记一条
                        Err(ControlError::Timeout { request_id }) => warn!(
                            target: "apb.pipeline",
                            hostname = %sync_hostname,
                            device_id,
                            request_id = %request_id,
                            "identity_sync_unacknowledged"
                        ),
                        Err(err) => warn!(
                            target: "apb.pipeline",
                            hostname = %sync_hostname,
                            device_id,
                            error = %err,
                            "identity_sync_send_failed"
                        ),
                    }
                });
            }
        }

        let outcome = LoginOutcome {
            device_id,
            created,
            needs_sync,
        };
        self.remember(dedup_key, outcome, now_ms);
        apb_telemetry::record_login_processed();
        Ok(outcome)
    }

    fn cached_outcome(&self, key: &(String, [u8; 32])) -> Option<LoginOutcome> {
        let dedup = lock(&self.dedup);
        dedup.get(key).and_then(|entry| {
            let fresh =
                now_epoch_ms().saturating_sub(entry.ts_ms) < self.dedup_window_ms as i64;
            fresh.then_some(entry.outcome)
        })
    }

    fn remember(&self, key: (String, [u8; 32]), outcome: LoginOutcome, now_ms: i64) {
        let mut dedup = lock(&self.dedup);
        dedup.retain(|_, entry| {
            now_ms.saturating_sub(entry.ts_ms) < self.dedup_window_ms as i64
        });
        dedup.insert(
            key,
            DedupEntry {
                ts_ms: now_ms,
                outcome,
            },
        );
    }

    fn lock_for(&self, mac_key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = lock(&self.locks);
        Arc::clone(
            locks
                .entry(mac_key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// login/status 观测转状态增量。
pub(crate) fn status_delta(device_id: i64, observation: &StatusObservation) -> DeviceDelta {
    DeviceDelta {
        device_id: Some(device_id),
        online: Some(true),
        firmware: Some(observation.firmware.clone()),
        uptime_s: Some(observation.uptime_s),
        boot_count: Some(observation.boot_count),
        network: NetworkDelta {
            ip: Some(observation.ip.clone()),
            ssid: Some(observation.ssid.clone()),
            rssi: Some(observation.rssi),
        },
        sensors: SensorDelta {
            temperature_c: Some(observation.temperature_c),
            humidity_pct: Some(observation.humidity_pct),
        },
        inputs: InputDelta {
            panic1: Some(observation.inputs.panic1),
            panic2: Some(observation.inputs.panic2),
            tamper: Some(observation.inputs.tamper),
        },
        outputs: OutputDelta {
            siren: Some(observation.outputs.siren),
            turret: Some(observation.outputs.turret),
        },
        error_flags: Some(observation.error_flags),
    }
}

// 锁被毒化时继续使用内部数据
fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
