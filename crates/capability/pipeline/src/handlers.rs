//! 各消息类型处理器。
//!
//! 所有处理器共享同一骨架：解析设备 → 计算最小状态增量 →
//! 持久化 → 合并实时快照 → 广播阶段事件。非关键路径的持久化
//! 失败（计数器、遥测样本、响应留档）只记日志，不中断管线。

use std::sync::Arc;

use apb_control::CommandService;
use apb_protocol::{
    AlarmObservation, CommandReply, HeartbeatObservation, LastWillObservation, StatusObservation,
};
use apb_realtime::LiveStore;
use apb_storage::{AlarmEventStore, DeviceStore, TelemetryStore, TelemetrySampleRecord};
use apb_telemetry::{Stage, StageEvent, StageFeed};
use domain::{
    AlarmState, AlarmType, ChangeKind, CounterField, DeviceDelta, DeviceSnapshot, InputDelta,
    MessageKind, NetworkDelta, OutputDelta, OutputKind, SensorDelta,
};
use tracing::{info, warn};

use crate::resolver::{status_delta, IdentityResolver};

/// 温度显著变化阈值（摄氏度）。
const TEMP_DELTA_THRESHOLD: f32 = 2.0;
/// 湿度显著变化阈值（百分点）。
const HUMIDITY_DELTA_THRESHOLD: f32 = 5.0;

/// 处理器集合（共享协作方）。
pub(crate) struct Handlers {
    pub devices: Arc<dyn DeviceStore>,
    pub alarms: Arc<dyn AlarmEventStore>,
    pub telemetry: Arc<dyn TelemetryStore>,
    pub control: Arc<CommandService>,
    pub live: Arc<LiveStore>,
    pub resolver: IdentityResolver,
    pub stages: StageFeed,
}

impl Handlers {
    fn stage(&self, hostname: &str, kind: MessageKind, stage: Stage, detail: Option<String>) {
        self.stages.emit(StageEvent {
            hostname: hostname.to_string(),
            kind: kind.as_str(),
            stage,
            detail,
            ts_ms: apb_telemetry::now_epoch_ms(),
        });
    }

    /// 校验设备上报的自身 ID 并在持久层确认存在；未同步或未知设备返回 None。
    ///
    /// 实时快照不参与解析，后端重启后落库设备的消息不受缓存冷启动影响。
    async fn resolve_device(
        &self,
        hostname: &str,
        kind: MessageKind,
        reported_id: i64,
    ) -> Option<i64> {
        if reported_id == 0 {
            apb_telemetry::record_message_dropped();
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                kind = kind.as_str(),
                "unsynchronized_device_dropped"
            );
            self.stage(hostname, kind, Stage::DeviceNotFound, None);
            return None;
        }
        match self.devices.find_by_id(reported_id).await {
            Ok(Some(_)) => {
                self.stage(hostname, kind, Stage::DeviceResolved, None);
                Some(reported_id)
            }
            Ok(None) => {
                apb_telemetry::record_message_dropped();
                warn!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    kind = kind.as_str(),
                    reported_id,
                    "unknown_device_dropped"
                );
                self.stage(hostname, kind, Stage::DeviceNotFound, None);
                None
            }
            Err(err) => {
                warn!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    kind = kind.as_str(),
                    error = %err,
                    "device_lookup_failed"
                );
                self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
                None
            }
        }
    }

    pub(crate) async fn heartbeat(
        &self,
        hostname: &str,
        observation: HeartbeatObservation,
        received_at_ms: i64,
    ) {
        let kind = MessageKind::Heartbeat;
        let Some(device_id) = self
            .resolve_device(hostname, kind, observation.reported_id)
            .await
        else {
            return;
        };
        // 快照仅用于样本分类，缺失时按周期样本处理
        let previous = self.live.snapshot(hostname);
        let change = classify_change(previous.as_ref(), &observation);

        let delta = heartbeat_delta(&observation);
        if let Err(err) = self.devices.update_status(device_id, &delta).await {
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "heartbeat_status_write_failed"
            );
            self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
            return;
        }

        // 遥测样本属于非关键路径，失败不中断
        let sample = TelemetrySampleRecord {
            device_id,
            timestamp: observation.timestamp,
            change,
            uptime_s: observation.uptime_s,
            free_heap: observation.free_heap,
            rssi: observation.rssi,
            temperature_c: observation.temperature_c,
            humidity_pct: observation.humidity_pct,
            error_flags: observation.error_flags,
        };
        match self.telemetry.save_sample(sample).await {
            Ok(()) => apb_telemetry::record_telemetry_sample(),
            Err(err) => warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "telemetry_write_failed"
            ),
        }
        self.stage(hostname, kind, Stage::Persisted, None);

        self.live.apply_delta(hostname, &delta, received_at_ms);
        self.stage(hostname, kind, Stage::StateUpdated, None);
        apb_telemetry::record_message_routed();
        info!(
            target: "apb.pipeline",
            hostname = %hostname,
            device_id,
            change = ?change,
            uptime_s = observation.uptime_s,
            "heartbeat_processed"
        );
        self.stage(hostname, kind, Stage::Completed, None);
    }

    pub(crate) async fn login(
        &self,
        hostname: &str,
        payload: &[u8],
        observation: StatusObservation,
    ) {
        let kind = MessageKind::Login;
        match self.resolver.resolve(hostname, payload, &observation).await {
            Ok(outcome) => {
                self.stage(hostname, kind, Stage::DeviceResolved, None);
                apb_telemetry::record_message_routed();
                info!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    device_id = outcome.device_id,
                    created = outcome.created,
                    needs_sync = outcome.needs_sync,
                    "login_processed"
                );
                self.stage(hostname, kind, Stage::Completed, None);
            }
            Err(err) => {
                warn!(
                    target: "apb.pipeline",
                    hostname = %hostname,
                    error = %err,
                    "login_failed"
                );
                self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
            }
        }
    }

    pub(crate) async fn status(
        &self,
        hostname: &str,
        observation: StatusObservation,
        received_at_ms: i64,
    ) {
        let kind = MessageKind::Status;
        let Some(device_id) = self
            .resolve_device(hostname, kind, observation.reported_id)
            .await
        else {
            return;
        };

        let delta = status_delta(device_id, &observation);
        if let Err(err) = self.devices.update_status(device_id, &delta).await {
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "status_write_failed"
            );
            self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
            return;
        }
        self.stage(hostname, kind, Stage::Persisted, None);

        self.live.apply_delta(hostname, &delta, received_at_ms);
        self.stage(hostname, kind, Stage::StateUpdated, None);
        apb_telemetry::record_message_routed();
        info!(
            target: "apb.pipeline",
            hostname = %hostname,
            device_id,
            firmware = %observation.firmware,
            "status_processed"
        );
        self.stage(hostname, kind, Stage::Completed, None);
    }

    pub(crate) async fn alarm(
        &self,
        hostname: &str,
        observation: AlarmObservation,
        received_at_ms: i64,
    ) {
        let kind = MessageKind::Alarm;
        let Some(device_id) = self
            .resolve_device(hostname, kind, observation.reported_id)
            .await
        else {
            return;
        };
        let record = observation.record;

        let active = record.state == AlarmState::Active;
        let mut delta = DeviceDelta::default();
        if record.alarm_type.is_input() {
            match record.alarm_type {
                AlarmType::Panic1 => delta.inputs.panic1 = Some(active),
                AlarmType::Panic2 => delta.inputs.panic2 = Some(active),
                AlarmType::Tamper => delta.inputs.tamper = Some(active),
                _ => {}
            }
            if active {
                let field = match record.alarm_type {
                    AlarmType::Panic1 => CounterField::Panic1,
                    AlarmType::Panic2 => CounterField::Panic2,
                    _ => CounterField::Tamper,
                };
                if let Err(err) = self.devices.increment_counter(device_id, field).await {
                    warn!(
                        target: "apb.pipeline",
                        hostname = %hostname,
                        device_id,
                        field = field.as_str(),
                        error = %err,
                        "counter_increment_failed"
                    );
                }
            }
        } else if record.alarm_type.is_output() {
            match record.output_type {
                Some(OutputKind::Siren) => delta.outputs.siren = Some(active),
                Some(OutputKind::Turret) => delta.outputs.turret = Some(active),
                _ => {}
            }
        }

        if let Err(err) = self.devices.update_status(device_id, &delta).await {
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "alarm_status_write_failed"
            );
            self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
            return;
        }
        // 无论输入/输出分类，事件本身始终留档
        match self.alarms.save_alarm_event(device_id, &record).await {
            Ok(()) => apb_telemetry::record_alarm_event(),
            Err(err) => warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "alarm_event_write_failed"
            ),
        }
        self.stage(hostname, kind, Stage::Persisted, None);

        self.live.apply_delta(hostname, &delta, received_at_ms);
        self.live.record_alarm(hostname, record.clone());
        self.stage(hostname, kind, Stage::StateUpdated, None);
        apb_telemetry::record_message_routed();
        info!(
            target: "apb.pipeline",
            hostname = %hostname,
            device_id,
            alarm_type = ?record.alarm_type,
            state = ?record.state,
            priority = ?record.priority,
            "alarm_processed"
        );
        self.stage(hostname, kind, Stage::Completed, None);
    }

    pub(crate) async fn last_will(
        &self,
        hostname: &str,
        observation: LastWillObservation,
        received_at_ms: i64,
    ) {
        let kind = MessageKind::LastWill;
        let Some(device_id) = self
            .resolve_device(hostname, kind, observation.reported_id)
            .await
        else {
            return;
        };

        let delta = DeviceDelta {
            online: Some(false),
            ..DeviceDelta::default()
        };
        if let Err(err) = self.devices.update_status(device_id, &delta).await {
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "last_will_status_write_failed"
            );
            self.stage(hostname, kind, Stage::Error, Some(err.to_string()));
            return;
        }
        if let Err(err) = self
            .devices
            .increment_counter(device_id, CounterField::Disconnect)
            .await
        {
            warn!(
                target: "apb.pipeline",
                hostname = %hostname,
                device_id,
                error = %err,
                "counter_increment_failed"
            );
        }
        self.stage(hostname, kind, Stage::Persisted, None);

        self.live.apply_delta(hostname, &delta, received_at_ms);
        self.stage(hostname, kind, Stage::StateUpdated, None);
        apb_telemetry::record_message_routed();
        info!(
            target: "apb.pipeline",
            hostname = %hostname,
            device_id,
            reason = ?observation.reason,
            "last_will_processed"
        );
        self.stage(hostname, kind, Stage::Completed, None);
    }

    pub(crate) async fn response(&self, hostname: &str, reply: CommandReply) {
        let kind = MessageKind::Response;
        self.control.handle_reply(reply).await;
        apb_telemetry::record_message_routed();
        self.stage(hostname, kind, Stage::Completed, None);
    }
}

/// 心跳观测转状态增量。
fn heartbeat_delta(observation: &HeartbeatObservation) -> DeviceDelta {
    DeviceDelta {
        online: Some(true),
        uptime_s: Some(observation.uptime_s),
        network: NetworkDelta {
            rssi: Some(observation.rssi),
            ..NetworkDelta::default()
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
        ..DeviceDelta::default()
    }
}

/// 对照上一份快照给心跳样本分类。
///
/// 仅用于标注留档的遥测样本，不影响是否落库。
fn classify_change(
    previous: Option<&DeviceSnapshot>,
    observation: &HeartbeatObservation,
) -> ChangeKind {
    let Some(previous) = previous else {
        return ChangeKind::Periodic;
    };
    if previous.inputs != observation.inputs {
        return ChangeKind::AlarmTransition;
    }
    if previous.outputs != observation.outputs {
        return ChangeKind::OutputTransition;
    }
    let temp_jump = previous
        .sensors
        .temperature_c
        .is_some_and(|prior| (observation.temperature_c - prior).abs() > TEMP_DELTA_THRESHOLD);
    let humidity_jump = previous
        .sensors
        .humidity_pct
        .is_some_and(|prior| (observation.humidity_pct - prior).abs() > HUMIDITY_DELTA_THRESHOLD);
    if temp_jump || humidity_jump {
        return ChangeKind::SensorDelta;
    }
    ChangeKind::Periodic
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{InputFlags, OutputFlags};

    fn heartbeat(temperature_c: f32, humidity_pct: f32, inputs: InputFlags) -> HeartbeatObservation {
        HeartbeatObservation {
            timestamp: 1_700_000_000,
            reported_id: 1,
            uptime_s: 600,
            free_heap: 180_000,
            rssi: -61,
            temperature_c,
            humidity_pct,
            inputs,
            outputs: OutputFlags::default(),
            error_flags: 0,
        }
    }

    fn snapshot(temperature_c: f32, humidity_pct: f32) -> DeviceSnapshot {
        DeviceSnapshot {
            hostname: "panel-01".to_string(),
            device_id: 1,
            sensors: domain::SensorReadings {
                temperature_c: Some(temperature_c),
                humidity_pct: Some(humidity_pct),
            },
            ..DeviceSnapshot::default()
        }
    }

    #[test]
    fn first_sample_is_periodic() {
        let observation = heartbeat(21.0, 40.0, InputFlags::default());
        assert_eq!(classify_change(None, &observation), ChangeKind::Periodic);
    }

    #[test]
    fn input_flip_wins_over_sensor_jump() {
        let prior = snapshot(21.0, 40.0);
        let observation = heartbeat(
            30.0,
            40.0,
            InputFlags {
                panic1: true,
                ..InputFlags::default()
            },
        );
        assert_eq!(
            classify_change(Some(&prior), &observation),
            ChangeKind::AlarmTransition
        );
    }

    #[test]
    fn sensor_thresholds_are_exclusive() {
        let prior = snapshot(21.0, 40.0);
        // 恰好 2°C / 5% 不算显著变化
        let observation = heartbeat(23.0, 45.0, InputFlags::default());
        assert_eq!(
            classify_change(Some(&prior), &observation),
            ChangeKind::Periodic
        );
        let observation = heartbeat(23.1, 40.0, InputFlags::default());
        assert_eq!(
            classify_change(Some(&prior), &observation),
            ChangeKind::SensorDelta
        );
        let observation = heartbeat(21.0, 45.6, InputFlags::default());
        assert_eq!(
            classify_change(Some(&prior), &observation),
            ChangeKind::SensorDelta
        );
    }
}
