//! 消息层编解码
//!
//! 线上消息与领域类型之间的唯一转换点：
//! - 数值枚举做总映射，超出范围一律兜底为 Unknown（解码绝不因此失败）
//! - 字段命名在此统一规范化，处理器不感知线上投影差异

use crate::error::ProtocolError;
use crate::types::{
    AlarmObservation, CommandReply, ConfigPayload, ConfigSection, DiagnosticAction,
    DisconnectReason, EnvelopeFields, HeartbeatObservation, LastWillObservation, OutboundCommand,
    StatusObservation, SystemAction,
};
use crate::wire;
use domain::{
    AlarmPriority, AlarmRecord, AlarmState, AlarmType, InputFlags, OutputFlags, OutputKind,
    OutputPattern,
};
use prost::Message;
use uuid::Uuid;

// ---- 线上枚举 → 领域枚举（总映射，Unknown 兜底） ----

fn alarm_type_from_wire(value: i32) -> AlarmType {
    match value {
        0 => AlarmType::Panic1,
        1 => AlarmType::Panic2,
        2 => AlarmType::Tamper,
        3 => AlarmType::Siren,
        4 => AlarmType::Turret,
        _ => AlarmType::Unknown,
    }
}

fn alarm_state_from_wire(value: i32) -> AlarmState {
    match value {
        0 => AlarmState::Inactive,
        1 => AlarmState::Active,
        _ => AlarmState::Unknown,
    }
}

fn alarm_priority_from_wire(value: i32) -> AlarmPriority {
    match value {
        0 => AlarmPriority::Low,
        1 => AlarmPriority::Normal,
        2 => AlarmPriority::High,
        3 => AlarmPriority::Critical,
        _ => AlarmPriority::Unknown,
    }
}

fn output_kind_from_wire(value: i32) -> OutputKind {
    match value {
        0 => OutputKind::Siren,
        1 => OutputKind::Turret,
        _ => OutputKind::Unknown,
    }
}

fn output_kind_to_wire(value: OutputKind) -> i32 {
    match value {
        OutputKind::Siren => 0,
        OutputKind::Turret => 1,
        OutputKind::Unknown => -1,
    }
}

fn pattern_from_wire(value: i32) -> OutputPattern {
    match value {
        0 => OutputPattern::Steady,
        1 => OutputPattern::Pulse,
        2 => OutputPattern::Strobe,
        _ => OutputPattern::Unknown,
    }
}

fn pattern_to_wire(value: OutputPattern) -> i32 {
    match value {
        OutputPattern::Steady => 0,
        OutputPattern::Pulse => 1,
        OutputPattern::Strobe => 2,
        OutputPattern::Unknown => -1,
    }
}

fn system_action_from_wire(value: i32) -> SystemAction {
    match value {
        0 => SystemAction::Reboot,
        1 => SystemAction::FactoryReset,
        2 => SystemAction::Sleep,
        _ => SystemAction::Unknown,
    }
}

fn system_action_to_wire(value: SystemAction) -> i32 {
    match value {
        SystemAction::Reboot => 0,
        SystemAction::FactoryReset => 1,
        SystemAction::Sleep => 2,
        SystemAction::Unknown => -1,
    }
}

fn diagnostic_action_from_wire(value: i32) -> DiagnosticAction {
    match value {
        0 => DiagnosticAction::SelfTest,
        1 => DiagnosticAction::ReportStatus,
        _ => DiagnosticAction::Unknown,
    }
}

fn diagnostic_action_to_wire(value: DiagnosticAction) -> i32 {
    match value {
        DiagnosticAction::SelfTest => 0,
        DiagnosticAction::ReportStatus => 1,
        DiagnosticAction::Unknown => -1,
    }
}

fn config_section_from_wire(value: i32) -> ConfigSection {
    match value {
        0 => ConfigSection::Wifi,
        1 => ConfigSection::Mqtt,
        2 => ConfigSection::Device,
        3 => ConfigSection::Location,
        4 => ConfigSection::Ntp,
        5 => ConfigSection::Ble,
        6 => ConfigSection::All,
        _ => ConfigSection::Unknown,
    }
}

fn config_section_to_wire(value: ConfigSection) -> i32 {
    match value {
        ConfigSection::Wifi => 0,
        ConfigSection::Mqtt => 1,
        ConfigSection::Device => 2,
        ConfigSection::Location => 3,
        ConfigSection::Ntp => 4,
        ConfigSection::Ble => 5,
        ConfigSection::All => 6,
        ConfigSection::Unknown => -1,
    }
}

fn disconnect_reason_from_wire(value: i32) -> DisconnectReason {
    match value {
        0 => DisconnectReason::Unexpected,
        1 => DisconnectReason::PowerLoss,
        2 => DisconnectReason::FirmwareUpdate,
        _ => DisconnectReason::Unknown,
    }
}

fn request_id_from_wire(bytes: &[u8]) -> Result<Uuid, ProtocolError> {
    Uuid::from_slice(bytes).map_err(|_| ProtocolError::RequestId(format!("{} bytes", bytes.len())))
}

fn mac_from_wire(bytes: &[u8]) -> Result<[u8; 6], ProtocolError> {
    if bytes.len() != 6 {
        return Err(ProtocolError::MacAddress(bytes.len()));
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(bytes);
    Ok(mac)
}

// ---- 命令信封 ----

fn command_to_wire(command: &OutboundCommand) -> wire::command_envelope::Command {
    use wire::command_envelope::Command;
    match command {
        OutboundCommand::System { action, delay_s } => Command::System(wire::SystemCommand {
            action: system_action_to_wire(*action),
            delay_s: *delay_s,
        }),
        OutboundCommand::Config(payload) => Command::Config(wire::ConfigCommand {
            section: Some(config_payload_to_wire(payload)),
        }),
        OutboundCommand::Output {
            output,
            activate,
            pattern,
            duration_on_ms,
            duration_off_ms,
        } => Command::Output(wire::OutputCommand {
            output: output_kind_to_wire(*output),
            activate: *activate,
            pattern: pattern_to_wire(*pattern),
            duration_on_ms: *duration_on_ms,
            duration_off_ms: *duration_off_ms,
        }),
        OutboundCommand::Diagnostic { action } => Command::Diagnostic(wire::DiagnosticCommand {
            action: diagnostic_action_to_wire(*action),
        }),
        OutboundCommand::Ota {
            url,
            version,
            checksum,
        } => Command::Ota(wire::OtaCommand {
            url: url.clone(),
            version: version.clone(),
            checksum: checksum.clone(),
        }),
        OutboundCommand::ConfigRead { section } => Command::ConfigRead(wire::ConfigReadCommand {
            section: config_section_to_wire(*section),
        }),
    }
}

fn config_payload_to_wire(payload: &ConfigPayload) -> wire::config_command::Section {
    use wire::config_command::Section;
    match payload {
        ConfigPayload::Wifi { ssid, password } => Section::Wifi(wire::WifiConfig {
            ssid: ssid.clone(),
            password: password.clone(),
        }),
        ConfigPayload::Mqtt {
            host,
            port,
            username,
            password,
        } => Section::Mqtt(wire::MqttConfig {
            host: host.clone(),
            port: u32::from(*port),
            username: username.clone(),
            password: password.clone(),
        }),
        ConfigPayload::Device {
            device_id,
            hostname,
        } => Section::Device(wire::DeviceConfig {
            device_id: *device_id,
            hostname: hostname.clone(),
        }),
        ConfigPayload::Location {
            site,
            zone,
            latitude,
            longitude,
        } => Section::Location(wire::LocationConfig {
            site: site.clone(),
            zone: zone.clone(),
            latitude: *latitude,
            longitude: *longitude,
        }),
        ConfigPayload::Ntp {
            server,
            sync_interval_s,
        } => Section::Ntp(wire::NtpConfig {
            server: server.clone(),
            sync_interval_s: *sync_interval_s,
        }),
        ConfigPayload::Ble { enabled, tx_power } => Section::Ble(wire::BleConfig {
            enabled: *enabled,
            tx_power: *tx_power,
        }),
    }
}

fn command_from_wire(
    command: wire::command_envelope::Command,
) -> Result<OutboundCommand, ProtocolError> {
    use wire::command_envelope::Command;
    Ok(match command {
        Command::System(inner) => OutboundCommand::System {
            action: system_action_from_wire(inner.action),
            delay_s: inner.delay_s,
        },
        Command::Config(inner) => {
            let section = inner.section.ok_or(ProtocolError::MissingCommand)?;
            OutboundCommand::Config(config_payload_from_wire(section))
        }
        Command::Output(inner) => OutboundCommand::Output {
            output: output_kind_from_wire(inner.output),
            activate: inner.activate,
            pattern: pattern_from_wire(inner.pattern),
            duration_on_ms: inner.duration_on_ms,
            duration_off_ms: inner.duration_off_ms,
        },
        Command::Diagnostic(inner) => OutboundCommand::Diagnostic {
            action: diagnostic_action_from_wire(inner.action),
        },
        Command::Ota(inner) => OutboundCommand::Ota {
            url: inner.url,
            version: inner.version,
            checksum: inner.checksum,
        },
        Command::ConfigRead(inner) => OutboundCommand::ConfigRead {
            section: config_section_from_wire(inner.section),
        },
    })
}

fn config_payload_from_wire(section: wire::config_command::Section) -> ConfigPayload {
    use wire::config_command::Section;
    match section {
        Section::Wifi(inner) => ConfigPayload::Wifi {
            ssid: inner.ssid,
            password: inner.password,
        },
        Section::Mqtt(inner) => ConfigPayload::Mqtt {
            host: inner.host,
            port: inner.port.min(u32::from(u16::MAX)) as u16,
            username: inner.username,
            password: inner.password,
        },
        Section::Device(inner) => ConfigPayload::Device {
            device_id: inner.device_id,
            hostname: inner.hostname,
        },
        Section::Location(inner) => ConfigPayload::Location {
            site: inner.site,
            zone: inner.zone,
            latitude: inner.latitude,
            longitude: inner.longitude,
        },
        Section::Ntp(inner) => ConfigPayload::Ntp {
            server: inner.server,
            sync_interval_s: inner.sync_interval_s,
        },
        Section::Ble(inner) => ConfigPayload::Ble {
            enabled: inner.enabled,
            tx_power: inner.tx_power,
        },
    }
}

/// 编码命令信封。
pub fn encode_envelope(
    sequence: u32,
    timestamp: u32,
    request_id: Uuid,
    auth_level: u8,
    command: &OutboundCommand,
) -> Vec<u8> {
    let envelope = wire::CommandEnvelope {
        sequence,
        timestamp,
        request_id: request_id.as_bytes().to_vec(),
        auth_level: u32::from(auth_level),
        command: Some(command_to_wire(command)),
    };
    envelope.encode_to_vec()
}

/// 解码命令信封（测试与诊断工具使用）。
pub fn decode_envelope(bytes: &[u8]) -> Result<EnvelopeFields, ProtocolError> {
    let envelope = wire::CommandEnvelope::decode(bytes)?;
    let command = envelope.command.ok_or(ProtocolError::MissingCommand)?;
    Ok(EnvelopeFields {
        sequence: envelope.sequence,
        timestamp: envelope.timestamp,
        request_id: request_id_from_wire(&envelope.request_id)?,
        auth_level: envelope.auth_level.min(u32::from(u8::MAX)) as u8,
        command: command_from_wire(command)?,
    })
}

// ---- 上行消息 ----

/// 解码命令响应。
pub fn decode_response(bytes: &[u8]) -> Result<CommandReply, ProtocolError> {
    let response = wire::CommandResponse::decode(bytes)?;
    Ok(CommandReply {
        request_id: request_id_from_wire(&response.request_id)?,
        timestamp: response.timestamp,
        success: response.success,
        error_code: response.error_code,
        message: response.message,
        payload: response.payload,
    })
}

/// 编码命令响应（测试中模拟设备侧）。
pub fn encode_response(reply: &CommandReply) -> Vec<u8> {
    let response = wire::CommandResponse {
        request_id: reply.request_id.as_bytes().to_vec(),
        timestamp: reply.timestamp,
        success: reply.success,
        error_code: reply.error_code,
        message: reply.message.clone(),
        payload: reply.payload.clone(),
    };
    response.encode_to_vec()
}

/// 解码心跳消息。
pub fn decode_heartbeat(bytes: &[u8]) -> Result<HeartbeatObservation, ProtocolError> {
    let heartbeat = wire::Heartbeat::decode(bytes)?;
    Ok(HeartbeatObservation {
        timestamp: heartbeat.timestamp,
        reported_id: heartbeat.device_id,
        uptime_s: heartbeat.uptime_s,
        free_heap: heartbeat.free_heap,
        rssi: heartbeat.rssi,
        temperature_c: heartbeat.temperature,
        humidity_pct: heartbeat.humidity,
        inputs: InputFlags {
            panic1: heartbeat.panic1,
            panic2: heartbeat.panic2,
            tamper: heartbeat.tamper,
        },
        outputs: OutputFlags {
            siren: heartbeat.siren,
            turret: heartbeat.turret,
        },
        error_flags: heartbeat.error_flags,
    })
}

/// 解码状态上报（login 与 status 共用）。
pub fn decode_status(bytes: &[u8]) -> Result<StatusObservation, ProtocolError> {
    let status = wire::StatusReport::decode(bytes)?;
    Ok(StatusObservation {
        mac: mac_from_wire(&status.mac)?,
        hostname: status.hostname,
        reported_id: status.device_id,
        firmware: status.firmware,
        boot_count: status.boot_count,
        ip: status.ip,
        ssid: status.ssid,
        rssi: status.rssi,
        temperature_c: status.temperature,
        humidity_pct: status.humidity,
        inputs: InputFlags {
            panic1: status.panic1,
            panic2: status.panic2,
            tamper: status.tamper,
        },
        outputs: OutputFlags {
            siren: status.siren,
            turret: status.turret,
        },
        error_flags: status.error_flags,
        uptime_s: status.uptime_s,
    })
}

/// 解码报警事件。
///
/// 输出相关字段仅在输出类事件上有意义，输入类事件置 None。
pub fn decode_alarm(bytes: &[u8]) -> Result<AlarmObservation, ProtocolError> {
    let alarm = wire::AlarmEventMsg::decode(bytes)?;
    let alarm_type = alarm_type_from_wire(alarm.alarm_type);
    let is_output = alarm_type.is_output();
    Ok(AlarmObservation {
        reported_id: alarm.device_id,
        record: AlarmRecord {
            sequence: alarm.sequence,
            timestamp: alarm.timestamp,
            alarm_type,
            state: alarm_state_from_wire(alarm.state),
            priority: alarm_priority_from_wire(alarm.priority),
            physical_state: alarm.physical_state,
            output_type: is_output.then(|| output_kind_from_wire(alarm.output_type)),
            pattern: is_output.then(|| pattern_from_wire(alarm.pattern)),
            duration_on_ms: is_output.then_some(alarm.duration_on_ms),
            duration_off_ms: is_output.then_some(alarm.duration_off_ms),
        },
    })
}

/// 解码遗言消息。
pub fn decode_last_will(bytes: &[u8]) -> Result<LastWillObservation, ProtocolError> {
    let last_will = wire::LastWill::decode(bytes)?;
    Ok(LastWillObservation {
        timestamp: last_will.timestamp,
        reported_id: last_will.device_id,
        reason: disconnect_reason_from_wire(last_will.reason),
    })
}
