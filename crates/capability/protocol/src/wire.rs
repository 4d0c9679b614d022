//! 线上消息结构（protobuf）
//!
//! schema 固定且较小，直接手写 prost derive 结构体，不引入 build.rs。
//! 字段编号与设备固件侧 .proto 一致，不可改动。
//!
//! 枚举字段一律以原始 `int32` 承载，由 `codec` 做总映射归一，
//! 超出范围的值在映射处兜底为 Unknown，解码本身不会失败。

/// 下行命令信封。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandEnvelope {
    /// 帧序号（与外层帧一致，便于固件侧对账）
    #[prost(uint32, tag = "1")]
    pub sequence: u32,
    /// 下发时间（unix 秒）
    #[prost(uint32, tag = "2")]
    pub timestamp: u32,
    /// 请求标识（16 字节 UUID）
    #[prost(bytes = "vec", tag = "3")]
    pub request_id: Vec<u8>,
    /// 权限级别
    #[prost(uint32, tag = "4")]
    pub auth_level: u32,
    /// 命令变体（oneof，恰好一个）
    #[prost(oneof = "command_envelope::Command", tags = "10, 11, 12, 13, 14, 15")]
    pub command: Option<command_envelope::Command>,
}

pub mod command_envelope {
    /// 命令 oneof 变体。
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Command {
        #[prost(message, tag = "10")]
        System(super::SystemCommand),
        #[prost(message, tag = "11")]
        Config(super::ConfigCommand),
        #[prost(message, tag = "12")]
        Output(super::OutputCommand),
        #[prost(message, tag = "13")]
        Diagnostic(super::DiagnosticCommand),
        #[prost(message, tag = "14")]
        Ota(super::OtaCommand),
        #[prost(message, tag = "15")]
        ConfigRead(super::ConfigReadCommand),
    }
}

/// 系统命令（重启 / 恢复出厂 / 休眠）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SystemCommand {
    #[prost(int32, tag = "1")]
    pub action: i32,
    /// 延迟执行秒数
    #[prost(uint32, tag = "2")]
    pub delay_s: u32,
}

/// 配置命令（子 oneof：恰好一个配置段）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigCommand {
    #[prost(oneof = "config_command::Section", tags = "1, 2, 3, 4, 5, 6")]
    pub section: Option<config_command::Section>,
}

pub mod config_command {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Section {
        #[prost(message, tag = "1")]
        Wifi(super::WifiConfig),
        #[prost(message, tag = "2")]
        Mqtt(super::MqttConfig),
        #[prost(message, tag = "3")]
        Device(super::DeviceConfig),
        #[prost(message, tag = "4")]
        Location(super::LocationConfig),
        #[prost(message, tag = "5")]
        Ntp(super::NtpConfig),
        #[prost(message, tag = "6")]
        Ble(super::BleConfig),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WifiConfig {
    #[prost(string, tag = "1")]
    pub ssid: String,
    #[prost(string, tag = "2")]
    pub password: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MqttConfig {
    #[prost(string, tag = "1")]
    pub host: String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
    #[prost(string, tag = "3")]
    pub username: String,
    #[prost(string, tag = "4")]
    pub password: String,
}

/// 设备身份配置（身份同步命令的载体）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceConfig {
    /// 后端分配的设备 ID
    #[prost(int64, tag = "1")]
    pub device_id: i64,
    #[prost(string, tag = "2")]
    pub hostname: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LocationConfig {
    #[prost(string, tag = "1")]
    pub site: String,
    #[prost(string, tag = "2")]
    pub zone: String,
    #[prost(double, tag = "3")]
    pub latitude: f64,
    #[prost(double, tag = "4")]
    pub longitude: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NtpConfig {
    #[prost(string, tag = "1")]
    pub server: String,
    #[prost(uint32, tag = "2")]
    pub sync_interval_s: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BleConfig {
    #[prost(bool, tag = "1")]
    pub enabled: bool,
    #[prost(int32, tag = "2")]
    pub tx_power: i32,
}

/// 输出控制命令（警笛 / 警灯）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputCommand {
    #[prost(int32, tag = "1")]
    pub output: i32,
    /// true = 激活，false = 关闭
    #[prost(bool, tag = "2")]
    pub activate: bool,
    #[prost(int32, tag = "3")]
    pub pattern: i32,
    #[prost(uint32, tag = "4")]
    pub duration_on_ms: u32,
    #[prost(uint32, tag = "5")]
    pub duration_off_ms: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiagnosticCommand {
    #[prost(int32, tag = "1")]
    pub action: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OtaCommand {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub checksum: String,
}

/// 配置读取命令。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigReadCommand {
    #[prost(int32, tag = "1")]
    pub section: i32,
}

/// 命令响应（与 CommandEnvelope 按 request_id 1:1 关联）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub request_id: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub timestamp: u32,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(uint32, tag = "4")]
    pub error_code: u32,
    #[prost(string, tag = "5")]
    pub message: String,
    /// 可选附带数据（如 config-read 的配置内容）
    #[prost(bytes = "vec", tag = "6")]
    pub payload: Vec<u8>,
}

/// 报警事件消息。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AlarmEventMsg {
    #[prost(uint32, tag = "1")]
    pub sequence: u32,
    #[prost(uint32, tag = "2")]
    pub timestamp: u32,
    #[prost(int32, tag = "3")]
    pub alarm_type: i32,
    #[prost(int32, tag = "4")]
    pub state: i32,
    #[prost(int32, tag = "5")]
    pub priority: i32,
    #[prost(bool, tag = "6")]
    pub physical_state: bool,
    #[prost(int32, tag = "7")]
    pub output_type: i32,
    #[prost(int32, tag = "8")]
    pub pattern: i32,
    #[prost(uint32, tag = "9")]
    pub duration_on_ms: u32,
    #[prost(uint32, tag = "10")]
    pub duration_off_ms: u32,
    /// 设备当前认为的自身 ID（0 = 未同步）
    #[prost(int64, tag = "11")]
    pub device_id: i64,
}

/// 心跳消息（周期遥测）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(uint32, tag = "1")]
    pub timestamp: u32,
    #[prost(uint64, tag = "2")]
    pub uptime_s: u64,
    #[prost(uint32, tag = "3")]
    pub free_heap: u32,
    #[prost(int32, tag = "4")]
    pub rssi: i32,
    #[prost(float, tag = "5")]
    pub temperature: f32,
    #[prost(float, tag = "6")]
    pub humidity: f32,
    #[prost(bool, tag = "7")]
    pub panic1: bool,
    #[prost(bool, tag = "8")]
    pub panic2: bool,
    #[prost(bool, tag = "9")]
    pub tamper: bool,
    #[prost(bool, tag = "10")]
    pub siren: bool,
    #[prost(bool, tag = "11")]
    pub turret: bool,
    #[prost(uint32, tag = "12")]
    pub error_flags: u32,
    /// 设备当前认为的自身 ID（0 = 未同步）
    #[prost(int64, tag = "13")]
    pub device_id: i64,
}

/// 状态上报（login 与 status 共用同一 schema）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusReport {
    /// MAC 地址（6 字节）
    #[prost(bytes = "vec", tag = "1")]
    pub mac: Vec<u8>,
    #[prost(string, tag = "2")]
    pub hostname: String,
    /// 设备当前认为的自身 ID（0 = 未同步）
    #[prost(int64, tag = "3")]
    pub device_id: i64,
    #[prost(string, tag = "4")]
    pub firmware: String,
    #[prost(uint32, tag = "5")]
    pub boot_count: u32,
    #[prost(string, tag = "6")]
    pub ip: String,
    #[prost(string, tag = "7")]
    pub ssid: String,
    #[prost(int32, tag = "8")]
    pub rssi: i32,
    #[prost(float, tag = "9")]
    pub temperature: f32,
    #[prost(float, tag = "10")]
    pub humidity: f32,
    #[prost(bool, tag = "11")]
    pub panic1: bool,
    #[prost(bool, tag = "12")]
    pub panic2: bool,
    #[prost(bool, tag = "13")]
    pub tamper: bool,
    #[prost(bool, tag = "14")]
    pub siren: bool,
    #[prost(bool, tag = "15")]
    pub turret: bool,
    #[prost(uint32, tag = "16")]
    pub error_flags: u32,
    #[prost(uint64, tag = "17")]
    pub uptime_s: u64,
}

/// 遗言消息（broker 代发的断连通知）。
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LastWill {
    #[prost(uint32, tag = "1")]
    pub timestamp: u32,
    #[prost(int32, tag = "2")]
    pub reason: i32,
    /// 设备当前认为的自身 ID（0 = 未同步）
    #[prost(int64, tag = "3")]
    pub device_id: i64,
}
