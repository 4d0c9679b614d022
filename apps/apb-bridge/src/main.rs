//! 报警主机接入网关（唯一运行时二进制）。
//!
//! 接线顺序：配置 → 日志 → 帧编解码器 → 存储 → 控制链路 →
//! 实时快照 → 处理管线 → MQTT 接入，最后等待 ctrl-c 优雅退出。

use apb_config::AppConfig;
use apb_control::{
    spawn_queue_pruner, CommandService, CommandServiceConfig, MqttDispatcher, MqttDispatcherConfig,
};
use apb_ingest::{MqttSource, MqttSourceConfig, Source};
use apb_pipeline::{IdentityResolver, Router};
use apb_protocol::FrameCodec;
use apb_realtime::{spawn_offline_sweeper, LiveStore};
use apb_storage::{
    InMemoryAlarmEventStore, InMemoryCommandLogStore, InMemoryDeviceStore, InMemoryTelemetryStore,
};
use apb_telemetry::{init_tracing, StageFeed};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let codec = FrameCodec::new(&config.frame_key)?;

    // 持久化边界：内存实现（关系型实现由外部协作方接入）
    let devices = Arc::new(InMemoryDeviceStore::new());
    let alarms = Arc::new(InMemoryAlarmEventStore::new());
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let command_log = Arc::new(InMemoryCommandLogStore::new());

    // 控制链路：命令发布 + 响应关联
    let (dispatcher, dispatch_handle) = MqttDispatcher::connect(MqttDispatcherConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_base: config.topic_base.clone(),
        qos: config.command_qos,
    })?;
    let control = Arc::new(CommandService::new(
        codec.clone(),
        Arc::new(dispatcher),
        command_log.clone(),
        CommandServiceConfig {
            auth_level: config.command_auth_level,
            response_timeout_ms: config.command_timeout_ms,
            dedup_window_ms: config.command_dedup_window_ms,
        },
    ));
    let pruner_handle = spawn_queue_pruner(
        control.clone(),
        config.queue_prune_interval_ms,
        config.queue_stale_after_ms,
    );

    // 实时快照 + 离线检测
    let live = Arc::new(LiveStore::new(config.alarm_buffer_capacity));
    let sweeper_handle = spawn_offline_sweeper(
        live.clone(),
        config.offline_timeout_ms,
        config.offline_sweep_interval_ms,
    );

    // 处理管线
    let resolver = IdentityResolver::new(
        devices.clone(),
        control.clone(),
        live.clone(),
        config.login_dedup_window_ms,
    );
    let router = Router::new(
        codec,
        devices,
        alarms,
        telemetry,
        control,
        live,
        resolver,
        StageFeed::default(),
    );

    // MQTT 接入
    let source = MqttSource::new(MqttSourceConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_base: config.topic_base.clone(),
    });
    info!(
        target: "apb.bridge",
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        topic_base = %config.topic_base,
        "bridge_started"
    );
    let mut ingest_handle = tokio::spawn(async move { source.run(Arc::new(router)).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(target: "apb.bridge", "shutdown_requested");
        }
        result = &mut ingest_handle => {
            match result {
                Ok(Err(err)) => warn!(target: "apb.bridge", error = %err, "ingest_stopped"),
                Ok(Ok(())) => info!(target: "apb.bridge", "ingest_finished"),
                Err(err) => warn!(target: "apb.bridge", error = %err, "ingest_task_failed"),
            }
        }
    }

    // 退出前回收后台任务，避免定时器在拆线后继续触发
    ingest_handle.abort();
    sweeper_handle.abort();
    pruner_handle.abort();
    dispatch_handle.abort();
    info!(target: "apb.bridge", "bridge_stopped");
    Ok(())
}
