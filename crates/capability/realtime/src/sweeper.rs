//! 离线检测扫描任务。

use std::sync::Arc;
use std::time::Duration;

use apb_telemetry::now_epoch_ms;
use tokio::task::JoinHandle;
use tracing::info;

use crate::store::LiveStore;

/// 启动离线检测扫描任务。
///
/// 每个扫描周期检查一次全部在线设备，静默超过 `timeout_ms`
/// 的设备被标记离线并广播 [`domain::DeviceEvent::Offline`]。
pub fn spawn_offline_sweeper(
    store: Arc<LiveStore>,
    timeout_ms: u64,
    interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let marked = store.mark_offline_stale(now_epoch_ms(), timeout_ms);
            for (hostname, last_seen_ms) in marked {
                apb_telemetry::record_device_offline();
                info!(
                    target: "apb.realtime",
                    hostname = %hostname,
                    last_seen_ms,
                    "device_marked_offline"
                );
            }
        }
    })
}
