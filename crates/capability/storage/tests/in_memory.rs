use apb_storage::{
    CommandLogRecord, CommandLogStore, CommandResponseRecord, DeviceStore,
    InMemoryCommandLogStore, InMemoryDeviceStore, NewDevice,
};
use domain::{CommandKind, CommandStatus, CounterField, DeviceDelta};
use uuid::Uuid;

#[tokio::test]
async fn device_create_assigns_sequential_ids() {
    let store = InMemoryDeviceStore::new();
    let first = store
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:22".to_string(),
            hostname: "panel-01".to_string(),
        })
        .await
        .expect("create device");
    let second = store
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:23".to_string(),
            hostname: "panel-02".to_string(),
        })
        .await
        .expect("create device");

    assert_eq!(first.device_id, 1);
    assert_eq!(second.device_id, 2);

    let found = store
        .find_by_mac("aa:bb:cc:00:11:22")
        .await
        .expect("find by mac");
    assert_eq!(found, Some(first.clone()));
    let found = store.find_by_id(2).await.expect("find by id");
    assert_eq!(found, Some(second));
}

#[tokio::test]
async fn duplicate_mac_is_rejected() {
    let store = InMemoryDeviceStore::new();
    store
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:22".to_string(),
            hostname: "panel-01".to_string(),
        })
        .await
        .expect("create device");
    let result = store
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:22".to_string(),
            hostname: "panel-01b".to_string(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn counters_increment_per_field() {
    let store = InMemoryDeviceStore::new();
    let device = store
        .create_device(NewDevice {
            mac_address: "aa:bb:cc:00:11:22".to_string(),
            hostname: "panel-01".to_string(),
        })
        .await
        .expect("create device");

    store
        .increment_counter(device.device_id, CounterField::Panic1)
        .await
        .expect("increment");
    store
        .increment_counter(device.device_id, CounterField::Panic1)
        .await
        .expect("increment");
    store
        .increment_counter(device.device_id, CounterField::Tamper)
        .await
        .expect("increment");

    assert_eq!(store.counter(device.device_id, CounterField::Panic1), 2);
    assert_eq!(store.counter(device.device_id, CounterField::Tamper), 1);
    assert_eq!(store.counter(device.device_id, CounterField::Disconnect), 0);
}

#[tokio::test]
async fn status_update_requires_known_device() {
    let store = InMemoryDeviceStore::new();
    let result = store.update_status(404, &DeviceDelta::online()).await;
    assert!(result.is_err());
    assert_eq!(store.status_update_count(), 0);
}

#[tokio::test]
async fn command_log_status_transitions() {
    let store = InMemoryCommandLogStore::new();
    let request_id = Uuid::new_v4();
    store
        .log_command(CommandLogRecord {
            request_id,
            device_id: 1,
            hostname: "panel-01".to_string(),
            kind: CommandKind::Output,
            status: CommandStatus::Sent,
            issued_at_ms: 1_000,
        })
        .await
        .expect("log command");

    let updated = store
        .update_command_status(request_id, CommandStatus::Timeout)
        .await
        .expect("update status");
    assert_eq!(updated.map(|item| item.status), Some(CommandStatus::Timeout));

    let missing = store
        .update_command_status(Uuid::new_v4(), CommandStatus::Success)
        .await
        .expect("update status");
    assert!(missing.is_none());
}

#[tokio::test]
async fn orphan_response_is_archived() {
    let store = InMemoryCommandLogStore::new();
    store
        .save_response(CommandResponseRecord {
            request_id: Uuid::new_v4(),
            device_id: None,
            success: true,
            error_code: 0,
            message: "late".to_string(),
            timestamp: 1_700_000_000,
            received_at_ms: 2_000,
        })
        .await
        .expect("save response");
    assert_eq!(store.response_count(), 1);
}

#[tokio::test]
async fn list_commands_newest_first_with_limit() {
    let store = InMemoryCommandLogStore::new();
    for issued_at_ms in [100i64, 300, 200] {
        store
            .log_command(CommandLogRecord {
                request_id: Uuid::new_v4(),
                device_id: 1,
                hostname: "panel-01".to_string(),
                kind: CommandKind::System,
                status: CommandStatus::Sent,
                issued_at_ms,
            })
            .await
            .expect("log command");
    }
    let items = store.list_commands(1, 2).await.expect("list");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].issued_at_ms, 300);
    assert_eq!(items[1].issued_at_ms, 200);
}
