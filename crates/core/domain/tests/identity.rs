use domain::{DeviceIdentity, format_mac, parse_mac};

#[test]
fn identity_sync_state() {
    let mut identity = DeviceIdentity {
        mac_address: [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22],
        hostname: "panel-01".to_string(),
        backend_id: 42,
        reported_id: 0,
    };
    assert!(!identity.is_synced());

    identity.reported_id = 42;
    assert!(identity.is_synced());
}

#[test]
fn mac_round_trip() {
    let mac = [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22];
    let text = format_mac(&mac);
    assert_eq!(text, "aa:bb:cc:00:11:22");
    assert_eq!(parse_mac(&text), Some(mac));
}

#[test]
fn mac_parse_rejects_malformed() {
    assert_eq!(parse_mac("aa:bb:cc"), None);
    assert_eq!(parse_mac("aa:bb:cc:00:11:22:33"), None);
    assert_eq!(parse_mac("zz:bb:cc:00:11:22"), None);
}

#[test]
fn message_kind_aliases() {
    use domain::MessageKind;
    assert_eq!(MessageKind::parse("resp"), Some(MessageKind::Response));
    assert_eq!(MessageKind::parse("response"), Some(MessageKind::Response));
    assert_eq!(MessageKind::parse("hb"), Some(MessageKind::Heartbeat));
    assert_eq!(MessageKind::parse("bogus"), None);
}
