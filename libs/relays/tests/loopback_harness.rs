//! End-to-end runs over the loopback host

use relays::types::{ControlRequest, DevicePowerState, Oid, Packet, PnpEvent, Status};
use relays::{LoopbackHost, RelayConfig, RelayDriver};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test_log::test]
fn test_frames_are_echoed_and_returned() {
    let host = LoopbackHost::new();
    let config = RelayConfig::compact_defaults().with_binding("lower0", "relay0");
    let driver = RelayDriver::register(host.clone(), config).unwrap();
    let adapter = driver.bind("lower0").unwrap();

    for seq in 0u8..20 {
        let packet = if seq % 3 == 0 {
            Packet::from_frame(vec![seq; 60]).with_stack_remaining(0)
        } else {
            Packet::from_frame(vec![seq; 60])
        };
        assert!(adapter.send(packet).is_pending());
    }
    wait_until("sends to complete", || adapter.outstanding_sends() == 0);
    wait_until("echoes to be delivered", || host.counters().packets_received == 20);
    wait_until("echoes to be returned", || host.counters().packets_returned == 20);

    let counters = host.counters();
    assert_eq!(counters.sends_completed, 20);
    assert_eq!(counters.send_failures, 0);
    assert_eq!(counters.frames_echoed, 20);
    // The counting upper edge keeps nothing
    assert_eq!(counters.packets_returned, 20);

    assert_eq!(driver.unbind(&adapter), Status::Success);
    host.join_workers();
    assert!(adapter.is_released());
}

#[test_log::test]
fn test_query_and_power_cycle() {
    let host = LoopbackHost::new();
    let config = RelayConfig::compact_defaults().with_binding("lower0", "relay0");
    let driver = RelayDriver::register(host.clone(), config).unwrap();
    let adapter = driver.bind("lower0").unwrap();

    let submitted = adapter
        .submit_request(ControlRequest::query(Oid::GEN_LINK_SPEED, 4))
        .unwrap();
    assert!(submitted.is_pending());
    wait_until("request completion", || host.counters().requests_completed == 1);

    assert_eq!(
        driver.pnp_event(Some(&adapter), PnpEvent::SetPower(DevicePowerState::D3)),
        Status::Success
    );
    assert_eq!(adapter.send(Packet::from_frame(vec![0u8; 60])).status(), Status::Failure);
    driver.pnp_event(Some(&adapter), PnpEvent::SetPower(DevicePowerState::D0));
    assert!(adapter.send(Packet::from_frame(vec![0u8; 60])).is_pending());

    wait_until("send after wake", || host.counters().sends_completed == 1);
    assert_eq!(host.counters().pnp_events, 2);

    driver.unbind(&adapter);
    host.join_workers();
}

#[test_log::test]
fn test_sample_config_binds_every_device() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/relay.toml");
    let config = RelayConfig::from_file(&path).unwrap();
    let devices: Vec<String> = config.bindings.iter().map(|b| b.device.clone()).collect();

    let host = LoopbackHost::new();
    let driver = RelayDriver::register(host.clone(), config).unwrap();
    let adapters: Vec<_> = devices.iter().map(|d| driver.bind(d).unwrap()).collect();
    assert_eq!(driver.attached_adapters().len(), devices.len());

    for adapter in &adapters {
        driver.unbind(adapter);
    }
    host.join_workers();
    assert!(driver.attached_adapters().is_empty());
}
