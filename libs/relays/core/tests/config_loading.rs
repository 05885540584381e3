//! Loading `RelayConfig` from TOML files on disk

use relay_core::{BindingConfig, RelayConfig, RelayError};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_full_config_from_file() {
    let file = write_config(
        r#"
[pools]
min_packets = 8
max_packets = 64

[receive]
batch_capacity = 16

[power]
quiescence_poll_ms = 5
warn_after_polls = 100

[[bindings]]
device = "lower0"
upper_binding = "relay0"

[[bindings]]
device = "lower1"
upper_binding = "relay1"
"#,
    );

    let config = RelayConfig::from_file(file.path()).unwrap();
    assert_eq!(config.pools.min_packets, 8);
    assert_eq!(config.pools.max_packets, 64);
    assert_eq!(config.receive.batch_capacity, 16);
    assert_eq!(config.power.poll_interval().as_millis(), 5);
    assert_eq!(config.upper_binding("lower1").as_deref(), Some("relay1"));
    assert_eq!(config.upper_binding("lower2"), None);
}

#[test]
fn test_empty_file_gives_defaults() {
    let file = write_config("");
    let config = RelayConfig::from_file(file.path()).unwrap();

    let defaults = RelayConfig::default();
    assert_eq!(config.pools.max_packets, defaults.pools.max_packets);
    assert_eq!(config.receive.batch_capacity, defaults.receive.batch_capacity);
    assert!(config.bindings.is_empty());
}

#[test]
fn test_duplicate_device_rejected() {
    let file = write_config(
        r#"
[[bindings]]
device = "lower0"
upper_binding = "relay0"

[[bindings]]
device = "lower0"
upper_binding = "relay1"
"#,
    );

    assert!(matches!(RelayConfig::from_file(file.path()), Err(RelayError::Config(_))));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RelayConfig::from_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(RelayError::Config(_))));
}
