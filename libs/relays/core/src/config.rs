//! # Relay Configuration
//!
//! ## Purpose
//! Sizing and timing knobs for every adapter plus the binding table that maps
//! each lower device to the upper-edge instance exported for it.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [pools]
//! min_packets = 32        # descriptors pre-allocated per pool
//! max_packets = 255       # hard ceiling per pool
//!
//! [receive]
//! batch_capacity = 8      # received packets held before an upward indication
//!
//! [power]
//! quiescence_poll_ms = 2  # sleep between quiescence checks on power-down
//! warn_after_polls = 500  # log a warning every N polls while still draining
//!
//! [[bindings]]
//! device = "lower0"
//! upper_binding = "relay0"
//! ```
//!
//! Every section is optional; missing values fall back to the defaults above.

use crate::error::{RelayError, RelayResult};
use crate::host::BindingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
#[cfg(feature = "config-files")]
use std::path::Path;
use std::time::Duration;

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub pools: PoolSettings,
    pub receive: ReceiveSettings,
    pub power: PowerSettings,
    pub bindings: Vec<BindingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub min_packets: usize,
    pub max_packets: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_packets: 32,
            max_packets: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveSettings {
    pub batch_capacity: usize,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self { batch_capacity: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerSettings {
    pub quiescence_poll_ms: u64,
    pub warn_after_polls: u64,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            quiescence_poll_ms: 2,
            warn_after_polls: 500,
        }
    }
}

impl PowerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.quiescence_poll_ms)
    }
}

/// One lower device and the upper-edge instance exported on top of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub device: String,
    pub upper_binding: String,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    #[cfg(feature = "config-files")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(contents: &str) -> RelayResult<Self> {
        let config: RelayConfig = toml::from_str(contents)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Small pools and a short batch; handy for tests and the loopback harness
    pub fn compact_defaults() -> Self {
        Self {
            pools: PoolSettings {
                min_packets: 4,
                max_packets: 16,
            },
            receive: ReceiveSettings { batch_capacity: 4 },
            power: PowerSettings {
                quiescence_poll_ms: 1,
                warn_after_polls: 1000,
            },
            bindings: Vec::new(),
        }
    }

    /// Builder-style helper adding a binding entry
    pub fn with_binding(mut self, device: impl Into<String>, upper_binding: impl Into<String>) -> Self {
        self.bindings.push(BindingEntry {
            device: device.into(),
            upper_binding: upper_binding.into(),
        });
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> RelayResult<()> {
        if self.pools.min_packets == 0 {
            return Err(RelayError::Config("pools.min_packets must be > 0".to_string()));
        }

        if self.pools.max_packets < self.pools.min_packets {
            return Err(RelayError::Config(
                "pools.max_packets must be >= pools.min_packets".to_string(),
            ));
        }

        if self.receive.batch_capacity == 0 {
            return Err(RelayError::Config(
                "receive.batch_capacity must be > 0".to_string(),
            ));
        }

        if self.power.quiescence_poll_ms == 0 {
            return Err(RelayError::Config(
                "power.quiescence_poll_ms must be > 0".to_string(),
            ));
        }

        if self.power.warn_after_polls == 0 {
            return Err(RelayError::Config(
                "power.warn_after_polls must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.bindings {
            if entry.device.is_empty() || entry.upper_binding.is_empty() {
                return Err(RelayError::Config(
                    "bindings entries need a device and an upper_binding".to_string(),
                ));
            }
            if !seen.insert(entry.device.as_str()) {
                return Err(RelayError::Config(format!(
                    "duplicate binding for device '{}'",
                    entry.device
                )));
            }
        }

        Ok(())
    }
}

impl BindingConfig for RelayConfig {
    fn upper_binding(&self, device: &str) -> Option<String> {
        self.bindings
            .iter()
            .find(|entry| entry.device == device)
            .map(|entry| entry.upper_binding.clone())
    }
}
