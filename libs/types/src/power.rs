//! Device power states and the per-edge power phase tracked by the relay.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Device power state as carried by SetPower events and `OID_PNP_SET_POWER`
///
/// Ordering follows the host convention: anything greater than `D0` is a
/// low-power state.
#[repr(u32)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DevicePowerState {
    Unspecified = 0,
    D0 = 1,
    D1 = 2,
    D2 = 3,
    D3 = 4,
}

impl DevicePowerState {
    /// Fully powered
    pub fn is_working(self) -> bool {
        self == DevicePowerState::D0
    }

    pub fn is_low_power(self) -> bool {
        self > DevicePowerState::D0
    }
}

/// Power phase of one relay edge
///
/// An edge leaves `Active` the moment a low-power notice arrives (`Transitioning`)
/// and settles in `LowPower` once in-flight work has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePower {
    #[default]
    Active,
    Transitioning(DevicePowerState),
    LowPower(DevicePowerState),
}

impl EdgePower {
    pub fn is_active(self) -> bool {
        matches!(self, EdgePower::Active)
    }

    /// The device state this phase corresponds to
    pub fn device_state(self) -> DevicePowerState {
        match self {
            EdgePower::Active => DevicePowerState::D0,
            EdgePower::Transitioning(state) | EdgePower::LowPower(state) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_power_ordering() {
        assert!(!DevicePowerState::D0.is_low_power());
        assert!(DevicePowerState::D3.is_low_power());
        assert!(DevicePowerState::D1 > DevicePowerState::D0);
    }

    #[test]
    fn test_edge_power_device_state() {
        assert_eq!(EdgePower::Active.device_state(), DevicePowerState::D0);
        assert_eq!(
            EdgePower::Transitioning(DevicePowerState::D2).device_state(),
            DevicePowerState::D2
        );
        assert!(!EdgePower::LowPower(DevicePowerState::D3).is_active());
    }
}
