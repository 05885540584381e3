//! Object identifiers for control requests, plus the few payload layouts the
//! relay has to understand in order to rewrite or answer them locally.

use crate::power::DevicePowerState;
use std::fmt;

/// Identifier of the value a control request queries or sets
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(pub u32);

impl Oid {
    pub const GEN_SUPPORTED_LIST: Oid = Oid(0x0001_0101);
    pub const GEN_MAXIMUM_FRAME_SIZE: Oid = Oid(0x0001_0106);
    pub const GEN_LINK_SPEED: Oid = Oid(0x0001_0107);
    pub const GEN_MAC_OPTIONS: Oid = Oid(0x0001_0113);
    pub const GEN_MEDIA_CONNECT_STATUS: Oid = Oid(0x0001_0114);
    pub const GEN_SUPPORTED_GUIDS: Oid = Oid(0x0001_0117);
    pub const ETH_CURRENT_ADDRESS: Oid = Oid(0x0101_0102);
    pub const TCP_TASK_OFFLOAD: Oid = Oid(0xFC01_0201);
    pub const PNP_CAPABILITIES: Oid = Oid(0xFD01_0100);
    pub const PNP_SET_POWER: Oid = Oid(0xFD01_0101);
    pub const PNP_QUERY_POWER: Oid = Oid(0xFD01_0102);
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid(0x{:08X})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Bits of the `GEN_MAC_OPTIONS` value
pub mod mac_options {
    pub const COPY_LOOKAHEAD_DATA: u32 = 0x0000_0001;
    pub const RECEIVE_SERIALIZED: u32 = 0x0000_0002;
    pub const TRANSFERS_NOT_PEND: u32 = 0x0000_0004;
    /// Set only by the lowest driver of a stack; loopback is done below it
    pub const NO_LOOPBACK: u32 = 0x0000_0008;
}

/// Wire layout of the `PNP_CAPABILITIES` answer
///
/// Four little-endian `u32`s: flags followed by the minimum device states for
/// magic-packet, pattern and link-change wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PnpCapabilities {
    pub flags: u32,
    pub min_magic_packet_wake_up: DevicePowerState,
    pub min_pattern_wake_up: DevicePowerState,
    pub min_link_change_wake_up: DevicePowerState,
}

impl PnpCapabilities {
    pub const WIRE_SIZE: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..4].copy_from_slice(&self.flags.to_le_bytes());
        out[4..8].copy_from_slice(&u32::from(self.min_magic_packet_wake_up).to_le_bytes());
        out[8..12].copy_from_slice(&u32::from(self.min_pattern_wake_up).to_le_bytes());
        out[12..16].copy_from_slice(&u32::from(self.min_link_change_wake_up).to_le_bytes());
        out
    }

    /// Parse from a response buffer; `None` if it is short or holds an unknown state
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::WIRE_SIZE {
            return None;
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(Self {
            flags: word(0),
            min_magic_packet_wake_up: DevicePowerState::try_from(word(4)).ok()?,
            min_pattern_wake_up: DevicePowerState::try_from(word(8)).ok()?,
            min_link_change_wake_up: DevicePowerState::try_from(word(12)).ok()?,
        })
    }
}
