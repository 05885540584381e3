//! Completion status vocabulary shared with the host framework.
//!
//! The numeric values are the host's own `u32` codes so a status can cross the
//! relay boundary unchanged in either direction.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Status returned by, or completed through, every relay operation
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Status {
    Success = 0x0000_0000,
    /// Completion will arrive later through the matching `*_complete` callback
    Pending = 0x0000_0103,
    Failure = 0xC000_0001,
    /// Out of descriptors/memory; for received packets also means "copy before retaining"
    Resources = 0xC000_009A,
    NotSupported = 0xC000_00BB,
    InvalidLength = 0xC001_0014,
    UnsupportedMedia = 0xC001_0019,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn is_pending(self) -> bool {
        self == Status::Pending
    }

    /// Raw host code
    pub fn code(self) -> u32 {
        self.into()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:08X})", self, self.code())
    }
}
