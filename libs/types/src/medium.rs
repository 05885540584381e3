//! Link media a lower binding can report.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Medium {
    Ethernet802_3 = 0,
    TokenRing802_5 = 1,
    Fddi = 2,
    Wan = 3,
}

impl Medium {
    /// Medium the relay advertises on its upper edge for this lower medium
    ///
    /// WAN bindings are exposed as Ethernet; everything else passes through.
    pub fn exported(self) -> Medium {
        match self {
            Medium::Wan => Medium::Ethernet802_3,
            other => other,
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Medium::Ethernet802_3 => "802.3",
            Medium::TokenRing802_5 => "802.5",
            Medium::Fddi => "fddi",
            Medium::Wan => "wan",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wan_exported_as_ethernet() {
        assert_eq!(Medium::Wan.exported(), Medium::Ethernet802_3);
        assert_eq!(Medium::Fddi.exported(), Medium::Fddi);
    }
}
