//! Status indications and PnP events exchanged between the edges.

use crate::power::DevicePowerState;
use std::fmt;

/// Link state carried by the connect/disconnect status indications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkStatus {
    Connect,
    Disconnect,
}

impl LinkStatus {
    pub fn indication(self) -> StatusIndication {
        match self {
            LinkStatus::Connect => StatusIndication::MediaConnect,
            LinkStatus::Disconnect => StatusIndication::MediaDisconnect,
        }
    }
}

/// Status code raised by the lower binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusIndication {
    MediaConnect,
    MediaDisconnect,
    Other(u32),
}

impl StatusIndication {
    const MEDIA_CONNECT: u32 = 0x4001_000B;
    const MEDIA_DISCONNECT: u32 = 0x4001_000C;

    pub fn from_code(code: u32) -> Self {
        match code {
            Self::MEDIA_CONNECT => StatusIndication::MediaConnect,
            Self::MEDIA_DISCONNECT => StatusIndication::MediaDisconnect,
            other => StatusIndication::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            StatusIndication::MediaConnect => Self::MEDIA_CONNECT,
            StatusIndication::MediaDisconnect => Self::MEDIA_DISCONNECT,
            StatusIndication::Other(code) => code,
        }
    }

    /// The link state this indication reports, if it is a link event
    pub fn link(self) -> Option<LinkStatus> {
        match self {
            StatusIndication::MediaConnect => Some(LinkStatus::Connect),
            StatusIndication::MediaDisconnect => Some(LinkStatus::Disconnect),
            StatusIndication::Other(_) => None,
        }
    }
}

/// Plug-and-play / power event delivered to a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnpEvent {
    SetPower(DevicePowerState),
    QueryPower(DevicePowerState),
    QueryRemoveDevice,
    CancelRemoveDevice,
    Reconfigure,
    BindList,
    BindsComplete,
    PnpCapabilities,
}

impl fmt::Display for PnpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PnpEvent::SetPower(state) => write!(f, "SetPower({state:?})"),
            PnpEvent::QueryPower(state) => write!(f, "QueryPower({state:?})"),
            PnpEvent::QueryRemoveDevice => f.write_str("QueryRemoveDevice"),
            PnpEvent::CancelRemoveDevice => f.write_str("CancelRemoveDevice"),
            PnpEvent::Reconfigure => f.write_str("Reconfigure"),
            PnpEvent::BindList => f.write_str("BindList"),
            PnpEvent::BindsComplete => f.write_str("BindsComplete"),
            PnpEvent::PnpCapabilities => f.write_str("PnpCapabilities"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_indications_map_both_ways() {
        for link in [LinkStatus::Connect, LinkStatus::Disconnect] {
            let indication = link.indication();
            assert_eq!(StatusIndication::from_code(indication.code()), indication);
            assert_eq!(indication.link(), Some(link));
        }
        assert_eq!(StatusIndication::from_code(0x4001_0001).link(), None);
    }
}
