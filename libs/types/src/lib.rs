//! # Relay Types
//!
//! Shared vocabulary for the pass-through relay and the collaborators on
//! either side of it.
//!
//! ## Design Philosophy
//!
//! - **Host codes at the boundary**: `Status`, `DevicePowerState`, `Medium` and
//!   `Oid` keep the host framework's numeric values so nothing is translated on
//!   the way through.
//! - **Owned descriptors**: a `Packet` owns its buffer chain (`bytes::Bytes`) and,
//!   when it is a wrapper, the original it stands in for.
//! - **No behaviour**: this crate holds data and small pure helpers only; all
//!   relay state lives in `relay-core`.
//!
//! ## Quick Start
//!
//! ```rust
//! use relay_types::{ControlRequest, Oid, Packet, Status};
//!
//! let packet = Packet::from_frame(&b"\x00\x01frame"[..]);
//! assert_eq!(packet.total_len(), 7);
//!
//! let request = ControlRequest::query(Oid::GEN_MAC_OPTIONS, 4);
//! assert!(request.is_query());
//! assert!(Status::Success.is_success());
//! ```

pub mod event;
pub mod medium;
pub mod oid;
pub mod packet;
pub mod power;
pub mod request;
pub mod status;

pub use event::{LinkStatus, PnpEvent, StatusIndication};
pub use medium::Medium;
pub use oid::{mac_options, Oid, PnpCapabilities};
pub use packet::{OutOfBand, Packet, PacketId, PerPacketInfo, PoolId, ReceivedFrame};
pub use power::{DevicePowerState, EdgePower};
pub use request::{ControlRequest, RequestKind};
pub use status::Status;
