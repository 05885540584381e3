//! # Relay Core
//!
//! Pass-through relay between an upper edge (the virtual interface exported to
//! consumers) and a lower binding (the real interface underneath). Traffic,
//! control requests and status events are forwarded transparently; the relay
//! itself only keeps the bookkeeping needed to do that safely while either
//! edge is being powered down, rebound or torn out.
//!
//! ## Components
//!
//! - **Binding manager** (`binding`): `RelayDriver` registration, bind/unbind,
//!   upper-edge attach and halt.
//! - **Packet relay engine** (`send`, `receive`, `batch`, `pool`): stacking or
//!   wrapping packets, receive batching, send accounting.
//! - **Power/PnP controller** (`power`): per-edge power phase, quiescence
//!   barrier, link-status latch.
//! - **Control-request relay** (`request`): one-at-a-time request forwarding
//!   with local answers and response rewrites.

pub mod adapter;
pub mod batch;
pub mod binding;
pub mod config;
pub mod error;
pub mod host;
pub mod pool;
pub mod power;
pub mod receive;
pub mod request;
pub mod send;
pub mod sync;

// Re-export commonly used types
pub use adapter::{Adapter, AdapterSnapshot};
pub use batch::ReceiveBatch;
pub use binding::{AdapterRegistry, RelayDriver, PROTOCOL_NAME};
pub use config::{BindingEntry, PoolSettings, PowerSettings, ReceiveSettings, RelayConfig};
pub use error::{RelayError, RelayResult};
pub use host::{BindingConfig, Dispatch, HostFramework, LowerBinding, OpenOutcome, UpperEdge};
pub use pool::{PacketPool, Relayed};
pub use request::{rewrite_response, Submitted, RESPONSE_REWRITES};
pub use sync::Event;

pub use relay_types as types;
