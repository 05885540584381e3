//! Pass-through relay facade
//!
//! Re-exports the relay engine and its vocabulary, and carries the loopback
//! host the `relay` binary uses to drive an adapter end to end without a real
//! device underneath.

pub use relay_core as core;
pub use relay_types as types;

pub mod loopback;

pub use loopback::{LoopbackCounters, LoopbackHost};
pub use relay_core::{Adapter, RelayConfig, RelayDriver, RelayError, RelayResult};
