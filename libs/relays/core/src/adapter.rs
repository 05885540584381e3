//! # Adapter Context
//!
//! ## Purpose
//! One `Adapter` exists per bound lower device. It owns the two descriptor
//! pools, the receive batch, the power and link state of both edges and the
//! bookkeeping for in-flight sends and control requests.
//!
//! ## Architecture Role
//!
//! ```text
//!        UpperEdge (virtual interface)
//!            |  send / submit_request          ^ indicate_receive / request_complete
//!            v                                 |
//!   +-------------------- Adapter ---------------------+
//!   | send_pool  recv_pool  ReceiveBatch  AdapterState |
//!   +--------------------------------------------------+
//!            |  send / request                 ^ receive_packet / send_complete
//!            v                                 |
//!        LowerBinding (downstream interface)
//! ```
//!
//! The operations live next to their concern: `send.rs`, `receive.rs`,
//! `batch.rs`, `power.rs`, `request.rs`, and the lifecycle in `binding.rs`.
//!
//! ## Locking
//! All mutable state sits behind one `parking_lot::Mutex`. It is held only to
//! read or flip fields and swap the batch out; every call into a collaborator
//! happens after the guard is dropped.

use crate::batch::ReceiveBatch;
use crate::binding::AdapterRegistry;
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::host::{LowerBinding, UpperEdge};
use crate::pool::PacketPool;
use crate::sync::Event;
use parking_lot::Mutex;
use relay_types::{ControlRequest, EdgePower, LinkStatus, Medium, Status};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-adapter values taken from [`RelayConfig`] at bind time
#[derive(Debug, Clone)]
pub(crate) struct AdapterSettings {
    pub batch_capacity: usize,
    pub poll_interval: Duration,
    pub warn_after_polls: u64,
}

impl From<&RelayConfig> for AdapterSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            batch_capacity: config.receive.batch_capacity,
            poll_interval: config.power.poll_interval(),
            warn_after_polls: config.power.warn_after_polls,
        }
    }
}

/// Everything guarded by the adapter lock
pub(crate) struct AdapterState {
    pub upper: Option<Arc<dyn UpperEdge>>,
    pub lower_power: EdgePower,
    pub upper_power: EdgePower,
    pub standing_by: bool,
    pub unbinding: bool,
    pub upper_init_pending: bool,
    pub outstanding_sends: usize,
    pub request_outstanding: bool,
    pub queued_request: Option<ControlRequest>,
    pub batch: ReceiveBatch,
    pub last_indicated_link: LinkStatus,
    pub latest_link: LinkStatus,
    pub indicate_receive_complete: bool,
}

impl AdapterState {
    fn new(batch_capacity: usize) -> Self {
        Self {
            upper: None,
            lower_power: EdgePower::Active,
            upper_power: EdgePower::Active,
            standing_by: false,
            unbinding: false,
            upper_init_pending: false,
            outstanding_sends: 0,
            request_outstanding: false,
            queued_request: None,
            batch: ReceiveBatch::new(batch_capacity),
            last_indicated_link: LinkStatus::Connect,
            latest_link: LinkStatus::Connect,
            indicate_receive_complete: false,
        }
    }

    /// Upper edge to indicate to: attached and fully powered
    pub fn indication_target(&self) -> Option<Arc<dyn UpperEdge>> {
        match &self.upper {
            Some(upper) if self.upper_power.is_active() => Some(Arc::clone(upper)),
            _ => None,
        }
    }

    /// Upper edge for status traffic: attached and both edges fully powered
    pub fn status_target(&self) -> Option<Arc<dyn UpperEdge>> {
        if self.lower_power.is_active() {
            self.indication_target()
        } else {
            None
        }
    }
}

/// Point-in-time view of an adapter's counters and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSnapshot {
    pub device: String,
    pub upper_attached: bool,
    pub lower_power: EdgePower,
    pub upper_power: EdgePower,
    pub standing_by: bool,
    pub unbinding: bool,
    pub outstanding_sends: usize,
    pub request_outstanding: bool,
    pub request_queued: bool,
    pub queued_receives: usize,
    pub send_pool_in_use: usize,
    pub recv_pool_in_use: usize,
    pub released: bool,
}

/// Relay context for one bound lower device
pub struct Adapter {
    device: String,
    upper_instance: String,
    pub(crate) settings: AdapterSettings,
    pub(crate) registry: Arc<AdapterRegistry>,
    pub(crate) send_pool: PacketPool,
    pub(crate) recv_pool: PacketPool,
    lower: OnceLock<Arc<dyn LowerBinding>>,
    medium: OnceLock<Medium>,
    pub(crate) state: Mutex<AdapterState>,
    /// Downstream open/close completion
    pub(crate) open_close: Event,
    pub(crate) upper_init: Event,
    released: AtomicBool,
}

impl Adapter {
    /// Allocate the adapter and both pools; the lower binding is attached later
    pub(crate) fn new(
        device: &str,
        upper_instance: &str,
        registry: Arc<AdapterRegistry>,
        config: &RelayConfig,
    ) -> RelayResult<Arc<Self>> {
        let send_pool = PacketPool::new("send", config.pools.min_packets, config.pools.max_packets)?;
        let recv_pool = PacketPool::new("recv", config.pools.min_packets, config.pools.max_packets)?;
        let settings = AdapterSettings::from(config);

        Ok(Arc::new(Self {
            device: device.to_string(),
            upper_instance: upper_instance.to_string(),
            state: Mutex::new(AdapterState::new(settings.batch_capacity)),
            settings,
            registry,
            send_pool,
            recv_pool,
            lower: OnceLock::new(),
            medium: OnceLock::new(),
            open_close: Event::new(),
            upper_init: Event::new(),
            released: AtomicBool::new(false),
        }))
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Name of the upper-edge instance exported for this device
    pub fn upper_instance(&self) -> &str {
        &self.upper_instance
    }

    /// Medium of the lower binding, once it is open
    pub fn medium(&self) -> Option<Medium> {
        self.medium.get().copied()
    }

    pub(crate) fn lower(&self) -> Option<&Arc<dyn LowerBinding>> {
        self.lower.get()
    }

    pub(crate) fn attach_lower(&self, binding: Arc<dyn LowerBinding>) {
        let medium = binding.medium();
        if self.lower.set(binding).is_err() {
            debug_assert!(false, "lower binding attached twice");
            return;
        }
        let _ = self.medium.set(medium);
        debug!(device = %self.device, %medium, "Lower binding attached");
    }

    pub(crate) fn upper(&self) -> Option<Arc<dyn UpperEdge>> {
        self.state.lock().upper.clone()
    }

    pub fn is_upper_attached(&self) -> bool {
        self.state.lock().upper.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AdapterSnapshot {
        let state = self.state.lock();
        AdapterSnapshot {
            device: self.device.clone(),
            upper_attached: state.upper.is_some(),
            lower_power: state.lower_power,
            upper_power: state.upper_power,
            standing_by: state.standing_by,
            unbinding: state.unbinding,
            outstanding_sends: state.outstanding_sends,
            request_outstanding: state.request_outstanding,
            request_queued: state.queued_request.is_some(),
            queued_receives: state.batch.len(),
            send_pool_in_use: self.send_pool.in_use(),
            recv_pool_in_use: self.recv_pool.in_use(),
            released: self.is_released(),
        }
    }

    /// Downstream open finished
    pub fn open_complete(&self, status: Status) {
        debug!(device = %self.device, %status, "Open complete");
        self.open_close.set(status);
    }

    /// Downstream close finished
    pub fn close_complete(&self, status: Status) {
        debug!(device = %self.device, %status, "Close complete");
        self.open_close.set(status);
    }

    /// Close the lower binding (if open) and free both pools
    ///
    /// Runs at most once per adapter, whichever of unbind, halt or a failed
    /// bind gets here first.
    pub(crate) fn close_and_free(&self) -> Status {
        if self.released.swap(true, Ordering::AcqRel) {
            debug_assert!(false, "adapter {} released twice", self.device);
            warn!(device = %self.device, "Ignoring second release of adapter");
            return Status::Failure;
        }

        let status = match self.lower() {
            Some(lower) => {
                self.open_close.reset();
                match lower.close() {
                    Status::Pending => self.open_close.wait(),
                    status => status,
                }
            }
            None => Status::Success,
        };
        if !status.is_success() {
            warn!(device = %self.device, %status, "Lower binding close failed");
        }

        self.send_pool.release();
        self.recv_pool.release();
        info!(device = %self.device, "Adapter resources released");
        status
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("device", &self.device)
            .field("upper_instance", &self.upper_instance)
            .field("medium", &self.medium())
            .field("released", &self.is_released())
            .finish()
    }
}
