//! # Binding Manager
//!
//! ## Purpose
//! Owns the relay's registration with the host and the lifecycle of every
//! adapter: bind, upper-edge attach, unbind and halt.
//!
//! ## Lifecycle
//!
//! ```text
//! bind ──> pools allocated ──> lower open ──> upper instance started
//!                                               │
//!                                   upper_initialize (attach)
//!                                               │
//! unbind ──> queued work failed/returned ──> [cancel or await attach]
//!              │                                  │
//!              │ upper attached                   │ never attached
//!              v                                  v
//!   host tears upper down ──> halt         close + free here
//!                 └──────────> close + free (exactly once)
//! ```
//!
//! Any failure during bind unwinds in reverse: close the binding if it was
//! opened, free both pools, drop the adapter.

use crate::adapter::Adapter;
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::host::{BindingConfig, HostFramework, OpenOutcome, UpperEdge};
use parking_lot::Mutex;
use relay_types::{EdgePower, LinkStatus, Medium, Status};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Name the relay registers with the host under
pub const PROTOCOL_NAME: &str = "passthru-relay";

/// Adapters whose upper edge is attached
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: Mutex<Vec<Weak<Adapter>>>,
}

impl AdapterRegistry {
    fn insert(&self, adapter: &Arc<Adapter>) {
        let mut adapters = self.adapters.lock();
        adapters.retain(|weak| weak.strong_count() > 0);
        adapters.push(Arc::downgrade(adapter));
    }

    fn remove(&self, adapter: &Adapter) {
        self.adapters
            .lock()
            .retain(|weak| weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), adapter));
    }

    pub fn adapters(&self) -> Vec<Arc<Adapter>> {
        self.adapters.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Relay registration and entry point for lower-edge lifecycle events
pub struct RelayDriver {
    pub(crate) host: Arc<dyn HostFramework>,
    bindings: Arc<dyn BindingConfig>,
    config: RelayConfig,
    registry: Arc<AdapterRegistry>,
    registered: AtomicBool,
}

impl RelayDriver {
    /// Register with the host, reading upper-edge names from `config.bindings`
    pub fn register(host: Arc<dyn HostFramework>, config: RelayConfig) -> RelayResult<Self> {
        let bindings = Arc::new(config.clone());
        Self::register_with(host, config, bindings)
    }

    /// Register with the host using a separate binding-name source
    pub fn register_with(
        host: Arc<dyn HostFramework>,
        config: RelayConfig,
        bindings: Arc<dyn BindingConfig>,
    ) -> RelayResult<Self> {
        config.validate()?;

        let status = host.register_protocol(PROTOCOL_NAME);
        if !status.is_success() {
            error!(%status, "Protocol registration failed");
            return Err(RelayError::Registration(status));
        }
        info!(protocol = PROTOCOL_NAME, "Relay registered");

        Ok(Self {
            host,
            bindings,
            config,
            registry: Arc::new(AdapterRegistry::default()),
            registered: AtomicBool::new(true),
        })
    }

    /// Deregister from the host; later calls are no-ops
    pub fn unload(&self) {
        if self.registered.swap(false, Ordering::AcqRel) {
            self.host.deregister_protocol();
            info!(protocol = PROTOCOL_NAME, "Relay deregistered");
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Adapters with an attached upper edge
    pub fn attached_adapters(&self) -> Vec<Arc<Adapter>> {
        self.registry.adapters()
    }

    /// Bind to lower device `device`
    pub fn bind(&self, device: &str) -> RelayResult<Arc<Adapter>> {
        let instance = self.bindings.upper_binding(device).ok_or_else(|| {
            RelayError::Config(format!("no upper binding configured for device '{device}'"))
        })?;
        info!(device, instance = %instance, "Binding adapter");

        let adapter = Adapter::new(device, &instance, Arc::clone(&self.registry), &self.config)?;

        adapter.open_close.reset();
        let binding = match self.host.open_adapter(device, &adapter) {
            OpenOutcome::Opened(binding) => binding,
            OpenOutcome::Pending(binding) => match adapter.open_close.wait() {
                Status::Success => binding,
                status => return Err(Self::abandon(&adapter, RelayError::Downstream(status))),
            },
            OpenOutcome::Failed(status) => {
                return Err(Self::abandon(&adapter, RelayError::Downstream(status)));
            }
        };
        adapter.attach_lower(binding);

        adapter.state.lock().upper_init_pending = true;
        adapter.upper_init.reset();
        let status = self.host.initialize_upper_instance(&instance, &adapter);
        if !status.is_success() {
            adapter.state.lock().upper_init_pending = false;
            return Err(Self::abandon(&adapter, RelayError::UpstreamAttach(status)));
        }

        debug!(device, "Adapter bound");
        Ok(adapter)
    }

    /// Roll back a partially bound adapter
    fn abandon(adapter: &Adapter, err: RelayError) -> RelayError {
        warn!(device = adapter.device(), error = %err, "Bind failed; rolling back");
        adapter.close_and_free();
        err
    }

    /// Unbind from the lower device
    pub fn unbind(&self, adapter: &Arc<Adapter>) -> Status {
        info!(device = adapter.device(), "Unbinding adapter");

        let (queued_request, drained) = {
            let mut state = adapter.state.lock();
            state.unbinding = true;
            (state.queued_request.take(), state.batch.take())
        };
        if let Some(request) = queued_request {
            adapter.fail_queued_request(request);
        }
        for packet in drained {
            adapter.return_packet(packet);
        }

        let init_pending = adapter.state.lock().upper_init_pending;
        if init_pending {
            if self
                .host
                .cancel_upper_instance(adapter.upper_instance())
                .is_success()
            {
                debug!(device = adapter.device(), "Cancelled pending upper-edge attach");
                adapter.state.lock().upper_init_pending = false;
            } else {
                debug!(device = adapter.device(), "Waiting for in-flight upper-edge attach");
                adapter.upper_init.wait();
            }
        }

        if adapter.is_upper_attached() {
            match self.host.deinitialize_upper_instance(adapter) {
                Status::Success => Status::Success,
                status => {
                    warn!(device = adapter.device(), %status, "Upper-edge teardown failed");
                    Status::Failure
                }
            }
        } else {
            adapter.close_and_free()
        }
    }
}

impl Drop for RelayDriver {
    fn drop(&mut self) {
        self.unload();
    }
}

impl Adapter {
    /// Upper edge attaching to this adapter
    ///
    /// Picks the medium to export from `offered` and returns its index.
    pub fn upper_initialize(
        self: &Arc<Self>,
        upper: Arc<dyn UpperEdge>,
        offered: &[Medium],
    ) -> RelayResult<usize> {
        let exported = self.medium().unwrap_or(Medium::Ethernet802_3).exported();
        let result = offered
            .iter()
            .position(|medium| *medium == exported)
            .ok_or(RelayError::UnsupportedMedium(exported));

        {
            let mut state = self.state.lock();
            if result.is_ok() {
                state.upper = Some(upper);
                state.upper_power = EdgePower::Active;
                state.last_indicated_link = LinkStatus::Connect;
                state.latest_link = LinkStatus::Connect;
            }
            state.upper_init_pending = false;
        }

        let status = match &result {
            Ok(index) => {
                self.registry.insert(self);
                info!(device = self.device(), %exported, index, "Upper edge attached");
                Status::Success
            }
            Err(err) => {
                warn!(device = self.device(), error = %err, "Upper edge attach refused");
                err.status()
            }
        };
        self.upper_init.set(status);
        result
    }

    /// Upper edge is being torn down: detach, close the lower binding and free
    pub fn halt(&self) {
        info!(device = self.device(), "Halting adapter");
        self.registry.remove(self);
        self.state.lock().upper = None;
        self.close_and_free();
    }
}
