//! # Collaborator Boundaries
//!
//! ## Purpose
//! The relay sits between three collaborators it does not implement:
//!
//! - [`HostFramework`]: registers the relay, opens lower bindings and creates
//!   or tears down upper-edge instances.
//! - [`LowerBinding`]: the opened downstream interface. Its completions come
//!   back through the matching `Adapter` methods (`send_complete`,
//!   `request_complete`, `close_complete`, ...).
//! - [`UpperEdge`]: the virtual interface exported to consumers above.
//!
//! Every call the relay makes into one of these happens with no adapter lock
//! held, so implementations are free to re-enter the adapter.

use crate::adapter::Adapter;
use relay_types::{ControlRequest, Medium, Packet, PnpEvent, Status, StatusIndication};
use std::sync::Arc;

/// Outcome of an operation that may finish now or through a later callback
#[derive(Debug)]
pub enum Dispatch<T> {
    /// Finished synchronously; ownership of the item comes back with its status
    Complete(T, Status),
    /// The callee kept the item and will complete it through the callback path
    Pending,
}

impl<T> Dispatch<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending)
    }

    pub fn status(&self) -> Status {
        match self {
            Dispatch::Complete(_, status) => *status,
            Dispatch::Pending => Status::Pending,
        }
    }
}

/// Result of asking the host to open a lower binding
pub enum OpenOutcome {
    Opened(Arc<dyn LowerBinding>),
    /// Final status arrives through `Adapter::open_complete`
    Pending(Arc<dyn LowerBinding>),
    Failed(Status),
}

pub trait HostFramework: Send + Sync {
    fn register_protocol(&self, name: &str) -> Status;

    fn deregister_protocol(&self);

    fn open_adapter(&self, device: &str, adapter: &Arc<Adapter>) -> OpenOutcome;

    /// Start the upper-edge instance named `instance` on top of `adapter`
    ///
    /// The instance attaches later (or right away) through
    /// `Adapter::upper_initialize`.
    fn initialize_upper_instance(&self, instance: &str, adapter: &Arc<Adapter>) -> Status;

    /// Cancel an attach that has not happened yet; `Success` means it never will
    fn cancel_upper_instance(&self, instance: &str) -> Status;

    /// Tear down an attached upper edge; the host calls `Adapter::halt` while doing so
    fn deinitialize_upper_instance(&self, adapter: &Arc<Adapter>) -> Status;

    fn reenumerate_bindings(&self);
}

pub trait LowerBinding: Send + Sync {
    fn medium(&self) -> Medium;

    fn send(&self, packet: Packet) -> Dispatch<Packet>;

    fn request(&self, request: ControlRequest) -> Dispatch<ControlRequest>;

    /// Give back a received packet the relay retained
    fn return_packet(&self, packet: Packet);

    /// `Pending` means `Adapter::close_complete` follows
    fn close(&self) -> Status;

    fn cancel_send_packets(&self, _cancel_id: u64) {}
}

pub trait UpperEdge: Send + Sync {
    fn send_complete(&self, packet: Packet, status: Status);

    /// Deliver a batch of received packets
    ///
    /// Returns the packets the upper edge is already done with; this always
    /// includes those indicated with `Status::Resources`. Anything kept is
    /// handed back later through `Adapter::return_packet`.
    fn indicate_receive(&self, packets: Vec<Packet>) -> Vec<Packet>;

    /// Buffer-form receive indication for `medium`
    fn indicate_receive_frame(&self, medium: Medium, header: &[u8], data: &[u8], packet_size: usize);

    fn indicate_receive_complete(&self, medium: Medium);

    fn request_complete(&self, request: ControlRequest, status: Status);

    fn indicate_status(&self, status: StatusIndication, payload: &[u8]);

    fn indicate_status_complete(&self);

    fn notify_pnp(&self, event: PnpEvent) -> Status;
}

/// Source of the binding-scoped upper-edge instance name
pub trait BindingConfig: Send + Sync {
    fn upper_binding(&self, device: &str) -> Option<String>;
}
