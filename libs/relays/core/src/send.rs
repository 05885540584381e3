//! # Send Path
//!
//! ## Purpose
//! Relays packets from the upper edge to the lower binding, keeping the
//! outstanding-send count exact so a power-down can wait for the path to
//! drain.
//!
//! Every accepted send bumps the count before it goes down and drops it only
//! after the original has been completed, synchronously through the returned
//! [`Dispatch`] or later through [`Adapter::send_complete`].

use crate::adapter::Adapter;
use crate::host::Dispatch;
use crate::pool::Relayed;
use relay_types::{Packet, Status};
use tracing::{debug, error, trace, warn};

/// Result of pushing one packet down; `Completed` still holds its send count
enum SendOutcome {
    Rejected(Packet, Status),
    Completed(Packet, Status),
    Pending,
}

impl Adapter {
    /// Send one packet downstream
    ///
    /// `Pending` means the upper edge's `send_complete` will be called for
    /// this packet later.
    pub fn send(&self, packet: Packet) -> Dispatch<Packet> {
        match self.dispatch_send(packet) {
            SendOutcome::Rejected(packet, status) => Dispatch::Complete(packet, status),
            SendOutcome::Completed(packet, status) => {
                self.send_finished();
                Dispatch::Complete(packet, status)
            }
            SendOutcome::Pending => Dispatch::Pending,
        }
    }

    /// Array-form send: every packet is completed through the upper edge exactly once
    ///
    /// With no upper edge attached there is nobody to complete to, so the
    /// packets come back untouched and the caller still owns them.
    pub fn send_packets(&self, packets: Vec<Packet>) -> Vec<Packet> {
        let Some(upper) = self.upper() else {
            warn!(device = %self.device(), count = packets.len(), "send_packets with no upper edge attached");
            return packets;
        };

        for packet in packets {
            match self.dispatch_send(packet) {
                SendOutcome::Rejected(packet, status) => upper.send_complete(packet, status),
                SendOutcome::Completed(packet, status) => {
                    upper.send_complete(packet, status);
                    self.send_finished();
                }
                SendOutcome::Pending => {}
            }
        }
        Vec::new()
    }

    fn dispatch_send(&self, packet: Packet) -> SendOutcome {
        {
            let mut state = self.state.lock();
            if state.unbinding || !state.upper_power.is_active() || !state.lower_power.is_active() {
                trace!(device = %self.device(), packet = %packet.id(), "Send gated by power state");
                return SendOutcome::Rejected(packet, Status::Failure);
            }
            state.outstanding_sends += 1;
        }

        let Some(lower) = self.lower() else {
            self.send_finished();
            return SendOutcome::Rejected(packet, Status::Failure);
        };

        match self.send_pool.stack_or_wrap(packet, Packet::copy_send_fields_from) {
            Ok(Relayed::Forwarded { original }) => match lower.send(original) {
                Dispatch::Pending => SendOutcome::Pending,
                Dispatch::Complete(mut packet, status) => {
                    packet.pop_stack();
                    SendOutcome::Completed(packet, status)
                }
            },
            Ok(Relayed::Wrapped { original_id, wrapper }) => {
                trace!(device = %self.device(), packet = %original_id, "Sending wrapped packet");
                match lower.send(wrapper) {
                    Dispatch::Pending => SendOutcome::Pending,
                    Dispatch::Complete(wrapper, status) => {
                        SendOutcome::Completed(self.reclaim_send_wrapper(wrapper), status)
                    }
                }
            }
            Err(packet) => {
                self.send_finished();
                SendOutcome::Rejected(packet, Status::Resources)
            }
        }
    }

    /// Lower binding finished a send that returned `Pending`
    pub fn send_complete(&self, packet: Packet, status: Status) {
        let original = if self.send_pool.owns(&packet) {
            self.reclaim_send_wrapper(packet)
        } else {
            let mut packet = packet;
            packet.pop_stack();
            packet
        };

        match self.upper() {
            Some(upper) => upper.send_complete(original, status),
            None => warn!(device = %self.device(), packet = %original.id(), %status, "Send completed with no upper edge"),
        }
        self.send_finished();
    }

    /// Ask the lower binding to cancel sends tagged with `cancel_id`
    pub fn cancel_send_packets(&self, cancel_id: u64) {
        if let Some(lower) = self.lower() {
            debug!(device = %self.device(), cancel_id, "Cancelling sends");
            lower.cancel_send_packets(cancel_id);
        }
    }

    pub fn outstanding_sends(&self) -> usize {
        self.state.lock().outstanding_sends
    }

    fn send_finished(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.outstanding_sends > 0, "send completed twice");
        state.outstanding_sends = state.outstanding_sends.saturating_sub(1);
    }

    /// Copy completion info back to the original and recycle the wrapper
    fn reclaim_send_wrapper(&self, mut wrapper: Packet) -> Packet {
        match wrapper.take_original() {
            Some(mut original) => {
                original.oob.per_packet = wrapper.oob.per_packet;
                self.send_pool.free(wrapper);
                original
            }
            None => {
                debug_assert!(false, "send wrapper without an original");
                error!(device = %self.device(), wrapper = %wrapper.id(), "Send wrapper lost its original");
                wrapper
            }
        }
    }
}
