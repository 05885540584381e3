//! Receive batching: received packets are held in a fixed-capacity array and
//! indicated upward together, either when the array fills, when a caller
//! forces it, or on an explicit flush.

use crate::adapter::Adapter;
use relay_types::{Packet, PacketId};
use std::mem;
use tracing::trace;

/// Fixed-capacity array of received packets awaiting indication
#[derive(Debug)]
pub struct ReceiveBatch {
    packets: Vec<Packet>,
    capacity: usize,
}

impl ReceiveBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append; returns true once the batch is full
    pub fn push(&mut self, packet: Packet) -> bool {
        debug_assert!(self.packets.len() < self.capacity, "receive batch overflow");
        self.packets.push(packet);
        self.packets.len() >= self.capacity
    }

    /// Swap the queued packets out, leaving an empty batch behind
    pub fn take(&mut self) -> Vec<Packet> {
        mem::replace(&mut self.packets, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Adapter {
    /// Queue a received packet, delivering the batch when full or when `force` is set
    ///
    /// With `force`, the packet is ephemeral: it comes back to the caller once
    /// the batch has been delivered (or returned, if nobody is listening).
    ///
    /// `Err` hands the packet straight back: the adapter is unbinding or has
    /// nobody to indicate to, and the batch no longer accepts packets.
    pub(crate) fn queue_received(&self, packet: Packet, force: bool) -> Result<Option<Packet>, Packet> {
        let ephemeral = force.then(|| packet.id());
        let batch = {
            let mut state = self.state.lock();
            if state.unbinding || state.indication_target().is_none() {
                return Err(packet);
            }
            let full = state.batch.push(packet);
            if full || force {
                Some(state.batch.take())
            } else {
                None
            }
        };

        Ok(match batch {
            Some(packets) => self.deliver_batch(packets, ephemeral),
            None => None,
        })
    }

    /// Deliver whatever is queued; no-op on an empty batch
    pub fn flush_receive_queue(&self) {
        let packets = {
            let mut state = self.state.lock();
            if state.batch.is_empty() {
                return;
            }
            state.batch.take()
        };
        let _ = self.deliver_batch(packets, None);
    }

    fn deliver_batch(&self, packets: Vec<Packet>, ephemeral: Option<PacketId>) -> Option<Packet> {
        let target = self.state.lock().indication_target();
        let count = packets.len();

        let handed_back = match target {
            Some(upper) => {
                trace!(device = %self.device(), count, "Indicating receive batch");
                upper.indicate_receive(packets)
            }
            None => {
                trace!(device = %self.device(), count, "No upper edge to indicate to; returning batch");
                packets
            }
        };

        let mut ephemeral_packet = None;
        for packet in handed_back {
            if Some(packet.id()) == ephemeral {
                ephemeral_packet = Some(packet);
            } else {
                self.return_packet(packet);
            }
        }
        debug_assert!(
            ephemeral.is_none() || ephemeral_packet.is_some(),
            "upper edge kept a packet indicated with Resources"
        );
        ephemeral_packet
    }
}
