//! # Receive Path
//!
//! ## Purpose
//! Relays frames from the lower binding to the upper edge. Packet-form
//! receives are stacked or wrapped and go through the receive batch;
//! buffer-form receives are wrapped into a descriptor when the lower binding
//! supplied a packet object, and indicated in buffer form otherwise.
//!
//! ## Ownership
//! `receive_packet` returns `Some(packet)` whenever the relay is done with the
//! packet by the time the call returns, and `None` when it kept it. A kept
//! packet comes back to the lower binding through `LowerBinding::return_packet`
//! once the upper edge calls [`Adapter::return_packet`].

use crate::adapter::Adapter;
use crate::pool::Relayed;
use relay_types::{Medium, Packet, ReceivedFrame, Status};
use std::mem;
use tracing::{debug, error, trace, warn};

impl Adapter {
    fn receive_gate_open(&self) -> bool {
        let state = self.state.lock();
        !state.unbinding && state.indication_target().is_some()
    }

    /// Packet-form receive from the lower binding
    pub fn receive_packet(&self, packet: Packet) -> Option<Packet> {
        if !self.receive_gate_open() {
            trace!(device = %self.device(), packet = %packet.id(), "Receive gated; handing packet back");
            return Some(packet);
        }

        // Resources: the lower binding needs the packet back before we return
        let ephemeral = packet.status == Status::Resources;
        match self.recv_pool.stack_or_wrap(packet, Packet::copy_receive_fields_from) {
            Ok(Relayed::Forwarded { original }) => {
                let mut packet = match self.queue_received(original, ephemeral) {
                    Ok(None) => return None,
                    Ok(Some(packet)) | Err(packet) => packet,
                };
                packet.pop_stack();
                Some(packet)
            }
            Ok(Relayed::Wrapped { wrapper, .. }) => {
                let wrapper = match self.queue_received(wrapper, ephemeral) {
                    Ok(None) => return None,
                    Ok(Some(wrapper)) | Err(wrapper) => wrapper,
                };
                Some(self.reclaim_receive_wrapper(wrapper))
            }
            Err(packet) => Some(packet),
        }
    }

    /// Buffer-form receive from the lower binding
    pub fn receive_indication(&self, frame: &ReceivedFrame) -> Status {
        if !self.receive_gate_open() {
            return Status::Failure;
        }

        if let Some(packet) = &frame.packet {
            if let Some(mut wrapper) = self.recv_pool.alloc() {
                wrapper.copy_receive_fields_from(packet);
                wrapper.header_size = frame.header.len();
                // Upper edge must copy; we reclaim the descriptor right after indicating
                wrapper.status = Status::Resources;
                return match self.queue_received(wrapper, true) {
                    Ok(wrapper) => {
                        if let Some(wrapper) = wrapper {
                            self.recv_pool.free(wrapper);
                        }
                        Status::Success
                    }
                    Err(wrapper) => {
                        self.recv_pool.free(wrapper);
                        Status::Failure
                    }
                };
            }
            // Keep ordering with what is already queued before the buffer indication
            self.flush_receive_queue();
        }

        let target = {
            let mut state = self.state.lock();
            let target = state.indication_target();
            if target.is_some() {
                state.indicate_receive_complete = true;
            }
            target
        };
        if let Some(upper) = target {
            let medium = self.exported_medium();
            trace!(device = %self.device(), %medium, size = frame.packet_size, "Buffer-form receive");
            upper.indicate_receive_frame(medium, &frame.header, &frame.data, frame.packet_size);
        }
        Status::Success
    }

    /// End of a receive burst from the lower binding
    pub fn receive_complete(&self) {
        self.flush_receive_queue();

        let target = {
            let mut state = self.state.lock();
            let indicated = mem::take(&mut state.indicate_receive_complete);
            if indicated {
                state.indication_target()
            } else {
                None
            }
        };
        if let Some(upper) = target {
            upper.indicate_receive_complete(self.exported_medium());
        }
    }

    /// Upper edge is done with a packet it kept
    pub fn return_packet(&self, packet: Packet) {
        let packet = if self.recv_pool.owns(&packet) {
            self.reclaim_receive_wrapper(packet)
        } else {
            let mut packet = packet;
            packet.pop_stack();
            packet
        };

        match self.lower() {
            Some(lower) => lower.return_packet(packet),
            None => warn!(device = %self.device(), packet = %packet.id(), "No lower binding to return packet to"),
        }
    }

    fn reclaim_receive_wrapper(&self, mut wrapper: Packet) -> Packet {
        match wrapper.take_original() {
            Some(original) => {
                debug!(device = %self.device(), packet = %original.id(), "Reclaimed receive wrapper");
                self.recv_pool.free(wrapper);
                original
            }
            None => {
                debug_assert!(false, "receive wrapper without an original");
                error!(device = %self.device(), wrapper = %wrapper.id(), "Receive wrapper lost its original");
                wrapper
            }
        }
    }

    fn exported_medium(&self) -> Medium {
        self.medium().unwrap_or(Medium::Ethernet802_3).exported()
    }
}
