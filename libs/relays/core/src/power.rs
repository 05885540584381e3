//! # Power and PnP Controller
//!
//! ## Purpose
//! Tracks the power phase of both edges and gates every data and control
//! path on it.
//!
//! ## Lower Edge
//! A low-power `SetPower` stops new sends and requests the moment the state is
//! recorded, forwards the event upward, then polls until in-flight sends and
//! the in-flight request have drained. The barrier is a bounded-sleep polling
//! loop; it never gives up, it only warns while waiting. Returning to D0
//! replays a request that was queued while the edge was down.
//!
//! ## Upper Edge
//! Driven by `Set OID_PNP_SET_POWER` through the request relay. Link status
//! changes that arrive while either edge is down are latched (last one wins)
//! and the latched value is delivered once when the upper edge resumes.

use crate::adapter::Adapter;
use crate::binding::RelayDriver;
use relay_types::{DevicePowerState, EdgePower, PnpEvent, Status, StatusIndication};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

impl Adapter {
    /// Lower binding changed power state
    ///
    /// Returns the upper edge's answer to the forwarded event.
    pub fn set_lower_power(&self, device_state: DevicePowerState) -> Status {
        let event = PnpEvent::SetPower(device_state);

        if device_state.is_low_power() {
            let upper = {
                let mut state = self.state.lock();
                if state.lower_power.is_active() {
                    state.standing_by = true;
                }
                state.lower_power = EdgePower::Transitioning(device_state);
                state.upper.clone()
            };
            info!(device = %self.device(), state = ?device_state, "Lower edge entering low power");

            let status = upper.map_or(Status::Success, |upper| upper.notify_pnp(event));
            self.wait_for_quiescence();

            let queued = {
                let mut state = self.state.lock();
                let queued = state.queued_request.take();
                if state.lower_power == EdgePower::Transitioning(device_state) {
                    state.lower_power = EdgePower::LowPower(device_state);
                }
                queued
            };
            if let Some(request) = queued {
                self.fail_queued_request(request);
            }
            debug_assert_eq!(self.send_pool.in_use(), 0, "send wrappers outstanding after quiescence");
            status
        } else {
            let (replay, upper) = {
                let mut state = self.state.lock();
                if !state.lower_power.is_active() {
                    state.standing_by = false;
                }
                state.lower_power = EdgePower::Active;
                let replay = state.queued_request.take();
                if replay.is_some() {
                    state.request_outstanding = true;
                }
                (replay, state.upper.clone())
            };
            info!(device = %self.device(), "Lower edge back to D0");

            if let Some(request) = replay {
                debug!(device = %self.device(), oid = %request.oid, "Replaying queued request");
                self.forward_request_upward(request);
            }
            upper.map_or(Status::Success, |upper| upper.notify_pnp(event))
        }
    }

    fn wait_for_quiescence(&self) {
        let interval = self.settings.poll_interval;
        let warn_every = self.settings.warn_after_polls.max(1);
        let mut polls: u64 = 0;

        loop {
            let (sends, request) = {
                let state = self.state.lock();
                (state.outstanding_sends, state.request_outstanding)
            };
            if sends == 0 && !request {
                break;
            }

            polls += 1;
            if polls % warn_every == 0 {
                warn!(
                    device = %self.device(),
                    outstanding_sends = sends,
                    request_outstanding = request,
                    polls,
                    "Still waiting for lower edge to quiesce"
                );
            }
            thread::sleep(interval);
        }
        debug!(device = %self.device(), polls, "Lower edge quiescent");
    }

    /// Upper edge changed power state (`Set OID_PNP_SET_POWER`)
    pub fn set_upper_power(&self, device_state: DevicePowerState) -> Status {
        let (upper, replay) = {
            let mut state = self.state.lock();
            let was_active = state.upper_power.is_active();

            // A sleeping upper edge can only be woken
            if !was_active && device_state != DevicePowerState::D0 {
                warn!(device = %self.device(), state = ?device_state, "Upper edge asked to change between low-power states");
                return Status::Failure;
            }

            if was_active && device_state.is_low_power() {
                state.standing_by = true;
            }
            if !was_active && device_state == DevicePowerState::D0 {
                state.standing_by = false;
            }
            state.upper_power = if device_state.is_low_power() {
                EdgePower::LowPower(device_state)
            } else {
                EdgePower::Active
            };

            let replay = if state.standing_by {
                state.latest_link = state.last_indicated_link;
                None
            } else if state.last_indicated_link != state.latest_link {
                state.last_indicated_link = state.latest_link;
                Some(state.latest_link)
            } else {
                None
            };
            (state.upper.clone(), replay)
        };
        info!(device = %self.device(), state = ?device_state, "Upper edge power set");

        if let (Some(upper), Some(link)) = (upper, replay) {
            debug!(device = %self.device(), ?link, "Delivering latched link status");
            upper.indicate_status(link.indication(), &[]);
            upper.indicate_status_complete();
        }
        Status::Success
    }

    /// Status indication from the lower binding
    pub fn indicate_status(&self, indication: StatusIndication, payload: &[u8]) {
        let target = {
            let mut state = self.state.lock();
            if state.upper.is_none() {
                return;
            }
            let target = state.status_target();
            if let Some(link) = indication.link() {
                if target.is_some() {
                    state.last_indicated_link = link;
                } else {
                    debug!(device = %self.device(), ?link, "Latching link status while powered down");
                    state.latest_link = link;
                }
            }
            target
        };

        if let Some(upper) = target {
            upper.indicate_status(indication, payload);
        }
    }

    pub fn status_complete(&self) {
        let target = self.state.lock().status_target();
        if let Some(upper) = target {
            upper.indicate_status_complete();
        }
    }
}

impl RelayDriver {
    /// PnP event from the host, optionally scoped to one adapter
    pub fn pnp_event(&self, adapter: Option<&Arc<Adapter>>, event: PnpEvent) -> Status {
        debug!(%event, device = ?adapter.map(|a| a.device()), "PnP event");
        match (event, adapter) {
            (PnpEvent::SetPower(device_state), Some(adapter)) => adapter.set_lower_power(device_state),
            (PnpEvent::Reconfigure, None) => {
                self.host.reenumerate_bindings();
                Status::Success
            }
            (_, Some(adapter)) => adapter
                .upper()
                .map_or(Status::Success, |upper| upper.notify_pnp(event)),
            (_, None) => Status::Success,
        }
    }
}
