//! # Control-Request Relay
//!
//! ## Purpose
//! Forwards get/set requests from the upper edge to the lower binding, one at
//! a time per adapter, answering a few locally and rewriting a few responses
//! on the way back up.
//!
//! ## Admission
//!
//! | Condition                                   | Outcome                      |
//! |---------------------------------------------|------------------------------|
//! | answered locally (power query/set, GUIDs)   | `Complete`                   |
//! | unbinding, or upper edge not at D0          | `Complete(Failure)`          |
//! | a request already in flight or queued       | `Err(RelayError::Busy)`      |
//! | lower edge down and not standing by         | queued, `Pending`            |
//! | standing by                                 | `Complete(Failure)`          |
//! | otherwise                                   | forwarded                    |
//!
//! ## Response Rewrites
//! Applied after the lower binding completes and before the upper edge sees
//! the result; see [`RESPONSE_REWRITES`].

use crate::adapter::Adapter;
use crate::error::{RelayError, RelayResult};
use crate::host::Dispatch;
use relay_types::{
    mac_options, ControlRequest, DevicePowerState, Oid, PnpCapabilities, RequestKind, Status,
};
use tracing::{debug, trace, warn};

/// Outcome of submitting a control request
pub type Submitted = Dispatch<ControlRequest>;

/// Rewrite applied to a completed request; returns the status to report upward
pub type ResponseRewrite = fn(&mut ControlRequest, Status) -> Status;

/// Response rewrites keyed by request kind and OID
pub const RESPONSE_REWRITES: &[(RequestKind, Oid, ResponseRewrite)] = &[
    (RequestKind::Query, Oid::GEN_MAC_OPTIONS, clear_no_loopback),
    (RequestKind::Query, Oid::PNP_CAPABILITIES, mask_wake_up_capabilities),
];

/// Run the matching rewrite, if any, over a completed request
pub fn rewrite_response(request: &mut ControlRequest, status: Status) -> Status {
    RESPONSE_REWRITES
        .iter()
        .find(|(kind, oid, _)| *kind == request.kind && *oid == request.oid)
        .map_or(status, |(_, _, rewrite)| rewrite(request, status))
}

/// Loopback is handled by the lowest layer; advertising it here would loop twice
fn clear_no_loopback(request: &mut ControlRequest, status: Status) -> Status {
    if status.is_success() {
        if let Some(options) = request.read_u32(0) {
            request.write_u32(0, options & !mac_options::NO_LOOPBACK);
        }
    }
    status
}

/// Wake-up is not supported through the relay
fn mask_wake_up_capabilities(request: &mut ControlRequest, status: Status) -> Status {
    if !status.is_success() {
        return status;
    }

    let Some(mut caps) = PnpCapabilities::from_bytes(&request.buffer) else {
        request.bytes_needed = PnpCapabilities::WIRE_SIZE;
        return Status::Resources;
    };
    caps.min_magic_packet_wake_up = DevicePowerState::Unspecified;
    caps.min_pattern_wake_up = DevicePowerState::Unspecified;
    caps.min_link_change_wake_up = DevicePowerState::Unspecified;
    request.buffer[..PnpCapabilities::WIRE_SIZE].copy_from_slice(&caps.to_bytes());
    request.bytes_transferred = PnpCapabilities::WIRE_SIZE;
    request.bytes_needed = 0;
    Status::Success
}

impl Adapter {
    /// Submit a control request from the upper edge
    pub fn submit_request(&self, mut request: ControlRequest) -> RelayResult<Submitted> {
        if let Some(status) = self.answer_locally(&mut request) {
            return Ok(Dispatch::Complete(request, status));
        }

        {
            let mut state = self.state.lock();
            if state.request_outstanding || state.queued_request.is_some() {
                warn!(device = %self.device(), oid = %request.oid, "Rejecting request while another is outstanding");
                return Err(RelayError::Busy);
            }
            if state.unbinding || !state.upper_power.is_active() {
                return Ok(Dispatch::Complete(request, Status::Failure));
            }
            if !state.lower_power.is_active() && !state.standing_by {
                debug!(device = %self.device(), oid = %request.oid, "Queueing request until lower edge is back");
                state.queued_request = Some(request);
                return Ok(Dispatch::Pending);
            }
            if state.standing_by {
                return Ok(Dispatch::Complete(request, Status::Failure));
            }
            state.request_outstanding = true;
        }

        Ok(self.forward_request(request))
    }

    /// Lower binding finished a request that returned `Pending`
    pub fn request_complete(&self, mut request: ControlRequest, status: Status) {
        let status = self.finish_request(&mut request, status);
        self.complete_upward(request, status);
    }

    pub fn request_outstanding(&self) -> bool {
        self.state.lock().request_outstanding
    }

    /// Forward a request whose outstanding flag is already set
    fn forward_request(&self, request: ControlRequest) -> Submitted {
        let Some(lower) = self.lower() else {
            let mut request = request;
            let status = self.finish_request(&mut request, Status::Failure);
            return Dispatch::Complete(request, status);
        };

        trace!(device = %self.device(), oid = %request.oid, kind = ?request.kind, "Forwarding request");
        match lower.request(request) {
            Dispatch::Pending => Dispatch::Pending,
            Dispatch::Complete(mut request, status) => {
                let status = self.finish_request(&mut request, status);
                Dispatch::Complete(request, status)
            }
        }
    }

    /// Forward and route a synchronous completion to the upper edge
    pub(crate) fn forward_request_upward(&self, request: ControlRequest) {
        if let Dispatch::Complete(request, status) = self.forward_request(request) {
            self.complete_upward(request, status);
        }
    }

    /// Complete a queued request that will never be forwarded
    pub(crate) fn fail_queued_request(&self, request: ControlRequest) {
        debug!(device = %self.device(), oid = %request.oid, "Failing queued request");
        self.complete_upward(request, Status::Failure);
    }

    fn finish_request(&self, request: &mut ControlRequest, status: Status) -> Status {
        {
            let mut state = self.state.lock();
            debug_assert!(state.request_outstanding, "request completed twice");
            state.request_outstanding = false;
        }
        rewrite_response(request, status)
    }

    fn complete_upward(&self, request: ControlRequest, status: Status) {
        match self.upper() {
            Some(upper) => upper.request_complete(request, status),
            None => warn!(device = %self.device(), oid = %request.oid, %status, "Request completed with no upper edge"),
        }
    }

    fn answer_locally(&self, request: &mut ControlRequest) -> Option<Status> {
        match (request.kind, request.oid) {
            (RequestKind::Query, Oid::PNP_QUERY_POWER) => Some(Status::Success),
            (RequestKind::Query, Oid::GEN_SUPPORTED_GUIDS) => Some(Status::NotSupported),
            (RequestKind::Set, Oid::PNP_SET_POWER) => Some(self.process_set_power(request)),
            _ => None,
        }
    }

    fn process_set_power(&self, request: &mut ControlRequest) -> Status {
        const STATE_SIZE: usize = 4;

        let status = match request.read_u32(0) {
            None => Status::InvalidLength,
            Some(raw) => match DevicePowerState::try_from(raw) {
                Ok(device_state) => self.set_upper_power(device_state),
                Err(_) => Status::Failure,
            },
        };

        if status.is_success() {
            request.bytes_transferred = STATE_SIZE;
            request.bytes_needed = 0;
        } else {
            request.bytes_transferred = 0;
            request.bytes_needed = STATE_SIZE;
        }
        status
    }
}
