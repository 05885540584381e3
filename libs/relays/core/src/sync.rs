//! Blocking notification event with a status slot.
//!
//! Used where a relay thread has to wait for a completion delivered on some
//! other thread: downstream open/close, and an in-flight upper-edge attach.

use parking_lot::{Condvar, Mutex};
use relay_types::Status;

#[derive(Debug)]
struct EventState {
    signaled: bool,
    status: Status,
}

/// Manual-reset event carrying the status of the completion that set it
#[derive(Debug)]
pub struct Event {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState {
                signaled: false,
                status: Status::Success,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn reset(&self) {
        self.state.lock().signaled = false;
    }

    /// Record `status` and wake every waiter
    pub fn set(&self, status: Status) {
        let mut state = self.state.lock();
        state.status = status;
        state.signaled = true;
        self.cond.notify_all();
    }

    /// Block until set; returns the recorded status
    pub fn wait(&self) -> Status {
        let mut state = self.state.lock();
        while !state.signaled {
            self.cond.wait(&mut state);
        }
        state.status
    }

    pub fn is_set(&self) -> bool {
        self.state.lock().signaled
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
