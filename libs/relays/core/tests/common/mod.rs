//! Shared mock collaborators for relay integration tests.
//!
//! `MockHost` opens `MockLower` bindings and attaches a `MockUpper` edge; each
//! records everything the relay hands it so tests can assert on ordering and
//! exactly-once delivery.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use relay_core::{
    Adapter, Dispatch, HostFramework, LowerBinding, OpenOutcome, RelayConfig, RelayDriver,
    UpperEdge,
};
use relay_types::{
    ControlRequest, Medium, Packet, PacketId, PnpEvent, Status, StatusIndication,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

pub const DEVICE: &str = "lower0";
pub const INSTANCE: &str = "relay0";

pub fn test_config() -> RelayConfig {
    RelayConfig::compact_defaults().with_binding(DEVICE, INSTANCE)
}

/// How the mock completes an operation handed to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Sync(Status),
    /// Kept until the test completes it
    Pending,
    /// Completed from another thread after a short delay
    Deferred(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    Immediate,
    /// Held until `MockHost::finish_attach`
    Deferred,
    Fail(Status),
}

// ---------------------------------------------------------------------------
// Lower binding
// ---------------------------------------------------------------------------

pub struct MockLower {
    pub medium: Medium,
    adapter: Mutex<Weak<Adapter>>,
    pub send_mode: Mutex<Completion>,
    pub request_mode: Mutex<Completion>,
    pub close_mode: Mutex<Completion>,
    /// Written into query buffers on completion
    pub response: Mutex<Option<Vec<u8>>>,
    pub pending_sends: Mutex<Vec<Packet>>,
    pub pending_requests: Mutex<Vec<ControlRequest>>,
    pub sent: Mutex<Vec<PacketId>>,
    pub forwarded_requests: Mutex<Vec<ControlRequest>>,
    pub returned: Mutex<Vec<Packet>>,
    pub cancelled: Mutex<Vec<u64>>,
    pub close_calls: AtomicUsize,
}

impl MockLower {
    pub fn new(medium: Medium) -> Arc<Self> {
        Arc::new(Self {
            medium,
            adapter: Mutex::new(Weak::new()),
            send_mode: Mutex::new(Completion::Sync(Status::Success)),
            request_mode: Mutex::new(Completion::Sync(Status::Success)),
            close_mode: Mutex::new(Completion::Sync(Status::Success)),
            response: Mutex::new(None),
            pending_sends: Mutex::new(Vec::new()),
            pending_requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            forwarded_requests: Mutex::new(Vec::new()),
            returned: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        })
    }

    fn attach(&self, adapter: &Arc<Adapter>) {
        *self.adapter.lock() = Arc::downgrade(adapter);
    }

    pub fn adapter(&self) -> Arc<Adapter> {
        self.adapter.lock().upgrade().expect("adapter still alive")
    }

    /// Complete every pending send with `status`; returns how many
    pub fn complete_sends(&self, status: Status) -> usize {
        let packets: Vec<Packet> = self.pending_sends.lock().drain(..).collect();
        let adapter = self.adapter();
        let count = packets.len();
        for packet in packets {
            adapter.send_complete(packet, status);
        }
        count
    }

    pub fn complete_request(&self, status: Status) -> bool {
        let request = self.pending_requests.lock().pop();
        match request {
            Some(mut request) => {
                self.fill_response(&mut request);
                self.adapter().request_complete(request, status);
                true
            }
            None => false,
        }
    }

    pub fn returned_ids(&self) -> Vec<PacketId> {
        self.returned.lock().iter().map(Packet::id).collect()
    }

    fn fill_response(&self, request: &mut ControlRequest) {
        if let Some(response) = self.response.lock().as_ref() {
            let len = response.len().min(request.buffer.len());
            request.buffer[..len].copy_from_slice(&response[..len]);
            request.bytes_transferred = len;
        }
    }
}

impl LowerBinding for MockLower {
    fn medium(&self) -> Medium {
        self.medium
    }

    fn send(&self, packet: Packet) -> Dispatch<Packet> {
        self.sent.lock().push(packet.id());
        let mode = *self.send_mode.lock();
        match mode {
            Completion::Sync(status) => Dispatch::Complete(packet, status),
            Completion::Pending => {
                self.pending_sends.lock().push(packet);
                Dispatch::Pending
            }
            Completion::Deferred(status) => {
                let adapter = self.adapter();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    adapter.send_complete(packet, status);
                });
                Dispatch::Pending
            }
        }
    }

    fn request(&self, mut request: ControlRequest) -> Dispatch<ControlRequest> {
        self.forwarded_requests.lock().push(request.clone());
        let mode = *self.request_mode.lock();
        match mode {
            Completion::Sync(status) => {
                self.fill_response(&mut request);
                Dispatch::Complete(request, status)
            }
            Completion::Pending => {
                self.pending_requests.lock().push(request);
                Dispatch::Pending
            }
            Completion::Deferred(status) => {
                self.fill_response(&mut request);
                let adapter = self.adapter();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    adapter.request_complete(request, status);
                });
                Dispatch::Pending
            }
        }
    }

    fn return_packet(&self, packet: Packet) {
        self.returned.lock().push(packet);
    }

    fn close(&self) -> Status {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.close_mode.lock();
        match mode {
            Completion::Sync(status) => status,
            Completion::Pending | Completion::Deferred(_) => {
                let status = match mode {
                    Completion::Deferred(status) => status,
                    _ => Status::Success,
                };
                let adapter = self.adapter();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    adapter.close_complete(status);
                });
                Status::Pending
            }
        }
    }

    fn cancel_send_packets(&self, cancel_id: u64) {
        self.cancelled.lock().push(cancel_id);
    }
}

// ---------------------------------------------------------------------------
// Upper edge
// ---------------------------------------------------------------------------

pub struct MockUpper {
    /// Keep packets indicated with Success instead of handing them straight back
    pub retain: AtomicBool,
    pub retained: Mutex<Vec<Packet>>,
    pub batches: Mutex<Vec<Vec<PacketId>>>,
    pub frames: Mutex<Vec<(Medium, Vec<u8>, Vec<u8>, usize)>>,
    pub receive_completes: AtomicUsize,
    pub request_completions: Mutex<Vec<(ControlRequest, Status)>>,
    pub statuses: Mutex<Vec<StatusIndication>>,
    pub status_completes: AtomicUsize,
    pub pnp_events: Mutex<Vec<PnpEvent>>,
    send_tx: Sender<(PacketId, Status)>,
    pub send_rx: Receiver<(PacketId, Status)>,
}

impl MockUpper {
    pub fn new() -> Arc<Self> {
        let (send_tx, send_rx) = unbounded();
        Arc::new(Self {
            retain: AtomicBool::new(true),
            retained: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            receive_completes: AtomicUsize::new(0),
            request_completions: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            status_completes: AtomicUsize::new(0),
            pnp_events: Mutex::new(Vec::new()),
            send_tx,
            send_rx,
        })
    }

    /// Hand every retained packet back to `adapter`
    pub fn release_retained(&self, adapter: &Adapter) -> usize {
        let packets: Vec<Packet> = self.retained.lock().drain(..).collect();
        let count = packets.len();
        for packet in packets {
            adapter.return_packet(packet);
        }
        count
    }

    pub fn delivered_ids(&self) -> Vec<PacketId> {
        self.batches.lock().iter().flatten().copied().collect()
    }

    pub fn send_completions(&self) -> Vec<(PacketId, Status)> {
        self.send_rx.try_iter().collect()
    }
}

impl UpperEdge for MockUpper {
    fn send_complete(&self, packet: Packet, status: Status) {
        let _ = self.send_tx.send((packet.id(), status));
    }

    fn indicate_receive(&self, packets: Vec<Packet>) -> Vec<Packet> {
        self.batches
            .lock()
            .push(packets.iter().map(Packet::id).collect());

        let retain = self.retain.load(Ordering::SeqCst);
        let mut handed_back = Vec::new();
        for packet in packets {
            if retain && packet.status != Status::Resources {
                self.retained.lock().push(packet);
            } else {
                handed_back.push(packet);
            }
        }
        handed_back
    }

    fn indicate_receive_frame(&self, medium: Medium, header: &[u8], data: &[u8], packet_size: usize) {
        self.frames
            .lock()
            .push((medium, header.to_vec(), data.to_vec(), packet_size));
    }

    fn indicate_receive_complete(&self, _medium: Medium) {
        self.receive_completes.fetch_add(1, Ordering::SeqCst);
    }

    fn request_complete(&self, request: ControlRequest, status: Status) {
        self.request_completions.lock().push((request, status));
    }

    fn indicate_status(&self, status: StatusIndication, _payload: &[u8]) {
        self.statuses.lock().push(status);
    }

    fn indicate_status_complete(&self) {
        self.status_completes.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_pnp(&self, event: PnpEvent) -> Status {
        self.pnp_events.lock().push(event);
        Status::Success
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub struct MockHost {
    pub lower: Arc<MockLower>,
    pub upper: Arc<MockUpper>,
    pub offered_media: Mutex<Vec<Medium>>,
    pub register_status: Mutex<Status>,
    pub open_mode: Mutex<Completion>,
    pub attach_mode: Mutex<AttachMode>,
    pub cancel_succeeds: AtomicBool,
    deferred_attach: Mutex<Option<Arc<Adapter>>>,
    pub register_calls: AtomicUsize,
    pub deregister_calls: AtomicUsize,
    pub reenumerate_calls: AtomicUsize,
    pub deinitialize_calls: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Self::with_medium(Medium::Ethernet802_3)
    }

    pub fn with_medium(medium: Medium) -> Arc<Self> {
        Arc::new(Self {
            lower: MockLower::new(medium),
            upper: MockUpper::new(),
            offered_media: Mutex::new(vec![Medium::Ethernet802_3]),
            register_status: Mutex::new(Status::Success),
            open_mode: Mutex::new(Completion::Sync(Status::Success)),
            attach_mode: Mutex::new(AttachMode::Immediate),
            cancel_succeeds: AtomicBool::new(true),
            deferred_attach: Mutex::new(None),
            register_calls: AtomicUsize::new(0),
            deregister_calls: AtomicUsize::new(0),
            reenumerate_calls: AtomicUsize::new(0),
            deinitialize_calls: AtomicUsize::new(0),
        })
    }

    /// Run a deferred upper-edge attach now; false if none is held
    pub fn finish_attach(&self) -> bool {
        let adapter = self.deferred_attach.lock().take();
        match adapter {
            Some(adapter) => {
                self.attach(&adapter);
                true
            }
            None => false,
        }
    }

    fn attach(&self, adapter: &Arc<Adapter>) -> Status {
        let media = self.offered_media.lock().clone();
        let upper: Arc<dyn UpperEdge> = self.upper.clone();
        match adapter.upper_initialize(upper, &media) {
            Ok(_) => Status::Success,
            Err(err) => err.status(),
        }
    }
}

impl HostFramework for MockHost {
    fn register_protocol(&self, _name: &str) -> Status {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        *self.register_status.lock()
    }

    fn deregister_protocol(&self) {
        self.deregister_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn open_adapter(&self, _device: &str, adapter: &Arc<Adapter>) -> OpenOutcome {
        self.lower.attach(adapter);
        let binding: Arc<dyn LowerBinding> = self.lower.clone();
        let mode = *self.open_mode.lock();
        match mode {
            Completion::Sync(Status::Success) => OpenOutcome::Opened(binding),
            Completion::Sync(status) => OpenOutcome::Failed(status),
            Completion::Pending => {
                adapter.open_complete(Status::Success);
                OpenOutcome::Pending(binding)
            }
            Completion::Deferred(status) => {
                let adapter = Arc::clone(adapter);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    adapter.open_complete(status);
                });
                OpenOutcome::Pending(binding)
            }
        }
    }

    fn initialize_upper_instance(&self, _instance: &str, adapter: &Arc<Adapter>) -> Status {
        let mode = *self.attach_mode.lock();
        match mode {
            AttachMode::Immediate => {
                self.attach(adapter);
                Status::Success
            }
            AttachMode::Deferred => {
                *self.deferred_attach.lock() = Some(Arc::clone(adapter));
                Status::Success
            }
            AttachMode::Fail(status) => status,
        }
    }

    fn cancel_upper_instance(&self, _instance: &str) -> Status {
        if self.cancel_succeeds.load(Ordering::SeqCst) && self.deferred_attach.lock().take().is_some() {
            Status::Success
        } else {
            Status::Failure
        }
    }

    fn deinitialize_upper_instance(&self, adapter: &Arc<Adapter>) -> Status {
        self.deinitialize_calls.fetch_add(1, Ordering::SeqCst);
        adapter.halt();
        Status::Success
    }

    fn reenumerate_bindings(&self) {
        self.reenumerate_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Register a driver on a fresh mock host and bind `DEVICE`
pub fn bound_adapter() -> (Arc<MockHost>, RelayDriver, Arc<Adapter>) {
    bound_adapter_with(MockHost::new(), test_config())
}

pub fn bound_adapter_with(host: Arc<MockHost>, config: RelayConfig) -> (Arc<MockHost>, RelayDriver, Arc<Adapter>) {
    let driver = RelayDriver::register(host.clone(), config).expect("register");
    let adapter = driver.bind(DEVICE).expect("bind");
    (host, driver, adapter)
}

/// Packet that must be wrapped: no stack slot left
pub fn unstackable(frame: &'static [u8]) -> Packet {
    Packet::from_frame(frame).with_stack_remaining(0)
}
