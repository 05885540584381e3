//! # Loopback Host
//!
//! ## Purpose
//! In-process stand-in for the host framework. Each opened device gets a
//! `LoopbackLower` with one worker thread that completes sends and requests
//! asynchronously and echoes every sent frame back up as a receive. A single
//! `CountingUpper` sits on top of every adapter and tallies what reaches it.
//!
//! ## Worker Protocol
//!
//! ```text
//! send(packet)  ──> Job::Send    ──> send_complete + receive_packet(echo)
//! request(req)  ──> Job::Request ──> request_complete
//! close()       ──> Job::Close   ──> close_complete, worker exits
//! ```
//!
//! Jobs are handled in submission order, so a close always follows the sends
//! queued before it.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use relay_core::{Adapter, Dispatch, HostFramework, LowerBinding, OpenOutcome, UpperEdge};
use relay_types::{
    mac_options, ControlRequest, Medium, Oid, Packet, PnpEvent, Status, StatusIndication,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Link speed reported by loopback devices, in 100 bps units
const LINK_SPEED: u32 = 10_000_000;
const MAX_FRAME_SIZE: u32 = 1500;

enum Job {
    Send(Packet),
    Request(ControlRequest),
    Close,
}

/// Counters shared by the loopback lower bindings and the upper edge
#[derive(Debug, Default)]
struct Counters {
    sends_completed: AtomicU64,
    send_failures: AtomicU64,
    frames_echoed: AtomicU64,
    packets_returned: AtomicU64,
    packets_received: AtomicU64,
    receive_completes: AtomicU64,
    requests_completed: AtomicU64,
    status_indications: AtomicU64,
    pnp_events: AtomicU64,
}

/// Point-in-time copy of the loopback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackCounters {
    pub sends_completed: u64,
    pub send_failures: u64,
    pub frames_echoed: u64,
    pub packets_returned: u64,
    pub packets_received: u64,
    pub receive_completes: u64,
    pub requests_completed: u64,
    pub status_indications: u64,
    pub pnp_events: u64,
}

impl Counters {
    fn snapshot(&self) -> LoopbackCounters {
        LoopbackCounters {
            sends_completed: self.sends_completed.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            frames_echoed: self.frames_echoed.load(Ordering::Relaxed),
            packets_returned: self.packets_returned.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            receive_completes: self.receive_completes.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            status_indications: self.status_indications.load(Ordering::Relaxed),
            pnp_events: self.pnp_events.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Lower binding
// ---------------------------------------------------------------------------

/// Loopback device underneath one adapter
struct LoopbackLower {
    device: String,
    jobs: Sender<Job>,
    counters: Arc<Counters>,
}

impl LoopbackLower {
    fn spawn(
        device: &str,
        adapter: Weak<Adapter>,
        counters: Arc<Counters>,
    ) -> std::io::Result<(Arc<Self>, JoinHandle<()>)> {
        let (jobs, rx) = unbounded();
        let worker = {
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name(format!("loopback-{device}"))
                .spawn(move || run_worker(rx, adapter, counters))?
        };

        let lower = Arc::new(Self {
            device: device.to_string(),
            jobs,
            counters,
        });
        Ok((lower, worker))
    }

    fn submit(&self, job: Job) -> bool {
        self.jobs.send(job).is_ok()
    }
}

impl LowerBinding for LoopbackLower {
    fn medium(&self) -> Medium {
        Medium::Ethernet802_3
    }

    fn send(&self, packet: Packet) -> Dispatch<Packet> {
        match self.jobs.send(Job::Send(packet)) {
            Ok(()) => Dispatch::Pending,
            Err(err) => match err.into_inner() {
                Job::Send(packet) => {
                    warn!(device = %self.device, "Loopback worker gone; failing send");
                    Dispatch::Complete(packet, Status::Failure)
                }
                _ => Dispatch::Pending,
            },
        }
    }

    fn request(&self, request: ControlRequest) -> Dispatch<ControlRequest> {
        match self.jobs.send(Job::Request(request)) {
            Ok(()) => Dispatch::Pending,
            Err(err) => match err.into_inner() {
                Job::Request(request) => Dispatch::Complete(request, Status::Failure),
                _ => Dispatch::Pending,
            },
        }
    }

    fn return_packet(&self, packet: Packet) {
        trace!(device = %self.device, packet = %packet.id(), "Echoed packet returned");
        bump(&self.counters.packets_returned);
    }

    fn close(&self) -> Status {
        if self.submit(Job::Close) {
            Status::Pending
        } else {
            Status::Success
        }
    }
}

fn run_worker(jobs: Receiver<Job>, adapter: Weak<Adapter>, counters: Arc<Counters>) {
    for job in jobs.iter() {
        let Some(adapter) = adapter.upgrade() else {
            debug!("Adapter gone; loopback worker exiting");
            return;
        };

        match job {
            Job::Send(packet) => {
                let frame = packet.payload();
                adapter.send_complete(packet, Status::Success);
                bump(&counters.sends_completed);

                if adapter.receive_packet(Packet::from_frame(frame)).is_some() {
                    trace!(device = adapter.device(), "Echo handed straight back");
                }
                bump(&counters.frames_echoed);

                if jobs.is_empty() {
                    adapter.receive_complete();
                }
            }
            Job::Request(mut request) => {
                let status = answer_request(&mut request);
                adapter.request_complete(request, status);
            }
            Job::Close => {
                // Push out anything still sitting in the receive batch first
                adapter.flush_receive_queue();
                adapter.close_complete(Status::Success);
                debug!(device = adapter.device(), "Loopback worker closed");
                return;
            }
        }
    }
}

fn answer_request(request: &mut ControlRequest) -> Status {
    if !request.is_query() {
        request.bytes_transferred = request.buffer.len();
        return Status::Success;
    }

    let value = match request.oid {
        Oid::GEN_LINK_SPEED => LINK_SPEED,
        Oid::GEN_MAXIMUM_FRAME_SIZE => MAX_FRAME_SIZE,
        Oid::GEN_MEDIA_CONNECT_STATUS => 0,
        Oid::GEN_MAC_OPTIONS => mac_options::COPY_LOOKAHEAD_DATA | mac_options::NO_LOOPBACK,
        _ => return Status::NotSupported,
    };
    if request.write_u32(0, value) {
        request.bytes_transferred = 4;
        Status::Success
    } else {
        request.bytes_needed = 4;
        Status::InvalidLength
    }
}

// ---------------------------------------------------------------------------
// Upper edge
// ---------------------------------------------------------------------------

/// Upper edge that counts everything and keeps nothing
struct CountingUpper {
    counters: Arc<Counters>,
}

impl UpperEdge for CountingUpper {
    fn send_complete(&self, packet: Packet, status: Status) {
        if !status.is_success() {
            debug!(packet = %packet.id(), %status, "Send failed");
            bump(&self.counters.send_failures);
        }
    }

    fn indicate_receive(&self, packets: Vec<Packet>) -> Vec<Packet> {
        self.counters
            .packets_received
            .fetch_add(packets.len() as u64, Ordering::Relaxed);
        packets
    }

    fn indicate_receive_frame(&self, _medium: Medium, _header: &[u8], _data: &[u8], _packet_size: usize) {
        bump(&self.counters.packets_received);
    }

    fn indicate_receive_complete(&self, _medium: Medium) {
        bump(&self.counters.receive_completes);
    }

    fn request_complete(&self, request: ControlRequest, status: Status) {
        debug!(oid = %request.oid, %status, value = ?request.read_u32(0), "Request complete");
        bump(&self.counters.requests_completed);
    }

    fn indicate_status(&self, status: StatusIndication, _payload: &[u8]) {
        debug!(code = status.code(), "Status indication");
        bump(&self.counters.status_indications);
    }

    fn indicate_status_complete(&self) {}

    fn notify_pnp(&self, event: PnpEvent) -> Status {
        debug!(%event, "PnP notification");
        bump(&self.counters.pnp_events);
        Status::Success
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Loopback host framework
pub struct LoopbackHost {
    counters: Arc<Counters>,
    upper: Arc<CountingUpper>,
    lowers: Mutex<HashMap<String, Arc<LoopbackLower>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LoopbackHost {
    pub fn new() -> Arc<Self> {
        let counters = Arc::new(Counters::default());
        Arc::new(Self {
            upper: Arc::new(CountingUpper {
                counters: Arc::clone(&counters),
            }),
            counters,
            lowers: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn counters(&self) -> LoopbackCounters {
        self.counters.snapshot()
    }

    /// Wait for every worker thread to exit; call after unbinding
    pub fn join_workers(&self) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                warn!("Loopback worker panicked");
            }
        }
    }
}

impl HostFramework for LoopbackHost {
    fn register_protocol(&self, name: &str) -> Status {
        info!(protocol = name, "Loopback host accepted registration");
        Status::Success
    }

    fn deregister_protocol(&self) {
        debug!("Loopback host deregistered");
    }

    fn open_adapter(&self, device: &str, adapter: &Arc<Adapter>) -> OpenOutcome {
        match LoopbackLower::spawn(device, Arc::downgrade(adapter), Arc::clone(&self.counters)) {
            Ok((lower, worker)) => {
                self.workers.lock().push(worker);
                self.lowers.lock().insert(device.to_string(), Arc::clone(&lower));
                OpenOutcome::Opened(lower)
            }
            Err(err) => {
                warn!(device, error = %err, "Failed to start loopback worker");
                OpenOutcome::Failed(Status::Resources)
            }
        }
    }

    fn initialize_upper_instance(&self, _instance: &str, adapter: &Arc<Adapter>) -> Status {
        let upper: Arc<dyn UpperEdge> = self.upper.clone();
        match adapter.upper_initialize(upper, &[Medium::Ethernet802_3]) {
            Ok(_) => Status::Success,
            Err(err) => err.status(),
        }
    }

    fn cancel_upper_instance(&self, _instance: &str) -> Status {
        // Attach is synchronous here; nothing is ever left to cancel
        Status::Failure
    }

    fn deinitialize_upper_instance(&self, adapter: &Arc<Adapter>) -> Status {
        adapter.halt();
        self.lowers.lock().remove(adapter.device());
        Status::Success
    }

    fn reenumerate_bindings(&self) {
        info!(devices = self.lowers.lock().len(), "Re-enumerating bindings");
    }
}
