//! # Packet Descriptors
//!
//! ## Purpose
//! Owned packet descriptor that crosses the relay boundary in both directions.
//! A descriptor carries a chain of `Bytes` buffers (cheap to clone, never copied),
//! per-packet flags, out-of-band data and a small amount of "stack" capacity
//! that decides whether a relay layer may forward it as-is or must wrap it.
//!
//! ## Ownership Model
//! A pool-allocated wrapper owns the original packet it stands in for through
//! its reserved area ([`Packet::stash_original`] / [`Packet::take_original`]).
//! The original is moved in, never aliased, and moved back out on completion.

use crate::status::Status;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a packet descriptor for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(u64);

impl PacketId {
    fn next() -> Self {
        PacketId(NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt#{}", self.0)
    }
}

/// Identity of the pool a descriptor was allocated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    /// Fresh process-unique pool identity
    pub fn next() -> Self {
        PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-packet info carried alongside the data (checksum offload, priority, VLAN, cancel id)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerPacketInfo {
    pub checksum: u32,
    pub priority: u8,
    pub vlan_id: u16,
    pub cancel_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutOfBand {
    /// Medium-specific blob, relayed untouched
    pub media_specific: Option<Bytes>,
    pub per_packet: PerPacketInfo,
}

pub struct Packet {
    id: PacketId,
    pool: Option<PoolId>,
    pub buffers: Vec<Bytes>,
    pub flags: u32,
    pub header_size: usize,
    /// Receive status; `Resources` means the holder must copy before retaining
    pub status: Status,
    pub oob: OutOfBand,
    stack_remaining: u8,
    reserved: Option<Box<Packet>>,
}

impl Packet {
    /// Stack slots a freshly built packet offers to the layers it passes through
    pub const DEFAULT_STACK_DEPTH: u8 = 2;

    pub fn new(buffers: Vec<Bytes>) -> Self {
        Self {
            id: PacketId::next(),
            pool: None,
            buffers,
            flags: 0,
            header_size: 0,
            status: Status::Success,
            oob: OutOfBand::default(),
            stack_remaining: Self::DEFAULT_STACK_DEPTH,
            reserved: None,
        }
    }

    /// Single-buffer packet holding one frame
    pub fn from_frame(frame: impl Into<Bytes>) -> Self {
        Self::new(vec![frame.into()])
    }

    /// Empty descriptor owned by `pool`
    pub fn descriptor(pool: PoolId) -> Self {
        let mut packet = Self::new(Vec::new());
        packet.pool = Some(pool);
        packet
    }

    pub fn with_stack_remaining(mut self, slots: u8) -> Self {
        self.stack_remaining = slots;
        self
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn pool(&self) -> Option<PoolId> {
        self.pool
    }

    pub fn is_from(&self, pool: PoolId) -> bool {
        self.pool == Some(pool)
    }

    pub fn stack_remaining(&self) -> u8 {
        self.stack_remaining
    }

    /// Claim one stack slot for the current layer; false if none is left
    pub fn push_stack(&mut self) -> bool {
        if self.stack_remaining == 0 {
            return false;
        }
        self.stack_remaining -= 1;
        true
    }

    /// Give back a slot claimed by [`push_stack`](Self::push_stack)
    pub fn pop_stack(&mut self) {
        self.stack_remaining = self.stack_remaining.saturating_add(1);
    }

    /// Move `original` into this wrapper's reserved area
    pub fn stash_original(&mut self, original: Packet) {
        debug_assert!(self.reserved.is_none(), "wrapper already holds an original");
        self.reserved = Some(Box::new(original));
    }

    pub fn take_original(&mut self) -> Option<Packet> {
        self.reserved.take().map(|boxed| *boxed)
    }

    pub fn original(&self) -> Option<&Packet> {
        self.reserved.as_deref()
    }

    /// Point this descriptor at `source`'s data and send-side metadata
    pub fn copy_send_fields_from(&mut self, source: &Packet) {
        self.buffers = source.buffers.clone();
        self.flags = source.flags;
        self.header_size = source.header_size;
        self.oob = source.oob.clone();
    }

    /// Point this descriptor at `source`'s data and receive-side metadata
    pub fn copy_receive_fields_from(&mut self, source: &Packet) {
        self.buffers = source.buffers.clone();
        self.flags = source.flags;
        self.header_size = source.header_size;
        self.oob = source.oob.clone();
        self.status = source.status;
    }

    /// Reset to an empty descriptor, keeping identity and pool ownership
    pub fn recycle(&mut self) {
        debug_assert!(self.reserved.is_none(), "recycling a wrapper that still owns its original");
        self.buffers.clear();
        self.flags = 0;
        self.header_size = 0;
        self.status = Status::Success;
        self.oob = OutOfBand::default();
        self.stack_remaining = Self::DEFAULT_STACK_DEPTH;
    }

    pub fn total_len(&self) -> usize {
        self.buffers.iter().map(Bytes::len).sum()
    }

    /// Contiguous copy of the buffer chain
    pub fn payload(&self) -> Bytes {
        match self.buffers.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chain => {
                let mut out = BytesMut::with_capacity(self.total_len());
                for buffer in chain {
                    out.extend_from_slice(buffer);
                }
                out.freeze()
            }
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .field("len", &self.total_len())
            .field("status", &self.status)
            .field("stack_remaining", &self.stack_remaining)
            .field("original", &self.reserved.as_ref().map(|p| p.id))
            .finish()
    }
}

/// A frame indicated by the lower binding in buffer form
///
/// `packet` is set when the lower binding also has a packet object for the
/// frame; the relay then prefers packet-form delivery upward.
#[derive(Debug)]
pub struct ReceivedFrame {
    pub header: Bytes,
    pub data: Bytes,
    pub packet_size: usize,
    pub packet: Option<Packet>,
}

impl ReceivedFrame {
    pub fn new(header: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        let header = header.into();
        let data = data.into();
        let packet_size = data.len();
        Self {
            header,
            data,
            packet_size,
            packet: None,
        }
    }

    pub fn with_packet(mut self, packet: Packet) -> Self {
        self.packet = Some(packet);
        self
    }
}
