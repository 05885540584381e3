//! # Packet Pools and the Stacking Decision
//!
//! ## Purpose
//! Bounded free-lists of packet descriptors, one for sends and one for
//! receives per adapter, and the decision of whether a packet crosses the
//! relay boundary as-is or inside a pool wrapper.
//!
//! ## Stacking
//! A packet that still has a free stack slot is forwarded untouched
//! ([`Relayed::Forwarded`]). Otherwise a descriptor is taken from the pool,
//! pointed at the original's buffers, and made the owner of the original
//! ([`Relayed::Wrapped`]). Completion paths tell the two apart with
//! [`PacketPool::owns`].

use crate::error::{RelayError, RelayResult};
use parking_lot::Mutex;
use relay_types::{Packet, PacketId, PoolId};
use tracing::{trace, warn};

/// How a packet crossed the relay boundary
#[derive(Debug)]
pub enum Relayed {
    /// The original itself, holding one of its stack slots
    Forwarded { original: Packet },
    /// A pool descriptor that owns the original in its reserved area
    Wrapped { original_id: PacketId, wrapper: Packet },
}

impl Relayed {
    pub fn into_packet(self) -> Packet {
        match self {
            Relayed::Forwarded { original } => original,
            Relayed::Wrapped { wrapper, .. } => wrapper,
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    free: Vec<Packet>,
    allocated: usize,
    released: bool,
}

/// Bounded, thread-safe pool of packet descriptors
#[derive(Debug)]
pub struct PacketPool {
    id: PoolId,
    name: &'static str,
    max: usize,
    inner: Mutex<PoolInner>,
}

impl PacketPool {
    /// Pool pre-populated with `min` descriptors that may grow to `max`
    pub fn new(name: &'static str, min: usize, max: usize) -> RelayResult<Self> {
        if max == 0 || min > max {
            return Err(RelayError::ResourceExhaustion(format!(
                "{name} pool cannot hold {min}..{max} descriptors"
            )));
        }

        let id = PoolId::next();
        let free = (0..min).map(|_| Packet::descriptor(id)).collect();
        Ok(Self {
            id,
            name,
            max,
            inner: Mutex::new(PoolInner {
                free,
                allocated: min,
                released: false,
            }),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// True if `packet` is one of this pool's descriptors
    pub fn owns(&self, packet: &Packet) -> bool {
        packet.is_from(self.id)
    }

    /// Take a descriptor; `None` when the pool is at its ceiling or released
    pub fn alloc(&self) -> Option<Packet> {
        let mut inner = self.inner.lock();
        if inner.released {
            return None;
        }
        if let Some(packet) = inner.free.pop() {
            return Some(packet);
        }
        if inner.allocated < self.max {
            inner.allocated += 1;
            return Some(Packet::descriptor(self.id));
        }
        None
    }

    /// Return a descriptor taken with [`alloc`](Self::alloc)
    pub fn free(&self, mut packet: Packet) {
        debug_assert!(self.owns(&packet), "{} pool freeing a foreign packet", self.name);
        if !self.owns(&packet) {
            return;
        }
        packet.recycle();
        let mut inner = self.inner.lock();
        if inner.released {
            inner.allocated = inner.allocated.saturating_sub(1);
            return;
        }
        inner.free.push(packet);
    }

    /// Descriptors currently handed out
    pub fn in_use(&self) -> usize {
        let inner = self.inner.lock();
        inner.allocated - inner.free.len()
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Drop every cached descriptor and refuse further allocation
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        debug_assert!(!inner.released, "{} pool released twice", self.name);
        let outstanding = inner.allocated - inner.free.len();
        if outstanding != 0 {
            warn!(pool = self.name, outstanding, "Releasing pool with descriptors still in use");
        }
        inner.released = true;
        inner.allocated = outstanding;
        inner.free.clear();
    }

    /// Forward `packet` as-is when it has stack space, otherwise wrap it
    ///
    /// `copy` fills the wrapper from the original before ownership moves.
    /// Pool exhaustion hands the untouched packet back as `Err`.
    pub fn stack_or_wrap(
        &self,
        mut packet: Packet,
        copy: impl FnOnce(&mut Packet, &Packet),
    ) -> Result<Relayed, Packet> {
        if packet.push_stack() {
            trace!(pool = self.name, packet = %packet.id(), "Forwarding on packet stack");
            return Ok(Relayed::Forwarded { original: packet });
        }

        let Some(mut wrapper) = self.alloc() else {
            warn!(pool = self.name, packet = %packet.id(), "Packet pool exhausted");
            return Err(packet);
        };
        copy(&mut wrapper, &packet);
        let original_id = packet.id();
        wrapper.stash_original(packet);
        trace!(pool = self.name, packet = %original_id, wrapper = %wrapper.id(), "Wrapped packet");
        Ok(Relayed::Wrapped {
            original_id,
            wrapper,
        })
    }
}
