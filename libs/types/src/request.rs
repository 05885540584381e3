//! Control (get/set) requests relayed from the upper edge to the lower binding.

use crate::oid::Oid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Query,
    Set,
}

/// A single get/set request and its information buffer
///
/// For a query the buffer is the space the answer is written into; for a set
/// it carries the value. `bytes_transferred`/`bytes_needed` are filled in by
/// whoever completes the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub kind: RequestKind,
    pub oid: Oid,
    pub buffer: Vec<u8>,
    pub bytes_transferred: usize,
    pub bytes_needed: usize,
}

impl ControlRequest {
    /// Query with an answer buffer of `capacity` bytes
    pub fn query(oid: Oid, capacity: usize) -> Self {
        Self {
            kind: RequestKind::Query,
            oid,
            buffer: vec![0u8; capacity],
            bytes_transferred: 0,
            bytes_needed: 0,
        }
    }

    pub fn set(oid: Oid, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: RequestKind::Set,
            oid,
            buffer: value.into(),
            bytes_transferred: 0,
            bytes_needed: 0,
        }
    }

    pub fn is_query(&self) -> bool {
        self.kind == RequestKind::Query
    }

    /// Little-endian `u32` at `offset`, if the buffer is long enough
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.buffer.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Overwrite the little-endian `u32` at `offset`; false if out of range
    pub fn write_u32(&mut self, offset: usize, value: u32) -> bool {
        let Some(end) = offset.checked_add(4) else {
            return false;
        };
        match self.buffer.get_mut(offset..end) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }
}
