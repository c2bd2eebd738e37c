//! Arena allocator for out-of-line column payloads.
//!
//! A tuple never owns the variable-length bytes of its out-of-line columns;
//! it stores a fixed-size descriptor pointing at a [`Pool`] slot instead.
//! Slots are released one by one with [`Pool::free`] or all at once with
//! [`Pool::reset`], typically when the statement or transaction that owns
//! the pool finishes.

use crate::storage::error::{StorageError, StorageResult};
use bytes::Bytes;
use log::{debug, warn};
use parking_lot::Mutex;

/// Handle to one allocation inside a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarlenRef(pub u32);

struct PoolSlot {
    capacity: usize,
    payload: Bytes,
}

#[derive(Default)]
struct PoolInner {
    slots: Vec<Option<PoolSlot>>,
    free_slots: Vec<u32>,
    allocated_bytes: usize,
}

/// Slot arena shared by every tuple that references it.
///
/// The slot table sits behind a mutex so tuples can allocate through a
/// shared `&Pool`; callers remain responsible for not racing on the same
/// tuple buffer.
#[derive(Default)]
pub struct Pool {
    inner: Mutex<PoolInner>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(slots: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                slots: Vec::with_capacity(slots),
                ..PoolInner::default()
            }),
        }
    }

    /// Reserve a slot able to hold up to `capacity` bytes. The slot starts
    /// out empty.
    pub fn allocate(&self, capacity: usize) -> VarlenRef {
        let mut inner = self.inner.lock();
        let slot = PoolSlot {
            capacity,
            payload: Bytes::new(),
        };
        inner.allocated_bytes += capacity;

        if let Some(index) = inner.free_slots.pop() {
            inner.slots[index as usize] = Some(slot);
            VarlenRef(index)
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Some(slot));
            VarlenRef(index)
        }
    }

    /// Replace the payload stored in `slot`.
    ///
    /// Panics if the slot has been freed.
    pub fn write(&self, slot: VarlenRef, bytes: &[u8]) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.slots.get_mut(slot.0 as usize).and_then(Option::as_mut) else {
            panic!("write to unallocated pool slot {}", slot.0);
        };
        if bytes.len() > entry.capacity {
            return Err(StorageError::ObjectTooLong {
                length: bytes.len(),
                max_length: entry.capacity,
            });
        }
        entry.payload = Bytes::copy_from_slice(bytes);
        Ok(())
    }

    /// Shared handle to the payload of `slot`, or `None` if it is not
    /// allocated.
    pub fn get(&self, slot: VarlenRef) -> Option<Bytes> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(slot.0 as usize)
            .and_then(Option::as_ref)
            .map(|entry| entry.payload.clone())
    }

    pub fn capacity(&self, slot: VarlenRef) -> Option<usize> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(slot.0 as usize)
            .and_then(Option::as_ref)
            .map(|entry| entry.capacity)
    }

    /// Release a single slot. Returns false if it was not allocated.
    pub fn free(&self, slot: VarlenRef) -> bool {
        let mut inner = self.inner.lock();
        let released = inner
            .slots
            .get_mut(slot.0 as usize)
            .and_then(Option::take);

        match released {
            Some(entry) => {
                inner.allocated_bytes -= entry.capacity;
                inner.free_slots.push(slot.0);
                true
            }
            None => {
                warn!("Ignoring free of unallocated pool slot {}", slot.0);
                false
            }
        }
    }

    /// Release every allocation at once.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        debug!(
            "Resetting pool: {} slots, {} bytes",
            inner.slots.len() - inner.free_slots.len(),
            inner.allocated_bytes
        );
        inner.slots.clear();
        inner.free_slots.clear();
        inner.allocated_bytes = 0;
    }

    /// Sum of the capacities of all live slots.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().allocated_bytes
    }

    pub fn live_allocations(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.len() - inner.free_slots.len()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("live_allocations", &self.live_allocations())
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}
