//! In-flight memory governor.
//!
//! Bounds how much work the phase pool holds in memory at once. The primary
//! ceiling is an item count (raw byte accounting is unreliable across codec
//! backends); an optional byte bound refines it when size estimates exist.
//!
//! A [`Reservation`] is an RAII token: admission happens in
//! [`MemoryGovernor::reserve`], release happens in `Drop`. Workers that fail,
//! reject, or panic all release on unwind, so the counter cannot leak -
//! leaked reservations are the classic cause of gradual throughput collapse
//! under sustained load.

use crate::config::MemoryConfig;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Default)]
struct Usage {
    items: usize,
    bytes: u64,
}

struct Inner {
    usage: Mutex<Usage>,
    freed: Condvar,
    ceiling_items: usize,
    ceiling_bytes: u64,
}

/// Counting semaphore gating admission to the phase worker pool.
///
/// Cloneable handle; all clones share the same counters.
#[derive(Clone)]
pub struct MemoryGovernor {
    inner: Arc<Inner>,
}

impl MemoryGovernor {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                usage: Mutex::new(Usage::default()),
                freed: Condvar::new(),
                ceiling_items: config.ceiling_items.max(1),
                ceiling_bytes: config.ceiling_bytes,
            }),
        }
    }

    /// Block until there is room for one more item of `estimated_bytes`,
    /// then reserve it.
    ///
    /// An oversized item is still admitted when nothing else is in flight;
    /// otherwise it could never run at all.
    pub fn reserve(&self, estimated_bytes: u64) -> Reservation {
        let mut usage = self.inner.usage.lock().unwrap();
        loop {
            let item_ok = usage.items < self.inner.ceiling_items;
            let bytes_ok = self.inner.ceiling_bytes == 0
                || usage.items == 0
                || usage.bytes + estimated_bytes <= self.inner.ceiling_bytes;
            if item_ok && bytes_ok {
                break;
            }
            usage = self.inner.freed.wait(usage).unwrap();
        }
        usage.items += 1;
        usage.bytes += estimated_bytes;
        Reservation {
            inner: Arc::clone(&self.inner),
            bytes: estimated_bytes,
        }
    }

    /// Current number of in-flight reservations.
    pub fn in_flight(&self) -> usize {
        self.inner.usage.lock().unwrap().items
    }
}

/// Token for one admitted item. Releasing is automatic on drop.
pub struct Reservation {
    inner: Arc<Inner>,
    bytes: u64,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut usage = self.inner.usage.lock().unwrap();
        usage.items -= 1;
        usage.bytes -= self.bytes;
        drop(usage);
        self.inner.freed.notify_all();
    }
}
