//! Hazard slot arrays and global registry state.
//!
//! Each registered thread owns a small fixed group of announcement cells plus
//! a private retired list (kept in `guard::Handle`). The global state holds
//! the slot table, the thread index allocator, and the orphaned retirements
//! left behind by exited threads.

use crate::retired::Retired;
use core::sync::atomic::{AtomicUsize, Ordering, fence};
use once_cell::race::OnceBox;
use std::sync::{Mutex, PoisonError};

/// Hazard slots per thread. Two are enough for a validated list traversal:
/// one covers the node being read, the other its predecessor.
pub(crate) const HAZARDS_PER_THREAD: usize = 2;

/// Retired-list length at which a reclamation pass is attempted.
pub(crate) const RETIRE_THRESHOLD: usize = 100;

// Maximum concurrent threads. Configurable via cargo features:
//   hazel = { features = ["max-threads-512"] }
// Default: 128.
#[cfg(feature = "max-threads-1024")]
pub(crate) const MAX_THREADS: usize = 1024;
#[cfg(all(feature = "max-threads-512", not(feature = "max-threads-1024")))]
pub(crate) const MAX_THREADS: usize = 512;
#[cfg(all(
    feature = "max-threads-256",
    not(any(feature = "max-threads-512", feature = "max-threads-1024"))
))]
pub(crate) const MAX_THREADS: usize = 256;
#[cfg(not(any(
    feature = "max-threads-256",
    feature = "max-threads-512",
    feature = "max-threads-1024"
)))]
pub(crate) const MAX_THREADS: usize = 128;

/// Announcement cells of one thread. A non-zero cell is a live hazard: the
/// address it holds must not be freed until the cell is cleared or
/// overwritten.
#[repr(align(128))]
pub(crate) struct ThreadSlots {
    hazards: [AtomicUsize; HAZARDS_PER_THREAD],
}

impl ThreadSlots {
    fn new() -> Self {
        Self {
            hazards: core::array::from_fn(|_| AtomicUsize::new(0)),
        }
    }
}

/// Global registry state.
pub(crate) struct RegistryState {
    /// Per-thread announcement cells.
    slots: &'static [ThreadSlots],
    /// Thread index allocator (next never-used index).
    next_tid: AtomicUsize,
    /// Indices of exited threads, available for reuse.
    free_tids: Mutex<Vec<usize>>,
    /// Retirements left behind by exited threads; adopted by the next
    /// reclamation pass of any surviving thread.
    orphans: Mutex<Vec<Retired>>,
}

impl RegistryState {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_THREADS);
        for _ in 0..MAX_THREADS {
            slots.push(ThreadSlots::new());
        }
        Self {
            slots: Box::leak(slots.into_boxed_slice()),
            next_tid: AtomicUsize::new(0),
            free_tids: Mutex::new(Vec::new()),
            orphans: Mutex::new(Vec::new()),
        }
    }

    /// The announcement cell `index` of thread `tid`.
    #[inline]
    pub(crate) fn announcement(&self, tid: usize, index: usize) -> &AtomicUsize {
        &self.slots[tid].hazards[index]
    }

    /// Allocate a thread index.
    ///
    /// Recycled indices are preferred: they come back with their two
    /// announcement cells already cleared and the previous owner's retired
    /// list drained, so reuse can never revive a stale hazard. Fresh indices
    /// come from the high-water counter; the counter only moves when an
    /// index is actually handed out, so a rejected registration (caught by
    /// `catch_unwind`) does not burn slot groups.
    pub(crate) fn alloc_tid(&self) -> usize {
        if let Some(tid) = self.lock_free_tids().pop() {
            return tid;
        }
        self.next_tid
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current < MAX_THREADS).then_some(current + 1)
            })
            .unwrap_or_else(|_| {
                panic!("hazel: more than {MAX_THREADS} threads hold registry slots")
            })
    }

    /// Return a thread index for recycling. The caller must already have
    /// drained its retired list (into the orphan list if necessary).
    pub(crate) fn free_tid(&self, tid: usize) {
        for index in 0..HAZARDS_PER_THREAD {
            self.slots[tid].hazards[index].store(0, Ordering::Release);
        }
        self.lock_free_tids().push(tid);
    }

    /// Park retirements of an exiting thread for adoption.
    pub(crate) fn adopt_orphans(&self, mut entries: Vec<Retired>) {
        self.lock_orphans().append(&mut entries);
    }

    /// Move all parked retirements into `into`.
    pub(crate) fn drain_orphans(&self, into: &mut Vec<Retired>) {
        into.append(&mut self.lock_orphans());
    }

    /// Sorted, deduplicated addresses of every live hazard announcement,
    /// the caller's own included: a structure may retire a pointer that it
    /// still holds announced.
    pub(crate) fn protected_set(&self) -> Vec<usize> {
        // Order the scan after the unlinks that preceded the retirements
        // being examined.
        fence(Ordering::SeqCst);

        let high = self.next_tid.load(Ordering::Acquire).min(MAX_THREADS);
        let mut protected = Vec::with_capacity(high * HAZARDS_PER_THREAD);
        for slots in &self.slots[..high] {
            for hazard in &slots.hazards {
                let addr = hazard.load(Ordering::SeqCst);
                if addr != 0 {
                    protected.push(addr);
                }
            }
        }
        protected.sort_unstable();
        protected.dedup();
        protected
    }

    fn lock_free_tids(&self) -> std::sync::MutexGuard<'_, Vec<usize>> {
        // The list stays consistent across panics; ignore poisoning.
        self.free_tids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_orphans(&self) -> std::sync::MutexGuard<'_, Vec<Retired>> {
        self.orphans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Global singleton instance
static GLOBAL: OnceBox<RegistryState> = OnceBox::new();

/// Get reference to global registry state
#[inline]
pub(crate) fn global() -> &'static RegistryState {
    GLOBAL.get_or_init(|| Box::new(RegistryState::new()))
}
