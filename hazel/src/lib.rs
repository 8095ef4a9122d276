//! Hazel: hazard-pointer memory reclamation for lock-free data structures.
//!
//! Hazel implements classic hazard pointers: every pointer a thread is about
//! to dereference is first published in one of its hazard slots, and freeing
//! of retired allocations is deferred until a scan proves that no slot in the
//! process still announces them.
//!
//! # Key Features
//!
//! - **Bounded garbage**: unreclaimed memory is proportional to the number of
//!   live announcements, not to how long readers stay active
//! - **Stall tolerance**: a preempted reader only delays the allocations it
//!   actually announced
//! - **Lock-Free Progress**: no operation waits on another thread
//! - **Slot-Based Architecture**: two fixed slots per thread, allocated lazily
//!
//! # Example
//!
//! ```rust
//! use hazel::{guard, retire, Atomic, Ordering};
//!
//! let atomic = Atomic::new(Box::into_raw(Box::new(42)));
//!
//! // Claim a hazard slot and protect the pointer behind `atomic`.
//! let slot = guard();
//! let value = slot.protect(&atomic);
//!
//! // Access safely while the announcement is live.
//! unsafe {
//!     if let Some(value) = value.as_ref() {
//!         assert_eq!(*value, 42);
//!     }
//! }
//!
//! drop(slot);
//!
//! // Hand the allocation to the registry once nothing links to it anymore.
//! unsafe { retire(atomic.load(Ordering::Relaxed)) };
//! hazel::reclaim();
//! ```

#![warn(missing_docs)]

mod atomic;
mod guard;
mod retired;
mod slot;

pub use atomic::{Atomic, Shared};
pub use guard::{Guard, guard, reclaim, retire};

// Re-export for convenience
pub use core::sync::atomic::Ordering;
