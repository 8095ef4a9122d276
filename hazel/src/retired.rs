//! Retired allocations awaiting safe destruction.
//!
//! A retired pointer is already unreachable from the owning structure; it
//! waits on its thread's retired list until a scan proves no hazard
//! announcement covers it.

/// Type-erased destructor invoked when a retired allocation is reclaimed.
type DestructorFn = unsafe fn(*mut ());

/// A single retired allocation: raw address plus the monomorphized
/// destructor that reboxes and drops it.
pub(crate) struct Retired {
    ptr: *mut (),
    destructor: DestructorFn,
}

impl Retired {
    /// Capture `ptr` together with a destructor for its concrete type.
    pub(crate) fn new<T: 'static>(ptr: *mut T) -> Self {
        unsafe fn destructor<T>(ptr: *mut ()) {
            // SAFETY: `ptr` came from `Box::into_raw` on a `T`; the registry
            // reclaims each entry exactly once.
            unsafe { drop(Box::from_raw(ptr as *mut T)) };
        }
        Self {
            ptr: ptr as *mut (),
            destructor: destructor::<T>,
        }
    }

    /// Address used for membership tests against the protected set.
    #[inline]
    pub(crate) fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Destroy the allocation.
    ///
    /// # Safety
    ///
    /// No hazard announcement may cover this address.
    pub(crate) unsafe fn reclaim(self) {
        // SAFETY: forwarded to the caller
        unsafe { (self.destructor)(self.ptr) };
    }
}

// SAFETY: ownership of the allocation moved to the registry at retire time;
// the destructor only requires the `T: 'static` captured in `new`.
unsafe impl Send for Retired {}
