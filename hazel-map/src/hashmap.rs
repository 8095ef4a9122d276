//! Hash map over per-bucket lock-free linked lists.
//!
//! # Architecture
//!
//! - **Buckets**: fixed array of atomic head pointers, sized at construction;
//!   a key's bucket is `hash mod capacity`.
//! - **Nodes**: singly linked, key fixed at publication, value held in a
//!   separately boxed cell that is swapped wholesale on update so readers
//!   never observe a torn value.
//! - **Removal**: two CAS steps in the style of Michael's algorithm. The low
//!   bit of a node's `next` is its deletion mark; marking freezes the link
//!   and makes the key invisible, the unlink CAS on the predecessor makes
//!   the node unreachable. Every traversal helps finish unlinks it runs into.
//! - **Reclamation**: unreachable nodes and superseded value cells go to
//!   `hazel::retire`; traversals keep the node under inspection and its
//!   predecessor announced in the thread's two hazard slots, re-validating
//!   the incoming link after every announcement.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ptr;
use core::sync::atomic::Ordering;
use foldhash::fast::FixedState;
use hazel::{Atomic, Guard, guard, retire};

/// Number of buckets when no capacity is requested.
const DEFAULT_CAPACITY: usize = 16;

/// A simple exponential backoff for reducing contention.
struct Backoff {
    step: u32,
}

impl Backoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline(always)]
    fn spin(&mut self) {
        for _ in 0..(1 << self.step.min(6)) {
            core::hint::spin_loop();
        }
        if self.step <= 6 {
            self.step += 1;
        }
    }
}

// Deletion mark: low bit of a `next` pointer. Nodes are boxed, so the bit is
// always free.

#[inline]
fn is_marked<T>(ptr: *mut T) -> bool {
    ptr as usize & 1 == 1
}

#[inline]
fn marked<T>(ptr: *mut T) -> *mut T {
    (ptr as usize | 1) as *mut T
}

#[inline]
fn unmarked<T>(ptr: *mut T) -> *mut T {
    (ptr as usize & !1) as *mut T
}

/// Node in a bucket chain.
///
/// `hash` and `key` never change after the node is published. `value` owns
/// the current value cell; updates swap the whole cell and retire the old
/// one. `next` is the chain link and carries the deletion mark.
struct Node<K, V> {
    hash: u64,
    key: K,
    value: Atomic<V>,
    next: Atomic<Node<K, V>>,
}

impl<K, V> Node<K, V> {
    fn alloc(hash: u64, key: K, cell: *mut V) -> *mut Self {
        Box::into_raw(Box::new(Self {
            hash,
            key,
            value: Atomic::new(cell),
            next: Atomic::null(),
        }))
    }
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        let cell = self.value.load(Ordering::Relaxed);
        if !cell.is_null() {
            // SAFETY: the node owns its current cell; nobody else frees it
            unsafe { drop(Box::from_raw(cell)) };
        }
    }
}

/// Where a chain search ended up.
enum FindResult<'g, K, V> {
    /// A live (unmarked) node with the key. `node` is announced by one of
    /// the traversal guards; `spare` holds the other slot, which still
    /// protects the owner of `prev_link`. Reusing it forfeits `prev_link`.
    Present {
        prev_link: &'g Atomic<Node<K, V>>,
        node: &'g Node<K, V>,
        next: *mut Node<K, V>,
        spare: &'g Guard,
    },
    /// No live node with the key; `prev_link` is the link the search ended
    /// on (its owner is still announced), ready for a tail insertion.
    Absent {
        prev_link: &'g Atomic<Node<K, V>>,
    },
}

/// Lock-free concurrent hash map.
///
/// Progress is lock-free: an operation retries only after another thread
/// changed the chain it works on. Lookups copy the value out; the element
/// count is not tracked and iteration is not offered.
pub struct HashMap<K, V, S = FixedState> {
    buckets: Box<[Atomic<Node<K, V>>]>,
    hasher: S,
}

impl<K, V> HashMap<K, V, FixedState>
where
    K: Hash + Eq + 'static,
    V: Clone + 'static,
{
    /// Creates an empty map with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty map with `capacity` buckets.
    ///
    /// The bucket count is fixed for the lifetime of the map. Panics if
    /// `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, FixedState::default())
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + 'static,
    V: Clone + 'static,
    S: BuildHasher,
{
    /// Creates an empty map with `capacity` buckets and the given hasher.
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        assert!(capacity > 0, "hazel-map: capacity must be non-zero");

        let mut buckets = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buckets.push(Atomic::null());
        }

        Self {
            buckets: buckets.into_boxed_slice(),
            hasher,
        }
    }

    /// The number of buckets, as chosen at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Get the underlying hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    #[inline(always)]
    fn bucket(&self, hash: u64) -> &Atomic<Node<K, V>> {
        let index = (hash % self.buckets.len() as u64) as usize;
        // SAFETY: the index was reduced modulo the bucket count
        unsafe { self.buckets.get_unchecked(index) }
    }

    /// Walk a chain looking for `key`, helping finish pending unlinks.
    ///
    /// The traversal alternates the two guards so that the current node and
    /// the owner of `prev_link` are announced at all times. Each candidate
    /// is announced *before* it is dereferenced, then the link that produced
    /// it is re-read; any disagreement (a new value or a freshly set mark)
    /// restarts from the bucket head.
    fn find<'g, Q>(
        &self,
        bucket: &'g Atomic<Node<K, V>>,
        hash: u64,
        key: &Q,
        curr_guard: &'g Guard,
        prev_guard: &'g Guard,
    ) -> FindResult<'g, K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        'restart: loop {
            let mut hp_curr = curr_guard;
            let mut hp_prev = prev_guard;
            let mut prev_link: &'g Atomic<Node<K, V>> = bucket;
            let mut curr = prev_link.load(Ordering::Acquire);

            loop {
                if curr.is_null() {
                    return FindResult::Absent { prev_link };
                }

                hp_curr.announce(curr);
                if prev_link.load(Ordering::SeqCst) != curr {
                    continue 'restart;
                }

                // SAFETY: announced above and re-confirmed reachable through
                // a link whose owner is still announced
                let node = unsafe { &*curr };
                let next = node.next.load(Ordering::Acquire);

                if is_marked(next) {
                    // Logically deleted; finish the unlink before moving on.
                    let next = unmarked(next);
                    if prev_link
                        .compare_exchange(curr, next, Ordering::Release, Ordering::Relaxed)
                        .is_err()
                    {
                        continue 'restart;
                    }
                    // SAFETY: our unlink CAS made the node unreachable
                    unsafe { retire(curr) };
                    curr = next;
                    continue;
                }

                if node.hash == hash && node.key.borrow() == key {
                    return FindResult::Present {
                        prev_link,
                        node,
                        next,
                        spare: hp_prev,
                    };
                }

                prev_link = &node.next;
                mem::swap(&mut hp_curr, &mut hp_prev);
                curr = next;
            }
        }
    }

    /// Copy out the value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let bucket = self.bucket(hash);
        let curr_guard = guard();
        let prev_guard = guard();

        match self.find(bucket, hash, key, &curr_guard, &prev_guard) {
            FindResult::Present { node, spare, .. } => {
                // The predecessor no longer matters; its slot now covers the
                // value cell while the node itself stays announced.
                let cell = spare.protect(&node.value);
                // SAFETY: the cell is announced and was re-validated against
                // the node's value field
                Some(unsafe { cell.deref() }.clone())
            }
            FindResult::Absent { .. } => None,
        }
    }

    /// Whether `key` has a value in the map.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Insert or update.
    ///
    /// Returns `None` if the key was absent and a new node was linked, or
    /// the previous value if the key was present and the value was replaced
    /// in place on the existing node.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        let bucket = self.bucket(hash);
        let mut backoff = Backoff::new();
        let curr_guard = guard();
        let prev_guard = guard();

        // Staged off-chain; published by at most one successful CAS below.
        let node_ptr = Node::alloc(hash, key, Box::into_raw(Box::new(value)));

        loop {
            // SAFETY: the staged node is unpublished, so the reference cannot
            // be invalidated by other threads
            let staged = unsafe { &*node_ptr };

            match self.find(bucket, hash, &staged.key, &curr_guard, &prev_guard) {
                FindResult::Present { node, .. } => {
                    // Update in place: hand our cell to the live node and
                    // discard the staged one.
                    let cell = staged.value.swap(ptr::null_mut(), Ordering::Relaxed);
                    let prev = node.value.swap(cell, Ordering::AcqRel);
                    // SAFETY: the swap took `prev` out of the node, so it is
                    // exclusively ours to read and retire; cells are immutable
                    let previous = unsafe { (*prev).clone() };
                    unsafe { retire(prev) };
                    // SAFETY: never published
                    unsafe { drop(Box::from_raw(node_ptr)) };
                    return Some(previous);
                }
                FindResult::Absent { prev_link } => {
                    // Link at the point the search ended. Concurrent
                    // insertions of the same key contend on this same link,
                    // which is what keeps keys unique.
                    match prev_link.compare_exchange(
                        ptr::null_mut(),
                        node_ptr,
                        Ordering::Release,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return None,
                        Err(_) => backoff.spin(),
                    }
                }
            }
        }
    }

    /// Remove `key` from the map.
    ///
    /// Returns whether a value was present. The node is first marked
    /// (logical deletion, the point at which the key disappears), then
    /// unlinked; whichever thread wins the unlink hands the node to the
    /// reclamation registry.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let bucket = self.bucket(hash);
        let mut backoff = Backoff::new();
        let curr_guard = guard();
        let prev_guard = guard();

        loop {
            let (prev_link, node, next) =
                match self.find(bucket, hash, key, &curr_guard, &prev_guard) {
                    FindResult::Present {
                        prev_link,
                        node,
                        next,
                        ..
                    } => (prev_link, node, next),
                    FindResult::Absent { .. } => return false,
                };

            // Mark the node's own link. The field is frozen from here on:
            // every other CAS on it expects an unmarked value.
            if node
                .next
                .compare_exchange(next, marked(next), Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                // Successor changed or another remover won; re-examine.
                backoff.spin();
                continue;
            }

            let node_ptr = node as *const Node<K, V> as *mut Node<K, V>;
            if prev_link
                .compare_exchange(node_ptr, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // SAFETY: the successful unlink made the node unreachable
                unsafe { retire(node_ptr) };
            }
            // On failure a traversal is already helping; it retires the node.
            return true;
        }
    }
}

impl<K, V> Default for HashMap<K, V, FixedState>
where
    K: Hash + Eq + 'static,
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: any thread may drop keys, values, and cells during reclamation and
// teardown, and shared access hands out `&K` and clones of `V`.
unsafe impl<K: Send + Sync, V: Send + Sync, S: Send> Send for HashMap<K, V, S> {}
unsafe impl<K: Send + Sync, V: Send + Sync, S: Sync> Sync for HashMap<K, V, S> {}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        // Teardown is single-threaded; retired nodes are no longer linked,
        // so everything reachable here is freed exactly once.
        for bucket in self.buckets.iter() {
            let mut curr = bucket.load(Ordering::Relaxed);
            while !curr.is_null() {
                // SAFETY: exclusive access, and `curr` is unmarked
                let node = unsafe { Box::from_raw(curr) };
                curr = unmarked(node.next.load(Ordering::Relaxed));
            }
        }
    }
}
