//! Lock-free concurrent hash map using Michael's algorithm with hazel
//! hazard-pointer memory reclamation.
//!
//! The map is a fixed array of buckets, each rooting a singly-linked chain
//! of nodes mutated only by compare-and-swap. Readers announce every pointer
//! in a hazard slot before dereferencing it and re-validate the link that
//! produced it; removal marks a node's link before unlinking it, and
//! unlinked nodes are handed to [`hazel`] rather than freed in place.
//!
//! # Example
//!
//! ```rust
//! use hazel_map::HashMap;
//!
//! let map = HashMap::with_capacity(64);
//! assert_eq!(map.insert("answer", 42), None);
//! assert_eq!(map.get(&"answer"), Some(42));
//! assert!(map.remove(&"answer"));
//! assert_eq!(map.get(&"answer"), None);
//! ```

#![warn(missing_docs)]

mod hashmap;

pub use hashmap::HashMap;
