//! # grpcache
//!
//! Bounded, recency-ordered cache from string keys (window titles) to a
//! single decimal digit (keyboard layout group), with a compact text form
//! for handing state to an external property store.
//!
//! ## Architecture
//! - **Hash**: seeded MurmurHash2; keys are discarded after hashing
//! - **LRU List**: doubly-linked list over slot storage, O(1) promote/evict
//! - **Codec**: `<capacity> <seed> <hash>=<digit> ...`, MRU first
//!
//! ```
//! use grpcache::GroupCache;
//!
//! let mut cache = GroupCache::with_seed(3, 0).unwrap();
//! cache.set("Terminal", 1).unwrap();
//!
//! let blob = cache.encode();
//! let mut restored = GroupCache::decode(&blob).unwrap();
//! assert_eq!(restored.get("Terminal"), Some(1));
//! ```

#![warn(missing_docs)]

mod cache;
pub mod codec;
mod error;
pub mod hash;
mod lru;
mod stats;

pub use cache::{GroupCache, MAX_VALUE};
pub use error::{Error, Result};
pub use lru::Iter;
pub use stats::CacheStats;
