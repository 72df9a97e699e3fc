#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Compact open-addressed key-value store.
//!
//! # compact_store::CompactStore
//! A single-writer hash table built for large, long-lived in-memory datasets such as the nodes
//! and edges of a regional road network. Entries live in one flat slot array with a single byte
//! of metadata per slot, collisions are resolved by linear probing, removals leave tombstones
//! that are purged whenever the table is rehashed, and the capacity never shrinks.
//!
//! # compact_store::Construction
//! The store either starts small and grows on demand, or is pre-sized for an expected number of
//! entries so that a bulk load never rehashes.
//!
//! ```
//! use compact_store::{CompactStore, SetResult};
//!
//! let mut store: CompactStore<u64, &str> = CompactStore::with_capacity(3);
//! let capacity = store.capacity();
//!
//! assert!(store.add(1, "a").is_ok());
//! assert!(store.add(2, "b").is_ok());
//! assert!(store.add(2, "c").is_err());
//! assert_eq!(store.set(3, "d"), SetResult::Inserted);
//! assert_eq!(store.set(3, "e"), SetResult::Replaced("d"));
//!
//! assert_eq!(store.capacity(), capacity);
//! assert_eq!(store.remove(&1), Some((1, "a")));
//! assert_eq!(store.get(&2), Some(&"b"));
//! assert_eq!(store.len(), 2);
//! ```

pub mod compact_store;
pub use compact_store::CompactStore;
pub use compact_store::SetResult;

pub mod construction;
pub use construction::Construction;
pub use construction::LoadFactor;
pub use construction::StoreConfig;

mod error;
pub use error::{ConfigError, DuplicateKeyError, ReserveError};

#[cfg(not(feature = "equivalent"))]
mod equivalent;
#[cfg(not(feature = "equivalent"))]
pub use equivalent::Equivalent;
#[cfg(feature = "equivalent")]
pub use equivalent::Equivalent;
