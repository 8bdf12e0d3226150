//! # lrucache
//!
//! Fixed-capacity key-value cache that evicts the least recently used entry.
//!
//! ## Architecture
//! - **HashMap**: AHash index from key to arena slot (O(1))
//! - **LRU List**: doubly-linked list threaded through the slots by index (O(1))
//! - **Free list**: evicted slots are reused by later insertions
//!
//! Every `get` hit and every `put` moves the key to the front of the list;
//! a `put` of a new key into a full cache evicts the back entry first.
//!
//! ```
//! use lrucache::{Error, LruCache};
//!
//! let mut cache = LruCache::new(2)?;
//! cache.put("a", 1);
//! cache.put("b", 2);
//! cache.get("a")?;
//! cache.put("c", 3); // evicts b
//!
//! assert_eq!(cache.get("b"), Err(Error::KeyNotFound));
//! assert_eq!(cache.get("a"), Ok(&1));
//! # Ok::<(), Error>(())
//! ```
//!
//! The cache does no locking. Callers that share one between threads
//! serialize access themselves, for instance behind a mutex.

#![warn(missing_docs)]

mod error;
mod lru;

pub use error::{Error, Result};
pub use lru::{Iter, LruCache};
