//! Replacement policy for the buffer pool.
//!
//! - [`LruCache`] - Recency-ordered map; the pool evicts from its cold end

mod lru;

pub use lru::{Iter, LruCache};
