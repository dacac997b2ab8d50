//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between operators and page
//! stores. Every page access goes through it, and it acquires page locks on
//! behalf of the requesting transaction before handing a page out.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`BufferPoolStats`] - Hit/miss/eviction/write-back counters
//! - [`replacer`] - LRU ordering used for eviction

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use stats::{BufferPoolStats, StatsSnapshot};
