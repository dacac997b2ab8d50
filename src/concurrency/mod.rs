//! Concurrency control - strict two-phase locking at page granularity.
//!
//! # Components
//! - [`LockManager`] - Lock table, per-transaction lock index, deadlock detection
//! - [`PageLock`] - Blocking shared/exclusive lock on one page
//! - [`WaitForGraph`] - Blocked-on relation between transactions
//! - [`Permission`] - `Shared` or `Exclusive`

mod lock_manager;
mod page_lock;
mod permission;
mod wait_for_graph;

pub use lock_manager::LockManager;
pub use page_lock::PageLock;
pub use permission::Permission;
pub use wait_for_graph::WaitForGraph;
