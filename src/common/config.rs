//! Configuration constants and knobs for StratumDB.

use std::time::Duration;

/// Default size of a page in bytes (4KB).
///
/// Every [`PageStore`](crate::storage::PageStore) is constructed with its own
/// page size, so test harnesses can use small pages without touching this.
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 400;

/// Default interval after which a blocked lock request re-checks its grant
/// condition even without a wake-up.
///
/// Releases always broadcast to waiters; this only bounds how long a waiter
/// can sleep if a notification is missed.
pub const DEFAULT_LOCK_RECHECK: Duration = Duration::from_secs(2);

/// Lock manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Upper bound on a single condition wait before re-evaluating.
    pub recheck_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            recheck_interval: DEFAULT_LOCK_RECHECK,
        }
    }
}

/// Buffer pool settings.
///
/// # Example
/// ```
/// use stratumdb::Config;
///
/// let config = Config {
///     pool_pages: 16,
///     ..Config::default()
/// };
/// assert_eq!(config.page_size, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of pages held in the cache.
    pub pool_pages: usize,
    /// Page size expected from every registered table.
    pub page_size: usize,
    /// Lock manager settings.
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_pages: DEFAULT_POOL_PAGES,
            page_size: PAGE_SIZE,
            lock: LockConfig::default(),
        }
    }
}
