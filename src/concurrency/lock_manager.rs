//! Lock Manager - page-granular two-phase locking with deadlock detection.
//!
//! The [`LockManager`] provides:
//! - A lazily populated table of [`PageLock`]s
//! - An index of the pages each transaction has locked
//! - A [`WaitForGraph`] checked every time a request is about to wait

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::{Error, LockConfig, PageId, Result, TransactionId};
use crate::concurrency::{PageLock, Permission, WaitForGraph};

/// Grants page locks to transactions and breaks deadlocks by aborting.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────────────┐
/// │                        LockManager                         │
/// │  ┌──────────────────────┐   ┌──────────────────────────┐   │
/// │  │ locks                │   │ held                     │   │
/// │  │ PageId → PageLock    │   │ Txn → {PageId}           │   │
/// │  └──────────────────────┘   └──────────────────────────┘   │
/// │  ┌──────────────────────────────────────────────────────┐  │
/// │  │ graph: WaitForGraph  (Txn → Txns it is blocked on)   │  │
/// │  └──────────────────────────────────────────────────────┘  │
/// └────────────────────────────────────────────────────────────┘
/// ```
///
/// # Deadlock Policy
/// Detection is proactive: when a request blocks, edges from the requester
/// to the conflicting holders are recorded and the graph is searched for a
/// cycle through the requester *before* it sleeps. On a cycle the edges are
/// removed again and the request fails with
/// [`Error::TransactionAborted`]. The requester's edges are recomputed after
/// every wake-up and dropped as soon as it is granted.
///
/// # Lock Ordering
/// `locks` → page state → `graph`. `held` is never held together with
/// another of these mutexes.
///
/// # Reclamation
/// A page lock is removed from the table once nobody holds it and no thread
/// has a handle to it (checked under the table mutex, where handles are
/// handed out), so the table only grows with the set of pages in use.
pub struct LockManager {
    config: LockConfig,
    locks: Mutex<HashMap<PageId, Arc<PageLock>>>,
    held: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    graph: Mutex<WaitForGraph>,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
            graph: Mutex::new(WaitForGraph::new()),
        }
    }

    // ========================================================================
    // Public API: acquire and release
    // ========================================================================

    /// Block until `tid` holds `perm` on `page_id`.
    ///
    /// # Errors
    /// `Error::TransactionAborted` if waiting would close a cycle in the
    /// wait-for graph. The transaction keeps its other locks and must call
    /// [`transaction_finished`](Self::transaction_finished) before retrying.
    pub fn lock(&self, tid: TransactionId, page_id: PageId, perm: Permission) -> Result<()> {
        let page_lock = self.page_lock(page_id);

        let result = page_lock.acquire(tid, perm, self.config.recheck_interval, |holders| {
            let mut graph = self.graph.lock();
            graph.set_waits(tid, holders.iter().copied());
            if holders.is_empty() {
                return Ok(());
            }
            if graph.on_cycle(tid) {
                graph.clear_waits(tid);
                warn!(%tid, %page_id, %perm, ?holders, "lock_manager.lock.deadlock");
                return Err(Error::TransactionAborted(tid));
            }
            debug!(%tid, %page_id, %perm, ?holders, "lock_manager.lock.blocked");
            Ok(())
        });
        drop(page_lock);

        match result {
            Ok(()) => {
                self.held.lock().entry(tid).or_default().insert(page_id);
                trace!(%tid, %page_id, %perm, "lock_manager.lock.granted");
                Ok(())
            }
            Err(err) => {
                self.reclaim(page_id);
                Err(err)
            }
        }
    }

    /// Release whatever `tid` holds on `page_id`.
    ///
    /// Releasing before the transaction finishes breaks two-phase locking;
    /// callers use it only for pages they provably did not depend on.
    pub fn unlock(&self, tid: TransactionId, page_id: PageId) {
        if let Some(page_lock) = self.existing_lock(page_id) {
            page_lock.release(tid);
        }

        {
            let mut held = self.held.lock();
            if let Some(pages) = held.get_mut(&tid) {
                pages.remove(&page_id);
                if pages.is_empty() {
                    held.remove(&tid);
                }
            }
        }

        self.reclaim(page_id);
        trace!(%tid, %page_id, "lock_manager.unlock");
    }

    /// Release every lock `tid` holds and forget it in the wait-for graph.
    ///
    /// Transactions blocked on those locks are woken.
    pub fn transaction_finished(&self, tid: TransactionId) {
        let pages = self.held.lock().remove(&tid).unwrap_or_default();

        for &page_id in &pages {
            if let Some(page_lock) = self.existing_lock(page_id) {
                page_lock.release(tid);
            }
            self.reclaim(page_id);
        }

        self.graph.lock().remove_transaction(tid);
        debug!(%tid, released = pages.len(), "lock_manager.transaction_finished");
    }

    // ========================================================================
    // Public API: queries
    // ========================================================================

    /// Whether `tid` holds any lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing_lock(page_id)
            .is_some_and(|page_lock| page_lock.holds(tid))
    }

    /// Whether `tid` holds `Exclusive` on `page_id`.
    pub fn holds_exclusive(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing_lock(page_id)
            .is_some_and(|page_lock| page_lock.holds_exclusive(tid))
    }

    /// Transactions currently holding `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<TransactionId> {
        let mut holders = self
            .existing_lock(page_id)
            .map(|page_lock| page_lock.holders())
            .unwrap_or_default();
        holders.sort_unstable();
        holders
    }

    /// Pages `tid` holds locks on, sorted.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .held
            .lock()
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort_unstable();
        pages
    }

    /// Whether `tid` is currently blocked in [`lock`](Self::lock).
    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.graph.lock().is_waiting(tid)
    }

    /// Number of page locks currently in the table.
    pub fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }

    // ========================================================================
    // Internal: lock table
    // ========================================================================

    fn page_lock(&self, page_id: PageId) -> Arc<PageLock> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(page_id)
                .or_insert_with(|| Arc::new(PageLock::new(page_id))),
        )
    }

    fn existing_lock(&self, page_id: PageId) -> Option<Arc<PageLock>> {
        self.locks.lock().get(&page_id).cloned()
    }

    /// Drop the table entry for `page_id` if it is idle and unreferenced.
    ///
    /// The caller must have dropped its own handle first.
    fn reclaim(&self, page_id: PageId) {
        let mut locks = self.locks.lock();
        let idle = locks
            .get(&page_id)
            .is_some_and(|page_lock| Arc::strong_count(page_lock) == 1 && page_lock.is_free());
        if idle {
            locks.remove(&page_id);
            trace!(%page_id, "lock_manager.reclaim");
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}
