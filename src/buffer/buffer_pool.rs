//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between page stores and operators, LRU eviction
//! - Page locking on behalf of transactions (through the [`LockManager`])
//! - Write-back of dirty pages on eviction, flush and commit
//! - Discarding of uncommitted pages on abort

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruCache;
use crate::buffer::BufferPoolStats;
use crate::common::{Config, Error, PageId, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, Permission};
use crate::storage::{Catalog, PageRef, Tuple};

/// Bounded cache of pages shared by concurrent transactions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                          BufferPool                          │
/// │  ┌───────────────────────────────┐   ┌────────────────────┐  │
/// │  │ cache: LruCache<PageId, Page> │   │ lock_manager       │  │
/// │  │ MRU ─────────────────────► LRU│   │ page locks + graph │  │
/// │  └───────────────┬───────────────┘   └────────────────────┘  │
/// │                  │ load / write-back                         │
/// │  ┌───────────────▼───────────────┐   ┌────────────────────┐  │
/// │  │ catalog: table → DbFile       │   │ stats (atomics)    │  │
/// │  │         └─► PageStore         │   │                    │  │
/// │  └───────────────────────────────┘   └────────────────────┘  │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Policies
/// - *Steal*: a dirty page may be evicted (written back) before its
///   transaction commits.
/// - *Force*: commit writes back every cached page the transaction dirtied.
/// - Abort drops the transaction's dirty cached pages. Pages it dirtied that
///   were already stolen stay written; there is no undo.
///
/// # Thread Safety
/// - `cache`: `Mutex`, never held while waiting for a page lock. Eviction
///   (including its write-back) and insertion happen in one critical section.
/// - `lock_manager`: internally synchronized
/// - `stats`: atomic counters
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use stratumdb::storage::{Catalog, HeapFile, MemoryPageStore};
/// use stratumdb::{BufferPool, Config, PageId, Permission, TransactionId};
///
/// let catalog = Arc::new(Catalog::new(128));
/// let table = HeapFile::new(MemoryPageStore::with_pages(1, 128, 4), 8).unwrap();
/// catalog.add_table(Arc::new(table)).unwrap();
/// let pool = BufferPool::new(Config { pool_pages: 2, page_size: 128, ..Config::default() }, catalog);
///
/// let tid = TransactionId::new();
/// let page = pool.get_page(tid, PageId::new(1, 0), Permission::Exclusive).unwrap();
/// page.data_mut()[0] = 7;
/// page.mark_dirty(tid);
///
/// pool.transaction_complete(tid, true).unwrap();
/// assert!(!page.is_dirty());
/// ```
pub struct BufferPool {
    cache: Mutex<LruCache<PageId, PageRef>>,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    stats: BufferPoolStats,
    config: Config,
}

impl BufferPool {
    /// Create a pool holding at most `config.pool_pages` pages.
    ///
    /// # Panics
    /// Panics if `config.pool_pages` is 0 or the catalog's page size differs
    /// from `config.page_size`.
    pub fn new(config: Config, catalog: Arc<Catalog>) -> Self {
        assert!(config.pool_pages > 0, "pool_pages must be > 0");
        assert_eq!(
            catalog.page_size(),
            config.page_size,
            "catalog and pool page sizes differ"
        );

        Self {
            cache: Mutex::new(LruCache::new(config.pool_pages)),
            catalog,
            lock_manager: LockManager::new(config.lock),
            stats: BufferPoolStats::new(),
            config,
        }
    }

    // ========================================================================
    // Public API: page access
    // ========================================================================

    /// Lock `page_id` for `tid` with `perm`, then return the page.
    ///
    /// Blocks while another transaction holds a conflicting lock. A cached
    /// page becomes most recently used; otherwise it is read from its table's
    /// store, evicting the least recently used page if the pool is full.
    ///
    /// # Errors
    /// - `Error::UnknownTable` if the table is not in the catalog
    /// - `Error::TransactionAborted` if waiting would deadlock
    /// - `Error::Storage` if the read, or the write-back of a dirty victim, fails
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> Result<PageRef> {
        let file = self.catalog.file(page_id.table_id)?;
        self.lock_manager.lock(tid, page_id, perm)?;

        let cached = self.cache.lock().get(&page_id).cloned();
        if let Some(page) = cached {
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!(%tid, %page_id, "buffer_pool.hit");
            return Ok(page);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let page = Arc::new(file.store().read_page(page_id)?);
        BufferPoolStats::bump(&self.stats.pages_read);
        trace!(%tid, %page_id, "buffer_pool.miss");

        self.install(page)
    }

    /// Release `tid`'s lock on `page_id` before the transaction ends.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.unlock(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    // ========================================================================
    // Public API: tuples
    // ========================================================================

    /// Insert `tuple` into table `table_id` on behalf of `tid`.
    ///
    /// Every page the table modified is marked dirty by `tid` and cached,
    /// replacing any other cached instance of it.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.adopt_dirty(tid, &pages)?;
        Ok(pages)
    }

    /// Delete the tuple named by `tuple`'s record id on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| Error::IllegalState("tuple has no record id".into()))?;
        let file = self.catalog.file(record_id.page_id.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.adopt_dirty(tid, &pages)?;
        Ok(pages)
    }

    // ========================================================================
    // Public API: flush and discard
    // ========================================================================

    /// Write back every dirty cached page.
    ///
    /// Stops at the first failure; the failed page and any not yet attempted
    /// stay dirty.
    pub fn flush_all_pages(&self) -> Result<()> {
        for page in self.cached_pages() {
            self.write_back(&page, None)?;
        }
        Ok(())
    }

    /// Write back `page_id` if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let cached = self.cache.lock().peek(&page_id).cloned();
        match cached {
            Some(page) => self.write_back(&page, None),
            None => Ok(()),
        }
    }

    /// Write back every cached page dirtied by `tid`.
    ///
    /// A page whose eviction is being written back concurrently is waited
    /// for; if that write failed the page is still `tid`'s and is written
    /// here, so `Ok` means every page `tid` dirtied is on its store.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for page in self.cached_pages() {
            self.write_back(&page, Some(tid))?;
        }
        Ok(())
    }

    /// Drop `page_id` from the cache without writing it back.
    ///
    /// Returns whether the page was cached.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let discarded = self.cache.lock().remove(&page_id).is_some();
        if discarded {
            debug!(%page_id, "buffer_pool.discard");
        }
        discarded
    }

    // ========================================================================
    // Public API: transactions
    // ========================================================================

    /// Finish `tid`: on commit write back its dirty pages, on abort discard
    /// them. Then release all of its locks.
    ///
    /// # Errors
    /// `Error::Storage` if a commit write-back fails. The transaction keeps
    /// its locks and the failed page stays dirty, so the commit can be
    /// retried or turned into an abort.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let mut cache = self.cache.lock();
            let dirtied: Vec<PageId> = cache
                .iter()
                .filter(|(_, page)| page.dirtier() == Some(tid))
                .map(|(page_id, _)| *page_id)
                .collect();
            for page_id in &dirtied {
                cache.remove(page_id);
            }
            drop(cache);
            debug!(%tid, discarded = dirtied.len(), "buffer_pool.abort.discard");
        }

        self.lock_manager.transaction_finished(tid);
        debug!(%tid, commit, "buffer_pool.transaction_complete");
        Ok(())
    }

    // ========================================================================
    // Public API: introspection
    // ========================================================================

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().contains(&page_id)
    }

    /// Cached page ids from most to least recently used.
    pub fn cached_page_ids(&self) -> Vec<PageId> {
        self.cache.lock().iter().map(|(page_id, _)| *page_id).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.pool_pages
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Internal: cache maintenance
    // ========================================================================

    fn cached_pages(&self) -> Vec<PageRef> {
        self.cache.lock().iter().map(|(_, page)| Arc::clone(page)).collect()
    }

    /// Cache a freshly read page unless another thread cached it first.
    fn install(&self, page: PageRef) -> Result<PageRef> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&page.id()) {
            return Ok(Arc::clone(existing));
        }
        self.make_room(&mut cache)?;
        cache.insert(page.id(), Arc::clone(&page));
        Ok(page)
    }

    /// Make `pages` the cached instances and mark them dirty by `tid`.
    ///
    /// A page is only marked once it is resident. If making room for it
    /// fails, it is left clean and uncached: the row-level change it carries
    /// is not applied and `tid` must abort.
    fn adopt_dirty(&self, tid: TransactionId, pages: &[PageRef]) -> Result<()> {
        let mut cache = self.cache.lock();
        for page in pages {
            if !cache.contains(&page.id()) {
                self.make_room(&mut cache)?;
            }
            cache.insert(page.id(), Arc::clone(page));
            page.mark_dirty(tid);
        }
        Ok(())
    }

    /// Evict the least recently used page if the cache is full.
    ///
    /// A dirty victim is written back first; if that fails it stays cached
    /// and dirty and the error is returned.
    fn make_room(&self, cache: &mut LruCache<PageId, PageRef>) -> Result<()> {
        if !cache.is_full() {
            return Ok(());
        }
        let Some((&victim_id, victim)) = cache.peek_lru() else {
            return Ok(());
        };
        let victim = Arc::clone(victim);

        self.write_back(&victim, None)?;
        cache.remove(&victim_id);
        BufferPoolStats::bump(&self.stats.evictions);
        debug!(page_id = %victim_id, "buffer_pool.evict");
        Ok(())
    }

    /// Write `page` to its store if it is dirty, clearing the dirty mark.
    ///
    /// With `owner` set, only a page dirtied by that transaction is written.
    /// The page's write-back mutex is held from taking the dirty mark until
    /// it is cleared or restored, so concurrent write-backs of one page are
    /// serialized and the second sees the outcome of the first.
    fn write_back(&self, page: &PageRef, owner: Option<TransactionId>) -> Result<()> {
        let _writing = page.lock_write_back();
        if owner.is_some_and(|owner| page.dirtier() != Some(owner)) {
            return Ok(());
        }
        let Some(tid) = page.take_dirty() else {
            return Ok(());
        };
        let page_id = page.id();

        let written = self
            .catalog
            .file(page_id.table_id)
            .and_then(|file| file.store().write_page(page));
        match written {
            Ok(()) => {
                BufferPoolStats::bump(&self.stats.pages_written);
                debug!(%page_id, %tid, "buffer_pool.write_back");
                Ok(())
            }
            Err(err) => {
                page.restore_dirty(tid);
                BufferPoolStats::bump(&self.stats.write_back_failures);
                warn!(%page_id, %tid, error = %err, "buffer_pool.write_back.failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HeapFile, MemoryPageStore};

    const PAGE: usize = 64;

    type MemoryTable = Arc<HeapFile<MemoryPageStore>>;

    fn pool_with_pages(pool_pages: usize, page_count: u32) -> (BufferPool, MemoryTable) {
        let catalog = Arc::new(Catalog::new(PAGE));
        let store = MemoryPageStore::with_pages(1, PAGE, page_count);
        let table = Arc::new(HeapFile::new(store, 4).unwrap());
        catalog.add_table(table.clone()).unwrap();
        let config = Config {
            pool_pages,
            page_size: PAGE,
            ..Config::default()
        };
        (BufferPool::new(config, catalog), table)
    }

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn test_miss_then_hit() {
        let (pool, table) = pool_with_pages(2, 2);
        let tid = TransactionId::new();

        let first = pool.get_page(tid, pid(0), Permission::Shared).unwrap();
        let second = pool.get_page(tid, pid(0), Permission::Shared).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.page_store().reads(), 1);
        let stats = pool.stats().snapshot();
        assert_eq!((stats.cache_hits, stats.cache_misses), (1, 1));
        assert!(pool.holds_lock(tid, pid(0)));
    }

    #[test]
    fn test_lru_eviction_order() {
        let (pool, _) = pool_with_pages(2, 3);
        let tid = TransactionId::new();

        pool.get_page(tid, pid(0), Permission::Shared).unwrap();
        pool.get_page(tid, pid(1), Permission::Shared).unwrap();
        pool.get_page(tid, pid(0), Permission::Shared).unwrap();
        pool.get_page(tid, pid(2), Permission::Shared).unwrap();

        assert_eq!(pool.cached_page_ids(), vec![pid(2), pid(0)]);
        assert_eq!(pool.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let (pool, table) = pool_with_pages(1, 2);
        let tid = TransactionId::new();

        let page = pool.get_page(tid, pid(0), Permission::Exclusive).unwrap();
        page.data_mut()[10] = 0xAB;
        page.mark_dirty(tid);

        pool.get_page(tid, pid(1), Permission::Shared).unwrap();

        assert!(!page.is_dirty());
        assert_eq!(table.page_store().raw_page(0).unwrap()[10], 0xAB);
        assert_eq!(pool.stats().snapshot().pages_written, 1);
    }

    #[test]
    fn test_failed_write_back_keeps_victim() {
        let (pool, table) = pool_with_pages(1, 2);
        let tid = TransactionId::new();

        let page = pool.get_page(tid, pid(0), Permission::Exclusive).unwrap();
        page.mark_dirty(tid);
        table.page_store().set_fail_writes(true);

        let err = pool.get_page(tid, pid(1), Permission::Shared).unwrap_err();
        assert!(err.is_storage());
        assert!(pool.is_cached(pid(0)));
        assert_eq!(page.dirtier(), Some(tid));
        assert_eq!(pool.stats().snapshot().write_back_failures, 1);
    }

    #[test]
    fn test_unknown_table_takes_no_lock() {
        let (pool, _) = pool_with_pages(1, 1);
        let tid = TransactionId::new();

        let err = pool
            .get_page(tid, PageId::new(9, 0), Permission::Shared)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTable(9)));
        assert!(!pool.holds_lock(tid, PageId::new(9, 0)));
    }

    #[test]
    fn test_discard_page() {
        let (pool, _) = pool_with_pages(2, 1);
        let tid = TransactionId::new();
        pool.get_page(tid, pid(0), Permission::Shared).unwrap();

        assert!(pool.discard_page(pid(0)));
        assert!(!pool.discard_page(pid(0)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_abort_discards_only_own_pages() {
        let (pool, table) = pool_with_pages(4, 2);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        let p0 = pool.get_page(t1, pid(0), Permission::Exclusive).unwrap();
        p0.data_mut()[0] = 1;
        p0.mark_dirty(t1);
        let p1 = pool.get_page(t2, pid(1), Permission::Exclusive).unwrap();
        p1.mark_dirty(t2);

        pool.transaction_complete(t1, false).unwrap();

        assert!(!pool.is_cached(pid(0)));
        assert!(pool.is_cached(pid(1)));
        assert_eq!(table.page_store().raw_page(0).unwrap()[0], 0);
        assert!(!pool.holds_lock(t1, pid(0)));
        assert!(pool.holds_lock(t2, pid(1)));
    }

    #[test]
    fn test_commit_failure_keeps_locks() {
        let (pool, table) = pool_with_pages(2, 1);
        let tid = TransactionId::new();
        let page = pool.get_page(tid, pid(0), Permission::Exclusive).unwrap();
        page.mark_dirty(tid);

        table.page_store().set_fail_writes(true);
        assert!(pool.transaction_complete(tid, true).is_err());
        assert!(pool.holds_lock(tid, pid(0)));
        assert!(page.is_dirty());

        table.page_store().set_fail_writes(false);
        pool.transaction_complete(tid, true).unwrap();
        assert!(!pool.holds_lock(tid, pid(0)));
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_failed_room_for_modified_page_leaves_it_clean() {
        let (pool, table) = pool_with_pages(1, 2);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        // t1 modifies p0, which is then evicted while still clean.
        let p0 = pool.get_page(t1, pid(0), Permission::Exclusive).unwrap();
        p0.data_mut()[0] = 0xFF;
        assert!(pool.discard_page(pid(0)));

        let p1 = pool.get_page(t2, pid(1), Permission::Exclusive).unwrap();
        p1.mark_dirty(t2);
        table.page_store().set_fail_writes(true);

        let err = pool.adopt_dirty(t1, &[Arc::clone(&p0)]).unwrap_err();
        assert!(err.is_storage());
        assert!(!p0.is_dirty());
        assert!(!pool.is_cached(pid(0)));
        assert!(pool.is_cached(pid(1)));
        assert_eq!(p1.dirtier(), Some(t2));

        // Once room can be made the page is adopted and dirty.
        table.page_store().set_fail_writes(false);
        pool.adopt_dirty(t1, &[Arc::clone(&p0)]).unwrap();
        assert!(pool.is_cached(pid(0)));
        assert_eq!(p0.dirtier(), Some(t1));
    }

    #[test]
    fn test_delete_without_record_id() {
        let (pool, _) = pool_with_pages(2, 1);
        let mut tuple = Tuple::new(vec![0; 4]);

        let err = pool
            .delete_tuple(TransactionId::new(), &mut tuple)
            .unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }
}
