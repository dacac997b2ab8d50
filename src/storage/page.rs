//! Page - the fixed-size unit of I/O, caching and locking.
//!
//! A [`Page`] couples a page's bytes with the bookkeeping the buffer pool
//! needs: its identifier and which transaction (if any) dirtied it. While a
//! page is cached, every caller holds the same [`PageRef`], so a mutation made
//! by one holder is visible to all of them.

use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, MutexGuard, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::common::{PageId, TransactionId};

/// Shared handle to a cached page.
pub type PageRef = Arc<Page>;

/// A page of table data.
///
/// # Thread Safety
/// - `data`: `RwLock` so readers can inspect bytes concurrently
/// - `dirtier`: `Mutex` holding the transaction that last modified the page
/// - `write_back`: `Mutex` held by the buffer pool for the whole of one
///   write-back, so flushes of the same page never overlap
///
/// The page-level 2PL lock (see [`LockManager`](crate::concurrency::LockManager))
/// decides *who* may touch the page; the `RwLock` here only keeps individual
/// byte copies consistent, e.g. while a flush is reading the page.
///
/// # Example
/// ```
/// use stratumdb::{Page, PageId, TransactionId};
///
/// let page = Page::zeroed(PageId::new(1, 0), 64);
/// page.data_mut()[0] = 0xFF;
/// page.mark_dirty(TransactionId::from_raw(1));
///
/// assert_eq!(page.data()[0], 0xFF);
/// assert_eq!(page.dirtier(), Some(TransactionId::from_raw(1)));
/// ```
#[derive(Debug)]
pub struct Page {
    id: PageId,
    data: RwLock<Box<[u8]>>,
    dirtier: Mutex<Option<TransactionId>>,
    write_back: Mutex<()>,
}

impl Page {
    /// Wrap bytes read from a store.
    pub fn new(id: PageId, data: Vec<u8>) -> Self {
        Self {
            id,
            data: RwLock::new(data.into_boxed_slice()),
            dirtier: Mutex::new(None),
            write_back: Mutex::new(()),
        }
    }

    /// Create a zeroed page of `page_size` bytes.
    pub fn zeroed(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size])
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Page size in bytes.
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    // ========================================================================
    // Data access (RwLock)
    // ========================================================================

    /// Acquire read access to the page bytes.
    #[inline]
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.data.read(), |d| &**d)
    }

    /// Acquire write access to the page bytes.
    ///
    /// Callers are expected to hold `Exclusive` on the page and to mark it
    /// dirty once they are done.
    #[inline]
    pub fn data_mut(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.data.write(), |d| &mut **d)
    }

    /// Copy the page bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Record that `tid` modified this page.
    pub fn mark_dirty(&self, tid: TransactionId) {
        *self.dirtier.lock() = Some(tid);
    }

    /// The transaction that dirtied this page, or `None` if clean.
    #[inline]
    pub fn dirtier(&self) -> Option<TransactionId> {
        *self.dirtier.lock()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtier().is_some()
    }

    /// Mark the page clean.
    pub fn clear_dirty(&self) {
        *self.dirtier.lock() = None;
    }

    /// Serializes write-backs of this page.
    pub(crate) fn lock_write_back(&self) -> MutexGuard<'_, ()> {
        self.write_back.lock()
    }

    /// Clear the dirty flag, returning the previous owner.
    ///
    /// Flushes call this *before* writing so that a modification racing with
    /// the write re-marks the page instead of being forgotten.
    pub(crate) fn take_dirty(&self) -> Option<TransactionId> {
        self.dirtier.lock().take()
    }

    /// Put back an owner taken by [`take_dirty`](Self::take_dirty) after a
    /// failed write, unless someone re-marked the page meanwhile.
    pub(crate) fn restore_dirty(&self, tid: TransactionId) {
        let mut dirtier = self.dirtier.lock();
        if dirtier.is_none() {
            *dirtier = Some(tid);
        }
    }
}
