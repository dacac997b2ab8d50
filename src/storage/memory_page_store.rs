//! In-memory page store, mainly for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, StorageError, TableId};
use crate::storage::page::Page;
use crate::storage::page_store::{check_read, check_write, PageStore};

/// Volatile page store holding every page in a `Vec`.
///
/// Besides being fast, it can be told to fail writes
/// ([`set_fail_writes`](Self::set_fail_writes)) and counts every read and
/// write attempt, which lets tests observe write-back behavior exactly.
pub struct MemoryPageStore {
    table_id: TableId,
    page_size: usize,
    pages: Mutex<Vec<Box<[u8]>>>,
    fail_writes: AtomicBool,
    reads: AtomicU64,
    write_attempts: AtomicU64,
}

impl MemoryPageStore {
    /// Create an empty store.
    pub fn new(table_id: TableId, page_size: usize) -> Self {
        Self::with_pages(table_id, page_size, 0)
    }

    /// Create a store pre-filled with `count` zeroed pages.
    pub fn with_pages(table_id: TableId, page_size: usize, count: u32) -> Self {
        assert!(page_size > 0, "page_size must be > 0");
        let pages = (0..count)
            .map(|_| vec![0u8; page_size].into_boxed_slice())
            .collect();
        Self {
            table_id,
            page_size,
            pages: Mutex::new(pages),
            fail_writes: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            write_attempts: AtomicU64::new(0),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of `read_page` calls so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_page` calls so far, failed ones included.
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::Relaxed)
    }

    /// Copy of the stored bytes of a page, bypassing all bookkeeping.
    pub fn raw_page(&self, page_number: u32) -> Option<Vec<u8>> {
        self.pages
            .lock()
            .get(page_number as usize)
            .map(|p| p.to_vec())
    }
}

impl PageStore for MemoryPageStore {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u32 {
        self.pages.lock().len() as u32
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let pages = self.pages.lock();
        check_read(self.table_id, pages.len() as u32, page_id)?;
        Ok(Page::new(
            page_id,
            pages[page_id.page_number as usize].to_vec(),
        ))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::Relaxed);
        let page_id = page.id();
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StorageError::InjectedWriteFailure(page_id).into());
        }

        let data = page.data();
        let mut pages = self.pages.lock();
        let appends = check_write(
            self.table_id,
            self.page_size,
            pages.len() as u32,
            page_id,
            data.len(),
        )?;
        if appends {
            pages.push(data.to_vec().into_boxed_slice());
        } else {
            pages[page_id.page_number as usize].copy_from_slice(&data);
        }
        Ok(())
    }
}
