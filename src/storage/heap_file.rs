//! Heap file - unordered fixed-length records.
//!
//! # Page Layout
//! ```text
//! ┌──────────────────────┬──────────┬──────────┬─────┬──────────────┬─────────┐
//! │ occupancy bitmap     │ slot 0   │ slot 1   │ ... │ slot S-1     │ padding │
//! │ ceil(S / 8) bytes    │ R bytes  │ R bytes  │     │ R bytes      │         │
//! └──────────────────────┴──────────┴──────────┴─────┴──────────────┴─────────┘
//! S = floor(page_size * 8 / (R * 8 + 1))     (each slot costs R bytes + 1 bit)
//! ```
//! Bit `i % 8` of bitmap byte `i / 8` is set when slot `i` holds a record.

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::{Error, PageId, Result, TransactionId};
use crate::concurrency::Permission;
use crate::storage::catalog::DbFile;
use crate::storage::page::{Page, PageRef};
use crate::storage::page_store::PageStore;
use crate::storage::tuple::{RecordId, Tuple};

#[derive(Debug, Clone, Copy)]
struct HeapPageLayout {
    record_size: usize,
    slots: usize,
    header_len: usize,
}

impl HeapPageLayout {
    fn new(page_size: usize, record_size: usize) -> Self {
        let slots = (page_size * 8) / (record_size * 8 + 1);
        Self {
            record_size,
            slots,
            header_len: slots.div_ceil(8),
        }
    }

    fn is_used(&self, data: &[u8], slot: usize) -> bool {
        data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_used(&self, data: &mut [u8], slot: usize, used: bool) {
        if used {
            data[slot / 8] |= 1 << (slot % 8);
        } else {
            data[slot / 8] &= !(1 << (slot % 8));
        }
    }

    fn free_slot(&self, data: &[u8]) -> Option<usize> {
        (0..self.slots).find(|&slot| !self.is_used(data, slot))
    }

    fn record_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_len + slot * self.record_size;
        start..start + self.record_size
    }
}

/// A table of fixed-length records on top of any [`PageStore`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use stratumdb::storage::{Catalog, HeapFile, MemoryPageStore, Tuple};
/// use stratumdb::{BufferPool, Config, TransactionId};
///
/// let config = Config { page_size: 256, ..Config::default() };
/// let catalog = Arc::new(Catalog::new(256));
/// let table = HeapFile::new(MemoryPageStore::new(1, 256), 16).unwrap();
/// catalog.add_table(Arc::new(table)).unwrap();
/// let pool = BufferPool::new(config, catalog);
///
/// let tid = TransactionId::new();
/// let mut tuple = Tuple::new(vec![1; 16]);
/// pool.insert_tuple(tid, 1, &mut tuple).unwrap();
/// assert!(tuple.record_id().is_some());
/// pool.transaction_complete(tid, true).unwrap();
/// ```
pub struct HeapFile<S> {
    store: S,
    layout: HeapPageLayout,
    /// Serializes choosing and writing the next page number on append.
    append_lock: Mutex<()>,
}

impl<S: PageStore> HeapFile<S> {
    /// Wrap `store` as a heap of `record_size`-byte records.
    ///
    /// # Errors
    /// `Error::IllegalState` if not even one record fits in a page.
    pub fn new(store: S, record_size: usize) -> Result<Self> {
        let layout = HeapPageLayout::new(store.page_size(), record_size.max(1));
        if record_size == 0 || layout.slots == 0 {
            return Err(Error::IllegalState(format!(
                "record size {} does not fit a {}-byte page",
                record_size,
                store.page_size()
            )));
        }
        Ok(Self {
            store,
            layout,
            append_lock: Mutex::new(()),
        })
    }

    pub fn record_size(&self) -> usize {
        self.layout.record_size
    }

    pub fn slots_per_page(&self) -> usize {
        self.layout.slots
    }

    /// The underlying store.
    pub fn page_store(&self) -> &S {
        &self.store
    }

    /// Read every live tuple, taking `Shared` on each page.
    pub fn scan(&self, pool: &BufferPool, tid: TransactionId) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        for page_number in 0..self.store.page_count() {
            let page_id = PageId::new(self.store.table_id(), page_number);
            let page = pool.get_page(tid, page_id, Permission::Shared)?;
            let data = page.data();
            for slot in 0..self.layout.slots {
                if self.layout.is_used(&data, slot) {
                    let mut tuple = Tuple::new(data[self.layout.record_range(slot)].to_vec());
                    tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                    tuples.push(tuple);
                }
            }
        }
        Ok(tuples)
    }

    /// Write `tuple` into a free slot of `page`, if there is one.
    fn place(&self, page: &Page, tuple: &mut Tuple) -> Option<RecordId> {
        let mut data = page.data_mut();
        let slot = self.layout.free_slot(&data)?;
        data[self.layout.record_range(slot)].copy_from_slice(tuple.data());
        self.layout.set_used(&mut data, slot, true);

        let record_id = RecordId::new(page.id(), slot);
        tuple.set_record_id(Some(record_id));
        Some(record_id)
    }

    /// Append a zeroed page to the store and return its id.
    fn append_page(&self) -> Result<PageId> {
        let _guard = self.append_lock.lock();
        let page_id = PageId::new(self.store.table_id(), self.store.page_count());
        self.store
            .write_page(&Page::zeroed(page_id, self.store.page_size()))?;
        debug!(%page_id, "heap_file.append_page");
        Ok(page_id)
    }
}

impl<S: PageStore> DbFile for HeapFile<S> {
    fn store(&self) -> &dyn PageStore {
        &self.store
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        if tuple.data().len() != self.layout.record_size {
            return Err(Error::IllegalState(format!(
                "tuple has {} bytes, table {} stores {}-byte records",
                tuple.data().len(),
                self.store.table_id(),
                self.layout.record_size
            )));
        }

        let table_id = self.store.table_id();
        let mut next_page = 0;
        loop {
            let page_count = self.store.page_count();
            while next_page < page_count {
                let page_id = PageId::new(table_id, next_page);
                next_page += 1;

                let page = pool.get_page(tid, page_id, Permission::Shared)?;
                if self.layout.free_slot(&page.data()).is_none() {
                    continue;
                }
                let page = pool.get_page(tid, page_id, Permission::Exclusive)?;
                if self.place(&page, tuple).is_some() {
                    return Ok(vec![page]);
                }
            }

            // append_lock is already released here; never wait for a page
            // lock while holding it.
            let page_id = self.append_page()?;
            let page = pool.get_page(tid, page_id, Permission::Exclusive)?;
            if self.place(&page, tuple).is_some() {
                return Ok(vec![page]);
            }
            next_page = page_id.page_number + 1;
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| Error::IllegalState("tuple has no record id".into()))?;
        if record_id.page_id.table_id != self.store.table_id() {
            return Err(Error::IllegalState(format!(
                "{} is not in table {}",
                record_id,
                self.store.table_id()
            )));
        }

        let page = pool.get_page(tid, record_id.page_id, Permission::Exclusive)?;
        {
            let mut data = page.data_mut();
            if record_id.slot >= self.layout.slots || !self.layout.is_used(&data, record_id.slot) {
                return Err(Error::IllegalState(format!("{} is empty", record_id)));
            }
            self.layout.set_used(&mut data, record_id.slot, false);
        }

        tuple.set_record_id(None);
        Ok(vec![page])
    }
}
