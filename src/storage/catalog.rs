//! Table registry.
//!
//! The [`Catalog`] maps table ids to the [`DbFile`] that owns the table's
//! pages. The buffer pool routes every load and write-back through it, and
//! row-level operations are delegated to the file's tuple methods.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::{Error, Result, TableId, TransactionId};
use crate::storage::page::PageRef;
use crate::storage::page_store::PageStore;
use crate::storage::tuple::Tuple;

/// A table: its page store plus the row format layered on top.
///
/// Tuple operations obtain pages through the buffer pool (and therefore take
/// page locks on behalf of `tid`) and return every page they modified. They
/// do not mark pages dirty; [`BufferPool::insert_tuple`] and
/// [`BufferPool::delete_tuple`] do that.
pub trait DbFile: Send + Sync {
    /// Backing store for the table's pages.
    fn store(&self) -> &dyn PageStore;

    fn table_id(&self) -> TableId {
        self.store().table_id()
    }

    /// Store `tuple`, setting its record id.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>>;

    /// Remove the tuple named by `tuple`'s record id, clearing it.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>>;
}

/// Registry of tables keyed by id.
///
/// All registered tables share one page size, which is also the page size
/// the buffer pool is configured with.
pub struct Catalog {
    page_size: usize,
    files: RwLock<HashMap<TableId, Arc<dyn DbFile>>>,
}

impl Catalog {
    /// Create an empty catalog for tables with `page_size`-byte pages.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Register a table, replacing any table with the same id.
    ///
    /// # Errors
    /// `Error::IllegalState` if the table's page size differs from the catalog's.
    pub fn add_table(&self, file: Arc<dyn DbFile>) -> Result<()> {
        let store_page_size = file.store().page_size();
        if store_page_size != self.page_size {
            return Err(Error::IllegalState(format!(
                "table {} uses {}-byte pages, catalog expects {}",
                file.table_id(),
                store_page_size,
                self.page_size
            )));
        }

        let table_id = file.table_id();
        let replaced = self.files.write().insert(table_id, file).is_some();
        debug!(table_id, replaced, "catalog.add_table");
        Ok(())
    }

    /// Look up a table.
    pub fn file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>> {
        self.files
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::UnknownTable(table_id))
    }

    /// Ids of all registered tables, ascending.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.files.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
