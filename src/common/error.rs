//! Error types for StratumDB.

use thiserror::Error;

use crate::common::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the buffer pool, lock manager and stores.
///
/// Nothing inside the core retries or swallows these; the caller decides.
/// After [`Error::TransactionAborted`] the caller must finish the transaction
/// (releasing its locks) before retrying it.
#[derive(Debug, Error)]
pub enum Error {
    /// A page store failed to read or write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Granting the requested lock would have closed a wait-for cycle.
    #[error("transaction {0} aborted: deadlock detected")]
    TransactionAborted(TransactionId),

    /// Misuse at the operator layer.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// No table with this id is registered in the catalog.
    #[error("unknown table {0}")]
    UnknownTable(TableId),
}

impl Error {
    /// Whether this error came from a page store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// Whether this error is a deadlock abort.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::TransactionAborted(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(err))
    }
}

/// Page store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page index is at or beyond the store's page count.
    #[error("{page_id} is beyond the end of the table ({page_count} pages)")]
    PageOutOfRange { page_id: PageId, page_count: u32 },

    /// A page buffer does not match the store's page size.
    #[error("page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    /// The page belongs to a different table than the store.
    #[error("{page_id} does not belong to table {table_id}")]
    WrongTable { page_id: PageId, table_id: TableId },

    /// A write failed on purpose (in-memory store fault injection).
    #[error("injected write failure for {0}")]
    InjectedWriteFailure(PageId),

    /// A table file holds more pages than a page number can address.
    #[error("table file holds {pages} pages, more than a page number can address")]
    TooManyPages { pages: u64 },
}
