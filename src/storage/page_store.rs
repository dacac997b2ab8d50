//! Page store trait definition.

use crate::common::{PageId, Result, StorageError, TableId};
use crate::storage::page::Page;

/// Backing storage for the pages of one table.
///
/// Pages are laid out sequentially: page `n` occupies bytes
/// `[n * page_size, (n + 1) * page_size)`.
///
/// # Contract
/// - `read_page` fails with [`StorageError::PageOutOfRange`] when the page
///   index is at or beyond [`page_count`](PageStore::page_count).
/// - `write_page` writes exactly `page_size` bytes. Writing page
///   `page_count` appends it; writing further out is rejected so a table never
///   has holes.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the buffer pool calls them from
/// every transaction thread and does not serialize access itself.
pub trait PageStore: Send + Sync {
    /// Table whose pages this store holds.
    fn table_id(&self) -> TableId;

    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Number of pages currently stored.
    fn page_count(&self) -> u32;

    /// Read a page.
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Persist a page's current bytes.
    fn write_page(&self, page: &Page) -> Result<()>;
}

/// Shared argument checks for [`PageStore::read_page`].
pub(crate) fn check_read(
    table_id: TableId,
    page_count: u32,
    page_id: PageId,
) -> std::result::Result<(), StorageError> {
    if page_id.table_id != table_id {
        return Err(StorageError::WrongTable { page_id, table_id });
    }
    if page_id.page_number >= page_count {
        return Err(StorageError::PageOutOfRange {
            page_id,
            page_count,
        });
    }
    Ok(())
}

/// Shared argument checks for [`PageStore::write_page`].
///
/// Returns `true` when the write appends a new page.
pub(crate) fn check_write(
    table_id: TableId,
    page_size: usize,
    page_count: u32,
    page_id: PageId,
    len: usize,
) -> std::result::Result<bool, StorageError> {
    if page_id.table_id != table_id {
        return Err(StorageError::WrongTable { page_id, table_id });
    }
    if len != page_size {
        return Err(StorageError::PageSizeMismatch {
            expected: page_size,
            actual: len,
        });
    }
    if page_id.page_number > page_count {
        return Err(StorageError::PageOutOfRange {
            page_id,
            page_count,
        });
    }
    Ok(page_id.page_number == page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_read_bounds() {
        assert!(check_read(1, 2, PageId::new(1, 1)).is_ok());
        assert!(matches!(
            check_read(1, 2, PageId::new(1, 2)),
            Err(StorageError::PageOutOfRange { page_count: 2, .. })
        ));
        assert!(matches!(
            check_read(1, 2, PageId::new(2, 0)),
            Err(StorageError::WrongTable { table_id: 1, .. })
        ));
    }

    #[test]
    fn test_check_write_appends_only_next_page() {
        assert!(!check_write(1, 64, 2, PageId::new(1, 0), 64).unwrap());
        assert!(check_write(1, 64, 2, PageId::new(1, 2), 64).unwrap());
        assert!(check_write(1, 64, 2, PageId::new(1, 3), 64).is_err());
        assert!(matches!(
            check_write(1, 64, 2, PageId::new(1, 0), 32),
            Err(StorageError::PageSizeMismatch {
                expected: 64,
                actual: 32
            })
        ));
    }
}
