//! Page identifier type.

use std::fmt;

/// Identifies a table registered in the [`Catalog`](crate::storage::Catalog).
pub type TableId = u32;

/// Identifies a page: the table it belongs to plus its index in that table.
///
/// Page `n` of a table lives at byte offset `n * page_size` in the table's
/// store. Identifiers compare and hash by value and stay stable for the life
/// of the table.
///
/// # Example
/// ```
/// use stratumdb::PageId;
///
/// let pid = PageId::new(7, 42);
/// assert_eq!(pid.table_id, 7);
/// assert_eq!(pid.page_number, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    /// Byte offset of this page inside its table's store.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        u64::from(self.page_number) * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id, self.page_number)
    }
}
