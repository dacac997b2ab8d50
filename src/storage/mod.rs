//! Storage layer - pages, page stores and tables.
//!
//! - [`Page`] - In-memory page with dirty tracking
//! - [`PageStore`] - Reads and writes fixed-size pages of one table
//!   ([`FilePageStore`], [`MemoryPageStore`])
//! - [`Catalog`] / [`DbFile`] - Table registry and the table interface
//! - [`HeapFile`] - Fixed-length records on top of a page store

mod catalog;
mod file_page_store;
mod heap_file;
mod memory_page_store;
mod page;
mod page_store;
mod tuple;

pub use catalog::{Catalog, DbFile};
pub use file_page_store::FilePageStore;
pub use heap_file::HeapFile;
pub use memory_page_store::MemoryPageStore;
pub use page::{Page, PageRef};
pub use page_store::PageStore;
pub use tuple::{RecordId, Tuple};
