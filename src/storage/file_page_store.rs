//! File-backed page store - one table per file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{PageId, Result, StorageError, TableId};
use crate::storage::page::Page;
use crate::storage::page_store::{check_read, check_write, PageStore};

/// Stores a table's pages in a single file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0     S        2S       ...      N×S      (S = page_size)
/// ```
///
/// # Thread Safety
/// The file handle and page count sit behind one `Mutex`, so a seek and the
/// following read or write never interleave with another thread's.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct FilePageStore {
    table_id: TableId,
    page_size: usize,
    inner: Mutex<FileState>,
}

struct FileState {
    file: File,
    page_count: u32,
}

impl FilePageStore {
    /// Create a new, empty table file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, table_id: TableId, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_file(file, 0, table_id, page_size))
    }

    /// Open an existing table file.
    ///
    /// A trailing partial page (from a torn append) is ignored.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, or
    /// `StorageError::TooManyPages` if its page count does not fit a `u32`.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId, page_size: usize) -> Result<Self> {
        assert!(page_size > 0, "page_size must be > 0");
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let pages = file.metadata()?.len() / page_size as u64;
        let page_count =
            u32::try_from(pages).map_err(|_| StorageError::TooManyPages { pages })?;

        Ok(Self::from_file(file, page_count, table_id, page_size))
    }

    /// Open an existing table file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        page_size: usize,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, table_id, page_size)
        } else {
            Self::create(path, table_id, page_size)
        }
    }

    fn from_file(file: File, page_count: u32, table_id: TableId, page_size: usize) -> Self {
        assert!(page_size > 0, "page_size must be > 0");
        Self {
            table_id,
            page_size,
            inner: Mutex::new(FileState { file, page_count }),
        }
    }

    /// Get the total size of the table file in bytes.
    pub fn file_size(&self) -> u64 {
        u64::from(self.page_count()) * self.page_size as u64
    }
}

impl PageStore for FilePageStore {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut state = self.inner.lock();
        check_read(self.table_id, state.page_count, page_id)?;

        let mut buf = vec![0u8; self.page_size];
        state
            .file
            .seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        state.file.read_exact(&mut buf)?;

        trace!(%page_id, "file_store.read_page");
        Ok(Page::new(page_id, buf))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.id();
        let data = page.data();
        let mut state = self.inner.lock();
        let appends = check_write(
            self.table_id,
            self.page_size,
            state.page_count,
            page_id,
            data.len(),
        )?;

        state
            .file
            .seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        state.file.write_all(&data)?;
        state.file.sync_all()?;

        if appends {
            state.page_count += 1;
        }
        trace!(%page_id, appends, "file_store.write_page");
        Ok(())
    }
}
