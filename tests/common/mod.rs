//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use stratumdb::storage::{Catalog, HeapFile, MemoryPageStore};
use stratumdb::{BufferPool, Config, LockConfig, PageId, TransactionId};
use tracing_subscriber::EnvFilter;

pub const PAGE_SIZE: usize = 64;
pub const TABLE: u32 = 1;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("stratumdb=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

/// A pool over one in-memory heap table with `page_count` zeroed pages.
pub struct Fixture {
    pub pool: Arc<BufferPool>,
    pub table: Arc<HeapFile<MemoryPageStore>>,
}

impl Fixture {
    pub fn new(pool_pages: usize, page_count: u32) -> Self {
        Self::with_record_size(pool_pages, page_count, 4)
    }

    pub fn with_record_size(pool_pages: usize, page_count: u32, record_size: usize) -> Self {
        init_tracing();
        let store = MemoryPageStore::with_pages(TABLE, PAGE_SIZE, page_count);
        let table = Arc::new(HeapFile::new(store, record_size).unwrap());
        let catalog = Arc::new(Catalog::new(PAGE_SIZE));
        catalog.add_table(table.clone()).unwrap();

        let config = Config {
            pool_pages,
            page_size: PAGE_SIZE,
            lock: LockConfig {
                recheck_interval: Duration::from_millis(100),
            },
        };
        Self {
            pool: Arc::new(BufferPool::new(config, catalog)),
            table,
        }
    }

    pub fn store(&self) -> &MemoryPageStore {
        self.table.page_store()
    }
}

pub fn pid(page_number: u32) -> PageId {
    PageId::new(TABLE, page_number)
}

/// Spin until `tid` is blocked inside the lock manager.
pub fn wait_until_waiting(pool: &BufferPool, tid: TransactionId) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !pool.lock_manager().is_waiting(tid) {
        assert!(Instant::now() < deadline, "{tid} never blocked");
        thread::sleep(Duration::from_millis(1));
    }
}

pub fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn write_u32(bytes: &mut [u8], value: u32) {
    bytes[..4].copy_from_slice(&value.to_le_bytes());
}
