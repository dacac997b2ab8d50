//! StratumDB - a transactional page cache with page-level two-phase locking.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           StratumDB                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │          Operators (insert / delete / scan)             │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │   Buffer Pool (buffer/)            LRU page cache       │    │
//! │  │   steal / force, commit flush, abort discard            │    │
//! │  └──────────────┬──────────────────────────┬───────────────┘    │
//! │                 ↓                          ↓                    │
//! │  ┌──────────────────────────┐  ┌────────────────────────────┐   │
//! │  │ Lock Manager             │  │ Catalog → DbFile           │   │
//! │  │ (concurrency/)           │  │ (storage/)                 │   │
//! │  │ page locks, wait-for     │  │ HeapFile over a PageStore  │   │
//! │  │ graph, deadlock aborts   │  │ (file or memory)           │   │
//! │  └──────────────────────────┘  └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TransactionId, Error, config)
//! - [`buffer`] - Buffer pool and LRU replacement
//! - [`concurrency`] - Page locks, lock manager, wait-for graph
//! - [`storage`] - Pages, page stores, catalog, heap files
//!
//! # Quick Start
//! ```
//! use std::sync::Arc;
//! use stratumdb::storage::{Catalog, HeapFile, MemoryPageStore, Tuple};
//! use stratumdb::{BufferPool, Config, TransactionId};
//!
//! let catalog = Arc::new(Catalog::new(512));
//! let users = HeapFile::new(MemoryPageStore::new(1, 512), 32).unwrap();
//! catalog.add_table(Arc::new(users)).unwrap();
//! let pool = BufferPool::new(Config { pool_pages: 8, page_size: 512, ..Config::default() }, catalog);
//!
//! let tid = TransactionId::new();
//! let mut row = Tuple::new(vec![0x2A; 32]);
//! pool.insert_tuple(tid, 1, &mut row).unwrap();
//! pool.transaction_complete(tid, true).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{Config, Error, LockConfig, PageId, Result, StorageError, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, StatsSnapshot};
pub use concurrency::{LockManager, Permission};
pub use storage::{Page, PageRef};
