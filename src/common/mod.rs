//! Common types and utilities shared across StratumDB.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and structs
//! - Error types
//! - Identifiers (PageId, TransactionId)

pub mod config;
pub mod error;
mod page_id;
mod transaction_id;

pub use config::{Config, LockConfig};
pub use error::{Error, Result, StorageError};
pub use page_id::{PageId, TableId};
pub use transaction_id::TransactionId;
