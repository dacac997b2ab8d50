//! Tuples and record identifiers.

use std::fmt;

use crate::common::PageId;

/// Location of a stored tuple: page plus slot within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    #[inline]
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// A row as opaque bytes.
///
/// The core never interprets tuple contents; table files decide the
/// encoding. A tuple gets a [`RecordId`] once it is stored and loses it when
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    record_id: Option<RecordId>,
    data: Vec<u8>,
}

impl Tuple {
    /// A tuple that is not stored anywhere yet.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            record_id: None,
            data,
        }
    }

    #[inline]
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
