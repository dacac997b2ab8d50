//! Page lock - a blocking shared/exclusive lock owned by transactions.
//!
//! A [`PageLock`] tracks which transactions hold a page:
//! - any number of readers (`Shared`), or
//! - one writer (`Exclusive`)
//!
//! A sole reader can upgrade to writer in place. Waiters sleep on a condition
//! variable that every release broadcasts on; each one re-evaluates its own
//! grant condition on wake, so there is no fairness and starvation is possible.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::common::{PageId, Result, TransactionId};
use crate::concurrency::Permission;

/// Outcome of a single grant attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Attempt {
    Granted,
    /// Blocked by these holders (never includes the requester).
    Blocked(Vec<TransactionId>),
}

/// Holders of a page.
///
/// Invariant: `writer` is never also in `readers`; an upgrade moves the
/// transaction from one to the other.
#[derive(Debug, Default)]
struct LockState {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
}

impl LockState {
    fn held(&self, tid: TransactionId) -> Option<Permission> {
        if self.writer == Some(tid) {
            Some(Permission::Exclusive)
        } else if self.readers.contains(&tid) {
            Some(Permission::Shared)
        } else {
            None
        }
    }

    fn try_acquire(&mut self, tid: TransactionId, perm: Permission) -> Attempt {
        if self.held(tid).is_some_and(|held| held.covers(perm)) {
            return Attempt::Granted;
        }
        match perm {
            Permission::Shared => match self.writer {
                Some(writer) => Attempt::Blocked(vec![writer]),
                None => {
                    self.readers.insert(tid);
                    Attempt::Granted
                }
            },
            Permission::Exclusive => {
                let mut blockers: Vec<TransactionId> =
                    self.readers.iter().copied().filter(|&r| r != tid).collect();
                if let Some(writer) = self.writer {
                    blockers.push(writer);
                }
                if !blockers.is_empty() {
                    return Attempt::Blocked(blockers);
                }
                self.readers.remove(&tid);
                self.writer = Some(tid);
                Attempt::Granted
            }
        }
    }

    fn release(&mut self, tid: TransactionId) -> bool {
        let was_reader = self.readers.remove(&tid);
        let was_writer = self.writer == Some(tid);
        if was_writer {
            self.writer = None;
        }
        was_reader || was_writer
    }

    fn holds(&self, tid: TransactionId) -> bool {
        self.held(tid).is_some()
    }
}

/// Shared/exclusive lock on one page.
///
/// # Thread Safety
/// - `state`: `Mutex` guarding the holder sets
/// - `released`: `Condvar` broadcast on every release
pub struct PageLock {
    page_id: PageId,
    state: Mutex<LockState>,
    released: Condvar,
}

impl PageLock {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Block until `tid` holds `perm`.
    ///
    /// Every time the request is found blocked, `update_waits` is called with
    /// the conflicting holders while the lock's state is still held, so the
    /// caller can record wait-for edges and veto the wait by returning an
    /// error. Once the request is granted after having waited, it is called
    /// one last time with an empty slice. The condition wait is bounded by
    /// `recheck`; a timeout just re-runs the same evaluation.
    pub fn acquire<F>(
        &self,
        tid: TransactionId,
        perm: Permission,
        recheck: Duration,
        mut update_waits: F,
    ) -> Result<()>
    where
        F: FnMut(&[TransactionId]) -> Result<()>,
    {
        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            match state.try_acquire(tid, perm) {
                Attempt::Granted => {
                    if waited {
                        update_waits(&[])?;
                    }
                    return Ok(());
                }
                Attempt::Blocked(blockers) => {
                    update_waits(&blockers)?;
                    waited = true;
                    let timed_out = self.released.wait_for(&mut state, recheck).timed_out();
                    trace!(%tid, page_id = %self.page_id, timed_out, "page_lock.wake");
                }
            }
        }
    }

    /// Grant `perm` to `tid` only if that is possible right now.
    pub fn try_acquire(&self, tid: TransactionId, perm: Permission) -> bool {
        self.state.lock().try_acquire(tid, perm) == Attempt::Granted
    }

    /// Drop whatever `tid` holds and wake all waiters.
    ///
    /// Returns `false` if `tid` held nothing.
    pub fn release(&self, tid: TransactionId) -> bool {
        let released = self.state.lock().release(tid);
        if released {
            self.released.notify_all();
        }
        released
    }

    /// Whether `tid` holds this lock in any mode.
    pub fn holds(&self, tid: TransactionId) -> bool {
        self.state.lock().holds(tid)
    }

    pub fn holds_exclusive(&self, tid: TransactionId) -> bool {
        self.permission(tid) == Some(Permission::Exclusive)
    }

    /// Strongest permission `tid` holds, if any.
    pub fn permission(&self, tid: TransactionId) -> Option<Permission> {
        self.state.lock().held(tid)
    }

    /// Every current holder, readers and writer alike.
    pub fn holders(&self) -> Vec<TransactionId> {
        let state = self.state.lock();
        state.readers.iter().copied().chain(state.writer).collect()
    }

    /// Whether nobody holds the lock.
    pub fn is_free(&self) -> bool {
        let state = self.state.lock();
        state.writer.is_none() && state.readers.is_empty()
    }
}
