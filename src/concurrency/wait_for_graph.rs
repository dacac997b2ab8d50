//! Wait-for graph over transactions.

use std::collections::{HashMap, HashSet};

use crate::common::TransactionId;

/// Directed graph where an edge `T → U` means T is blocked on a lock U holds.
///
/// A transaction waits on at most one lock at a time, so its out-edges are
/// always replaced as a whole ([`set_waits`](Self::set_waits)) rather than
/// accumulated. Nodes without out-edges are not stored.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `waiter`'s out-edges with edges to `holders`.
    ///
    /// Self-edges are dropped; an empty `holders` clears the waiter.
    pub fn set_waits<I>(&mut self, waiter: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let targets: HashSet<TransactionId> =
            holders.into_iter().filter(|&h| h != waiter).collect();
        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Remove `waiter`'s out-edges.
    pub fn clear_waits(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Remove `tid` entirely: its out-edges and every edge pointing at it.
    pub fn remove_transaction(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        self.edges.retain(|_, targets| {
            targets.remove(&tid);
            !targets.is_empty()
        });
    }

    /// Whether `tid` currently has out-edges.
    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.edges.contains_key(&tid)
    }

    /// Transactions `waiter` is blocked on, sorted.
    pub fn waits_for(&self, waiter: TransactionId) -> Vec<TransactionId> {
        let mut targets: Vec<TransactionId> = self
            .edges
            .get(&waiter)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default();
        targets.sort_unstable();
        targets
    }

    /// Whether `tid` can reach itself, i.e. sits on a cycle.
    pub fn on_cycle(&self, tid: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = match self.edges.get(&tid) {
            Some(targets) => targets.iter().copied().collect(),
            None => return false,
        };

        while let Some(node) = stack.pop() {
            if node == tid {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(targets) = self.edges.get(&node) {
                stack.extend(targets.iter().copied().filter(|t| !visited.contains(t)));
            }
        }
        false
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }
}
