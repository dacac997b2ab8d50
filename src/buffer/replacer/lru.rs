//! LRU (Least Recently Used) cache.
//!
//! Entries live in a slot arena threaded by a doubly linked recency list, so
//! lookup, promotion, insertion and removal are all O(1).
//!
//! ```text
//!  head (MRU)                                     tail (LRU)
//!     │                                              │
//!     ▼                                              ▼
//!  ┌──────┐  next  ┌──────┐  next  ┌──────┐  next  ┌──────┐
//!  │ slot ├───────►│ slot ├───────►│ slot ├───────►│ slot │
//!  │  3   │◄───────┤  0   │◄───────┤  2   │◄───────┤  1   │
//!  └──────┘  prev  └──────┘  prev  └──────┘  prev  └──────┘
//! ```
//!
//! The cache never evicts on its own: callers inspect [`LruCache::peek_lru`]
//! and decide whether the victim may go before calling
//! [`LruCache::remove`].

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: usize,
    next: usize,
}

const UNLINKED: Link = Link {
    prev: NIL,
    next: NIL,
};

/// Bounded key/value map ordered by recency of use.
#[derive(Debug)]
pub struct LruCache<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<(K, V)>>,
    links: Vec<Link>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LRU capacity must be positive");
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            links: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.promote(slot);
        self.value(slot)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.value(slot)
    }

    /// Insert or replace `key`, making it most recently used.
    ///
    /// Returns the previous value when `key` was already present.
    ///
    /// # Panics
    /// Panics if `key` is new and the cache is full; callers make room first.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.promote(slot);
            return self.slots[slot]
                .replace((key, value))
                .map(|(_, old)| old);
        }

        assert!(!self.is_full(), "LRU cache is full");

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some((key.clone(), value));
                slot
            }
            None => {
                self.slots.push(Some((key.clone(), value)));
                self.links.push(UNLINKED);
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.push_front(slot);
        None
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        self.free.push(slot);
        self.slots[slot].take().map(|(_, value)| value)
    }

    /// Least recently used entry.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.entry(self.tail)
    }

    /// Remove and return the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.unlink(slot);
        self.free.push(slot);
        let (key, value) = self.slots[slot].take()?;
        self.index.remove(&key);
        Some((key, value))
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    // ========================================================================
    // Internal: recency list
    // ========================================================================

    fn value(&self, slot: usize) -> Option<&V> {
        self.slots[slot].as_ref().map(|(_, value)| value)
    }

    fn entry(&self, slot: usize) -> Option<(&K, &V)> {
        if slot == NIL {
            return None;
        }
        self.slots[slot].as_ref().map(|(key, value)| (key, value))
    }

    fn promote(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn push_front(&mut self, slot: usize) {
        self.links[slot] = Link {
            prev: NIL,
            next: self.head,
        };
        if self.head != NIL {
            self.links[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn unlink(&mut self, slot: usize) {
        let Link { prev, next } = self.links[slot];
        if prev == NIL {
            self.head = next;
        } else {
            self.links[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.links[next].prev = prev;
        }
        self.links[slot] = UNLINKED;
    }
}

/// Iterator over an [`LruCache`] from most to least recently used.
pub struct Iter<'a, K, V> {
    cache: &'a LruCache<K, V>,
    cursor: usize,
}

impl<'a, K: Hash + Eq + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor;
        let entry = self.cache.entry(slot)?;
        self.cursor = self.cache.links[slot].next;
        Some(entry)
    }
}
