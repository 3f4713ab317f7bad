//! Bounded top-K selection
//!
//! [`BoundedMinHeap`] keeps the `capacity` largest items of a stream, ordered by a key function,
//! in `O(capacity)` memory. The smallest retained item sits at the root so each offer costs one
//! comparison plus `O(log capacity)` sifting when the item is kept.
//!
//! Offer contract:
//! - below capacity, every item is inserted;
//! - at capacity, an item replaces the minimum only if its key is strictly greater;
//! - an item whose key is equal to or less than the minimum is discarded.
//!
//! Among retained items with equal keys the most recently inserted one is treated as the
//! minimum, so eviction always removes the latest arrival and the first seen survive.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use memuse::DynamicUsage;

use crate::primitives::Candidate;

// large `top_k` values should not reserve their whole capacity up front
const PREALLOCATION_LIMIT: usize = 4096;

/// Result of [`BoundedMinHeap::offer`]
#[derive(Debug, PartialEq, Eq)]
pub enum Offer<T> {
    /// The heap had room and the item was added.
    Inserted,
    /// The item displaced the returned minimum.
    Replaced(T),
    /// The item did not exceed the minimum and is handed back.
    Discarded(T),
}

struct Entry<T> {
    // insertion order, breaks ties between equal keys
    sequence: u64,
    item: T,
}

/// Min-heap of at most `capacity` items keyed by `key`.
pub struct BoundedMinHeap<T, K, F> {
    capacity: usize,
    entries: Vec<Entry<T>>,
    key: F,
    next_sequence: u64,
    _key: PhantomData<fn() -> K>,
}

impl<T, K, F> BoundedMinHeap<T, K, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    /// Creates an empty heap. A capacity of zero discards every offer.
    pub fn new(capacity: usize, key: F) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity.min(PREALLOCATION_LIMIT)),
            key,
            next_sequence: 0,
            _key: PhantomData,
        }
    }

    /// Maximum number of retained items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` once further offers must beat the minimum.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Returns the item that the next successful offer would evict.
    pub fn peek_min(&self) -> Option<&T> {
        self.entries.first().map(|entry| &entry.item)
    }

    /// Key of [`Self::peek_min`].
    pub fn min_key(&self) -> Option<K> {
        self.peek_min().map(&self.key)
    }

    /// Offers an item to the heap, see the module documentation for the contract.
    pub fn offer(&mut self, item: T) -> Offer<T> {
        if self.entries.len() < self.capacity {
            let sequence = self.take_sequence();
            self.entries.push(Entry { sequence, item });
            self.sift_up(self.entries.len() - 1);
            return Offer::Inserted;
        }

        let Some(min) = self.entries.first() else {
            return Offer::Discarded(item);
        };
        if (self.key)(&item) <= (self.key)(&min.item) {
            return Offer::Discarded(item);
        }

        let sequence = self.take_sequence();
        let evicted = std::mem::replace(&mut self.entries[0], Entry { sequence, item });
        self.sift_down(0);

        Offer::Replaced(evicted.item)
    }

    /// Iterates the retained items in heap order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &entry.item)
    }

    /// Consumes the heap, returning the retained items in no particular order.
    pub fn into_vec(self) -> Vec<T> {
        self.entries.into_iter().map(|entry| entry.item).collect()
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    // true if the entry at `a` belongs closer to the root than the entry at `b`
    fn ranks_below(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.entries[a], &self.entries[b]);
        match (self.key)(&a.item).cmp(&(self.key)(&b.item)) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.sequence > b.sequence,
        }
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.ranks_below(index, parent) {
                break;
            }
            self.entries.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut lowest = index;
            if left < len && self.ranks_below(left, lowest) {
                lowest = left;
            }
            if right < len && self.ranks_below(right, lowest) {
                lowest = right;
            }
            if lowest == index {
                break;
            }
            self.entries.swap(index, lowest);
            index = lowest;
        }
    }
}

impl<T, K, F> fmt::Debug for BoundedMinHeap<T, K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMinHeap")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<T: DynamicUsage, K, F> DynamicUsage for BoundedMinHeap<T, K, F> {
    fn dynamic_usage(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<Entry<T>>()
            + self
                .entries
                .iter()
                .map(|entry| entry.item.dynamic_usage())
                .sum::<usize>()
    }

    fn dynamic_usage_bounds(&self) -> (usize, Option<usize>) {
        let slots = self.entries.capacity() * std::mem::size_of::<Entry<T>>();
        self.entries
            .iter()
            .map(|entry| entry.item.dynamic_usage_bounds())
            .fold((slots, Some(slots)), |(lower, upper), (item_lower, item_upper)| {
                (
                    lower + item_lower,
                    upper.zip(item_upper).map(|(upper, item_upper)| upper + item_upper),
                )
            })
    }
}

type EnergyKey = fn(&Candidate) -> u64;

/// Retains the `top_k` candidates with the highest energy usage.
#[derive(Debug)]
pub struct EnergySelector {
    heap: BoundedMinHeap<Candidate, u64, EnergyKey>,
}

impl EnergySelector {
    /// Creates a selector retaining at most `top_k` candidates.
    pub fn new(top_k: usize) -> Self {
        Self {
            heap: BoundedMinHeap::new(top_k, Candidate::energy as EnergyKey),
        }
    }

    /// Offers a candidate, see [`BoundedMinHeap::offer`].
    pub fn offer(&mut self, candidate: Candidate) -> Offer<Candidate> {
        self.heap.offer(candidate)
    }

    /// Configured number of retained candidates.
    pub fn top_k(&self) -> usize {
        self.heap.capacity()
    }

    /// Number of candidates retained so far.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no candidate is retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Lowest energy currently retained.
    pub fn min_energy(&self) -> Option<u64> {
        self.heap.min_key()
    }

    /// Consumes the selector, returning the retained set unordered.
    pub fn into_vec(self) -> Vec<Candidate> {
        self.heap.into_vec()
    }
}

impl DynamicUsage for EnergySelector {
    fn dynamic_usage(&self) -> usize {
        self.heap.dynamic_usage()
    }

    fn dynamic_usage_bounds(&self) -> (usize, Option<usize>) {
        self.heap.dynamic_usage_bounds()
    }
}
