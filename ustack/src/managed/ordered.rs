use std::collections::VecDeque;
use std::collections::vec_deque::Iter;

use crate::wire::TcpSeqNumber as SeqNumber;

/// An element with a position in sequence space.
pub trait Sequenced {
    /// The sequence number ordering this element.
    fn seq(&self) -> SeqNumber;
}

/// Maintains a queue ordered by wrapping sequence comparison.
///
/// Elements are expected to occupy a window of less than 2<sup>31</sup> sequence numbers, the
/// range in which the wrapping comparison is consistent. Insertion is a binary search followed by
/// a shift which is cheap for the typical case of appending at either end.
#[derive(Debug, Clone)]
pub struct Ordered<T> {
    inner: VecDeque<T>,
}

impl<T: Sequenced> Ordered<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Ordered { inner: VecDeque::new() }
    }

    /// Insert an element behind all elements that do not compare greater.
    ///
    /// Returns the index at which the element was inserted.
    pub fn insert(&mut self, item: T) -> usize {
        let seq = item.seq();
        let idx = self.inner.partition_point(|other| !(seq < other.seq()));
        self.inner.insert(idx, item);
        idx
    }

    /// Find the index of the element starting exactly at `seq`.
    pub fn find(&self, seq: SeqNumber) -> Option<usize> {
        let idx = self.inner.partition_point(|other| other.seq() < seq);
        match self.inner.get(idx) {
            Some(item) if item.seq() == seq => Some(idx),
            _ => None,
        }
    }

    /// The element with the lowest sequence number.
    pub fn first(&self) -> Option<&T> {
        self.inner.front()
    }

    /// Mutable access to the lowest element.
    ///
    /// The caller must not move its sequence number past that of the following element.
    pub fn first_mut(&mut self) -> Option<&mut T> {
        self.inner.front_mut()
    }

    /// The element with the highest sequence number.
    pub fn last(&self) -> Option<&T> {
        self.inner.back()
    }

    /// Remove the lowest element.
    pub fn pop_first(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    /// Remove the highest element.
    pub fn pop_last(&mut self) -> Option<T> {
        self.inner.pop_back()
    }

    /// Remove the element at the specified index.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        self.inner.remove(idx)
    }

    /// Retrieve the element at an index, in order.
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.inner.get(idx)
    }

    /// Iterate in increasing sequence order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.inner.iter()
    }

    /// Remove all elements.
    pub fn clear(&mut self) {
        self.inner.clear()
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Sequenced> Default for Ordered<T> {
    fn default() -> Self {
        Ordered::new()
    }
}

impl<'a, T> IntoIterator for &'a Ordered<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.inner.iter()
    }
}
