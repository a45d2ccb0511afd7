use crate::layer::{Error, Result};

/// A fixed capacity ring of payload bytes addressed by absolute stream offsets.
///
/// Offsets grow without bound (modulo `usize`), the ring maps them onto its storage. The store
/// retains every byte from `head` up to `tail`: writes may land anywhere inside the window
/// `[head, head + capacity)`, including out of order, and `release` moves `head` forward once the
/// owner no longer needs the front.
#[derive(Debug, Clone)]
pub struct RingStore {
    storage: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl RingStore {
    /// Allocate a store holding up to `capacity` bytes.
    ///
    /// # Panics
    /// This function panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring store needs a non-zero capacity");
        RingStore {
            storage: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    /// The total number of bytes this store can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The offset of the oldest retained byte.
    pub fn head(&self) -> usize {
        self.head
    }

    /// The offset one past the furthest written byte.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Number of bytes between `head` and `tail`.
    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head)
    }

    /// Check if no bytes are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining capacity behind `tail`.
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Copy `data` into the store at `offset`.
    ///
    /// Returns `Err(Exhausted)` if any byte would fall outside `[head, head + capacity)`. Nothing
    /// is written in that case.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let rel = offset.wrapping_sub(self.head);
        if rel > self.capacity() || data.len() > self.capacity() - rel {
            return Err(Error::Exhausted);
        }

        let (first, second) = self.split_at(offset, data.len());
        let (data_first, data_second) = data.split_at(first.len());
        self.storage[first].copy_from_slice(data_first);
        self.storage[second].copy_from_slice(data_second);

        let end = offset.wrapping_add(data.len());
        if end.wrapping_sub(self.head) > self.len() {
            self.tail = end;
        }
        Ok(data.len())
    }

    /// Copy bytes starting at `offset` into `dest`.
    ///
    /// Copies at most up to `tail` and returns the number of copied bytes. Offsets outside the
    /// retained range yield nothing.
    pub fn read(&self, offset: usize, dest: &mut [u8]) -> usize {
        let rel = offset.wrapping_sub(self.head);
        if rel >= self.len() {
            return 0;
        }

        let len = dest.len().min(self.len() - rel);
        let (first, second) = self.split_at(offset, len);
        let split = first.len();
        dest[..split].copy_from_slice(&self.storage[first]);
        dest[split..len].copy_from_slice(&self.storage[second]);
        len
    }

    /// Forget all bytes before `offset`.
    ///
    /// Offsets beyond `tail` release everything.
    pub fn release(&mut self, offset: usize) {
        let rel = offset.wrapping_sub(self.head);
        if rel > self.len() {
            self.head = self.tail;
        } else {
            self.head = offset;
        }
    }

    /// Drop all content and restart at offset zero.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// The two storage ranges covering `len` bytes from `offset`, the second possibly empty.
    fn split_at(&self, offset: usize, len: usize)
        -> (core::ops::Range<usize>, core::ops::Range<usize>)
    {
        let start = offset % self.capacity();
        let contiguous = len.min(self.capacity() - start);
        (start..start + contiguous, 0..len - contiguous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_wraps() {
        let mut ring = RingStore::new(8);
        assert_eq!(ring.write(0, b"abcdef"), Ok(6));
        ring.release(5);
        assert_eq!(ring.free(), 7);
        assert_eq!(ring.write(6, b"ghijkl"), Ok(6));
        assert_eq!(ring.len(), 7);

        let mut buf = [0; 16];
        assert_eq!(ring.read(5, &mut buf), 7);
        assert_eq!(&buf[..7], b"fghijkl");
        // Storage was actually split.
        assert_eq!(&ring.storage[..4], b"ijkl");
    }

    #[test]
    fn rejects_overflow() {
        let mut ring = RingStore::new(4);
        assert_eq!(ring.write(0, b"abcde"), Err(Error::Exhausted));
        assert_eq!(ring.write(2, b"abc"), Err(Error::Exhausted));
        assert!(ring.is_empty());
        assert_eq!(ring.write(0, b"abcd"), Ok(4));
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.write(4, b"e"), Err(Error::Exhausted));
    }

    #[test]
    fn out_of_order_writes_extend_tail() {
        let mut ring = RingStore::new(16);
        assert_eq!(ring.write(10, b"kl"), Ok(2));
        assert_eq!(ring.tail(), 12);
        assert_eq!(ring.write(0, b"ab"), Ok(2));
        assert_eq!(ring.tail(), 12);

        let mut buf = [0; 2];
        assert_eq!(ring.read(10, &mut buf), 2);
        assert_eq!(&buf, b"kl");
    }

    #[test]
    fn partial_read() {
        let mut ring = RingStore::new(8);
        ring.write(0, b"abcdef").unwrap();
        let mut buf = [0; 3];
        assert_eq!(ring.read(2, &mut buf), 3);
        assert_eq!(&buf, b"cde");
        assert_eq!(ring.read(6, &mut buf), 0);
        ring.release(100);
        assert!(ring.is_empty());
        assert_eq!(ring.head(), 6);
    }
}
