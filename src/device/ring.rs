//! Fixed-capacity byte ring.
//!
//! ```text
//!   0                                              capacity
//!   ┌────────────┬──────────────────────┬────────────┐
//!   │  (free)    │ used bytes, oldest → │  (free)    │
//!   └────────────┴──────────────────────┴────────────┘
//!                ↑ read start           ↑ write_cursor
//! ```
//!
//! There is no separate read cursor: the readable region is the `used` bytes
//! that end at `write_cursor`, so it starts at
//! `(write_cursor + capacity - used) % capacity`. Either region may wrap.
//!
//! The ring itself does no locking; the driver only touches it through the
//! access guard.

use super::error::DriverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer {
    storage:      Box<[u8]>,
    used:         usize,
    write_cursor: usize,
    max_capacity: usize,
}

impl RingBuffer {
    /// Zeroed ring of `capacity` bytes that may later grow up to
    /// `max_capacity`.
    pub fn new(capacity: usize, max_capacity: usize) -> Result<Self, DriverError> {
        check_capacity(capacity, max_capacity)?;
        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
            write_cursor: 0,
            max_capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used == self.capacity()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    fn read_start(&self) -> usize {
        (self.write_cursor + self.capacity() - self.used) % self.capacity()
    }

    /// Copies as much of `bytes` as fits and returns the count.
    /// A full ring yields `0`, not an error.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let cap = self.capacity();
        let n = bytes.len().min(self.free());
        if n == 0 {
            return 0;
        }

        let head = n.min(cap - self.write_cursor);
        self.storage[self.write_cursor..self.write_cursor + head].copy_from_slice(&bytes[..head]);
        self.storage[..n - head].copy_from_slice(&bytes[head..n]);

        self.write_cursor = (self.write_cursor + n) % cap;
        self.used += n;
        n
    }

    /// Removes and returns up to `max_count` of the oldest bytes.
    /// An empty ring yields an empty vector.
    pub fn read(&mut self, max_count: usize) -> Vec<u8> {
        let out = self.copy_readable(max_count);
        self.used -= out.len();
        out
    }

    /// Oldest-first copy of the readable region without consuming it.
    pub fn peek(&self, max_count: usize) -> Vec<u8> {
        self.copy_readable(max_count)
    }

    fn copy_readable(&self, max_count: usize) -> Vec<u8> {
        let cap = self.capacity();
        let n = max_count.min(self.used);
        let start = self.read_start();
        let head = n.min(cap - start);

        let mut out = Vec::with_capacity(n);
        out.extend_from_slice(&self.storage[start..start + head]);
        out.extend_from_slice(&self.storage[..n - head]);
        out
    }

    /// Reallocates to `new_capacity`, keeping the oldest
    /// `min(used, new_capacity)` bytes in order at the front.
    /// On error the ring is left untouched.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), DriverError> {
        check_capacity(new_capacity, self.max_capacity)?;

        let kept = self.copy_readable(new_capacity);
        let mut storage = vec![0u8; new_capacity].into_boxed_slice();
        storage[..kept.len()].copy_from_slice(&kept);

        self.storage = storage;
        self.used = kept.len();
        self.write_cursor = kept.len() % new_capacity;
        Ok(())
    }

    /// Drops all data and zeroes the storage.
    pub fn clear(&mut self) {
        self.storage.fill(0);
        self.used = 0;
        self.write_cursor = 0;
    }
}

fn check_capacity(capacity: usize, max_capacity: usize) -> Result<(), DriverError> {
    if capacity == 0 {
        return Err(DriverError::config("buffer size must be greater than zero"));
    }
    if capacity > max_capacity {
        return Err(DriverError::config(format!(
            "buffer size {capacity} exceeds maximum {max_capacity}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> RingBuffer {
        RingBuffer::new(capacity, 64).unwrap()
    }

    #[test]
    fn write_then_read_returns_same_bytes() {
        let mut rb = ring(16);
        assert_eq!(rb.write(b"HELLOWORLD"), 10);
        assert_eq!(rb.read(5), b"HELLO");
        assert_eq!(rb.used(), 5);
        assert_eq!(rb.read(100), b"WORLD");
        assert!(rb.is_empty());
    }

    #[test]
    fn write_truncates_to_free_space() {
        let mut rb = ring(4);
        assert_eq!(rb.write(b"ABCDE"), 4);
        assert!(rb.is_full());
        assert_eq!(rb.write(b"Z"), 0);
        assert_eq!(rb.read(10), b"ABCD");
    }

    #[test]
    fn empty_read_is_empty_not_error() {
        let mut rb = ring(8);
        assert!(rb.read(4).is_empty());
        assert_eq!(rb.used(), 0);
    }

    #[test]
    fn data_wraps_around_the_end() {
        let mut rb = ring(8);
        rb.write(b"123456");
        assert_eq!(rb.read(4), b"1234");
        // cursor at 6, two bytes left; this write wraps
        assert_eq!(rb.write(b"ABCDEF"), 6);
        assert_eq!(rb.write_cursor(), 4);
        assert!(rb.is_full());
        assert_eq!(rb.read(8), b"56ABCDEF");
    }

    #[test]
    fn used_stays_within_capacity_over_mixed_traffic() {
        let mut rb = ring(7);
        let mut expected = std::collections::VecDeque::new();
        for step in 0u8..200 {
            let chunk: Vec<u8> = (0..(step % 5)).map(|i| step.wrapping_add(i)).collect();
            let n = rb.write(&chunk);
            expected.extend(&chunk[..n]);
            assert!(rb.used() <= rb.capacity());

            let got = rb.read((step % 3) as usize);
            let want: Vec<u8> = expected.drain(..got.len()).collect();
            assert_eq!(got, want);
            assert_eq!(rb.used(), expected.len());
        }
    }

    #[test]
    fn grow_keeps_everything_in_order() {
        let mut rb = ring(8);
        rb.write(b"xxxxxx");
        rb.read(6);
        rb.write(b"abcdef"); // wrapped
        rb.resize(32).unwrap();
        assert_eq!(rb.capacity(), 32);
        assert_eq!(rb.used(), 6);
        assert_eq!(rb.write_cursor(), 6);
        assert_eq!(rb.read(32), b"abcdef");
    }

    #[test]
    fn shrink_keeps_oldest_prefix() {
        let mut rb = ring(16);
        rb.write(b"0123456789");
        rb.resize(4).unwrap();
        assert_eq!(rb.used(), 4);
        assert!(rb.is_full());
        assert_eq!(rb.write_cursor(), 0);
        assert_eq!(rb.read(10), b"0123");
    }

    #[test]
    fn resize_rejects_zero_and_oversize_without_touching_data() {
        let mut rb = ring(8);
        rb.write(b"keep");
        let before = rb.clone();

        assert!(matches!(rb.resize(0), Err(DriverError::Config { .. })));
        assert!(matches!(rb.resize(65), Err(DriverError::Config { .. })));
        assert_eq!(rb, before);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut rb = ring(8);
        rb.write(b"secret");
        rb.clear();
        assert_eq!(rb.used(), 0);
        assert_eq!(rb.write_cursor(), 0);
        assert!(rb.storage.iter().all(|&b| b == 0));
    }

    #[test]
    fn construction_validates_capacity() {
        assert!(RingBuffer::new(0, 8).is_err());
        assert!(RingBuffer::new(9, 8).is_err());
        assert_eq!(RingBuffer::new(8, 8).unwrap().capacity(), 8);
    }
}
