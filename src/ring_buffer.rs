use std::fmt;
use std::io;
use std::ops::Range;

use tracing::{debug, trace};

use crate::error::{FifoError, FifoResult};
use crate::{MAX_CAPACITY, MIN_CAPACITY};

/// Ring buffer that owns its backing storage
pub type OwnedRingBuffer = RingBuffer<Box<[u8]>>;

/// Ring buffer attached to storage borrowed from the caller
pub type BorrowedRingBuffer<'a> = RingBuffer<&'a mut [u8]>;

/// Fixed-capacity byte FIFO with unbounded, masked cursors
///
/// `write` and `read` only ever grow (with `u32` wraparound). The number of
/// buffered bytes is always `write.wrapping_sub(read)` and never exceeds the
/// capacity; a cursor is reduced to a storage offset only at the point of
/// access, via `cursor & mask`.
///
/// The storage type decides who releases the memory: a [`OwnedRingBuffer`]
/// frees its `Box<[u8]>` on drop, a [`BorrowedRingBuffer`] leaves the
/// caller's slice alone.
pub struct RingBuffer<S> {
    storage: S,
    /// `capacity - 1`
    mask: u32,
    write: u32,
    read: u32,
}

/// Validates a storage length for attach mode
fn check_storage_len(len: usize) -> FifoResult<()> {
    if len < MIN_CAPACITY {
        return Err(FifoError::TooSmall { len });
    }
    if !len.is_power_of_two() {
        return Err(FifoError::NotPowerOfTwo { len });
    }
    if len > MAX_CAPACITY {
        return Err(FifoError::TooLarge { len });
    }
    Ok(())
}

/// Rounds a requested capacity up to a usable power of two
pub(crate) fn round_capacity(requested: usize) -> FifoResult<usize> {
    if requested > MAX_CAPACITY {
        return Err(FifoError::TooLarge { len: requested });
    }
    Ok(requested.max(MIN_CAPACITY).next_power_of_two())
}

/// Clamps a caller-supplied length to a cursor-space limit
#[inline]
pub(crate) fn clamp_len(requested: usize, limit: u32) -> u32 {
    u32::try_from(requested).map_or(limit, |r| r.min(limit))
}

/// Splits `len` bytes starting at storage `offset` into the run up to the
/// physical end of the storage and the wrapped run from its start.
#[inline]
pub(crate) fn segments(offset: u32, len: usize, capacity: usize) -> (Range<usize>, Range<usize>) {
    let offset = offset as usize;
    let first = len.min(capacity - offset);
    (offset..offset + first, 0..len - first)
}

impl OwnedRingBuffer {
    /// Allocate a ring buffer able to hold at least `requested` bytes
    ///
    /// The capacity is raised to [`MIN_CAPACITY`] and rounded up to the next
    /// power of two, so a request of 100 yields 128.
    ///
    /// # Returns
    /// * `Ok(OwnedRingBuffer)` with both cursors at 0
    /// * `Err(FifoError::TooLarge)` above [`MAX_CAPACITY`]
    /// * `Err(FifoError::Allocation)` if the allocator refuses the storage
    pub fn with_capacity(requested: usize) -> FifoResult<Self> {
        let capacity = round_capacity(requested)?;

        let mut storage = Vec::new();
        if let Err(source) = storage.try_reserve_exact(capacity) {
            debug!(requested, capacity, "ring buffer allocation failed");
            return Err(FifoError::Allocation { capacity, source });
        }
        storage.resize(capacity, 0);

        trace!(requested, capacity, "allocated ring buffer storage");
        Ok(Self::from_parts(storage.into_boxed_slice(), capacity))
    }

    /// Release the ring buffer and its storage
    ///
    /// Equivalent to dropping it; provided so the release point can be
    /// spelled out at the call site.
    pub fn free(self) {
        trace!(capacity = self.capacity(), "releasing ring buffer storage");
    }
}

impl<S> RingBuffer<S> {
    fn from_parts(storage: S, capacity: usize) -> Self {
        // capacity was validated against MAX_CAPACITY, so the mask fits in u32
        RingBuffer {
            storage,
            mask: (capacity - 1) as u32,
            write: 0,
            read: 0,
        }
    }

    pub(crate) fn into_parts(self) -> (S, u32, u32) {
        (self.storage, self.write, self.read)
    }

    pub(crate) fn from_raw_parts(storage: S, capacity: usize, write: u32, read: u32) -> Self {
        let mut rb = Self::from_parts(storage, capacity);
        rb.write = write;
        rb.read = read;
        rb
    }

    /// Give the storage back to the caller, discarding the cursors
    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Number of bytes the ring can hold
    pub fn capacity(&self) -> usize {
        self.mask as usize + 1
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.used() as usize
    }

    /// True when there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// True when a `put` would accept nothing
    pub fn is_full(&self) -> bool {
        self.unused() == 0
    }

    /// Number of bytes a `put` can currently accept
    pub fn free_space(&self) -> usize {
        self.unused() as usize
    }

    /// Raw, unmasked write cursor
    pub fn write_cursor(&self) -> u32 {
        self.write
    }

    /// Raw, unmasked read cursor
    pub fn read_cursor(&self) -> u32 {
        self.read
    }

    /// Force both cursors to arbitrary positions
    ///
    /// Useful to exercise the `u32` wraparound without pushing four billion
    /// bytes through the ring. The storage is not touched, so whatever bytes
    /// sit at the new offsets become the buffered content.
    ///
    /// # Returns
    /// * `Err(FifoError::CursorsOutOfRange)` if `write - read` (wrapping)
    ///   exceeds the capacity; the cursors are left unchanged
    pub fn set_cursors(&mut self, write: u32, read: u32) -> FifoResult<()> {
        if write.wrapping_sub(read) as usize > self.capacity() {
            return Err(FifoError::CursorsOutOfRange {
                write,
                read,
                capacity: self.capacity(),
            });
        }
        self.write = write;
        self.read = read;
        Ok(())
    }

    /// Empty the ring by zeroing both cursors; stale bytes stay in storage
    pub fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
    }

    /// Discard up to `len` unread bytes without copying them
    ///
    /// Returns the number of bytes actually discarded.
    pub fn skip(&mut self, len: usize) -> usize {
        let len = clamp_len(len, self.used());
        self.read = self.read.wrapping_add(len);
        len as usize
    }

    #[inline]
    fn used(&self) -> u32 {
        self.write.wrapping_sub(self.read)
    }

    #[inline]
    fn unused(&self) -> u32 {
        (self.mask + 1) - self.used()
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> RingBuffer<S> {
    /// Attach a ring buffer to caller-provided storage
    ///
    /// The storage length must be a power of two within
    /// [`MIN_CAPACITY`]..=[`MAX_CAPACITY`]. The ring never frees the storage;
    /// [`RingBuffer::into_inner`] hands it back.
    ///
    /// # Returns
    /// * `Err(FifoError::TooSmall)` for storage shorter than two bytes
    /// * `Err(FifoError::NotPowerOfTwo)` / `Err(FifoError::TooLarge)` otherwise
    pub fn attach(storage: S) -> FifoResult<Self> {
        let len = storage.as_ref().len();
        check_storage_len(len)?;
        trace!(capacity = len, "attached ring buffer to external storage");
        Ok(Self::from_parts(storage, len))
    }

    /// Copy as much of `src` as fits into the ring
    ///
    /// Never blocks and never fails: the write is truncated to the free
    /// space, and the number of bytes actually enqueued is returned (0 when
    /// the ring is full).
    pub fn put(&mut self, src: &[u8]) -> usize {
        let len = clamp_len(src.len(), self.unused()) as usize;
        let (head, tail) = segments(self.write & self.mask, len, self.capacity());
        let split = head.len();

        let buf = self.storage.as_mut();
        buf[head].copy_from_slice(&src[..split]);
        buf[tail].copy_from_slice(&src[split..len]);

        self.write = self.write.wrapping_add(len as u32);
        len
    }

    /// Copy up to `dst.len()` unread bytes into `dst` without consuming them
    ///
    /// Returns the number of bytes copied; only that prefix of `dst` is
    /// written.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let len = clamp_len(dst.len(), self.used()) as usize;
        let (head, tail) = segments(self.read & self.mask, len, self.capacity());
        let split = head.len();

        let buf = self.storage.as_ref();
        dst[..split].copy_from_slice(&buf[head]);
        dst[split..len].copy_from_slice(&buf[tail]);
        len
    }

    /// Copy up to `dst.len()` unread bytes into `dst` and consume them
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        let len = self.peek(dst);
        self.read = self.read.wrapping_add(len as u32);
        len
    }

    /// The unread bytes as two slices in logical order
    ///
    /// The second slice is empty unless the content wraps past the physical
    /// end of the storage.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let (head, tail) = segments(self.read & self.mask, self.len(), self.capacity());
        let buf = self.storage.as_ref();
        (&buf[head], &buf[tail])
    }
}

impl<S> fmt::Debug for RingBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("write", &self.write)
            .field("read", &self.read)
            .field("len", &self.len())
            .finish()
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> io::Read for RingBuffer<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.get(buf))
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> io::Write for RingBuffer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.put(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_capacity_rounding() {
        for (requested, expected) in [(0, 2), (1, 2), (2, 2), (3, 4), (100, 128), (128, 128), (129, 256)] {
            let rb = OwnedRingBuffer::with_capacity(requested).unwrap();
            assert_eq!(rb.capacity(), expected, "requested {}", requested);
            assert!(rb.is_empty());
        }
    }

    #[test]
    fn test_capacity_too_large() {
        let result = OwnedRingBuffer::with_capacity(MAX_CAPACITY + 1);
        assert_eq!(result.unwrap_err(), FifoError::TooLarge { len: MAX_CAPACITY + 1 });
        assert_eq!(round_capacity(MAX_CAPACITY).unwrap(), MAX_CAPACITY);
    }

    #[test]
    fn test_attach_rejects_bad_lengths() {
        let mut empty: [u8; 0] = [];
        let result = RingBuffer::attach(&mut empty[..]);
        assert_eq!(result.unwrap_err(), FifoError::TooSmall { len: 0 });

        let mut one = [0u8; 1];
        let result = RingBuffer::attach(&mut one[..]);
        assert_eq!(result.unwrap_err(), FifoError::TooSmall { len: 1 });

        let mut odd = [0u8; 100];
        let result = RingBuffer::attach(&mut odd[..]);
        assert_eq!(result.unwrap_err(), FifoError::NotPowerOfTwo { len: 100 });
    }

    #[test]
    fn test_attach_leaves_storage_with_caller() {
        let mut storage = [0u8; 8];
        {
            let mut rb = RingBuffer::attach(&mut storage[..]).unwrap();
            assert_eq!(rb.capacity(), 8);
            assert_eq!(rb.put(b"abc"), 3);
        }
        assert_eq!(&storage[..3], b"abc");
    }

    #[test]
    fn test_put_truncates_to_free_space() {
        let mut rb = OwnedRingBuffer::with_capacity(8).unwrap();
        assert_eq!(rb.put(b"hello"), 5);
        assert_eq!(rb.free_space(), 3);
        assert_eq!(rb.put(b"world"), 3);
        assert!(rb.is_full());
        assert_eq!(rb.put(b"!"), 0);

        let mut out = [0u8; 16];
        assert_eq!(rb.get(&mut out), 8);
        assert_eq!(&out[..8], b"hellowor");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_put_wraps_in_two_segments() {
        let mut rb = OwnedRingBuffer::with_capacity(8).unwrap();
        rb.put(b"123456");
        assert_eq!(rb.skip(5), 5);

        assert_eq!(rb.put(b"abcdef"), 6);
        let (head, tail) = rb.as_slices();
        assert_eq!(head, b"6ab");
        assert_eq!(tail, b"cdef");

        let mut out = [0u8; 7];
        assert_eq!(rb.get(&mut out), 7);
        assert_eq!(&out, b"6abcdef");
        assert_eq!(rb.write_cursor(), 12);
        assert_eq!(rb.read_cursor(), 12);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut rb = OwnedRingBuffer::with_capacity(16).unwrap();
        rb.put(&pattern(10));

        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        assert_eq!(rb.peek(&mut a), 4);
        assert_eq!(rb.peek(&mut b), 4);
        assert_eq!(a, b);
        assert_eq!(rb.len(), 10);
    }

    #[test]
    fn test_get_only_writes_available_prefix() {
        let mut rb = OwnedRingBuffer::with_capacity(128).unwrap();
        rb.put(&pattern(50));

        let mut out = [0xFFu8; 200];
        assert_eq!(rb.get(&mut out), 50);
        assert_eq!(&out[..50], &pattern(50)[..]);
        assert!(out[50..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_skip_clamps() {
        let mut rb = OwnedRingBuffer::with_capacity(16).unwrap();
        rb.put(b"abcdef");
        assert_eq!(rb.skip(2), 2);
        assert_eq!(rb.skip(usize::MAX), 4);
        assert_eq!(rb.skip(1), 0);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut rb = OwnedRingBuffer::with_capacity(16).unwrap();
        rb.set_cursors(u32::MAX - 3, u32::MAX - 10).unwrap();
        assert_eq!(rb.len(), 7);
        rb.reset();
        assert!(rb.is_empty());
        assert_eq!(rb.len(), 0);
        assert_eq!(rb.write_cursor(), 0);
        assert_eq!(rb.read_cursor(), 0);
    }

    #[test]
    fn test_set_cursors_rejects_overfull() {
        let mut rb = OwnedRingBuffer::with_capacity(16).unwrap();
        let result = rb.set_cursors(17, 0);
        assert_eq!(
            result.unwrap_err(),
            FifoError::CursorsOutOfRange {
                write: 17,
                read: 0,
                capacity: 16
            }
        );
        // read ahead of write wraps to a huge length
        assert!(rb.set_cursors(0, 1).is_err());
        assert!(rb.set_cursors(16, 0).is_ok());
        assert!(rb.is_full());
    }

    #[test]
    fn test_cursor_wraparound() {
        let mut rb = OwnedRingBuffer::with_capacity(128).unwrap();
        let start = 0u32.wrapping_sub(10);
        rb.set_cursors(start, start).unwrap();

        let data = pattern(100);
        assert_eq!(rb.put(&data), 100);
        assert_eq!(rb.write_cursor(), 90);
        assert_eq!(rb.len(), 100);

        let mut out = [0u8; 200];
        assert_eq!(rb.get(&mut out), 100);
        assert_eq!(&out[..100], &data[..]);
        assert_eq!(rb.read_cursor(), 90);
    }

    #[test]
    fn test_io_traits() {
        let mut rb = OwnedRingBuffer::with_capacity(4).unwrap();
        assert_eq!(rb.write(b"abcdef").unwrap(), 4);
        rb.flush().unwrap();

        let mut out = Vec::new();
        rb.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn test_debug_hides_storage() {
        let mut rb = OwnedRingBuffer::with_capacity(4).unwrap();
        rb.put(b"xy");
        assert_eq!(
            format!("{:?}", rb),
            "RingBuffer { capacity: 4, write: 2, read: 0, len: 2 }"
        );
    }
}
