//! Single-producer, single-consumer halves of an owned ring buffer.
//!
//! The cursors become atomics. Each side copies bytes first and publishes its
//! own cursor afterwards with `Release`; the other side loads it with
//! `Acquire` before touching the storage. The writer only touches the free
//! region and the reader only the unread region, so the two never access
//! the same bytes at once.

use std::cell::UnsafeCell;
use std::fmt;
use std::io;
use std::ops::Range;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::ring_buffer::{clamp_len, segments, OwnedRingBuffer};

struct Shared {
    storage: Box<[UnsafeCell<u8>]>,
    mask: u32,
    /// Only stored by the producer
    write: AtomicU32,
    /// Only stored by the consumer
    read: AtomicU32,
}

// Access to `storage` is partitioned between exactly one producer and one
// consumer by the cursors.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    fn capacity(&self) -> usize {
        self.mask as usize + 1
    }

    fn data(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    /// # Safety
    /// `range` must lie in storage owned by the caller's side of the ring.
    unsafe fn copy_in(&self, range: Range<usize>, src: &[u8]) {
        debug_assert_eq!(range.len(), src.len());
        ptr::copy_nonoverlapping(src.as_ptr(), self.data().add(range.start), src.len());
    }

    /// # Safety
    /// `range` must lie in storage owned by the caller's side of the ring.
    unsafe fn copy_out(&self, range: Range<usize>, dst: &mut [u8]) {
        debug_assert_eq!(range.len(), dst.len());
        ptr::copy_nonoverlapping(self.data().add(range.start), dst.as_mut_ptr(), dst.len());
    }
}

fn into_cells(storage: Box<[u8]>) -> Box<[UnsafeCell<u8>]> {
    // Safety: UnsafeCell<u8> is repr(transparent) over u8
    unsafe { Box::from_raw(Box::into_raw(storage) as *mut [UnsafeCell<u8>]) }
}

fn from_cells(storage: Box<[UnsafeCell<u8>]>) -> Box<[u8]> {
    // Safety: UnsafeCell<u8> is repr(transparent) over u8
    unsafe { Box::from_raw(Box::into_raw(storage) as *mut [u8]) }
}

/// Writing half of a split ring buffer
pub struct Producer {
    shared: Arc<Shared>,
}

/// Reading half of a split ring buffer
pub struct Consumer {
    shared: Arc<Shared>,
}

/// Returned by [`Producer::reunite`] when the halves come from different rings
#[derive(Error, Debug)]
#[error("producer and consumer belong to different ring buffers")]
pub struct ReuniteError(pub Producer, pub Consumer);

impl OwnedRingBuffer {
    /// Split into a producer and a consumer that may live on different threads
    ///
    /// Buffered bytes and cursor positions carry over unchanged.
    pub fn split(self) -> (Producer, Consumer) {
        let capacity = self.capacity();
        let (storage, write, read) = self.into_parts();
        trace!(capacity, write, read, "splitting ring buffer");

        let shared = Arc::new(Shared {
            storage: into_cells(storage),
            mask: (capacity - 1) as u32,
            write: AtomicU32::new(write),
            read: AtomicU32::new(read),
        });

        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }
}

impl Producer {
    /// Copy as much of `src` as currently fits; returns the count enqueued
    pub fn put(&mut self, src: &[u8]) -> usize {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);

        let free = (shared.mask + 1) - write.wrapping_sub(read);
        let len = clamp_len(src.len(), free) as usize;
        let (head, tail) = segments(write & shared.mask, len, shared.capacity());
        let split = head.len();

        // Safety: [write, read + capacity) is free space, which the consumer
        // does not touch until `write` is published below.
        unsafe {
            shared.copy_in(head, &src[..split]);
            shared.copy_in(tail, &src[split..len]);
        }

        shared
            .write
            .store(write.wrapping_add(len as u32), Ordering::Release);
        len
    }

    /// Bytes the consumer has not read yet, as seen from this side
    pub fn len(&self) -> usize {
        let write = self.shared.write.load(Ordering::Relaxed);
        let read = self.shared.read.load(Ordering::Acquire);
        write.wrapping_sub(read) as usize
    }

    /// True when the consumer has caught up with everything written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes a `put` can accept right now
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Number of bytes the ring can hold
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Join the two halves back into one ring buffer
    ///
    /// Fails, returning both halves untouched, if they were not produced by
    /// the same [`OwnedRingBuffer::split`] call.
    pub fn reunite(self, consumer: Consumer) -> Result<OwnedRingBuffer, ReuniteError> {
        if !Arc::ptr_eq(&self.shared, &consumer.shared) {
            return Err(ReuniteError(self, consumer));
        }
        drop(consumer);

        let Some(shared) = Arc::into_inner(self.shared) else {
            unreachable!("producer and consumer are the only owners of the ring");
        };
        let Shared {
            storage,
            mask,
            write,
            read,
        } = shared;
        let (write, read) = (write.into_inner(), read.into_inner());
        trace!(capacity = mask as usize + 1, write, read, "reuniting ring buffer");

        Ok(OwnedRingBuffer::from_raw_parts(
            from_cells(storage),
            mask as usize + 1,
            write,
            read,
        ))
    }
}

impl Consumer {
    fn peek_from(&self, read: u32, dst: &mut [u8]) -> usize {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Acquire);

        let len = clamp_len(dst.len(), write.wrapping_sub(read)) as usize;
        let (head, tail) = segments(read & shared.mask, len, shared.capacity());
        let split = head.len();

        // Safety: [read, write) was published by the producer, which will not
        // overwrite it until `read` moves past it.
        unsafe {
            shared.copy_out(head, &mut dst[..split]);
            shared.copy_out(tail, &mut dst[split..len]);
        }
        len
    }

    /// Copy up to `dst.len()` bytes without consuming them
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        self.peek_from(read, dst)
    }

    /// Copy up to `dst.len()` bytes and hand their space back to the producer
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        let len = self.peek_from(read, dst);
        self.shared
            .read
            .store(read.wrapping_add(len as u32), Ordering::Release);
        len
    }

    /// Discard up to `len` bytes; returns the count discarded
    pub fn skip(&mut self, len: usize) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        let len = clamp_len(len, write.wrapping_sub(read));
        self.shared
            .read
            .store(read.wrapping_add(len), Ordering::Release);
        len as usize
    }

    /// Bytes available to read
    pub fn len(&self) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        write.wrapping_sub(read) as usize
    }

    /// True when nothing is available to read
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes the ring can hold
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("write", &self.shared.write)
            .finish()
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("read", &self.shared.read)
            .finish()
    }
}

impl io::Write for Producer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.put(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Consumer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.get(buf))
    }
}
