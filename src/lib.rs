//! # bfifo - Byte FIFO with masked cursors
//!
//! A fixed-capacity circular byte buffer for moving a stream of bytes from a
//! writer to a reader without reallocating.
//!
//! ## Design
//!
//! - Capacity is a power of two, so a cursor maps to a storage offset with
//!   `cursor & (capacity - 1)`
//! - Read and write cursors are `u32` values that only grow and wrap around
//!   the full integer range; `write - read` is the number of buffered bytes
//! - Transfers never block or fail: `put`, `get`, `peek` and `skip` clamp to
//!   what is available and return the count actually moved
//! - Storage is either allocated and owned (`with_capacity`) or borrowed from
//!   the caller (`attach`); the storage type decides who frees it
//! - An owned ring can be `split` into a `Producer` and a `Consumer` for
//!   lock-free single-producer, single-consumer use across threads
//!
//! ## Example
//!
//! ```
//! use bfifo::OwnedRingBuffer;
//!
//! // A request of 100 bytes is rounded up to 128
//! let mut rb = OwnedRingBuffer::with_capacity(100).unwrap();
//! assert_eq!(rb.capacity(), 128);
//!
//! let data = [7u8; 200];
//! assert_eq!(rb.put(&data), 128); // truncated to the free space
//!
//! let mut out = [0u8; 64];
//! assert_eq!(rb.get(&mut out), 64);
//! assert_eq!(rb.len(), 64);
//!
//! rb.free();
//! ```
//!
//! Attaching to caller storage:
//!
//! ```
//! use bfifo::RingBuffer;
//!
//! let mut storage = [0u8; 16];
//! let mut rb = RingBuffer::attach(&mut storage[..]).unwrap();
//! rb.put(b"abc");
//! let storage = rb.into_inner(); // never freed by the ring
//! assert_eq!(&storage[..3], b"abc");
//! ```

#![warn(missing_docs)]

mod error;
mod ring_buffer;
mod spsc;

pub use error::{FifoError, FifoResult};
pub use ring_buffer::{BorrowedRingBuffer, OwnedRingBuffer, RingBuffer};
pub use spsc::{Consumer, Producer, ReuniteError};

/// Smallest capacity a ring buffer can have
pub const MIN_CAPACITY: usize = 2;

/// Largest capacity a ring buffer can have, so that a full ring's
/// `write - read` still fits in a `u32` cursor
pub const MAX_CAPACITY: usize = 1 << 31;
