//! Error types for ring buffer construction and cursor manipulation.
//!
//! Data transfer never fails: `put`, `get`, `peek` and `skip` clamp to what is
//! available and report the count actually moved.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::{MAX_CAPACITY, MIN_CAPACITY};

/// Errors raised while building a ring buffer or forcing its cursors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FifoError {
    /// Storage (or requested capacity) is below [`MIN_CAPACITY`]
    #[error("storage length {len} is below the minimum capacity of {}", MIN_CAPACITY)]
    TooSmall {
        /// Length that was supplied
        len: usize,
    },

    /// Attached storage length is not a power of two
    #[error("storage length {len} is not a power of two")]
    NotPowerOfTwo {
        /// Length that was supplied
        len: usize,
    },

    /// Storage (or requested capacity) is above [`MAX_CAPACITY`]
    #[error("length {len} exceeds the maximum capacity of {}", MAX_CAPACITY)]
    TooLarge {
        /// Length that was supplied or requested
        len: usize,
    },

    /// Backing storage could not be obtained from the allocator
    #[error("failed to allocate {capacity} bytes of ring storage")]
    Allocation {
        /// Rounded capacity that was being allocated
        capacity: usize,
        /// Allocator failure
        #[source]
        source: TryReserveError,
    },

    /// Forced cursors would hold more bytes than the ring can store
    #[error("cursors write={write} read={read} exceed capacity {capacity}")]
    CursorsOutOfRange {
        /// Requested write cursor
        write: u32,
        /// Requested read cursor
        read: u32,
        /// Capacity of the ring
        capacity: usize,
    },
}

/// Result alias for fallible ring buffer operations
pub type FifoResult<T> = Result<T, FifoError>;
