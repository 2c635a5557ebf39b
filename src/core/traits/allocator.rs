use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("could not reserve {bytes} bytes: {source}")]
    Reserve {
        bytes: u64,
        #[source]
        source: TryReserveError,
    },
    #[error("block of {bytes} bytes does not fit in the address space")]
    TooLarge { bytes: u64 },
    #[error("allocator refused {bytes} bytes")]
    Refused { bytes: u64 },
}

/// Source of raw buffers for a [`BlockArena`](crate::core::arena::BlockArena).
///
/// Implementations only reserve; committing pages (touching every byte) is
/// the arena's job.
#[cfg_attr(test, mockall::automock)]
pub trait Allocator: std::fmt::Debug + Send {
    /// Returns an empty buffer with capacity for at least `bytes` bytes.
    fn reserve(&mut self, bytes: usize) -> Result<Vec<u8>, AllocationError>;
}
