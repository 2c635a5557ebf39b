use crate::core::traits::allocator::{AllocationError, Allocator};
use crate::native::allocator::SystemAllocator;

/// Refuses every `fail_every`-th request and serves the rest from the
/// system allocator.
#[derive(Clone, Debug)]
pub struct FlakyAllocator {
    fail_every: u64,
    calls: u64,
    failures: u64,
}

impl FlakyAllocator {
    pub fn failing_every(fail_every: u64) -> Self {
        Self {
            fail_every,
            calls: 0,
            failures: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl Allocator for FlakyAllocator {
    fn reserve(&mut self, bytes: usize) -> Result<Vec<u8>, AllocationError> {
        self.calls += 1;
        if self.fail_every > 0 && self.calls % self.fail_every == 0 {
            self.failures += 1;
            tracing::debug!("Refusing allocation #{} of {} bytes", self.calls, bytes);
            return Err(AllocationError::Refused {
                bytes: bytes as u64,
            });
        }
        SystemAllocator.reserve(bytes)
    }
}
