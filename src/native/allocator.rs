use crate::core::traits::allocator::{AllocationError, Allocator};

/// Reserves straight from the global allocator. Exhaustion is reported as
/// an error instead of aborting the process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn reserve(&mut self, bytes: usize) -> Result<Vec<u8>, AllocationError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes)
            .map_err(|source| AllocationError::Reserve {
                bytes: bytes as u64,
                source,
            })?;
        Ok(buf)
    }
}
