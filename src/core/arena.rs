use std::hint::black_box;

use crate::constants::{FILL_BYTE, KIB};
use crate::core::traits::allocator::{AllocationError, Allocator};

/// One committed allocation. Every byte has been written with
/// [`FILL_BYTE`], so its pages are resident rather than merely reserved.
#[derive(Debug)]
pub struct MemoryBlock {
    buf: Vec<u8>,
}

impl MemoryBlock {
    fn commit(mut buf: Vec<u8>, bytes: usize) -> Self {
        buf.clear();
        buf.resize(bytes, FILL_BYTE);
        Self { buf }
    }

    pub fn len_bytes(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn size_kb(&self) -> u64 {
        self.len_bytes() / KIB
    }

    pub fn is_touched(&self) -> bool {
        self.buf.iter().all(|b| *b == FILL_BYTE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHandle {
    pub index: usize,
    pub bytes: u64,
}

/// LIFO stack of committed blocks owned by a single worker.
///
/// `total_bytes` and `total_kb` always equal the sums of [`MemoryBlock::len_bytes`]
/// and [`MemoryBlock::size_kb`] over the live blocks. A block that is not a
/// whole number of KB counts its whole KB only.
#[derive(Debug)]
pub struct BlockArena<A> {
    allocator: A,
    blocks: Vec<MemoryBlock>,
    total_bytes: u64,
    total_kb: u64,
}

impl<A: Allocator> BlockArena<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            blocks: Vec::new(),
            total_bytes: 0,
            total_kb: 0,
        }
    }

    /// Reserves `bytes`, touches all of them and pushes the block.
    pub fn allocate(&mut self, bytes: u64) -> Result<BlockHandle, AllocationError> {
        let block = self.commit(bytes)?;
        self.total_bytes += block.len_bytes();
        self.total_kb += block.size_kb();
        self.blocks.push(block);

        Ok(BlockHandle {
            index: self.blocks.len() - 1,
            bytes,
        })
    }

    pub fn allocate_kb(&mut self, size_kb: u64) -> Result<BlockHandle, AllocationError> {
        self.allocate(size_kb.saturating_mul(KIB))
    }

    /// Removes the most recent block, handing it to the caller.
    pub fn pop_block(&mut self) -> Option<MemoryBlock> {
        let block = self.blocks.pop()?;
        self.total_bytes -= block.len_bytes();
        self.total_kb -= block.size_kb();
        Some(block)
    }

    /// Releases the most recent block and returns its size in KB, or 0 when
    /// the arena is empty.
    pub fn free_last(&mut self) -> u64 {
        self.pop_block().map_or(0, |block| block.size_kb())
    }

    /// Commits `bytes` and releases them again without touching the stack.
    pub fn probe(&mut self, bytes: u64) -> Result<(), AllocationError> {
        let block = self.commit(bytes)?;
        black_box(&block);
        Ok(())
    }

    pub fn total_kb(&self) -> u64 {
        self.total_kb
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block_kb(&self) -> Option<u64> {
        self.blocks.last().map(MemoryBlock::size_kb)
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    fn commit(&mut self, bytes: u64) -> Result<MemoryBlock, AllocationError> {
        let len = usize::try_from(bytes).map_err(|_| AllocationError::TooLarge { bytes })?;
        let buf = self.allocator.reserve(len)?;
        Ok(MemoryBlock::commit(buf, len))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::core::traits::allocator::MockAllocator;
    use crate::native::allocator::SystemAllocator;

    fn accepting_allocator() -> MockAllocator {
        let mut allocator = MockAllocator::new();
        allocator
            .expect_reserve()
            .returning(|bytes| Ok(Vec::with_capacity(bytes)));
        allocator
    }

    fn live_bytes<A: Allocator>(arena: &BlockArena<A>) -> u64 {
        arena.blocks().iter().map(MemoryBlock::len_bytes).sum()
    }

    fn live_kb<A: Allocator>(arena: &BlockArena<A>) -> u64 {
        arena.blocks().iter().map(MemoryBlock::size_kb).sum()
    }

    #[test]
    fn test_allocate_touches_every_byte() {
        let mut arena = BlockArena::new(accepting_allocator());

        let handle = arena.allocate_kb(64).unwrap();

        assert_eq!(handle, BlockHandle { index: 0, bytes: 64 * KIB });
        assert_eq!(arena.total_kb(), 64);
        assert!(arena.blocks()[0].is_touched());
    }

    #[test]
    fn test_free_last_is_lifo() {
        let mut arena = BlockArena::new(accepting_allocator());
        arena.allocate_kb(4).unwrap();
        arena.allocate_kb(8).unwrap();
        arena.allocate_kb(16).unwrap();

        assert_eq!(arena.free_last(), 16);
        assert_eq!(arena.last_block_kb(), Some(8));
        assert_eq!(arena.total_kb(), 12);
    }

    #[test]
    fn test_partial_kb_blocks_count_whole_kb_only() {
        let mut arena = BlockArena::new(accepting_allocator());
        for _ in 0..3 {
            arena.allocate(1500).unwrap();
        }

        assert_eq!(arena.total_bytes(), 4500);
        assert_eq!(arena.total_kb(), 3);
        assert_eq!(arena.free_last(), 1);
        assert_eq!(arena.total_kb(), 2);
    }

    #[test]
    fn test_free_last_on_empty_arena_is_noop() {
        let mut arena = BlockArena::new(accepting_allocator());

        assert_eq!(arena.free_last(), 0);
        assert!(arena.is_empty());
        assert_eq!(arena.total_kb(), 0);
    }

    #[test]
    fn test_failed_allocation_leaves_arena_untouched() {
        let mut allocator = MockAllocator::new();
        allocator
            .expect_reserve()
            .times(1)
            .returning(|bytes| Err(AllocationError::Refused { bytes: bytes as u64 }));
        let mut arena = BlockArena::new(allocator);

        let err = arena.allocate_kb(1).unwrap_err();

        assert_eq!(err, AllocationError::Refused { bytes: KIB });
        assert!(arena.is_empty());
        assert_eq!(arena.total_bytes(), 0);
    }

    #[test]
    fn test_probe_does_not_retain_memory() {
        let mut allocator = MockAllocator::new();
        allocator
            .expect_reserve()
            .withf(|bytes| *bytes == 2048)
            .times(1)
            .returning(|bytes| Ok(Vec::with_capacity(bytes)));
        let mut arena = BlockArena::new(allocator);

        arena.probe(2048).unwrap();

        assert!(arena.is_empty());
        assert_eq!(arena.total_bytes(), 0);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Allocate(u64),
        Free,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..16_384).prop_map(Op::Allocate),
            Just(Op::Free),
        ]
    }

    proptest! {
        #[test]
        fn total_matches_live_blocks(ops in proptest::collection::vec(arb_op(), 0..64)) {
            let mut arena = BlockArena::new(SystemAllocator);

            for op in ops {
                match op {
                    Op::Allocate(bytes) => {
                        arena.allocate(bytes).unwrap();
                    }
                    Op::Free => {
                        arena.free_last();
                    }
                }
                prop_assert_eq!(arena.total_bytes(), live_bytes(&arena));
                prop_assert_eq!(arena.total_kb(), live_kb(&arena));
            }
        }

        #[test]
        fn freed_kb_matches_drop_in_total(sizes in proptest::collection::vec(1u64..10_000, 1..32)) {
            let mut arena = BlockArena::new(SystemAllocator);
            for bytes in &sizes {
                arena.allocate(*bytes).unwrap();
                prop_assert_eq!(arena.total_kb(), live_kb(&arena));
            }

            while !arena.is_empty() {
                let before = arena.total_kb();
                let freed = arena.free_last();
                prop_assert_eq!(before - arena.total_kb(), freed);
                prop_assert_eq!(arena.total_kb(), live_kb(&arena));
            }
            prop_assert_eq!(arena.total_kb(), 0);
            prop_assert_eq!(arena.total_bytes(), 0);
        }

        #[test]
        fn kb_aligned_total_matches_block_sizes(sizes in proptest::collection::vec(0u64..64, 0..32), frees in 0usize..32) {
            let mut arena = BlockArena::new(SystemAllocator);
            for size in &sizes {
                arena.allocate_kb(*size).unwrap();
            }
            for _ in 0..frees {
                arena.free_last();
            }

            let expected: u64 = arena.blocks().iter().map(MemoryBlock::size_kb).sum();
            prop_assert_eq!(arena.total_kb(), expected);
            prop_assert_eq!(arena.len(), sizes.len().saturating_sub(frees));
        }
    }
}
