//! Small-object arena for short-lived preloader buffers.
//!
//! The original arena hands back a raw pointer prefixed by a 2-byte
//! block-index tag so `Free(ptr, size)` can dispatch without a side table. A
//! safe Rust port can't expose that pointer directly, so
//! [`alloc`](BlockAllocator::alloc) returns an opaque [`BlockHandle`] that
//! carries the same dispatch information privately instead.

const BLOCK_SIZE: usize = 16 * 1024;
const DEFAULT_BLOCK_COUNT: usize = 8;

struct Block {
    buf: Vec<u8>,
    low: usize,
    high: usize,
    live: u32,
}

impl Block {
    fn new() -> Self {
        Self {
            buf: vec![0u8; BLOCK_SIZE],
            low: 0,
            high: BLOCK_SIZE,
            live: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.high - self.low
    }

    fn reset(&mut self) {
        self.low = 0;
        self.high = BLOCK_SIZE;
    }
}

enum Location {
    Heap(Vec<u8>),
    Block {
        block_index: u16,
        offset: usize,
        from_high: bool,
        len: usize,
    },
}

/// A short-lived buffer handed out by [`BlockAllocator::alloc`]. Must be
/// returned to the same allocator via [`BlockAllocator::free`].
pub struct BlockHandle {
    location: Location,
}

impl BlockHandle {
    /// Read-only view of the allocated bytes.
    #[must_use]
    pub fn as_slice<'a>(&'a self, allocator: &'a BlockAllocator) -> &'a [u8] {
        match &self.location {
            Location::Heap(buf) => buf,
            Location::Block {
                block_index,
                offset,
                from_high,
                len,
            } => {
                let block = &allocator.blocks[*block_index as usize]
                    .as_ref()
                    .expect("handle outlived its block");
                let start = if *from_high { *offset - *len } else { *offset };
                &block.buf[start..start + len]
            }
        }
    }

    /// Mutable view of the allocated bytes, for filling the buffer after
    /// allocation.
    pub fn as_mut_slice<'a>(&'a mut self, allocator: &'a mut BlockAllocator) -> &'a mut [u8] {
        match &mut self.location {
            Location::Heap(buf) => buf,
            Location::Block {
                block_index,
                offset,
                from_high,
                len,
            } => {
                let block = allocator.blocks[*block_index as usize]
                    .as_mut()
                    .expect("handle outlived its block");
                let start = if *from_high { *offset - *len } else { *offset };
                &mut block.buf[start..start + *len]
            }
        }
    }

    /// Length in bytes of this allocation.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.location {
            Location::Heap(buf) => buf.len(),
            Location::Block { len, .. } => *len,
        }
    }

    /// Whether this allocation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bump-allocates fixed-size blocks from both ends; oversize requests fall
/// back to the heap.
pub struct BlockAllocator {
    blocks: Vec<Option<Block>>,
    max_blocks: usize,
    next_from_high: bool,
}

impl BlockAllocator {
    /// Build an allocator with `max_blocks` 16-KB blocks available,
    /// block 0 preallocated and permanent.
    #[must_use]
    pub fn new(max_blocks: usize) -> Self {
        let max_blocks = max_blocks.max(1);
        let mut blocks = Vec::with_capacity(max_blocks);
        blocks.push(Some(Block::new()));
        for _ in 1..max_blocks {
            blocks.push(None);
        }
        Self {
            blocks,
            max_blocks,
            next_from_high: false,
        }
    }

    /// Default-sized allocator (8 blocks).
    #[must_use]
    pub fn default_sized() -> Self {
        Self::new(DEFAULT_BLOCK_COUNT)
    }

    /// Allocate `size` bytes. Requests over half a block's size go
    /// straight to the heap.
    pub fn alloc(&mut self, size: usize) -> BlockHandle {
        if size == 0 {
            return BlockHandle {
                location: Location::Heap(Vec::new()),
            };
        }
        if size > BLOCK_SIZE / 2 {
            return BlockHandle {
                location: Location::Heap(vec![0u8; size]),
            };
        }

        if let Some(handle) = self.try_alloc_in_existing(size) {
            return handle;
        }

        if let Some(index) = self.blocks.iter().position(Option::is_none) {
            if index < self.max_blocks {
                self.blocks[index] = Some(Block::new());
                if let Some(handle) = self.alloc_from_block(index, size) {
                    return handle;
                }
            }
        }

        BlockHandle {
            location: Location::Heap(vec![0u8; size]),
        }
    }

    fn try_alloc_in_existing(&mut self, size: usize) -> Option<BlockHandle> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.as_ref().is_some_and(|b| b.remaining() >= size))?;
        self.alloc_from_block(index, size)
    }

    fn alloc_from_block(&mut self, index: usize, size: usize) -> Option<BlockHandle> {
        let block = self.blocks[index].as_mut()?;
        if block.remaining() < size {
            return None;
        }
        self.next_from_high = !self.next_from_high;
        let (offset, from_high) = if self.next_from_high {
            block.high -= size;
            (block.high, true)
        } else {
            let start = block.low;
            block.low += size;
            (start, false)
        };
        block.live += 1;
        Some(BlockHandle {
            location: Location::Block {
                block_index: index as u16,
                offset: if from_high { offset + size } else { offset },
                from_high,
                len: size,
            },
        })
    }

    /// Release a previously allocated handle. A block whose live allocation
    /// count reaches zero is reclaimed for reuse (block 0 is permanent: it
    /// is reset in place rather than dropped).
    pub fn free(&mut self, handle: BlockHandle) {
        let Location::Block { block_index, .. } = handle.location else {
            return;
        };
        let index = block_index as usize;
        let Some(block) = self.blocks[index].as_mut() else {
            return;
        };
        block.live = block.live.saturating_sub(1);
        if block.live == 0 {
            if index == 0 {
                block.reset();
            } else {
                self.blocks[index] = None;
            }
        }
    }

    /// Number of currently live (non-freed, non-permanent-empty) blocks.
    #[must_use]
    pub fn live_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_allocation_comes_from_block_zero() {
        let mut allocator = BlockAllocator::default_sized();
        let handle = allocator.alloc(128);
        assert_eq!(handle.len(), 128);
        assert_eq!(allocator.live_block_count(), 1);
    }

    #[test]
    fn oversize_allocation_falls_back_to_heap() {
        let mut allocator = BlockAllocator::default_sized();
        let handle = allocator.alloc(BLOCK_SIZE);
        assert_eq!(handle.len(), BLOCK_SIZE);
        assert_eq!(allocator.live_block_count(), 1);
    }

    #[test]
    fn freeing_last_allocation_releases_non_permanent_block() {
        let mut allocator = BlockAllocator::new(2);
        let a = allocator.alloc(BLOCK_SIZE / 2);
        let b = allocator.alloc(BLOCK_SIZE / 2);
        let c = allocator.alloc(BLOCK_SIZE / 2);
        assert_eq!(allocator.live_block_count(), 2, "third alloc needs a second block");
        allocator.free(c);
        assert_eq!(allocator.live_block_count(), 1, "emptied block 1 is released");
        allocator.free(a);
        allocator.free(b);
        assert_eq!(allocator.live_block_count(), 1, "block 0 is permanent");
    }

    #[test]
    fn read_and_write_round_trip() {
        let mut allocator = BlockAllocator::default_sized();
        let mut handle = allocator.alloc(8);
        handle.as_mut_slice(&mut allocator).copy_from_slice(b"abcdefgh");
        assert_eq!(handle.as_slice(&allocator), b"abcdefgh");
    }
}
