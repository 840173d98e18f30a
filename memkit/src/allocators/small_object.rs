/*!
 * Small-Object Allocator
 * Size-class routing over four fixed-size block pools
 */

use crate::allocators::{Allocator, BlockAllocator};
use crate::core::error::{fatal, AllocatorError};
use crate::core::math::POINTER_SIZE;
use log::info;
use std::cmp;
use std::ptr::NonNull;

/// Number of size classes.
pub const LEVEL_COUNT: usize = 4;

/// Block size of size class `level`: `2P, 4P, 8P, 16P` for levels `0..4`.
#[inline]
const fn level_block_size(level: usize) -> usize {
    POINTER_SIZE << (level + 1)
}

/// An allocator for objects up to sixteen pointers in size.
///
/// Requests round up to the next power of two (at least two pointers) and
/// route to one of four block allocators with geometrically doubling block
/// sizes. Size-class routing avoids the internal fragmentation of a single
/// large pool while keeping the per-pointer overhead amortised.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct SmallObjectAllocator<'a> {
    levels: [BlockAllocator<'a>; LEVEL_COUNT],
}

impl<'a> SmallObjectAllocator<'a> {
    /// Create an allocator whose four pools each span `buffer_size` bytes
    /// from the host heap. `buffer_size` must be a power of two no smaller
    /// than the largest size class.
    pub fn new(buffer_size: usize) -> Self {
        Self::build(None, buffer_size)
    }

    /// As [`new`](Self::new) with every pool's buffer on loan from
    /// `parent`. The parent must outlive this allocator.
    pub fn with_parent(parent: &'a dyn Allocator, buffer_size: usize) -> Self {
        Self::build(Some(parent), buffer_size)
    }

    fn build(parent: Option<&'a dyn Allocator>, buffer_size: usize) -> Self {
        assert!(
            buffer_size.is_power_of_two(),
            "buffer size must be a power of two"
        );
        assert!(
            buffer_size >= level_block_size(LEVEL_COUNT - 1),
            "buffer must hold at least one block of the largest size class"
        );

        let levels = std::array::from_fn(|level| {
            let block_size = level_block_size(level);
            match parent {
                Some(parent) => {
                    BlockAllocator::with_parent(parent, block_size, buffer_size / block_size)
                }
                None => BlockAllocator::new(block_size, buffer_size / block_size),
            }
        });

        info!(
            "small-object allocator created: 4 pools of {} bytes each",
            buffer_size
        );
        Self { levels }
    }

    /// Whether `pointer` lies inside any of the size-class pools.
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.levels.iter().any(|level| level.contains(pointer))
    }

    /// The size class owning `pointer`, if any. Diagnostic.
    pub fn level_of(&self, pointer: NonNull<u8>) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(pointer))
    }

    /// Free blocks remaining in size class `level`.
    pub fn free_blocks(&self, level: usize) -> usize {
        self.levels[level].free_blocks()
    }

    /// Whether a request of `size` bytes would currently succeed.
    pub fn can_allocate(&self, size: usize) -> bool {
        match self.route(size) {
            Some(level) => self.levels[level].free_blocks() > 0,
            None => false,
        }
    }

    /// Allocations handed out and not yet deallocated, across all classes.
    pub fn outstanding_allocations(&self) -> usize {
        self.levels.iter().map(|level| level.allocated_blocks()).sum()
    }

    /// The size class serving `size`-byte requests, or `None` when the
    /// rounded size exceeds the largest class.
    fn route(&self, size: usize) -> Option<usize> {
        let rounded = cmp::max(size.next_power_of_two(), level_block_size(0));
        (0..LEVEL_COUNT).find(|&level| level_block_size(level) == rounded)
    }
}

impl Allocator for SmallObjectAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        match self.route(size) {
            Some(level) => self.levels[level].allocate(size),
            None => fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.max_allocation_size(),
            }),
        }
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        match self.level_of(pointer) {
            Some(level) => self.levels[level].deallocate(pointer),
            None => fatal(AllocatorError::ForeignPointer {
                pointer: pointer.as_ptr() as usize,
            }),
        }
    }

    fn max_allocation_size(&self) -> usize {
        level_block_size(LEVEL_COUNT - 1)
    }
}
