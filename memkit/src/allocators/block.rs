/*!
 * Block Allocator
 * Fixed-size blocks served from an in-place doubly-linked free list
 */

use crate::allocators::free_list::{FreeList, ListNode};
use crate::allocators::{Allocator, Region};
use crate::core::error::{fatal, AllocatorError};
use crate::core::math::{is_aligned, POINTER_SIZE};
use log::info;
use std::cell::Cell;
use std::mem;
use std::ptr::NonNull;

/// An allocator serving equal-sized blocks out of one fixed buffer.
///
/// Free blocks form an intrusive doubly-linked list: each free block's first
/// bytes hold its prev/next pair, so bookkeeping costs no extra memory.
/// Allocation unlinks the head and deallocation links at the head, both in
/// constant time.
/// There are no block-to-block locality guarantees; callers needing locality
/// should parent this allocator with a linear allocator.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct BlockAllocator<'a> {
    block_size: usize,
    block_count: usize,
    region: Region<'a>,
    free_list: FreeList,
    allocated: Cell<usize>,
}

impl<'a> BlockAllocator<'a> {
    /// Create an allocator with `block_count` blocks of `block_size` bytes,
    /// backed by the host heap. `block_size` must be a multiple of the
    /// pointer size and large enough to hold the free-list node.
    pub fn new(block_size: usize, block_count: usize) -> Self {
        Self::build(None, block_size, block_count)
    }

    /// As [`new`](Self::new) with the buffer on loan from `parent`.
    pub fn with_parent(parent: &'a dyn Allocator, block_size: usize, block_count: usize) -> Self {
        Self::build(Some(parent), block_size, block_count)
    }

    fn build(parent: Option<&'a dyn Allocator>, block_size: usize, block_count: usize) -> Self {
        assert!(
            is_aligned(block_size, POINTER_SIZE),
            "block size must be a multiple of the pointer size"
        );
        assert!(
            block_size >= mem::size_of::<ListNode>(),
            "block size must hold the free-list node"
        );
        assert!(block_count > 0, "a block allocator needs at least one block");

        let allocator = Self {
            block_size,
            block_count,
            region: Region::acquire(parent, block_size * block_count),
            free_list: FreeList::new(),
            allocated: Cell::new(0),
        };
        allocator.init_free_list();

        info!(
            "block allocator created: {} blocks of {} bytes",
            block_count, block_size
        );
        allocator
    }

    /// Walk the buffer linking every block into the free list, first block
    /// at the head.
    fn init_free_list(&self) {
        let base = self.region.base().as_ptr();

        // Pushed in reverse so the head ends up at the buffer start with the
        // next pointers running forward through the buffer.
        for index in (0..self.block_count).rev() {
            // Every block is in bounds and pointer-aligned by construction.
            unsafe {
                let block = NonNull::new_unchecked(base.add(index * self.block_size));
                self.free_list.push(block);
            }
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.block_count - self.allocated.get()
    }

    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.allocated.get()
    }

    /// Whether `pointer` lies inside this allocator's buffer.
    #[inline]
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.region.contains(pointer)
    }
}

impl Allocator for BlockAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        if size > self.block_size {
            fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.block_size,
            });
        }

        let block = match self.free_list.pop() {
            Some(block) => block,
            None => fatal(AllocatorError::OutOfCapacity {
                requested: size,
                available: 0,
            }),
        };

        self.allocated.set(self.allocated.get() + 1);
        block
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        if !self.contains(pointer) {
            fatal(AllocatorError::ForeignPointer {
                pointer: pointer.as_ptr() as usize,
            });
        }

        let allocated = self.allocated.get();
        if allocated == 0 {
            fatal(AllocatorError::DeallocateUnderflow);
        }

        self.free_list.push(pointer);
        self.allocated.set(allocated - 1);
    }

    fn max_allocation_size(&self) -> usize {
        self.block_size
    }
}

impl Drop for BlockAllocator<'_> {
    fn drop(&mut self) {
        let allocated = self.allocated.get();
        if allocated != 0 && !std::thread::panicking() {
            fatal(AllocatorError::OutstandingAllocations { count: allocated });
        }
    }
}
