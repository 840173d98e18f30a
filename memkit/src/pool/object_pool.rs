/*!
 * Object Pools
 * Pre-sized pools handing out owned objects of one type
 */

use crate::allocators::{Allocator, BlockAllocator, ListNode, PagedBlockAllocator};
use crate::core::math::{align_up, POINTER_SIZE};
use crate::scoped::Unique;
use std::cmp;
use std::marker::PhantomData;
use std::mem;

/// Block size able to hold one `T` and, while free, the free-list node.
fn block_size_for<T>() -> usize {
    assert!(
        mem::align_of::<T>() <= POINTER_SIZE,
        "over-aligned types are not supported"
    );

    cmp::max(
        align_up(mem::size_of::<T>(), POINTER_SIZE),
        mem::size_of::<ListNode>(),
    )
}

/// A fixed-capacity pool of `T` objects over one contiguous block buffer.
///
/// The pool can be backed by any allocator. Objects come out as
/// [`Unique`] handles whose drop returns the slot to the pool.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct ObjectPool<'a, T> {
    blocks: BlockAllocator<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T> ObjectPool<'a, T> {
    /// Create a pool with room for `capacity` objects, backed by the host
    /// heap.
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: BlockAllocator::new(block_size_for::<T>(), capacity),
            _marker: PhantomData,
        }
    }

    /// As [`new`](Self::new) with the buffer on loan from `parent`. The
    /// parent must outlive this pool.
    pub fn with_parent(parent: &'a dyn Allocator, capacity: usize) -> Self {
        Self {
            blocks: BlockAllocator::with_parent(parent, block_size_for::<T>(), capacity),
            _marker: PhantomData,
        }
    }

    /// Move `value` into a free slot. Aborts when the pool is full.
    pub fn create(&self, value: T) -> Unique<'_, T> {
        Unique::new_in(&self.blocks, value)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.block_count()
    }

    #[inline]
    pub fn free_objects(&self) -> usize {
        self.blocks.free_blocks()
    }
}

/// An object pool that grows by whole pages instead of running out.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct PagedObjectPool<'a, T> {
    blocks: PagedBlockAllocator<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T> PagedObjectPool<'a, T> {
    /// Create a pool growing in pages of `objects_per_page` slots, backed
    /// by the host heap.
    pub fn new(objects_per_page: usize) -> Self {
        Self {
            blocks: PagedBlockAllocator::new(block_size_for::<T>(), objects_per_page),
            _marker: PhantomData,
        }
    }

    /// As [`new`](Self::new) with every page on loan from `parent`. The
    /// parent must outlive this pool.
    pub fn with_parent(parent: &'a dyn Allocator, objects_per_page: usize) -> Self {
        Self {
            blocks: PagedBlockAllocator::with_parent(
                parent,
                block_size_for::<T>(),
                objects_per_page,
            ),
            _marker: PhantomData,
        }
    }

    /// Move `value` into a free slot, growing a page when every slot is
    /// taken.
    pub fn create(&self, value: T) -> Unique<'_, T> {
        Unique::new_in(&self.blocks, value)
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.blocks.page_count()
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.blocks.allocated_blocks()
    }
}
