/*!
 * Linear Allocator
 * Bump allocation within one fixed buffer with bulk reset
 */

use crate::allocators::{Allocator, Region};
use crate::core::error::{fatal, AllocatorError};
use crate::core::math::{align_down, align_up, POINTER_SIZE};
use log::{debug, info};
use std::cell::Cell;
use std::ptr::NonNull;

/// A bump allocator over a single fixed buffer.
///
/// Allocation advances a pointer and re-aligns it to the machine pointer
/// size; nothing else is tracked per allocation. Individual deallocation
/// only decrements an outstanding count. The bytes become reusable in bulk
/// when [`reset`](Self::reset) is called at a phase boundary, and the count
/// catches stale references at that point.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct LinearAllocator<'a> {
    region: Region<'a>,
    next_offset: Cell<usize>,
    outstanding: Cell<usize>,
}

impl<'a> LinearAllocator<'a> {
    /// Create an allocator with a buffer of `page_size` bytes from the host
    /// heap.
    pub fn new(page_size: usize) -> Self {
        Self::build(Region::from_host(page_size))
    }

    /// Create an allocator whose buffer is on loan from `parent`. The
    /// parent must outlive this allocator.
    pub fn with_parent(parent: &'a dyn Allocator, page_size: usize) -> Self {
        Self::build(Region::from_parent(parent, page_size))
    }

    fn build(region: Region<'a>) -> Self {
        info!("linear allocator created with a {} byte buffer", region.size());

        let allocator = Self {
            region,
            next_offset: Cell::new(0),
            outstanding: Cell::new(0),
        };
        allocator.next_offset.set(allocator.start_offset());
        allocator
    }

    /// Bytes still available, rounded down to pointer alignment.
    #[inline]
    pub fn free_space(&self) -> usize {
        align_down(self.region.size() - self.next_offset.get(), POINTER_SIZE)
    }

    /// Whether `pointer` lies inside this allocator's buffer.
    #[inline]
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.region.contains(pointer)
    }

    /// Allocations handed out and not yet deallocated.
    #[inline]
    pub fn outstanding_allocations(&self) -> usize {
        self.outstanding.get()
    }

    /// Return the bump pointer to the buffer start, making every previously
    /// allocated byte reusable. All outstanding allocations must have been
    /// deallocated first.
    pub fn reset(&self) {
        let outstanding = self.outstanding.get();
        if outstanding != 0 {
            fatal(AllocatorError::OutstandingAllocations { count: outstanding });
        }

        debug!("linear allocator reset");
        self.next_offset.set(self.start_offset());
    }

    /// Offset of the first pointer-aligned byte of the buffer.
    fn start_offset(&self) -> usize {
        let base = self.region.base().as_ptr() as usize;
        align_up(base, POINTER_SIZE) - base
    }
}

impl Allocator for LinearAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        let available = self.free_space();
        if size > available {
            fatal(AllocatorError::OutOfCapacity {
                requested: size,
                available,
            });
        }

        let offset = self.next_offset.get();
        self.next_offset.set(align_up(offset + size, POINTER_SIZE));
        self.outstanding.set(self.outstanding.get() + 1);

        // In bounds: the free-space check above keeps offset within the buffer.
        unsafe { NonNull::new_unchecked(self.region.base().as_ptr().add(offset)) }
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        if !self.contains(pointer) {
            fatal(AllocatorError::ForeignPointer {
                pointer: pointer.as_ptr() as usize,
            });
        }

        let outstanding = self.outstanding.get();
        if outstanding == 0 {
            fatal(AllocatorError::DeallocateUnderflow);
        }

        self.outstanding.set(outstanding - 1);
    }

    fn max_allocation_size(&self) -> usize {
        self.region.size()
    }
}

impl Drop for LinearAllocator<'_> {
    fn drop(&mut self) {
        let outstanding = self.outstanding.get();
        if outstanding != 0 && !std::thread::panicking() {
            fatal(AllocatorError::OutstandingAllocations { count: outstanding });
        }
    }
}
