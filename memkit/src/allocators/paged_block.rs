/*!
 * Paged Block Allocator
 * A chain of block-pool pages that grows when every pool is full
 */

use crate::allocators::{Allocator, BlockAllocator};
use crate::core::error::{fatal, AllocatorError};
use log::info;
use std::cell::RefCell;
use std::ptr::NonNull;

/// A block allocator that grows by whole pages instead of running out.
///
/// Pages are identically-configured [`BlockAllocator`]s of
/// `blocks_per_page` blocks; a request is served by the first page with a
/// free block, and a fresh page is appended when none has. Deallocation
/// never shrinks the chain; pages live until the allocator drops.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct PagedBlockAllocator<'a> {
    block_size: usize,
    blocks_per_page: usize,
    parent: Option<&'a dyn Allocator>,
    pages: RefCell<Vec<BlockAllocator<'a>>>,
}

impl<'a> PagedBlockAllocator<'a> {
    /// Create an allocator with one initial page of `blocks_per_page`
    /// blocks of `block_size` bytes from the host heap.
    pub fn new(block_size: usize, blocks_per_page: usize) -> Self {
        Self::build(None, block_size, blocks_per_page)
    }

    /// As [`new`](Self::new) with every page's buffer on loan from
    /// `parent`. The parent must outlive this allocator.
    pub fn with_parent(
        parent: &'a dyn Allocator,
        block_size: usize,
        blocks_per_page: usize,
    ) -> Self {
        Self::build(Some(parent), block_size, blocks_per_page)
    }

    fn build(parent: Option<&'a dyn Allocator>, block_size: usize, blocks_per_page: usize) -> Self {
        let allocator = Self {
            block_size,
            blocks_per_page,
            parent,
            pages: RefCell::new(Vec::new()),
        };
        let first = allocator.new_page();
        allocator.pages.borrow_mut().push(first);

        info!(
            "paged block allocator created: pages of {} blocks of {} bytes",
            blocks_per_page, block_size
        );
        allocator
    }

    fn new_page(&self) -> BlockAllocator<'a> {
        match self.parent {
            Some(parent) => {
                BlockAllocator::with_parent(parent, self.block_size, self.blocks_per_page)
            }
            None => BlockAllocator::new(self.block_size, self.blocks_per_page),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn blocks_per_page(&self) -> usize {
        self.blocks_per_page
    }

    /// Pages currently chained.
    pub fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    /// Whether `pointer` lies in any page.
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.pages.borrow().iter().any(|page| page.contains(pointer))
    }

    /// Free blocks remaining across all pages.
    pub fn free_blocks(&self) -> usize {
        self.pages.borrow().iter().map(|page| page.free_blocks()).sum()
    }

    /// Blocks handed out and not yet deallocated, across all pages.
    pub fn allocated_blocks(&self) -> usize {
        self.pages
            .borrow()
            .iter()
            .map(|page| page.allocated_blocks())
            .sum()
    }
}

impl Allocator for PagedBlockAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        if size > self.block_size {
            fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.block_size,
            });
        }

        {
            let pages = self.pages.borrow();
            for page in pages.iter() {
                if page.free_blocks() > 0 {
                    return page.allocate(size);
                }
            }
        }

        info!(
            "paged block allocator exhausted {} pages, growing",
            self.page_count()
        );

        let page = self.new_page();
        let pointer = page.allocate(size);
        self.pages.borrow_mut().push(page);
        pointer
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        let pages = self.pages.borrow();
        for page in pages.iter() {
            if page.contains(pointer) {
                return page.deallocate(pointer);
            }
        }

        fatal(AllocatorError::ForeignPointer {
            pointer: pointer.as_ptr() as usize,
        });
    }

    fn max_allocation_size(&self) -> usize {
        self.block_size
    }
}
