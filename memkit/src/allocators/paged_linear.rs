/*!
 * Paged Linear Allocator
 * A chain of linear pages that grows when the current pages are exhausted
 */

use crate::allocators::{Allocator, LinearAllocator};
use crate::core::error::{fatal, AllocatorError};
use log::{debug, info};
use std::cell::RefCell;
use std::ptr::NonNull;

/// A linear allocator that trades the hard capacity limit of a single
/// buffer for unbounded growth.
///
/// Pages are identically-configured [`LinearAllocator`]s; a request is
/// served by the first page with room for it, and a fresh page is appended
/// when none has. Lookup is linear in the page count, so this suits bursts
/// that overflow a reasonable single page while average occupancy stays
/// low. Pages are only released by [`reset_and_shrink`](Self::reset_and_shrink)
/// or at drop.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct PagedLinearAllocator<'a> {
    page_size: usize,
    parent: Option<&'a dyn Allocator>,
    pages: RefCell<Vec<LinearAllocator<'a>>>,
}

impl<'a> PagedLinearAllocator<'a> {
    /// Create an allocator with one initial page of `page_size` bytes from
    /// the host heap.
    pub fn new(page_size: usize) -> Self {
        Self::build(None, page_size)
    }

    /// As [`new`](Self::new) with every page's buffer on loan from
    /// `parent`. The parent must outlive this allocator.
    pub fn with_parent(parent: &'a dyn Allocator, page_size: usize) -> Self {
        Self::build(Some(parent), page_size)
    }

    fn build(parent: Option<&'a dyn Allocator>, page_size: usize) -> Self {
        let allocator = Self {
            page_size,
            parent,
            pages: RefCell::new(Vec::new()),
        };
        let first = allocator.new_page();
        allocator.pages.borrow_mut().push(first);

        info!("paged linear allocator created: {} byte pages", page_size);
        allocator
    }

    fn new_page(&self) -> LinearAllocator<'a> {
        match self.parent {
            Some(parent) => LinearAllocator::with_parent(parent, self.page_size),
            None => LinearAllocator::new(self.page_size),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages currently chained.
    pub fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    /// Whether `pointer` lies in any page.
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.pages.borrow().iter().any(|page| page.contains(pointer))
    }

    /// Allocations handed out and not yet deallocated, across all pages.
    pub fn outstanding_allocations(&self) -> usize {
        self.pages
            .borrow()
            .iter()
            .map(|page| page.outstanding_allocations())
            .sum()
    }

    /// Reset every page, making all previously allocated bytes reusable.
    /// Every allocation must have been deallocated first.
    pub fn reset(&self) {
        for page in self.pages.borrow().iter() {
            page.reset();
        }
    }

    /// Reset every page and drop all but the first.
    pub fn reset_and_shrink(&self) {
        self.reset();

        let mut pages = self.pages.borrow_mut();
        let dropped = pages.len() - 1;
        pages.truncate(1);

        debug!("paged linear allocator shrank by {} pages", dropped);
    }
}

impl Allocator for PagedLinearAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        if size > self.page_size {
            fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.page_size,
            });
        }

        {
            let pages = self.pages.borrow();
            for page in pages.iter() {
                if page.free_space() >= size {
                    return page.allocate(size);
                }
            }
        }

        info!(
            "paged linear allocator exhausted {} pages, growing",
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
        self.page_size
    }
}
