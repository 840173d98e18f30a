/*!
 * Small-Object Pool
 * A paged, typed pool for objects up to sixteen pointers in size
 */

use crate::allocators::{Allocator, SmallObjectAllocator};
use crate::core::error::{fatal, AllocatorError};
use crate::core::math::POINTER_SIZE;
use crate::scoped::Unique;
use log::info;
use std::cell::RefCell;
use std::mem;
use std::ptr::NonNull;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// The size-class pages, grown when no page can take a routed request.
/// Pages live until the pool drops, so handles stay valid across growth.
struct PagedSmallObjectAllocator<'a> {
    page_size: usize,
    parent: Option<&'a dyn Allocator>,
    pages: RefCell<Vec<SmallObjectAllocator<'a>>>,
}

impl<'a> PagedSmallObjectAllocator<'a> {
    fn build(parent: Option<&'a dyn Allocator>, page_size: usize) -> Self {
        let allocator = Self {
            page_size,
            parent,
            pages: RefCell::new(Vec::new()),
        };
        let first = allocator.new_page();
        allocator.pages.borrow_mut().push(first);
        allocator
    }

    fn new_page(&self) -> SmallObjectAllocator<'a> {
        match self.parent {
            Some(parent) => SmallObjectAllocator::with_parent(parent, self.page_size),
            None => SmallObjectAllocator::new(self.page_size),
        }
    }

    fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    fn live_objects(&self) -> usize {
        self.pages
            .borrow()
            .iter()
            .map(|page| page.outstanding_allocations())
            .sum()
    }
}

impl Allocator for PagedSmallObjectAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        if size > self.max_allocation_size() {
            fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.max_allocation_size(),
            });
        }

        {
            let pages = self.pages.borrow();
            for page in pages.iter() {
                if page.can_allocate(size) {
                    return page.allocate(size);
                }
            }
        }

        info!(
            "small-object pool exhausted {} pages, growing",
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
        16 * POINTER_SIZE
    }
}

/// A pool for efficient creation of small objects such as fundamental types
/// and small structs.
///
/// Objects route to size-class pages; when no existing page has room in the
/// routed class another page is allocated. A page, once created, lives
/// until the pool itself drops. The largest object the pool takes is
/// sixteen pointers, which leaves room for larger objects on 64-bit
/// machines.
///
/// Not thread-safe; all operations must stay on one thread.
pub struct SmallObjectPool<'a> {
    inner: PagedSmallObjectAllocator<'a>,
}

impl<'a> SmallObjectPool<'a> {
    /// The largest object size the pool accepts.
    pub const fn max_object_size() -> usize {
        16 * POINTER_SIZE
    }

    /// Create a pool with `page_size`-byte pages from the host heap.
    /// `page_size` must be a power of two no smaller than the largest size
    /// class.
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: PagedSmallObjectAllocator::build(None, page_size),
        }
    }

    /// A pool with the default page size, from the host heap.
    pub fn with_default_page_size() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }

    /// As [`new`](Self::new) with every page on loan from `parent`. The
    /// parent must outlive this pool.
    pub fn with_parent(parent: &'a dyn Allocator, page_size: usize) -> Self {
        Self {
            inner: PagedSmallObjectAllocator::build(Some(parent), page_size),
        }
    }

    /// Move `value` into the pool. The type must be no larger than
    /// [`max_object_size`](Self::max_object_size).
    pub fn create<T>(&self, value: T) -> Unique<'_, T> {
        assert!(
            mem::size_of::<T>() <= Self::max_object_size(),
            "object does not fit the small-object pool"
        );

        Unique::new_in(&self.inner, value)
    }

    /// Pages currently chained.
    pub fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    /// Objects alive in the pool.
    pub fn live_objects(&self) -> usize {
        self.inner.live_objects()
    }
}
