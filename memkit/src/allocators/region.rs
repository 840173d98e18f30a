/*!
 * Backing Regions
 * Buffer acquisition from the host heap or a parent allocator
 */

use crate::allocators::Allocator;
use crate::core::math::POINTER_SIZE;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// One contiguous byte buffer owned by an allocator.
///
/// The buffer is either acquired exclusively from the host's general heap or
/// on loan from a parent allocator; drop returns it to wherever it came
/// from. The parent, when present, must outlive the region.
pub(crate) struct Region<'a> {
    base: NonNull<u8>,
    size: usize,
    parent: Option<&'a dyn Allocator>,
}

impl<'a> Region<'a> {
    /// Acquire a buffer of `size` bytes from the parent when given one,
    /// otherwise from the host heap.
    pub fn acquire(parent: Option<&'a dyn Allocator>, size: usize) -> Self {
        match parent {
            Some(parent) => Self::from_parent(parent, size),
            None => Self::from_host(size),
        }
    }

    /// Acquire a pointer-aligned buffer from the host's general heap.
    /// Host-heap exhaustion is fatal.
    pub fn from_host(size: usize) -> Self {
        let layout = Self::host_layout(size);
        let pointer = unsafe { alloc::alloc(layout) };
        let base = match NonNull::new(pointer) {
            Some(base) => base,
            None => alloc::handle_alloc_error(layout),
        };

        Self {
            base,
            size,
            parent: None,
        }
    }

    /// Acquire a buffer on loan from `parent`. The parent aborts if it
    /// cannot serve the request.
    pub fn from_parent(parent: &'a dyn Allocator, size: usize) -> Self {
        let base = parent.allocate(size);

        Self {
            base,
            size,
            parent: Some(parent),
        }
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Half-open membership test: `base <= pointer < base + size`.
    #[inline]
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        let base = self.base.as_ptr() as usize;
        let pointer = pointer.as_ptr() as usize;
        pointer >= base && pointer < base + self.size
    }

    fn host_layout(size: usize) -> Layout {
        assert!(size > 0, "a backing buffer cannot be empty");
        Layout::from_size_align(size, POINTER_SIZE).expect("buffer layout overflows")
    }
}

impl Drop for Region<'_> {
    fn drop(&mut self) {
        match self.parent {
            Some(parent) => unsafe { parent.deallocate(self.base) },
            None => unsafe { alloc::dealloc(self.base.as_ptr(), Self::host_layout(self.size)) },
        }
    }
}
