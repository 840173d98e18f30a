/*!
 * Shared Owner
 * Reference-counted ownership with the count stored beside the value
 */

use crate::allocators::Allocator;
use crate::core::math::POINTER_SIZE;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// Count and value, allocated together.
struct SharedInner<T> {
    count: Cell<usize>,
    value: T,
}

/// A shared owner over a value in memory from a specific allocator.
///
/// Cloning bumps a reference count stored in the same allocation as the
/// value; the last owner to drop runs the destructor and returns the bytes.
/// Single-threaded, like every allocator it can wrap except the buddy:
/// neither the count nor the handle is safe to touch from another thread.
pub struct Shared<'a, T> {
    inner: NonNull<SharedInner<T>>,
    allocator: &'a dyn Allocator,
    _marker: PhantomData<SharedInner<T>>,
}

impl<'a, T> Shared<'a, T> {
    /// Move `value` into a count-carrying allocation from `allocator`.
    pub fn new_in(allocator: &'a dyn Allocator, value: T) -> Self {
        assert!(
            mem::align_of::<SharedInner<T>>() <= POINTER_SIZE,
            "over-aligned types are not supported"
        );

        let inner: NonNull<SharedInner<T>> =
            allocator.allocate(mem::size_of::<SharedInner<T>>()).cast();
        unsafe {
            inner.as_ptr().write(SharedInner {
                count: Cell::new(1),
                value,
            });
        }

        Self {
            inner,
            allocator,
            _marker: PhantomData,
        }
    }

    /// Owners currently alive.
    pub fn strong_count(&self) -> usize {
        unsafe { self.inner.as_ref() }.count.get()
    }

    /// Whether two handles own the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        let count = unsafe { self.inner.as_ref() }.count.get();
        unsafe { self.inner.as_ref() }.count.set(count + 1);

        Self {
            inner: self.inner,
            allocator: self.allocator,
            _marker: PhantomData,
        }
    }
}

impl<T> Deref for Shared<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &unsafe { self.inner.as_ref() }.value
    }
}

impl<T> Drop for Shared<'_, T> {
    fn drop(&mut self) {
        let count = unsafe { self.inner.as_ref() }.count.get();

        if count == 1 {
            unsafe {
                ptr::drop_in_place(self.inner.as_ptr());
                self.allocator.deallocate(self.inner.cast());
            }
        } else {
            unsafe { self.inner.as_ref() }.count.set(count - 1);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
