/*!
 * Container Adapters
 * Standard-container wrappers parameterised on an allocator reference
 */

use crate::allocators::Allocator;
use crate::core::math::POINTER_SIZE;
use allocator_api2::alloc::{AllocError, Allocator as RawAllocator};
use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;

/// A copyable handle around an allocator, usable wherever the standard
/// allocator protocol is expected.
///
/// The handle must not outlive the allocator it wraps; the borrow enforces
/// that. Equality compares the wrapped allocator *identities*: two handles
/// are equal exactly when they route to the same allocator instance.
#[derive(Clone, Copy)]
pub struct AllocRef<'a> {
    allocator: &'a dyn Allocator,
}

impl<'a> AllocRef<'a> {
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self { allocator }
    }

    /// The wrapped allocator.
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.allocator
    }

    fn identity(&self) -> *const u8 {
        self.allocator as *const dyn Allocator as *const u8
    }
}

impl PartialEq for AllocRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for AllocRef<'_> {}

impl fmt::Debug for AllocRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocRef({:p})", self.identity())
    }
}

unsafe impl RawAllocator for AllocRef<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        // No interface exposes over-aligned allocation.
        if layout.align() > POINTER_SIZE {
            return Err(AllocError);
        }

        if layout.size() == 0 {
            let dangling = NonNull::new(layout.align() as *mut u8).ok_or(AllocError)?;
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        if layout.size() > self.allocator.max_allocation_size() {
            return Err(AllocError);
        }

        let pointer = self.allocator.allocate(layout.size());
        Ok(NonNull::slice_from_raw_parts(pointer, layout.size()))
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            self.allocator.deallocate(pointer);
        }
    }
}

/// A vector drawing its storage from a wrapped allocator.
pub type Vec<'a, T> = allocator_api2::vec::Vec<T, AllocRef<'a>>;

/// A hash map drawing its storage from a wrapped allocator.
pub type HashMap<'a, K, V> = hashbrown::HashMap<K, V, ahash::RandomState, AllocRef<'a>>;

/// A hash set drawing its storage from a wrapped allocator.
pub type HashSet<'a, T> = hashbrown::HashSet<T, ahash::RandomState, AllocRef<'a>>;

/// An empty [`Vec`] backed by `allocator`.
pub fn vec_in<T>(allocator: &dyn Allocator) -> Vec<'_, T> {
    Vec::new_in(AllocRef::new(allocator))
}

/// An empty [`HashMap`] backed by `allocator`.
pub fn hash_map_in<K, V>(allocator: &dyn Allocator) -> HashMap<'_, K, V> {
    HashMap::with_hasher_in(ahash::RandomState::new(), AllocRef::new(allocator))
}

/// An empty [`HashSet`] backed by `allocator`.
pub fn hash_set_in<T>(allocator: &dyn Allocator) -> HashSet<'_, T> {
    HashSet::with_hasher_in(ahash::RandomState::new(), AllocRef::new(allocator))
}
