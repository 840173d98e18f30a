/*!
 * Allocator Contract
 * The uniform interface every allocator variant implements
 */

use std::ptr::NonNull;

/// Raw byte allocator.
///
/// An allocator's identity is the instance itself: a pointer handed out by
/// one instance must be returned to that same instance. Implementations are
/// neither `Clone` nor `Copy`.
///
/// Any allocator can back another allocator's buffer, so implementations
/// take `&self` and manage their own interior mutability. A parent must
/// outlive its children; children call back into the parent only when
/// acquiring the backing buffer at construction and returning it at drop.
pub trait Allocator {
    /// Allocate a region of at least `size` bytes, aligned to at least the
    /// machine pointer size.
    ///
    /// Aborts the process if the request cannot be satisfied; this library
    /// treats allocation failure as a fatal configuration bug rather than a
    /// recoverable condition. Callers that need to tolerate failure should
    /// pre-validate against [`max_allocation_size`](Self::max_allocation_size)
    /// and the concrete allocator's capacity probes.
    fn allocate(&self, size: usize) -> NonNull<u8>;

    /// Return a region previously obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `pointer` must have been returned by `allocate` on this same instance
    /// and must not already have been deallocated.
    unsafe fn deallocate(&self, pointer: NonNull<u8>);

    /// The largest request this allocator can ever satisfy.
    fn max_allocation_size(&self) -> usize;
}
