/*!
 * Allocator Errors
 * Invariant-violation diagnostics behind the abort-on-failure policy
 */

use log::error;
use thiserror::Error;

/// The ways an allocator contract can be violated.
///
/// None of these are recoverable at run time: they indicate bugs in caller
/// configuration, not ordinary runtime events. Callers wishing to tolerate
/// allocation failure must pre-validate against `max_allocation_size`,
/// `free_space` or `free_blocks` before requesting memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("out of capacity: requested {requested} bytes with {available} bytes free")]
    OutOfCapacity { requested: usize, available: usize },

    #[error("requested {requested} bytes but the maximum allocation size is {max} bytes")]
    OversizedAllocation { requested: usize, max: usize },

    #[error("pointer {pointer:#x} does not belong to this allocator")]
    ForeignPointer { pointer: usize },

    #[error("deallocate called with no allocations outstanding")]
    DeallocateUnderflow,

    #[error("{count} allocations still outstanding")]
    OutstandingAllocations { count: usize },
}

/// Abort the process with the violated invariant identified.
///
/// Failures here are fatal programming errors; no error codes are surfaced
/// to callers.
#[cold]
#[inline(never)]
pub(crate) fn fatal(err: AllocatorError) -> ! {
    error!("allocator invariant violated: {err}");
    panic!("{err}");
}
