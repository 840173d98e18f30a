/*!
 * Block Allocator Tests
 * Free-list round trips and capacity accounting
 */

use memkit::{Allocator, BlockAllocator};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::ptr::NonNull;

#[test]
fn test_round_trip_reissues_the_same_blocks() {
    let allocator = BlockAllocator::new(64, 4);

    let b1 = allocator.allocate(64);
    let b2 = allocator.allocate(64);
    let b3 = allocator.allocate(64);
    let b4 = allocator.allocate(64);

    // Fresh blocks come out in buffer order.
    for (index, block) in [b1, b2, b3, b4].iter().enumerate() {
        assert_eq!(block.as_ptr() as usize - b1.as_ptr() as usize, 64 * index);
    }

    unsafe {
        allocator.deallocate(b2);
        allocator.deallocate(b4);
        allocator.deallocate(b1);
        allocator.deallocate(b3);
    }
    assert_eq!(allocator.free_blocks(), 4);

    // Reallocating everything yields exactly the original block set.
    let first_round: BTreeSet<usize> =
        [b1, b2, b3, b4].iter().map(|b| b.as_ptr() as usize).collect();
    let second: Vec<NonNull<u8>> = (0..4).map(|_| allocator.allocate(64)).collect();
    let second_round: BTreeSet<usize> = second.iter().map(|b| b.as_ptr() as usize).collect();
    assert_eq!(first_round, second_round);

    for block in second {
        unsafe { allocator.deallocate(block) };
    }
}

#[test]
fn test_small_requests_use_whole_blocks() {
    let allocator = BlockAllocator::new(64, 2);

    let a = allocator.allocate(1);
    let b = allocator.allocate(64);
    assert_eq!(allocator.free_blocks(), 0);

    unsafe {
        allocator.deallocate(a);
        allocator.deallocate(b);
    }
    assert_eq!(allocator.free_blocks(), 2);
}

#[test]
fn test_max_allocation_is_the_block_size() {
    let allocator = BlockAllocator::new(128, 2);
    assert_eq!(allocator.max_allocation_size(), 128);
    assert_eq!(allocator.block_size(), 128);
    assert_eq!(allocator.block_count(), 2);
}

#[test]
fn test_parented_buffer_returns_to_parent() {
    let parent = BlockAllocator::new(1024, 2);

    {
        let child = BlockAllocator::with_parent(&parent, 64, 8);
        assert_eq!(parent.allocated_blocks(), 1);

        let block = child.allocate(64);
        unsafe { child.deallocate(block) };
    }

    assert_eq!(parent.allocated_blocks(), 0);
}

#[test]
#[should_panic(expected = "out of capacity")]
fn test_exhausted_pool_aborts() {
    let allocator = BlockAllocator::new(64, 1);
    let _held = allocator.allocate(64);
    allocator.allocate(64);
}
