/*!
 * Composition Tests
 * Allocators stacked on allocators: loans, growth and teardown
 */

use memkit::{
    Allocator, BlockAllocator, BuddyAllocator, PagedLinearAllocator, SmallObjectAllocator,
};
use pretty_assertions::assert_eq;

#[test]
fn test_paged_linear_on_buddy() {
    let buddy = BuddyAllocator::with_min_block_size(64 * 1024, 64);
    assert_eq!(buddy.outstanding_allocations(), 0);

    {
        let paged = PagedLinearAllocator::with_parent(&buddy, 4 * 1024);

        // The initial page is one buddy block of at least the page size.
        assert_eq!(buddy.outstanding_allocations(), 1);

        // A 3 KiB region fits the existing page: no further buddy traffic.
        let region = paged.allocate(3 * 1024);
        assert_eq!(buddy.outstanding_allocations(), 1);

        // Overflowing the page borrows exactly one more block.
        let second = paged.allocate(3 * 1024);
        assert_eq!(buddy.outstanding_allocations(), 2);

        unsafe {
            paged.deallocate(region);
            paged.deallocate(second);
        }

        // Reset recycles the pages without returning them.
        paged.reset();
        assert_eq!(buddy.outstanding_allocations(), 2);
    }

    // Teardown hands every page back.
    assert_eq!(buddy.outstanding_allocations(), 0);
}

#[test]
fn test_buddy_on_buddy() {
    let outer = BuddyAllocator::with_min_block_size(64 * 1024, 64);

    {
        let inner = BuddyAllocator::with_parent(&outer, 16 * 1024, 64);
        assert_eq!(outer.outstanding_allocations(), 1);

        // The inner allocator's header bookkeeping lives inside the loaned
        // buffer, so the outer sees exactly one allocation regardless of
        // inner traffic.
        let block = inner.allocate(1024);
        assert_eq!(outer.outstanding_allocations(), 1);
        unsafe { inner.deallocate(block) };
    }

    assert_eq!(outer.outstanding_allocations(), 0);
}

#[test]
fn test_small_object_on_buddy() {
    let buddy = BuddyAllocator::with_min_block_size(64 * 1024, 64);

    {
        let small = SmallObjectAllocator::with_parent(&buddy, 1024);

        // Four size-class pools, one loan each.
        assert_eq!(buddy.outstanding_allocations(), 4);

        let pointer = small.allocate(24);
        unsafe { small.deallocate(pointer) };
        assert_eq!(buddy.outstanding_allocations(), 4);
    }

    assert_eq!(buddy.outstanding_allocations(), 0);
}

#[test]
fn test_three_level_stack() {
    let buddy = BuddyAllocator::with_min_block_size(64 * 1024, 64);

    {
        let paged = PagedLinearAllocator::with_parent(&buddy, 8 * 1024);
        let blocks = BlockAllocator::with_parent(&paged, 64, 16);

        let block = blocks.allocate(64);
        assert!(paged.contains(block));
        assert!(buddy.contains(block));

        unsafe { blocks.deallocate(block) };
    }

    assert_eq!(buddy.outstanding_allocations(), 0);
}

#[test]
fn test_loaned_blocks_point_into_the_parent() {
    let buddy = BuddyAllocator::with_min_block_size(16 * 1024, 64);
    let pool = BlockAllocator::with_parent(&buddy, 128, 8);

    let block = pool.allocate(128);
    assert!(pool.contains(block));
    assert!(buddy.contains(block));

    unsafe { pool.deallocate(block) };
}
