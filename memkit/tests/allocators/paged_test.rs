/*!
 * Paged Allocator Tests
 * Page growth, routing and bulk reset across pages
 */

use memkit::{Allocator, PagedBlockAllocator, PagedLinearAllocator};
use pretty_assertions::assert_eq;
use std::ptr::NonNull;

#[test]
fn test_paged_block_grows_and_keeps_its_pages() {
    let allocator = PagedBlockAllocator::new(32, 8);

    // A ninth block overflows the first page.
    let blocks: Vec<NonNull<u8>> = (0..9).map(|_| allocator.allocate(32)).collect();
    assert_eq!(allocator.page_count(), 2);

    // Pages are never shrunk.
    for block in blocks {
        unsafe { allocator.deallocate(block) };
    }
    assert_eq!(allocator.page_count(), 2);
    assert_eq!(allocator.allocated_blocks(), 0);

    // Sixteen blocks fit the two existing pages exactly.
    let refill: Vec<NonNull<u8>> = (0..16).map(|_| allocator.allocate(32)).collect();
    assert_eq!(allocator.page_count(), 2);

    for block in refill {
        unsafe { allocator.deallocate(block) };
    }
}

#[test]
fn test_paged_block_routes_deallocation_to_the_owning_page() {
    let allocator = PagedBlockAllocator::new(64, 2);

    let blocks: Vec<NonNull<u8>> = (0..6).map(|_| allocator.allocate(64)).collect();
    assert_eq!(allocator.page_count(), 3);

    // Free one block from the middle page; only that page regains a slot.
    unsafe { allocator.deallocate(blocks[3]) };
    assert_eq!(allocator.free_blocks(), 1);

    let replacement = allocator.allocate(64);
    assert_eq!(replacement, blocks[3]);
    assert_eq!(allocator.page_count(), 3);

    for block in blocks.iter().enumerate().filter(|(i, _)| *i != 3).map(|(_, b)| *b) {
        unsafe { allocator.deallocate(block) };
    }
    unsafe { allocator.deallocate(replacement) };
}

#[test]
fn test_paged_linear_first_fit_prefers_early_pages() {
    let allocator = PagedLinearAllocator::new(256);

    let big = allocator.allocate(200);
    let overflow = allocator.allocate(200);
    assert_eq!(allocator.page_count(), 2);

    // The first page still has room for a small region.
    let small = allocator.allocate(32);
    assert!(small.as_ptr() as usize > big.as_ptr() as usize);
    assert!((small.as_ptr() as usize - big.as_ptr() as usize) < 256);

    unsafe {
        allocator.deallocate(big);
        allocator.deallocate(overflow);
        allocator.deallocate(small);
    }
    allocator.reset();
    assert_eq!(allocator.page_count(), 2);
}

#[test]
fn test_paged_linear_reset_makes_pages_reusable() {
    let allocator = PagedLinearAllocator::new(128);

    let first = allocator.allocate(128);
    unsafe { allocator.deallocate(first) };
    allocator.reset();

    // After reset the first page serves again instead of growing.
    let again = allocator.allocate(128);
    assert_eq!(again, first);
    assert_eq!(allocator.page_count(), 1);

    unsafe { allocator.deallocate(again) };
    allocator.reset();
}

#[test]
fn test_paged_linear_shrink_drops_all_but_the_first_page() {
    let allocator = PagedLinearAllocator::new(128);

    let held: Vec<NonNull<u8>> = (0..5).map(|_| allocator.allocate(128)).collect();
    assert_eq!(allocator.page_count(), 5);

    for pointer in held {
        unsafe { allocator.deallocate(pointer) };
    }
    allocator.reset_and_shrink();
    assert_eq!(allocator.page_count(), 1);
    assert_eq!(allocator.outstanding_allocations(), 0);
}

#[test]
#[should_panic(expected = "does not belong")]
fn test_paged_foreign_deallocate_aborts() {
    let allocator = PagedBlockAllocator::new(32, 2);
    let mut foreign = [0u8; 32];
    unsafe { allocator.deallocate(NonNull::new(foreign.as_mut_ptr()).unwrap()) };
}
