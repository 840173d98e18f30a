/*!
 * Linear Allocator Tests
 * Bump progression, reset behaviour and the fatal paths
 */

use memkit::{Allocator, LinearAllocator};
use pretty_assertions::assert_eq;

#[test]
fn test_bump_progression_and_reset_round_trip() {
    let allocator = LinearAllocator::new(1024);

    let p1 = allocator.allocate(300);
    let p2 = allocator.allocate(500);
    let p3 = allocator.allocate(100);

    // Each region is the previous request rounded up to pointer alignment.
    assert_eq!(p2.as_ptr() as usize - p1.as_ptr() as usize, 304);
    assert_eq!(p3.as_ptr() as usize - p2.as_ptr() as usize, 504);

    unsafe {
        allocator.deallocate(p1);
        allocator.deallocate(p2);
        allocator.deallocate(p3);
    }
    allocator.reset();

    let p4 = allocator.allocate(300);
    assert_eq!(p4, p1);
    unsafe { allocator.deallocate(p4) };
    allocator.reset();
}

#[test]
fn test_max_allocation_is_the_buffer() {
    let allocator = LinearAllocator::new(1024);
    assert_eq!(allocator.max_allocation_size(), 1024);
    assert_eq!(allocator.free_space(), 1024);

    let pointer = allocator.allocate(1024);
    assert_eq!(allocator.free_space(), 0);

    unsafe { allocator.deallocate(pointer) };
    allocator.reset();
}

#[test]
fn test_contains_tracks_the_buffer() {
    let allocator = LinearAllocator::new(128);
    let pointer = allocator.allocate(8);

    assert!(allocator.contains(pointer));

    let mut foreign = [0u8; 8];
    assert!(!allocator.contains(std::ptr::NonNull::new(foreign.as_mut_ptr()).unwrap()));

    unsafe { allocator.deallocate(pointer) };
    allocator.reset();
}

#[test]
fn test_parented_buffer_returns_to_parent() {
    let parent = LinearAllocator::new(4096);

    {
        let child = LinearAllocator::with_parent(&parent, 1024);
        let pointer = child.allocate(100);
        assert_eq!(parent.outstanding_allocations(), 1);
        unsafe { child.deallocate(pointer) };
    }

    assert_eq!(parent.outstanding_allocations(), 0);
    parent.reset();
}

#[test]
#[should_panic(expected = "does not belong")]
fn test_foreign_deallocate_aborts() {
    let allocator = LinearAllocator::new(128);
    let mut foreign = [0u8; 8];
    unsafe { allocator.deallocate(std::ptr::NonNull::new(foreign.as_mut_ptr()).unwrap()) };
}
