/*!
 * Buddy Allocator
 * Recursive half-splitting with merge-on-free and header-embedded bookkeeping
 *
 * The root block covers the whole buffer. A request is served by splitting
 * blocks in half until the smallest power-of-two block that fits is reached;
 * on deallocation a block re-merges with its buddy whenever both halves are
 * free. All bookkeeping lives at the start of the managed buffer itself, so
 * one buddy allocator can serve another allocator's buffer without any
 * auxiliary allocation.
 */

use crate::allocators::free_list::{self, ListNode};
use crate::allocators::{Allocator, Region};
use crate::core::error::{fatal, AllocatorError};
use crate::core::math::{align_up, is_aligned, offset_from, shift_count, POINTER_SIZE};
use log::info;
use parking_lot::Mutex;
use std::cmp;
use std::ptr::NonNull;

/// Default minimum block size in bytes.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 64;

/// Number of levels for the given buffer and minimum block sizes.
fn level_count_for(buffer_size: usize, min_block_size: usize) -> usize {
    shift_count(buffer_size / min_block_size) + 1
}

/// Bytes taken by the per-level free-list head pointers.
fn free_table_size(levels: usize) -> usize {
    levels * POINTER_SIZE
}

/// Bits in the paired-allocated table and in the split table: one bit per
/// buddy pair over levels 1.. and one bit per splittable block over levels
/// ..levels-1 both total `2^(levels-1) - 1`.
fn data_table_bits(levels: usize) -> usize {
    (1 << (levels - 1)) - 1
}

/// Bytes of one bit table, rounded up to pointer alignment so the tables
/// and the body after them stay aligned.
fn data_table_size(levels: usize) -> usize {
    align_up((data_table_bits(levels) + 7) / 8, POINTER_SIZE)
}

/// Total header size: free-list heads, paired-allocated bits, split bits.
fn header_size_for(levels: usize) -> usize {
    free_table_size(levels) + 2 * data_table_size(levels)
}

/// The per-level free-list heads, stored at the base of the managed buffer.
/// List nodes are embedded in the free blocks themselves.
struct FreeListTable {
    heads: *mut *mut ListNode,
    levels: usize,
}

impl FreeListTable {
    /// # Safety
    ///
    /// `buffer` must point to at least `free_table_size(levels)` writable
    /// pointer-aligned bytes.
    unsafe fn init(buffer: *mut u8, levels: usize) -> Self {
        let heads = buffer as *mut *mut ListNode;
        for level in 0..levels {
            *heads.add(level) = std::ptr::null_mut();
        }
        Self { heads, levels }
    }

    fn head_slot(&self, level: usize) -> *mut *mut ListNode {
        debug_assert!(level < self.levels);
        unsafe { self.heads.add(level) }
    }

    fn start(&self, level: usize) -> *mut ListNode {
        unsafe { *self.head_slot(level) }
    }

    unsafe fn push(&mut self, level: usize, block: *mut u8) {
        free_list::push_front(self.head_slot(level), block as *mut ListNode);
    }

    unsafe fn remove(&mut self, level: usize, block: *mut u8) {
        free_list::unlink(self.head_slot(level), block as *mut ListNode);
    }

    fn len(&self, level: usize) -> usize {
        unsafe { free_list::count(self.start(level)) }
    }
}

/// Bit table stored inside the managed buffer.
struct BitTable {
    bits: *mut u8,
}

impl BitTable {
    /// # Safety
    ///
    /// `buffer` must point to at least `bytes` writable bytes.
    unsafe fn init(buffer: *mut u8, bytes: usize) -> Self {
        std::ptr::write_bytes(buffer, 0, bytes);
        Self { bits: buffer }
    }

    fn get(&self, index: usize) -> bool {
        unsafe { *self.bits.add(index / 8) & (1 << (index % 8)) != 0 }
    }

    fn toggle(&mut self, index: usize) {
        unsafe { *self.bits.add(index / 8) ^= 1 << (index % 8) };
    }

    fn set(&mut self, index: usize, value: bool) {
        unsafe {
            if value {
                *self.bits.add(index / 8) |= 1 << (index % 8);
            } else {
                *self.bits.add(index / 8) &= !(1 << (index % 8));
            }
        }
    }
}

/// One bit per buddy pair, XOR-toggled on every allocation or deallocation
/// of either buddy. Clear means both buddies are allocated or both are free;
/// set means exactly one is allocated. The deallocation path already knows
/// the state of one buddy, so a single bit decides whether its partner is
/// free to merge with. The root block has no buddy and no entry.
struct AllocatedTable {
    bits: BitTable,
}

impl AllocatedTable {
    fn flag_index(level: usize, index: usize) -> usize {
        debug_assert!(level >= 1);
        (1 << (level - 1)) - 1 + (index >> 1)
    }

    fn get(&self, level: usize, index: usize) -> bool {
        self.bits.get(Self::flag_index(level, index))
    }

    fn toggle(&mut self, level: usize, index: usize) {
        self.bits.toggle(Self::flag_index(level, index));
    }
}

/// One bit per potentially-splittable block (every level but the finest),
/// set while the block is divided into its two children.
struct SplitTable {
    bits: BitTable,
}

impl SplitTable {
    fn flag_index(level: usize, index: usize) -> usize {
        (1 << level) - 1 + index
    }

    fn get(&self, level: usize, index: usize) -> bool {
        self.bits.get(Self::flag_index(level, index))
    }

    fn set(&mut self, level: usize, index: usize, value: bool) {
        self.bits.set(Self::flag_index(level, index), value);
    }
}

/// Everything the buddy allocator mutates, guarded by one mutex. The tables
/// point into the managed buffer's header region.
struct BuddyState {
    free: FreeListTable,
    allocated: AllocatedTable,
    split: SplitTable,
    outstanding: usize,
}

// The table pointers target the allocator's own buffer, which lives for as
// long as the state does and is only reached through the guarding mutex.
unsafe impl Send for BuddyState {}

/// A buddy allocator over a power-of-two buffer.
///
/// Level 0 is the whole buffer and is never handed out; each deeper level
/// halves the block size down to `min_block_size`, so the largest request
/// this allocator can serve is half its buffer. The bookkeeping (free-list
/// heads, paired-allocated bits, split bits) is embedded at the
/// start of the buffer, and the blocks the header occupies are reserved at
/// construction so user allocations never collide with it.
///
/// This is the one allocator in the crate designed to be shared across
/// threads: `allocate` and `deallocate` serialise behind a single mutex and
/// are linearisable.
///
/// # Performance
///
/// - **Allocation**: O(levels) worst case when a run of splits is needed
/// - **Deallocation**: O(levels) for the level scan plus merge cascade
/// - **Fragmentation**: allocating one buddy of every pair leaves plenty of
///   free space but no coarse blocks; there is no compaction
pub struct BuddyAllocator<'a> {
    buffer_size: usize,
    min_block_size: usize,
    levels: usize,
    header_size: usize,
    region: Region<'a>,
    state: Mutex<BuddyState>,
}

// Shared references only expose the mutex-guarded state and immutable
// geometry. The parent loan is touched at construction and drop alone, both
// of which take the allocator exclusively, so a shared buddy never reaches
// into a possibly thread-bound parent.
unsafe impl Sync for BuddyAllocator<'_> {}

impl<'a> BuddyAllocator<'a> {
    /// Create an allocator over `buffer_size` bytes from the host heap with
    /// the default minimum block size.
    pub fn new(buffer_size: usize) -> Self {
        Self::with_min_block_size(buffer_size, DEFAULT_MIN_BLOCK_SIZE)
    }

    /// Create an allocator over `buffer_size` bytes with blocks no smaller
    /// than `min_block_size`. Both must be powers of two, the minimum block
    /// must exceed two pointers, and the header must fit the buffer.
    pub fn with_min_block_size(buffer_size: usize, min_block_size: usize) -> Self {
        Self::validate(buffer_size, min_block_size);
        Self::build(Region::from_host(buffer_size), min_block_size)
    }

    /// As [`with_min_block_size`](Self::with_min_block_size) with the buffer
    /// on loan from `parent`. The parent must outlive this allocator.
    pub fn with_parent(
        parent: &'a dyn Allocator,
        buffer_size: usize,
        min_block_size: usize,
    ) -> Self {
        Self::validate(buffer_size, min_block_size);
        Self::build(Region::from_parent(parent, buffer_size), min_block_size)
    }

    fn validate(buffer_size: usize, min_block_size: usize) {
        assert!(
            buffer_size.is_power_of_two(),
            "buffer size must be a power of two"
        );
        assert!(
            min_block_size.is_power_of_two(),
            "minimum block size must be a power of two"
        );
        assert!(
            min_block_size > 2 * POINTER_SIZE,
            "minimum block size must exceed two pointers"
        );

        let levels = level_count_for(buffer_size, min_block_size);
        assert!(levels > 1, "buffer must split into at least two levels");
        assert!(
            header_size_for(levels) < buffer_size,
            "header does not fit the buffer"
        );
    }

    fn build(region: Region<'a>, min_block_size: usize) -> Self {
        let buffer_size = region.size();
        let levels = level_count_for(buffer_size, min_block_size);
        let header_size = header_size_for(levels);
        let base = region.base().as_ptr();
        let table_size = data_table_size(levels);

        // The header layout is [free-list heads][paired bits][split bits],
        // each section pointer-aligned.
        let state = unsafe {
            BuddyState {
                free: FreeListTable::init(base, levels),
                allocated: AllocatedTable {
                    bits: BitTable::init(base.add(free_table_size(levels)), table_size),
                },
                split: SplitTable {
                    bits: BitTable::init(
                        base.add(free_table_size(levels) + table_size),
                        table_size,
                    ),
                },
                outstanding: 0,
            }
        };

        let mut allocator = Self {
            buffer_size,
            min_block_size,
            levels,
            header_size,
            region,
            state: Mutex::new(state),
        };
        allocator.reserve_header();

        info!(
            "buddy allocator created: {} byte buffer, {} byte minimum block, {} levels, {} byte header",
            buffer_size, min_block_size, levels, header_size
        );
        allocator
    }

    /// Mark the header region allocated at every level that intersects it,
    /// mark every ancestor of the header split, and seed the free lists
    /// with the first free block of each level.
    fn reserve_header(&mut self) {
        let buffer_size = self.buffer_size;
        let header_size = self.header_size;
        let levels = self.levels;
        let body_start = align_up(header_size, self.min_block_size);
        let base = self.region.base().as_ptr();
        let block_size_at = |level: usize| buffer_size >> level;

        let state = self.state.get_mut();

        // Free lists: the body decomposes into one block per level, each at
        // an odd index (even-index frontier blocks are the halves of a
        // coarser free block and are represented there instead).
        for level in 0..levels {
            let first_free = align_up(body_start, block_size_at(level));
            if first_free < buffer_size {
                let index = first_free / block_size_at(level);
                if index % 2 == 1 {
                    unsafe { state.free.push(level, base.add(first_free)) };
                }
            }
        }

        // Paired-allocated bits: toggle once per header-covered block. Fully
        // covered pairs cancel out, leaving exactly the half-covered pairs
        // set.
        for level in 1..levels {
            let covered_end = align_up(header_size, block_size_at(level));
            let first_free_index = if covered_end < buffer_size {
                covered_end / block_size_at(level)
            } else {
                1 << level
            };

            for index in 0..first_free_index {
                state.allocated.toggle(level, index);
            }
        }

        // Split bits: every block containing the header start is divided.
        for level in 0..levels - 1 {
            let block_size = block_size_at(level);
            let last_split = align_up(body_start, block_size) - block_size;
            let last_split_index = last_split / block_size;

            for index in 0..=last_split_index {
                state.split.set(level, index, true);
            }
        }
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels
    }

    /// Bytes reserved at the buffer start for the bookkeeping tables.
    #[inline]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Whether `pointer` lies inside this allocator's buffer.
    #[inline]
    pub fn contains(&self, pointer: NonNull<u8>) -> bool {
        self.region.contains(pointer)
    }

    /// Allocations handed out and not yet deallocated.
    pub fn outstanding_allocations(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Current free-list length per level, coarsest first. Diagnostic.
    pub fn free_list_lengths(&self) -> std::vec::Vec<usize> {
        let state = self.state.lock();
        (0..self.levels).map(|level| state.free.len(level)).collect()
    }

    /// Block size at `level`: the whole buffer halved `level` times.
    fn block_size_at(&self, level: usize) -> usize {
        debug_assert!(level < self.levels);
        self.buffer_size >> level
    }

    /// The level whose blocks are exactly `block_size` bytes.
    fn level_for(&self, block_size: usize) -> usize {
        debug_assert!(block_size.is_power_of_two());
        debug_assert!(block_size >= self.min_block_size && block_size <= self.buffer_size);
        shift_count(self.buffer_size / block_size)
    }

    /// Index of the block at `pointer` within `level`.
    fn block_index(&self, level: usize, pointer: *mut u8) -> usize {
        let offset = pointer as usize - self.region.base().as_ptr() as usize;
        debug_assert!(is_aligned(offset, self.block_size_at(level)));
        offset / self.block_size_at(level)
    }

    /// Pointer to the block at (`level`, `index`).
    fn block_pointer(&self, level: usize, index: usize) -> *mut u8 {
        debug_assert!(index < (1 << level));
        unsafe { self.region.base().as_ptr().add(index * self.block_size_at(level)) }
    }

    /// Locate the allocated block holding `pointer`: the deepest level where
    /// the pointer is block-aligned and the block is not itself split.
    fn allocated_block_info(&self, state: &BuddyState, pointer: NonNull<u8>) -> (usize, usize) {
        let offset = offset_from(self.region.base(), pointer);

        for level in 1..self.levels {
            if is_aligned(offset, self.block_size_at(level)) {
                let index = offset / self.block_size_at(level);
                if level == self.levels - 1 || !state.split.get(level, index) {
                    return (level, index);
                }
            }
        }

        fatal(AllocatorError::ForeignPointer {
            pointer: pointer.as_ptr() as usize,
        });
    }

    /// Split one free block at `level` into its two children, recursing
    /// toward the root when `level` itself has no free block. Splitting can
    /// never consume the root, so running out at level 1 is exhaustion.
    fn split_block(&self, state: &mut BuddyState, level: usize, requested: usize) {
        debug_assert!(level >= 1 && level < self.levels - 1);

        let mut block = state.free.start(level);
        if block.is_null() {
            if level == 1 {
                fatal(AllocatorError::OutOfCapacity {
                    requested,
                    available: 0,
                });
            }

            self.split_block(state, level - 1, requested);
            block = state.free.start(level);
            debug_assert!(!block.is_null());
        }

        let block = block as *mut u8;
        let index = self.block_index(level, block);

        unsafe { state.free.remove(level, block) };
        state.allocated.toggle(level, index);
        state.split.set(level, index, true);

        let child_level = level + 1;
        unsafe {
            state.free.push(child_level, block);
            state.free.push(child_level, block.add(self.block_size_at(child_level)));
        }
    }

    /// Merge the children of (`level`, `index`) back into it if both are
    /// free, then keep merging toward the root. Must be called right after
    /// one of the children returned to its free list.
    fn try_merge(&self, state: &mut BuddyState, level: usize, index: usize) {
        debug_assert!(level < self.levels - 1);

        let child_level = level + 1;
        let child_a = index << 1;
        let child_b = child_a + 1;

        // Clear pair bit here means the partner of the just-freed child is
        // free as well.
        if !state.allocated.get(child_level, child_a) {
            unsafe {
                state.free.remove(child_level, self.block_pointer(child_level, child_a));
                state.free.remove(child_level, self.block_pointer(child_level, child_b));
            }

            state.split.set(level, index, false);
            state.allocated.toggle(level, index);

            unsafe { state.free.push(level, self.block_pointer(level, index)) };

            if level > 1 {
                self.try_merge(state, level - 1, index >> 1);
            }
        }
    }
}

impl Allocator for BuddyAllocator<'_> {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        let block_size = cmp::max(size.next_power_of_two(), self.min_block_size);
        if block_size > self.max_allocation_size() {
            fatal(AllocatorError::OversizedAllocation {
                requested: size,
                max: self.max_allocation_size(),
            });
        }

        let level = self.level_for(block_size);
        debug_assert!(level >= 1);

        let mut state = self.state.lock();

        let mut block = state.free.start(level);
        if block.is_null() {
            if level == 1 {
                fatal(AllocatorError::OutOfCapacity {
                    requested: size,
                    available: 0,
                });
            }

            self.split_block(&mut state, level - 1, size);
            block = state.free.start(level);
            debug_assert!(!block.is_null());
        }

        let block = block as *mut u8;
        unsafe { state.free.remove(level, block) };

        let index = self.block_index(level, block);
        state.allocated.toggle(level, index);
        state.outstanding += 1;

        NonNull::new(block).expect("free-list entries are never null")
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        if !self.contains(pointer) {
            fatal(AllocatorError::ForeignPointer {
                pointer: pointer.as_ptr() as usize,
            });
        }

        let mut state = self.state.lock();

        let (level, index) = self.allocated_block_info(&state, pointer);
        debug_assert!(level >= 1 && level < self.levels);

        if state.outstanding == 0 {
            fatal(AllocatorError::DeallocateUnderflow);
        }
        state.outstanding -= 1;

        state.allocated.toggle(level, index);
        unsafe { state.free.push(level, pointer.as_ptr()) };

        self.try_merge(&mut state, level - 1, index >> 1);
    }

    fn max_allocation_size(&self) -> usize {
        self.buffer_size / 2
    }
}

impl Drop for BuddyAllocator<'_> {
    fn drop(&mut self) {
        let outstanding = self.state.get_mut().outstanding;
        if outstanding != 0 && !std::thread::panicking() {
            fatal(AllocatorError::OutstandingAllocations { count: outstanding });
        }
    }
}
