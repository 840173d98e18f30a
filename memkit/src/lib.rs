/*!
 * memkit
 * Composable custom memory allocators with scoped owners and container adapters
 */

pub mod adapter;
pub mod allocators;
pub mod core;
pub mod pool;
pub mod scoped;

pub use adapter::{hash_map_in, hash_set_in, vec_in, AllocRef, HashMap, HashSet, Vec};
pub use allocators::{
    Allocator, BlockAllocator, BuddyAllocator, LinearAllocator, PagedBlockAllocator,
    PagedLinearAllocator, SmallObjectAllocator,
};
pub use self::core::error::AllocatorError;
pub use pool::{ObjectPool, PagedObjectPool, SmallObjectPool};
pub use scoped::{Shared, Unique, UniqueArray};
