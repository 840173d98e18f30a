/*!
 * Typed Pools
 * Object-granular facades over the block and small-object allocators
 */

mod object_pool;
mod small_object_pool;

pub use object_pool::{ObjectPool, PagedObjectPool};
pub use small_object_pool::SmallObjectPool;
