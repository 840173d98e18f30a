/*!
 * Scoped Owners
 * RAII handles that construct in, and destruct through, an allocator
 */

mod shared;
mod unique;

pub use shared::Shared;
pub use unique::{Unique, UniqueArray};
