//! Cache implementations for multivec backends.

mod array_cache;

pub use array_cache::{ArrayCache, ArrayKey};
