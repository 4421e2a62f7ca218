//! Shared SQL rendering building blocks.
//!
//! - [`generator`]: base statement rendering used by every dialect generator
//! - [`typemap`]: ordered-threshold type map

pub mod generator;
pub mod typemap;

pub use typemap::TypeMapBase;
