//! The version table: the durable record of applied migrations.

mod loader;
mod metadata;

pub use loader::{AppliedVersion, VersionLoader};
pub use metadata::VersionTableMetadata;
