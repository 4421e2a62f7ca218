//! SQLite driver.
//!
//! - [`SqliteGenerator`]: SQL generation for SQLite 3.35+
//! - [`SqliteProcessor`]: execution over sqlx

mod dialect;
mod processor;

pub use dialect::{sqlite_type_map, SqliteGenerator, SqliteQuoter, SQLITE, SQLITE_ALIASES};
pub use processor::SqliteProcessor;
