//! PostgreSQL driver.
//!
//! - [`PostgresGenerator`]: SQL generation for PostgreSQL 12+
//! - [`PostgresProcessor`]: execution over tokio-postgres

mod dialect;
mod processor;

pub use dialect::{postgres_type_map, PostgresGenerator, PostgresQuoter, POSTGRES, POSTGRES_ALIASES};
pub use processor::PostgresProcessor;
