//! Microsoft SQL Server driver.
//!
//! - [`SqlServerGenerator`]: SQL generation for SQL Server 2016+
//! - [`SqlServerProcessor`]: execution over Tiberius

mod dialect;
mod processor;

pub use dialect::{sqlserver_type_map, SqlServerGenerator, SqlServerQuoter, SQLSERVER, SQLSERVER_ALIASES};
pub use processor::{split_batches, SqlServerProcessor, TiberiusConnectionManager};
