//! Database driver implementations.
//!
//! Each driver supplies a quoter, a type map and a generator for its
//! dialect, and (except Jet) a processor executing against a live
//! connection:
//!
//! - [`sqlserver`]: Microsoft SQL Server over Tiberius
//! - [`postgres`]: PostgreSQL over tokio-postgres
//! - [`sqlite`]: SQLite over sqlx
//! - [`jet`]: Microsoft Jet (Access), generator only
//! - [`common`]: the connectionless processor
//!
//! # Adding New Databases
//!
//! 1. Create a module under `drivers/` with its quoter, type map and generator
//! 2. Implement `Processor` if the database can be reached from Rust
//! 3. Return its aliases from `Generator::aliases` and register them in `DriverCatalog`

pub mod common;
pub mod jet;
pub mod postgres;
pub mod sqlite;
pub mod sqlserver;

pub use common::ConnectionlessProcessor;
pub use jet::{JetGenerator, JET, JET_ALIASES};
pub use postgres::{PostgresGenerator, PostgresProcessor, POSTGRES, POSTGRES_ALIASES};
pub use sqlite::{SqliteGenerator, SqliteProcessor, SQLITE, SQLITE_ALIASES};
pub use sqlserver::{SqlServerGenerator, SqlServerProcessor, SQLSERVER, SQLSERVER_ALIASES};
