//! Processors shared by every dialect.

mod connectionless;

pub use connectionless::ConnectionlessProcessor;
