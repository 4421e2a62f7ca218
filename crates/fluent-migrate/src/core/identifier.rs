//! Identifier validation and bracket/quote escaping shared by all dialects.
//!
//! SQL identifiers cannot be sent as parameters, so generators embed them in
//! the statement text. Every identifier is validated when an expression is
//! checked, then wrapped in the dialect's quote characters with the closing
//! character doubled.

use crate::error::{MigrateError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - SQLite: unlimited
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `MigrateError::Generation` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MigrateError::Generation(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Generation(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Generation(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Wrap `name` in `open`/`close`, doubling any embedded `close`.
///
/// ```ignore
/// assert_eq!(wrap("users", "[", "]"), "[users]");
/// assert_eq!(wrap("table]name", "[", "]"), "[table]]name]");
/// ```
pub fn wrap(name: &str, open: &str, close: &str) -> String {
    let doubled = format!("{}{}", close, close);
    format!("{}{}{}", open, name.replace(close, &doubled), close)
}

/// Whether `name` is already wrapped in `open`/`close`.
pub fn is_wrapped(name: &str, open: &str, close: &str) -> bool {
    name.len() >= open.len() + close.len() && name.starts_with(open) && name.ends_with(close)
}

/// Strip `open`/`close` and undouble embedded `close`. Unwrapped input is returned as-is.
pub fn unwrap(name: &str, open: &str, close: &str) -> String {
    if !is_wrapped(name, open, close) {
        return name.to_string();
    }
    let inner = &name[open.len()..name.len() - close.len()];
    let doubled = format!("{}{}", close, close);
    inner.replace(&doubled, close)
}
