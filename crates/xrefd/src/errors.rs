use std::error::Error;
use std::fmt::{self, Display};

/// Typed errors raised by the reference resolver itself. Catalog and
/// bundle errors are propagated unchanged through `anyhow`.
#[derive(Debug)]
pub enum ResolveError {
    /// The originating dump id was not found in the catalog.
    MissingDump(i64),
    /// The client supplied a cursor blob we could not decode, or one
    /// carrying a phase this version does not know.
    InvalidCursor(String),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MissingDump(id) => write!(f, "dump not found: {}", id),
            ResolveError::InvalidCursor(reason) => write!(f, "invalid cursor: {}", reason),
        }
    }
}

impl Error for ResolveError {}
