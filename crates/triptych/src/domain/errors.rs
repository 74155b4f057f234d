//! Domain-specific errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComponentError {
    /// Every discovery strategy came back with too few members.
    #[error("component has no resolvable parts: {path}")]
    ResolutionExhausted { path: PathBuf },

    /// The combined document is not well-formed block markup.
    #[error("malformed combined document at byte {offset}: {reason}")]
    ParseFailure { reason: String, offset: usize },

    /// A fragment file disappeared between split and merge.
    #[error("fragment file missing at merge time: {missing}")]
    MergeConflict { missing: PathBuf },

    /// The host never confirmed a requested operation.
    #[error("host confirmation not received within {waited:?}")]
    Timeout { waited: Duration },

    /// A save notification arrived for a path no split component owns.
    #[error("no split component owns fragment {path}")]
    UnknownFragment { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
