//! Error taxonomy for the lineage and capability engine.
//!
//! Every fallible operation in this crate surfaces one of these variants to
//! its caller. Nothing here is retried internally: a failed operation leaves
//! the repository in whatever state the already-applied writes produced, and
//! the caller (the surrounding event layer) is responsible for reporting.

use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A capability operation was invoked on a facade that has no bound
    /// implementation. This is a programming-contract violation and is
    /// always propagated, never caught and retried.
    #[error("no implementation bound: expected {implementation}")]
    MissingImplementation { implementation: &'static str },

    /// A repository element failed a required stereotype or shape check,
    /// or an argument does not match the element it refers to.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Required repository structure is missing, or a tag that must be
    /// numeric failed to parse. A malformed repository is unrecoverable
    /// without operator intervention.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The target element is already locked by another holder. Reported
    /// before any mutation has happened; the operation aborts cleanly.
    #[error("element {element} is locked by {holder}")]
    LockUnavailable { element: String, holder: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable tag for reports and per-item failure lists.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingImplementation { .. } => "missing_implementation",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::LockUnavailable { .. } => "lock_unavailable",
        }
    }
}
