//! Rich diagnostic error types for the dianoia engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes, help text, and source chains so callers
//! know exactly what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the dianoia engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum DianoiaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persist(#[from] PersistError),
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DomainError {
    #[error("duplicate {namespace} id: {id}")]
    #[diagnostic(
        code(dianoia::domain::duplicate_id),
        help(
            "Every id must be unique within its namespace. \
             The object was not inserted; rename it or remove the existing one."
        )
    )]
    DuplicateId { namespace: &'static str, id: String },

    #[error("unknown {namespace} id: {id}")]
    #[diagnostic(
        code(dianoia::domain::unknown_id),
        help("No object with this id exists in the knowledge base. Check the id for typos.")
    )]
    UnknownId { namespace: &'static str, id: String },

    #[error("composite condition needs at least one operand")]
    #[diagnostic(
        code(dianoia::domain::empty_composite),
        help("And/Or/MofN conditions require one or more operands. Provide at least one.")
    )]
    EmptyComposite,

    #[error("invalid m-of-n bounds: min {min}, max {max} over {operands} operand(s)")]
    #[diagnostic(
        code(dianoia::domain::mofn_bounds),
        help("An m-of-n condition must satisfy 0 <= min <= max <= operand count.")
    )]
    MofNBounds {
        min: usize,
        max: usize,
        operands: usize,
    },

    #[error("interval lower bound {lo} exceeds upper bound {hi}")]
    #[diagnostic(
        code(dianoia::domain::interval_bounds),
        help("Numerical intervals must satisfy lo <= hi. Swap the bounds or fix the source value.")
    )]
    IntervalBounds { lo: f64, hi: f64 },
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("container index unusable: {message}")]
    #[diagnostic(
        code(dianoia::persist::structural),
        help(
            "The container's primary index is missing, unparsable, or names no \
             primary document. Nothing could be loaded — the source is not a \
             usable knowledge-base container."
        )
    )]
    Structural { message: String },

    #[error("document {location} unreadable: {message}")]
    #[diagnostic(
        code(dianoia::persist::document),
        help(
            "A document referenced by the container index could not be read or \
             parsed. The container may be truncated or hand-edited."
        )
    )]
    Document { location: String, message: String },

    #[error("archive error at {path}: {message}")]
    #[diagnostic(
        code(dianoia::persist::archive),
        help(
            "The container archive could not be opened, extracted, or written. \
             Check the path, permissions, and free disk space. A failed save \
             leaves any partially written archive in place."
        )
    )]
    Archive { path: String, message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(dianoia::persist::io),
        help("A filesystem operation failed. Check permissions and free space.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),
}

impl From<std::io::Error> for PersistError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// Convenience alias for functions returning dianoia results.
pub type DianoiaResult<T> = std::result::Result<T, DianoiaError>;
