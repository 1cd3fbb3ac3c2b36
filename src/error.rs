//! Error types for pgscope.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Classification of a server-side statement rejection, derived from the
/// SQLSTATE code the server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    /// Undefined table, column, function, or other object (e.g. 42P01).
    UndefinedObject,
    /// SQL syntax error (42601).
    Syntax,
    /// Datatype mismatch or invalid text representation.
    InvalidType,
    /// Any other statement-level rejection.
    Other,
}

impl std::fmt::Display for StatementErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedObject => write!(f, "undefined object"),
            Self::Syntax => write!(f, "syntax error"),
            Self::InvalidType => write!(f, "invalid type"),
            Self::Other => write!(f, "statement error"),
        }
    }
}

/// Main error type for pgscope operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The dedicated connection could not be established or was lost
    /// (host unreachable, auth failed, TLS/CA failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected a submitted statement. Propagated verbatim,
    /// never retried.
    #[error("Statement error ({kind}): {message}")]
    Statement {
        kind: StatementErrorKind,
        message: String,
    },

    /// The explain gate refused a non-read-only statement. Raised before
    /// any network round-trip.
    #[error("Statement not permitted: {0}")]
    NotPermitted(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (binding collisions, unbound placeholders, bugs).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Connection error from any displayable cause.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Statement error of the given kind.
    pub fn statement(kind: StatementErrorKind, msg: impl Into<String>) -> Self {
        Self::Statement {
            kind,
            message: msg.into(),
        }
    }

    /// Gate refusal carrying the offending statement.
    pub fn not_permitted(msg: impl Into<String>) -> Self {
        Self::NotPermitted(msg.into())
    }

    /// Configuration error from any displayable cause.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Internal invariant violation.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short category label, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Statement { .. } => "statement",
            Self::NotPermitted(_) => "not_permitted",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias using pgscope's Error.
pub type Result<T> = std::result::Result<T, Error>;
