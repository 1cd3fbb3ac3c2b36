//! Read-only statement gate for the explain path.
//!
//! Classifies a candidate statement by its normalized leading keyword and
//! an explicit unsafe-keyword set, so the gate stays auditable. This is a
//! defense-in-depth check independent of the server's own enforcement:
//! the diagnostic endpoint must never be usable to mutate state.

/// Classification of a candidate SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The statement starts with a read-only construct and may be explained.
    ReadOnly,
    /// The statement could mutate server state and must be rejected.
    Unsafe,
}

/// Leading keywords accepted as read-only.
const READ_ONLY_KEYWORDS: &[&str] = &["select", "with", "table", "values", "show"];

/// Leading keywords rejected outright. DDL/DML roots plus transaction
/// control and maintenance commands.
const UNSAFE_KEYWORDS: &[&str] = &[
    "analyze", "create", "drop", "alter", "commit", "rollback", "insert", "update", "delete",
    "truncate", "grant", "revoke", "vacuum", "reindex", "set", "copy", "call", "do", "begin",
    "merge",
];

/// Classifies a statement by its leading keyword.
///
/// Whitespace and case are normalized first. Unknown leading tokens
/// (including empty input) classify as unsafe: the gate fails closed.
pub fn classify(statement: &str) -> Classification {
    let normalized = statement.trim().to_lowercase();
    let leading = normalized
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .unwrap_or("");

    if UNSAFE_KEYWORDS.contains(&leading) {
        return Classification::Unsafe;
    }
    if READ_ONLY_KEYWORDS.contains(&leading) {
        return Classification::ReadOnly;
    }
    // Unknown leading tokens fail closed.
    Classification::Unsafe
}

/// Returns true if the statement classifies as read-only.
pub fn is_read_only(statement: &str) -> bool {
    classify(statement) == Classification::ReadOnly
}
