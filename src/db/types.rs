//! Value and row types for diagnostic results.
//!
//! Defines the structures used to represent bind parameters and result
//! rows coming back from the server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A row from a diagnostic query: column name mapped to a scalar value.
pub type DiagnosticRow = BTreeMap<String, Value>;

/// One scalar cell: a named bind parameter going in, or a result value
/// coming back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Postgres integer array, bound for `= any(...)` membership filters.
    IntArray(Vec<i64>),
    /// Postgres text array, bound for `= any(...)` membership filters.
    TextArray(Vec<String>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as text, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::IntArray(v) => write!(f, "{v:?}"),
            Value::TextArray(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident via $convert:expr),* $(,)?) => {
        $(impl From<$source> for Value {
            fn from(v: $source) -> Self {
                Value::$variant($convert(v))
            }
        })*
    };
}

value_from! {
    bool => Bool via std::convert::identity,
    i32 => Int via i64::from,
    i64 => Int via std::convert::identity,
    f64 => Float via std::convert::identity,
    String => String via std::convert::identity,
    &str => String via str::to_string,
    Vec<i64> => IntArray via std::convert::identity,
    Vec<String> => TextArray via std::convert::identity,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Server version as an ordered (major, minor, patch) tuple.
///
/// Comparison is lexicographic; a missing patch component is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerVersion(pub u32, pub u32, pub u32);

impl ServerVersion {
    /// Parses a `server_version` setting string, e.g. `"15.4"`,
    /// `"16.1 (Debian 16.1-1)"` or `"17beta1"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let head = raw
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::internal(format!("empty server version string: {raw:?}")))?;

        let mut parts = head.split('.').map(|p| {
            // Trim non-numeric suffixes such as "beta1" or "rc2".
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits
                .parse::<u32>()
                .map_err(|_| Error::internal(format!("unparseable server version: {raw:?}")))
        });

        let major = parts.next().transpose()?.unwrap_or(0);
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);
        Ok(Self(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Presence and version of an optional server extension.
///
/// Derived fresh for each inspection call; never cached, since server
/// state may change between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStatus {
    /// True if the extension is installed.
    pub present: bool,
    /// Reported extension version when installed.
    pub version: Option<String>,
}

impl ExtensionStatus {
    /// Status for an installed extension with the given version.
    pub fn present(version: impl Into<String>) -> Self {
        Self {
            present: true,
            version: Some(version.into()),
        }
    }

    /// Status for an extension that is not installed.
    pub fn absent() -> Self {
        Self {
            present: false,
            version: None,
        }
    }
}
