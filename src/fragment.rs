//! Composable parameterized SQL fragments.
//!
//! A fragment pairs SQL text containing named `%(name)s` placeholders with
//! the values bound to those names. Caller-supplied values never appear in
//! the text itself; they travel through the bindings and are rendered to
//! positional `$n` placeholders immediately before execution.

use std::collections::BTreeMap;

use crate::db::types::Value;
use crate::error::{Error, Result};

/// An immutable pair of SQL text and named parameter bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    text: String,
    bindings: BTreeMap<String, Value>,
}

impl SqlFragment {
    /// Creates an empty fragment with no bindings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a fragment from constant SQL text with no bindings.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Creates a fragment from text and an explicit binding set.
    pub fn with_bindings(
        text: impl Into<String>,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        Self {
            text: text.into(),
            bindings: bindings.into_iter().collect(),
        }
    }

    /// The SQL text with its named placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The named parameter bindings.
    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }

    /// Returns true if the fragment has no text and no bindings.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.bindings.is_empty()
    }

    /// Concatenates another fragment onto this one.
    ///
    /// Binding names must be unique within a composed statement; a
    /// collision is an internal error, never silently resolved.
    pub fn concat(mut self, other: SqlFragment) -> Result<SqlFragment> {
        for (name, value) in other.bindings {
            if self.bindings.contains_key(&name) {
                return Err(Error::internal(format!(
                    "binding name collision while composing SQL: {name}"
                )));
            }
            self.bindings.insert(name, value);
        }
        self.text.push_str(&other.text);
        Ok(self)
    }

    /// Renders the fragment to positional `$n` placeholders plus the bind
    /// values in placeholder order.
    ///
    /// Repeated references to one name share one ordinal. A placeholder
    /// without a binding is an internal error.
    pub fn render(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = String::with_capacity(self.text.len());
        let mut ordered: Vec<(String, Value)> = Vec::new();
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find("%(") {
            let after = &rest[start + 2..];
            let end = after.find(")s").ok_or_else(|| {
                Error::internal(format!("unterminated placeholder in SQL: {rest:?}"))
            })?;
            let name = &after[..end];

            sql.push_str(&rest[..start]);
            let ordinal = match ordered.iter().position(|(n, _)| n == name) {
                Some(idx) => idx + 1,
                None => {
                    let value = self.bindings.get(name).ok_or_else(|| {
                        Error::internal(format!("placeholder %({name})s has no binding"))
                    })?;
                    ordered.push((name.to_string(), value.clone()));
                    ordered.len()
                }
            };
            sql.push('$');
            sql.push_str(&ordinal.to_string());

            rest = &after[end + 2..];
        }
        sql.push_str(rest);

        Ok((sql, ordered.into_iter().map(|(_, v)| v).collect()))
    }
}

/// Builds a LIMIT clause fragment.
///
/// Absent or non-positive values produce an empty fragment: no limiting
/// applied. The integer is never embedded in the text.
pub fn limit_clause(value: Option<i64>) -> SqlFragment {
    match value {
        Some(v) if v > 0 => {
            SqlFragment::with_bindings(" limit %(limit)s", [("limit".to_string(), Value::Int(v))])
        }
        _ => SqlFragment::empty(),
    }
}

/// Builds an OFFSET clause fragment, with the same policy as [`limit_clause`].
pub fn offset_clause(value: Option<i64>) -> SqlFragment {
    match value {
        Some(v) if v > 0 => SqlFragment::with_bindings(
            " offset %(offset)s",
            [("offset".to_string(), Value::Int(v))],
        ),
        _ => SqlFragment::empty(),
    }
}

/// Builds a CASE ranking expression over `column_expression` from an
/// ordered priority list.
///
/// Entry `i` of the ranking binds `db_val_i` to the value and `db_rank_i`
/// to `i`; the default case binds `def_case_val` to the entry count so
/// unranked values sort last. The CASE result is cast to text and
/// concatenated with the column expression, so ties among unranked values
/// fall back to the column's natural order.
pub fn ranking_case_clause(column_expression: &str, ranking: &[String]) -> SqlFragment {
    if ranking.is_empty() {
        return SqlFragment::empty();
    }

    let mut text = format!("case {column_expression}");
    let mut bindings = BTreeMap::new();

    for (i, value) in ranking.iter().enumerate() {
        text.push_str(&format!(" when %(db_val_{i})s then %(db_rank_{i})s"));
        bindings.insert(format!("db_val_{i}"), Value::String(value.clone()));
        bindings.insert(format!("db_rank_{i}"), Value::Int(i as i64));
    }

    text.push_str(&format!(
        " else %(def_case_val)s end::text || {column_expression}"
    ));
    bindings.insert(
        "def_case_val".to_string(),
        Value::Int(ranking.len() as i64),
    );

    SqlFragment { text, bindings }
}
