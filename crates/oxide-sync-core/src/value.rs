//! Normalized scalar values and SQL literal escaping.

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A normalized scalar cell value.
///
/// Adapters decode binary payloads to text, so every database value maps to
/// one of these variants. `Null` is kept distinct from an empty `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text (including decoded binary data).
    Text(String),
}

impl Value {
    /// Returns `true` for SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text form used for equality and keying.
    ///
    /// NULL has no text form.
    #[must_use]
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(Cow::Borrowed(if *b { "1" } else { "0" })),
            Self::Int(i) => Some(Cow::Owned(i.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
        }
    }

    /// Builds a value from the text an adapter fetched for a column of the
    /// given declared type.
    ///
    /// Integer and boolean column types are converted back to typed values
    /// when the text parses; everything else stays text so that decimals and
    /// timestamps keep their exact rendering.
    #[must_use]
    pub fn from_column_text(declared_type: &str, text: Option<String>) -> Self {
        let Some(text) = text else {
            return Self::Null;
        };
        if integer_type_re().is_match(declared_type) {
            if let Ok(i) = text.trim().parse::<i64>() {
                return Self::Int(i);
            }
        } else if boolean_type_re().is_match(declared_type) {
            match text.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => return Self::Bool(true),
                "0" | "f" | "false" => return Self::Bool(false),
                _ => {}
            }
        }
        Self::Text(text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Renders a value as a SQL literal.
#[must_use]
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => quote_literal(s),
    }
}

/// Wraps text in single quotes, doubling embedded single quotes.
#[must_use]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Parses a single-quoted SQL string literal back into its text.
///
/// Returns `None` when the input is not a well-formed quoted literal.
#[must_use]
pub fn unescape_literal(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\'' {
            // A lone quote would have ended the literal.
            if chars.next() != Some('\'') {
                return None;
            }
        }
        out.push(ch);
    }
    Some(out)
}

fn integer_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(tiny|small|medium|big)?int(eger)?[0-9]*\b").expect("valid regex")
    })
}

fn boolean_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*bool(ean)?\b").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value(&Value::Null), "NULL");
        assert_eq!(escape_value(&Value::Int(-42)), "-42");
        assert_eq!(escape_value(&Value::Float(1.5)), "1.5");
        assert_eq!(escape_value(&Value::Bool(true)), "1");
        assert_eq!(escape_value(&Value::Bool(false)), "0");
        assert_eq!(escape_value(&Value::from("abc")), "'abc'");
        assert_eq!(escape_value(&Value::from("")), "''");
    }

    #[test]
    fn test_embedded_quote_round_trip() {
        let escaped = escape_value(&Value::from("O'Brien"));
        assert_eq!(escaped, "'O''Brien'");
        assert_eq!(unescape_literal(&escaped).as_deref(), Some("O'Brien"));
    }

    #[test]
    fn test_unescape_rejects_malformed() {
        assert_eq!(unescape_literal("abc"), None);
        assert_eq!(unescape_literal("'a'b'"), None);
        assert_eq!(unescape_literal("'"), None);
        assert_eq!(unescape_literal("''").as_deref(), Some(""));
    }

    #[test]
    fn test_null_distinct_from_empty_text() {
        assert_eq!(Value::Null.text(), None);
        assert_eq!(Value::from("").text().as_deref(), Some(""));
        assert_ne!(Value::Null.text(), Value::from("").text());
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_text_form_ignores_underlying_type() {
        assert_eq!(Value::Int(7).text(), Value::from("7").text());
        assert_eq!(Value::Bool(true).text(), Value::Int(1).text());
    }

    #[test]
    fn test_from_column_text() {
        assert_eq!(
            Value::from_column_text("INTEGER", Some("12".into())),
            Value::Int(12)
        );
        assert_eq!(
            Value::from_column_text("bigint", Some("-3".into())),
            Value::Int(-3)
        );
        assert_eq!(
            Value::from_column_text("int(11) unsigned", Some("5".into())),
            Value::Int(5)
        );
        assert_eq!(
            Value::from_column_text("boolean", Some("true".into())),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from_column_text("DECIMAL(10,2)", Some("1.50".into())),
            Value::from("1.50")
        );
        assert_eq!(
            Value::from_column_text("point", Some("1".into())),
            Value::from("1")
        );
        assert_eq!(Value::from_column_text("INTEGER", None), Value::Null);
    }

    #[test]
    fn test_untagged_serde() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(3),
            Value::from("x"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,3,"x"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
