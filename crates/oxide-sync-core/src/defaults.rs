//! Column default-value classification.
//!
//! A default is rendered either raw (numbers, keywords, expressions) or as a
//! quoted string literal. The decision is an ordered list of rules; the first
//! rule whose predicate matches wins and anything unmatched is quoted.
//! Exotic defaults may be classified wrongly but never fail.

use std::sync::OnceLock;

use regex::Regex;

use crate::value::quote_literal;

/// How a default value is written into a column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRendering {
    /// Emitted verbatim.
    Raw,
    /// Emitted as a single-quoted string literal.
    Quoted,
}

/// A single classification rule.
pub struct DefaultRule {
    /// Rule name, for diagnostics.
    pub name: &'static str,
    /// Predicate over the raw default text.
    pub matches: fn(&str) -> bool,
    /// Rendering applied when the predicate matches.
    pub rendering: DefaultRendering,
}

/// Defaults that are always emitted unquoted (compared case-insensitively).
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "NOW()",
    "TRUE",
    "FALSE",
];

/// The classification rules, in evaluation order.
pub static DEFAULT_RULES: [DefaultRule; 4] = [
    DefaultRule {
        name: "numeric",
        matches: is_numeric_literal,
        rendering: DefaultRendering::Raw,
    },
    DefaultRule {
        name: "keyword",
        matches: is_keyword,
        rendering: DefaultRendering::Raw,
    },
    DefaultRule {
        name: "function-call",
        matches: is_function_call,
        rendering: DefaultRendering::Raw,
    },
    DefaultRule {
        name: "expression",
        matches: is_parenthesized,
        rendering: DefaultRendering::Raw,
    },
];

/// Returns the rendering chosen for a default value.
#[must_use]
pub fn classify_default(value: &str) -> DefaultRendering {
    DEFAULT_RULES
        .iter()
        .find(|rule| (rule.matches)(value))
        .map_or(DefaultRendering::Quoted, |rule| rule.rendering)
}

/// Renders a default value for a column definition.
#[must_use]
pub fn render_default(value: &str) -> String {
    match classify_default(value) {
        DefaultRendering::Raw => value.to_string(),
        DefaultRendering::Quoted => quote_literal(value),
    }
}

/// Optional leading minus, digits, at most one decimal point.
#[must_use]
pub fn is_numeric_literal(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?([0-9]+\.?[0-9]*|\.[0-9]+)$").expect("valid regex"))
        .is_match(value)
}

/// One of [`DEFAULT_KEYWORDS`], ignoring case.
#[must_use]
pub fn is_keyword(value: &str) -> bool {
    DEFAULT_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(value))
}

/// Ends with `()`, e.g. `uuid()`.
#[must_use]
pub fn is_function_call(value: &str) -> bool {
    value.ends_with("()")
}

/// Starts with `(`, e.g. `(now() + interval 1 day)`.
#[must_use]
pub fn is_parenthesized(value: &str) -> bool {
    value.starts_with('(')
}
