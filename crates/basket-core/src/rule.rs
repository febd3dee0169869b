//! # Eligibility Rules
//!
//! A rule compares one field of the owning Item/Cart against a literal:
//! `price <= 125.00`, `quantity > 2`, `brand == "acme"`.
//!
//! ## Evaluation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rule::parse("price <= 125")                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare { field: "price", op: Le, value: Number(125) }                 │
//! │       │                                                                 │
//! │       ▼  holds(entity)                                                  │
//! │  entity.field("price") ──► Some(Number(99.0)) ──► 99 <= 125 ──► true    │
//! │                                                                         │
//! │  Fails closed:                                                          │
//! │    unknown field          → false                                       │
//! │    unparseable rule text  → Malformed(..) → false                       │
//! │    text vs ordering op    → false                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules are data: they serialize as their text form and evaluation has no
//! side effects.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Field Values
// =============================================================================

/// A scalar read from an entity, or written as a rule literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Converts a JSON scalar. Arrays, objects and null have no field value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            _ => None,
        }
    }

    /// Numeric view: numbers as-is, numeric text parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Equality used by search: numbers (and numeric text) compare by
    /// value, other text compares exactly.
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Anything a rule can be evaluated against.
///
/// Implemented by [`crate::Item`] and [`crate::Cart`].
pub trait FieldSource {
    /// Looks up a field by name. `None` means the field does not exist.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    /// Operator tokens, longest first so `<=` wins over `<`.
    const TOKENS: [(&'static str, CompareOp); 7] = [
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
        ("=", CompareOp::Eq),
    ];

    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Rule
// =============================================================================

/// One eligibility expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rule {
    /// `field op value`
    Compare {
        field: String,
        op: CompareOp,
        value: FieldValue,
    },

    /// Text that could not be parsed. Never holds.
    Malformed(String),
}

impl Rule {
    /// Builds a comparison rule directly.
    pub fn compare(field: impl Into<String>, op: CompareOp, value: FieldValue) -> Self {
        Rule::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    /// Parses rule text. Unparseable text yields [`Rule::Malformed`].
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::rule::{CompareOp, FieldValue, Rule};
    ///
    /// let rule = Rule::parse("price <= 125.00");
    /// assert_eq!(rule, Rule::compare("price", CompareOp::Le, FieldValue::Number(125.0)));
    ///
    /// assert!(matches!(Rule::parse("price"), Rule::Malformed(_)));
    /// ```
    pub fn parse(text: &str) -> Self {
        Self::try_parse(text).unwrap_or_else(|| Rule::Malformed(text.to_string()))
    }

    fn try_parse(text: &str) -> Option<Self> {
        let start = text.find(|c| matches!(c, '<' | '>' | '=' | '!'))?;
        let field = text[..start].trim();
        if field.is_empty()
            || !field
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            return None;
        }

        let rest = &text[start..];
        let (token, op) = CompareOp::TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))?;

        let literal = rest[token.len()..].trim();
        let value = parse_literal(literal)?;

        Some(Rule::compare(field, *op, value))
    }

    /// Returns true if this rule holds for `entity`.
    pub fn holds<E: FieldSource + ?Sized>(&self, entity: &E) -> bool {
        let (field, op, expected) = match self {
            Rule::Compare { field, op, value } => (field, op, value),
            Rule::Malformed(_) => return false,
        };

        let Some(actual) = entity.field(field) else {
            return false;
        };

        let ordering = match (&actual, expected) {
            (FieldValue::Text(a), FieldValue::Text(b)) => {
                // Text only supports equality checks
                if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return false;
                }
                a.cmp(b)
            }
            _ => match (actual.as_number(), expected.as_number()) {
                (Some(a), Some(b)) => match a.partial_cmp(&b) {
                    Some(ordering) => ordering,
                    None => return false,
                },
                _ => return false,
            },
        };

        op.accepts(ordering)
    }

    /// Checks if the rule text failed to parse.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Rule::Malformed(_))
    }
}

fn parse_literal(literal: &str) -> Option<FieldValue> {
    if literal.is_empty() {
        return None;
    }

    for quote in ['"', '\''] {
        if let Some(inner) = literal
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Some(FieldValue::Text(inner.to_string()));
        }
    }

    match literal.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(FieldValue::Number(n)),
        _ => Some(FieldValue::Text(literal.to_string())),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Compare { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Rule::Malformed(text) => f.write_str(text),
        }
    }
}

impl From<String> for Rule {
    fn from(text: String) -> Self {
        Rule::parse(&text)
    }
}

impl From<&str> for Rule {
    fn from(text: &str) -> Self {
        Rule::parse(text)
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
