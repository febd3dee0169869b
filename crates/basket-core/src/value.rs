//! # Action Values
//!
//! The amounts a condition applies: fixed (`"+5"`, `"-12.50"`) or
//! percentage (`"-10%"`, `"8.25%"`).
//!
//! ## How an Action Moves a Value
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  running = base                                                         │
//! │                                                                         │
//! │  "+5"    → running = running + 5                                        │
//! │  "-10%"  → running = running + running × (-10 / 100)                    │
//! │  "abc"   → running unchanged (malformed, contributes nothing)           │
//! │                                                                         │
//! │  Multiple actions compound against the RUNNING value, in order.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Numeric Semantics
//! All arithmetic is `f64` with no rounding. Rounding and currency
//! display belong to the caller.
//!
//! ## Usage
//! ```rust
//! use basket_core::value::ActionValue;
//!
//! let discount: ActionValue = "-10%".parse().unwrap();
//! assert_eq!(discount.apply_to(200.0), 180.0);
//!
//! let fee = ActionValue::from(4.5);
//! assert_eq!(fee.apply_to(10.0), 14.5);
//! ```

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Action Value
// =============================================================================

/// A single adjustment amount.
///
/// ## Wire Format
/// Serialized as a string (`"-10%"`, `"5"`). Deserializes from a string or
/// a JSON number. Text that is neither a number nor a percentage is kept
/// as [`ActionValue::Malformed`] rather than rejected, so a bad record
/// degrades to "no adjustment" instead of failing the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawActionValue", into = "String")]
pub enum ActionValue {
    /// Added to the running value as-is (negative subtracts).
    Fixed(f64),

    /// Percent of the running value (negative subtracts).
    Percentage(f64),

    /// Unparseable input, kept verbatim.
    Malformed(String),
}

impl ActionValue {
    /// Applies this action to `running` and returns the new running value.
    pub fn apply_to(&self, running: f64) -> f64 {
        match self {
            ActionValue::Fixed(amount) => running + amount,
            ActionValue::Percentage(pct) => running + running * (pct / 100.0),
            ActionValue::Malformed(_) => running,
        }
    }

    /// Checks if this is a percentage action.
    #[inline]
    pub fn is_percentage(&self) -> bool {
        matches!(self, ActionValue::Percentage(_))
    }

    /// Checks if this value failed to parse.
    #[inline]
    pub fn is_malformed(&self) -> bool {
        matches!(self, ActionValue::Malformed(_))
    }

    /// Parses a textual action value. Never fails.
    pub fn parse_lossy(text: &str) -> Self {
        let trimmed = text.trim();

        let (number, percentage) = match trimmed.strip_suffix('%') {
            Some(inner) => (inner.trim(), true),
            None => (trimmed, false),
        };

        match number.parse::<f64>() {
            Ok(n) if n.is_finite() && percentage => ActionValue::Percentage(n),
            Ok(n) if n.is_finite() => ActionValue::Fixed(n),
            _ => ActionValue::Malformed(text.to_string()),
        }
    }
}

impl FromStr for ActionValue {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionValue::parse_lossy(s))
    }
}

impl From<&str> for ActionValue {
    fn from(text: &str) -> Self {
        ActionValue::parse_lossy(text)
    }
}

impl From<f64> for ActionValue {
    fn from(amount: f64) -> Self {
        if amount.is_finite() {
            ActionValue::Fixed(amount)
        } else {
            ActionValue::Malformed(amount.to_string())
        }
    }
}

/// Display gives the wire form: `5`, `-2.5`, `-10%`.
impl fmt::Display for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Fixed(amount) => write!(f, "{}", amount),
            ActionValue::Percentage(pct) => write!(f, "{}%", pct),
            ActionValue::Malformed(text) => f.write_str(text),
        }
    }
}

impl From<ActionValue> for String {
    fn from(value: ActionValue) -> Self {
        value.to_string()
    }
}

/// What a record may carry in its `value` slot.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawActionValue {
    Number(f64),
    Text(String),
}

impl From<RawActionValue> for ActionValue {
    fn from(raw: RawActionValue) -> Self {
        match raw {
            RawActionValue::Number(n) => ActionValue::from(n),
            RawActionValue::Text(text) => ActionValue::parse_lossy(&text),
        }
    }
}

// =============================================================================
// Condition Action
// =============================================================================

/// One step of a condition: a value plus the `inclusive` flag.
///
/// `inclusive` marks tax-inclusive amounts. It is carried through records
/// untouched and does not change the computed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionAction {
    pub value: ActionValue,

    #[serde(default)]
    pub inclusive: bool,
}

impl ConditionAction {
    /// Creates a non-inclusive action.
    pub fn new(value: impl Into<ActionValue>) -> Self {
        ConditionAction {
            value: value.into(),
            inclusive: false,
        }
    }

    /// Creates an action flagged as inclusive.
    pub fn inclusive(value: impl Into<ActionValue>) -> Self {
        ConditionAction {
            value: value.into(),
            inclusive: true,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed() {
        assert_eq!(ActionValue::parse_lossy("5"), ActionValue::Fixed(5.0));
        assert_eq!(ActionValue::parse_lossy("+5"), ActionValue::Fixed(5.0));
        assert_eq!(ActionValue::parse_lossy(" -12.5 "), ActionValue::Fixed(-12.5));
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(ActionValue::parse_lossy("10%"), ActionValue::Percentage(10.0));
        assert_eq!(ActionValue::parse_lossy("-5%"), ActionValue::Percentage(-5.0));
        assert_eq!(ActionValue::parse_lossy("+8.25 %"), ActionValue::Percentage(8.25));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(ActionValue::parse_lossy("ten").is_malformed());
        assert!(ActionValue::parse_lossy("%").is_malformed());
        assert!(ActionValue::parse_lossy("").is_malformed());
        assert!(ActionValue::parse_lossy("inf").is_malformed());
    }

    #[test]
    fn test_apply() {
        assert_eq!(ActionValue::Fixed(5.0).apply_to(100.0), 105.0);
        assert_eq!(ActionValue::Fixed(-5.0).apply_to(100.0), 95.0);
        assert_eq!(ActionValue::Percentage(10.0).apply_to(500.0), 550.0);
        assert_eq!(ActionValue::Percentage(-50.0).apply_to(80.0), 40.0);
        assert_eq!(ActionValue::Malformed("x".into()).apply_to(80.0), 80.0);
    }

    #[test]
    fn test_display_is_wire_form() {
        assert_eq!(ActionValue::Fixed(5.0).to_string(), "5");
        assert_eq!(ActionValue::Fixed(-2.5).to_string(), "-2.5");
        assert_eq!(ActionValue::Percentage(-10.0).to_string(), "-10%");
        assert_eq!(ActionValue::Malformed("oops".into()).to_string(), "oops");
    }

    #[test]
    fn test_serde_accepts_numbers_and_strings() {
        let action: ConditionAction = serde_json::from_str(r#"{"value": 7}"#).unwrap();
        assert_eq!(action.value, ActionValue::Fixed(7.0));
        assert!(!action.inclusive);

        let action: ConditionAction =
            serde_json::from_str(r#"{"value": "-5%", "inclusive": true}"#).unwrap();
        assert_eq!(action.value, ActionValue::Percentage(-5.0));
        assert!(action.inclusive);

        let json = serde_json::to_value(ConditionAction::new("-5%")).unwrap();
        assert_eq!(json["value"], "-5%");
    }
}
