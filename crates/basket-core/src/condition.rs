//! # Conditions
//!
//! A condition is a named, typed pricing adjustment: a discount, a tax, a
//! shipping fee, or any user-defined category.
//!
//! ## Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Condition                                                              │
//! │  ├── name     "SALE 5%"         aggregation key for breakdowns          │
//! │  ├── type     "discount"        decides WHEN it runs (type order)       │
//! │  ├── target   subtotal          unit price or subtotal                  │
//! │  ├── actions  ["-5%"]           applied in order, compounding           │
//! │  └── rules    ["price > 50"]    ALL must hold, else contributes 0       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A condition is immutable once built. [`Condition::apply`] is a pure
//! function of the actions, the rules and the base value; the result is
//! returned, never cached on the condition.
//!
//! The serialized form of a [`Condition`] is the persisted condition record
//! `{ name, type, target, actions: [{value, inclusive}], rules: [..] }`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rule::{FieldSource, Rule};
use crate::value::{ActionValue, ConditionAction};

// =============================================================================
// Well-known Types
// =============================================================================

/// Type name for discounts.
pub const DISCOUNT: &str = "discount";

/// Type name for taxes.
pub const TAX: &str = "tax";

/// Type name for shipping fees.
pub const SHIPPING: &str = "shipping";

/// Type name for everything else.
pub const OTHER: &str = "other";

// =============================================================================
// Target
// =============================================================================

/// What a condition modifies.
///
/// Records may spell it `price`/`item` or `subtotal`/`total`, in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Target {
    /// The unit price, before quantity multiplication.
    Price,

    /// The subtotal, after quantity multiplication and price conditions.
    #[default]
    Subtotal,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Price => write!(f, "price"),
            Target::Subtotal => write!(f, "subtotal"),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" | "item" => Ok(Target::Price),
            "subtotal" | "total" => Ok(Target::Subtotal),
            other => Err(format!(
                "Unknown condition target: '{}'. Valid options: price, subtotal",
                other
            )),
        }
    }
}

impl TryFrom<String> for Target {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// Condition Result
// =============================================================================

/// Outcome of applying one condition to one base value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionResult {
    /// Whether every rule held.
    pub eligible: bool,

    /// Net change against the base value (0 when ineligible).
    pub delta: f64,
}

impl ConditionResult {
    const INELIGIBLE: ConditionResult = ConditionResult {
        eligible: false,
        delta: 0.0,
    };

    /// The base value after this result is applied.
    pub fn value(&self, base: f64) -> f64 {
        base + self.delta
    }
}

// =============================================================================
// Condition
// =============================================================================

/// A pricing adjustment rule.
///
/// ## Example
/// ```rust
/// use basket_core::condition::{Condition, Target, TAX};
///
/// let vat = Condition::new("VAT 10%", TAX, Target::Subtotal).with_action("10%");
/// # struct Nothing;
/// # impl basket_core::rule::FieldSource for Nothing {
/// #     fn field(&self, _: &str) -> Option<basket_core::rule::FieldValue> { None }
/// # }
/// let result = vat.apply(&Nothing, 200.0);
/// assert_eq!(result.delta, 20.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    name: String,

    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    target: Target,

    #[serde(default)]
    actions: Vec<ConditionAction>,

    #[serde(default)]
    rules: Vec<Rule>,
}

impl Condition {
    /// Creates a condition with no actions and no rules.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, target: Target) -> Self {
        Condition {
            name: name.into(),
            kind: kind.into(),
            target,
            actions: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Appends a non-inclusive action.
    pub fn with_action(mut self, value: impl Into<ActionValue>) -> Self {
        self.actions.push(ConditionAction::new(value));
        self
    }

    /// Appends an action with an explicit inclusive flag.
    pub fn with_condition_action(mut self, action: ConditionAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Appends an eligibility rule.
    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The condition type ("discount", "tax", ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn actions(&self) -> &[ConditionAction] {
        &self.actions
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True if there are no rules, or every rule holds for `entity`.
    pub fn eligible<E: FieldSource + ?Sized>(&self, entity: &E) -> bool {
        self.rules.iter().all(|rule| rule.holds(entity))
    }

    /// Applies every action in order, starting from `base`.
    ///
    /// Percentages compound against the running value. The returned delta
    /// is `final - base`; an ineligible condition returns a zero delta.
    pub fn apply<E: FieldSource + ?Sized>(&self, entity: &E, base: f64) -> ConditionResult {
        if !self.eligible(entity) {
            return ConditionResult::INELIGIBLE;
        }

        let value = self
            .actions
            .iter()
            .fold(base, |running, action| action.value.apply_to(running));

        ConditionResult {
            eligible: true,
            delta: value - base,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FieldValue;

    struct Priced(f64);

    impl FieldSource for Priced {
        fn field(&self, name: &str) -> Option<FieldValue> {
            (name == "price").then_some(FieldValue::Number(self.0))
        }
    }

    #[test]
    fn test_fixed_and_percentage() {
        let fee = Condition::new("Fee", OTHER, Target::Price).with_action("+5");
        assert_eq!(fee.apply(&Priced(100.0), 100.0).delta, 5.0);

        let sale = Condition::new("Sale", DISCOUNT, Target::Subtotal).with_action("-5%");
        assert_eq!(sale.apply(&Priced(100.0), 500.0).delta, -25.0);
    }

    #[test]
    fn test_actions_compound_against_running_value() {
        // 100 + 10 = 110, then +10% of 110 = 121
        let combo = Condition::new("Combo", OTHER, Target::Subtotal)
            .with_action("10")
            .with_action("10%");
        let result = combo.apply(&Priced(0.0), 100.0);
        assert!(result.eligible);
        assert!((result.delta - 21.0).abs() < 1e-9);
        assert!((result.value(100.0) - 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_ineligible_contributes_zero() {
        let premium = Condition::new("Premium", DISCOUNT, Target::Price)
            .with_action("-10%")
            .with_rule("price > 200");

        let result = premium.apply(&Priced(125.0), 125.0);
        assert_eq!(result, ConditionResult::INELIGIBLE);
        assert_eq!(result.value(125.0), 125.0);

        assert!(premium.apply(&Priced(250.0), 250.0).eligible);
    }

    #[test]
    fn test_all_rules_must_hold() {
        let band = Condition::new("Band", DISCOUNT, Target::Price)
            .with_action("-1")
            .with_rule("price >= 10")
            .with_rule("price < 20");

        assert!(band.eligible(&Priced(15.0)));
        assert!(!band.eligible(&Priced(25.0)));
        assert!(!band.eligible(&Priced(5.0)));
    }

    #[test]
    fn test_malformed_rule_makes_condition_ineligible() {
        let broken = Condition::new("Broken", DISCOUNT, Target::Price)
            .with_action("-1")
            .with_rule("price >");
        assert!(broken.rules()[0].is_malformed());
        assert!(!broken.eligible(&Priced(15.0)));
    }

    #[test]
    fn test_apply_is_repeatable() {
        let tax = Condition::new("Tax", TAX, Target::Subtotal).with_action("8.25%");
        let first = tax.apply(&Priced(10.0), 133.7);
        for _ in 0..5 {
            assert_eq!(tax.apply(&Priced(10.0), 133.7), first);
        }
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("price".parse::<Target>().unwrap(), Target::Price);
        assert_eq!("Subtotal".parse::<Target>().unwrap(), Target::Subtotal);
        assert!("sideways".parse::<Target>().is_err());
    }

    #[test]
    fn test_target_aliases_in_records() {
        let target: Target = serde_json::from_value(serde_json::json!("total")).unwrap();
        assert_eq!(target, Target::Subtotal);
        let target: Target = serde_json::from_value(serde_json::json!("Item")).unwrap();
        assert_eq!(target, Target::Price);
        assert!(serde_json::from_value::<Target>(serde_json::json!("sideways")).is_err());

        let record = serde_json::json!({
            "name": "Ship", "type": "shipping", "target": "total", "actions": [{"value": "+7"}]
        });
        let condition: Condition = serde_json::from_value(record).unwrap();
        assert_eq!(condition.target(), Target::Subtotal);
        assert_eq!(serde_json::to_value(condition.target()).unwrap(), "subtotal");
    }

    #[test]
    fn test_record_format() {
        let json = serde_json::json!({
            "name": "VAT",
            "type": "tax",
            "target": "subtotal",
            "actions": [{"value": "12.5%"}],
            "rules": ["quantity > 1"]
        });
        let condition: Condition = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(condition.kind(), TAX);
        assert_eq!(condition.target(), Target::Subtotal);
        assert_eq!(condition.rules().len(), 1);

        let back = serde_json::to_value(&condition).unwrap();
        assert_eq!(back["actions"][0]["value"], "12.5%");
        assert_eq!(back["actions"][0]["inclusive"], false);
        assert_eq!(back["rules"][0], "quantity > 1");
    }
}
