//! # Pricing Engine
//!
//! The multi-pass condition application shared by [`crate::Item`] and
//! [`crate::Cart`].
//!
//! ## One Full Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply_conditions(entity, baseline, ..)               │
//! │                                                                         │
//! │  1. price    = unit price              (cart: no price)                 │
//! │  2. breakdown = {}                                                      │
//! │                                                                         │
//! │  3. PRICE PASS (items only)                                             │
//! │     for type in type_order:                                             │
//! │       for condition of that type with target = price:                   │
//! │         price += delta             breakdown[type][name] += delta × qty │
//! │                                                                         │
//! │  4. running = quantity × price     (cart: Σ item totals)                │
//! │                                                                         │
//! │  5. SUBTOTAL PASS                                                       │
//! │     for type in type_order:                                             │
//! │       for condition of that type with target = subtotal:                │
//! │         running += delta           breakdown[type][name] += delta       │
//! │                                                                         │
//! │  6. total = running                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Pure: nothing is cached between calls, so calling it N times yields
//!   the same [`Pricing`] (breakdown included) every time.
//! - Types absent from the [`TypeOrder`] are never applied.
//! - Ineligible conditions are absent from the breakdown.
//! - `total - subtotal == breakdown.total()` (up to float error).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::condition::{Condition, Target, DISCOUNT, OTHER, TAX};
use crate::rule::FieldSource;

// =============================================================================
// Type Order
// =============================================================================

/// Ordered list of condition types to apply.
///
/// Default: `["discount", "other", "tax"]`. Duplicate entries are dropped
/// (first occurrence wins) so no type is ever applied twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TypeOrder(Vec<String>);

impl TypeOrder {
    /// Creates an order from any list of type names.
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order: Vec<String> = Vec::new();
        for kind in types {
            let kind = kind.into();
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        TypeOrder(order)
    }

    /// Checks if `kind` is applied under this order.
    pub fn contains(&self, kind: &str) -> bool {
        self.0.iter().any(|k| k == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TypeOrder {
    fn default() -> Self {
        TypeOrder::new([DISCOUNT, OTHER, TAX])
    }
}

impl From<Vec<String>> for TypeOrder {
    fn from(types: Vec<String>) -> Self {
        TypeOrder::new(types)
    }
}

impl From<TypeOrder> for Vec<String> {
    fn from(order: TypeOrder) -> Self {
        order.0
    }
}

impl<S: Into<String>> FromIterator<S> for TypeOrder {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        TypeOrder::new(iter)
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// Per-type, per-name contributions of the conditions that applied.
///
/// Conditions sharing a name within a type are summed under that name.
/// Values are contributions to the entity total: a price-target condition
/// on an item is recorded as `delta × quantity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breakdown(BTreeMap<String, BTreeMap<String, f64>>);

impl Breakdown {
    /// Adds `amount` under `[kind][name]`.
    pub fn record(&mut self, kind: &str, name: &str, amount: f64) {
        *self
            .0
            .entry(kind.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert(0.0) += amount;
    }

    /// Contribution recorded for one condition name.
    pub fn get(&self, kind: &str, name: &str) -> Option<f64> {
        self.0.get(kind).and_then(|names| names.get(name)).copied()
    }

    /// All names recorded under one type.
    pub fn by_type(&self, kind: &str) -> Option<&BTreeMap<String, f64>> {
        self.0.get(kind)
    }

    /// Amounts summed by condition name, optionally restricted to one type.
    pub fn totals_by_name(&self, kind: Option<&str>) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for (k, names) in &self.0 {
            if kind.is_some_and(|wanted| wanted != k.as_str()) {
                continue;
            }
            for (name, amount) in names {
                *totals.entry(name.clone()).or_insert(0.0) += amount;
            }
        }
        totals
    }

    /// Sum of every recorded amount of one type.
    pub fn total_of_type(&self, kind: &str) -> f64 {
        self.by_type(kind)
            .map(|names| names.values().sum())
            .unwrap_or(0.0)
    }

    /// Sum of every recorded amount.
    pub fn total(&self) -> f64 {
        self.0.values().flat_map(|names| names.values()).sum()
    }

    /// Adds every entry of `other` into this breakdown.
    pub fn merge(&mut self, other: &Breakdown) {
        for (kind, names) in &other.0 {
            for (name, amount) in names {
                self.record(kind, name, *amount);
            }
        }
    }

    /// Iterates `(type, name, amount)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.0.iter().flat_map(|(kind, names)| {
            names
                .iter()
                .map(move |(name, amount)| (kind.as_str(), name.as_str(), *amount))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Baseline & Result
// =============================================================================

/// The pre-condition starting point of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Baseline {
    /// An item line: unit price and quantity.
    Unit { price: f64, quantity: f64 },

    /// A cart: the already-resolved sum of its item totals. There is no
    /// unit price, so price-target conditions are inert here.
    Aggregate { subtotal: f64 },
}

impl Baseline {
    /// The pre-condition subtotal.
    pub fn subtotal(&self) -> f64 {
        match *self {
            Baseline::Unit { price, quantity } => price * quantity,
            Baseline::Aggregate { subtotal } => subtotal,
        }
    }
}

/// Result of one full application pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pricing {
    /// Unit price after price-target conditions (0 for a cart).
    pub price: f64,

    /// Pre-condition subtotal.
    pub subtotal: f64,

    /// Final value after both passes.
    pub total: f64,

    /// Contributions of every applied condition.
    pub breakdown: Breakdown,
}

// =============================================================================
// The Algorithm
// =============================================================================

/// Runs one full condition application. Never fails.
///
/// Rules are evaluated against `entity`; `conditions` are visited in
/// insertion order within each type of `order`.
pub fn apply_conditions<E: FieldSource + ?Sized>(
    entity: &E,
    baseline: Baseline,
    conditions: &[Condition],
    order: &TypeOrder,
) -> Pricing {
    let mut breakdown = Breakdown::default();

    let (price, mut running) = match baseline {
        Baseline::Unit { price, quantity } => {
            let mut price = price;
            for kind in order.iter() {
                for condition in of_kind(conditions, kind, Target::Price) {
                    let result = condition.apply(entity, price);
                    if result.eligible {
                        price += result.delta;
                        breakdown.record(kind, condition.name(), result.delta * quantity);
                    }
                }
            }
            (price, price * quantity)
        }
        Baseline::Aggregate { subtotal } => (0.0, subtotal),
    };

    for kind in order.iter() {
        for condition in of_kind(conditions, kind, Target::Subtotal) {
            let result = condition.apply(entity, running);
            if result.eligible {
                running += result.delta;
                breakdown.record(kind, condition.name(), result.delta);
            }
        }
    }

    Pricing {
        price,
        subtotal: baseline.subtotal(),
        total: running,
        breakdown,
    }
}

fn of_kind<'a>(
    conditions: &'a [Condition],
    kind: &'a str,
    target: Target,
) -> impl Iterator<Item = &'a Condition> + 'a {
    conditions
        .iter()
        .filter(move |c| c.kind() == kind && c.target() == target)
}

// =============================================================================
// Priceable
// =============================================================================

/// Shared behavior of everything that carries conditions.
///
/// Implementors describe their baseline, conditions and type order; the
/// totals and breakdown accessors come for free and always run a fresh
/// pass.
pub trait Priceable: FieldSource {
    /// Pre-condition starting point.
    fn baseline(&self) -> Baseline;

    /// Attached conditions, in insertion order.
    fn conditions(&self) -> &[Condition];

    /// Which types apply, and in which order.
    fn type_order(&self) -> &TypeOrder;

    /// Runs a full application pass.
    fn pricing(&self) -> Pricing {
        apply_conditions(self, self.baseline(), self.conditions(), self.type_order())
    }

    /// Pre-condition subtotal, recomputed on every call.
    fn subtotal(&self) -> f64 {
        self.baseline().subtotal()
    }

    /// Subtotal with every applicable condition applied.
    fn total(&self) -> f64 {
        self.pricing().total
    }

    /// Applied contributions summed by name, optionally for one type.
    fn conditions_total(&self, kind: Option<&str>) -> BTreeMap<String, f64> {
        self.pricing().breakdown.totals_by_name(kind)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
