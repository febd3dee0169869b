//! # Item
//!
//! One cart line: a product at a unit price and quantity, optional
//! attribute selections (size, colour, ...) and item-level conditions.
//!
//! ## Price Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit price 100.00                                                      │
//! │   + attribute "size: XL"      +5.00                                     │
//! │   + attribute "gift wrap"     +2.50                                     │
//! │  ─────────────────────────────────────                                  │
//! │  price()                     107.50   ← baseline for conditions         │
//! │  subtotal()      × qty 2  =  215.00   ← no conditions                   │
//! │  total()                              ← price pass + subtotal pass      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Row Identity
//! Each line is addressed by a row id: a content hash of every field except
//! price and quantity. Adding the same logical item twice therefore hits the
//! same row id and merges quantities instead of creating a duplicate line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::condition::Condition;
use crate::error::ValidationError;
use crate::pricing::{Baseline, Priceable, TypeOrder};
use crate::rule::{FieldSource, FieldValue};
use crate::snapshot::Keyed;
use crate::validation::{self, ItemInput, RequiredFields};

/// Number of hex characters kept from the identity hash.
pub const ROW_ID_LENGTH: usize = 32;

// =============================================================================
// Attribute
// =============================================================================

/// A named sub-selection of an item, contributing to its price and weight.
///
/// Persisted as `attributes: { <name>: { label, value, price, weight } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttribute {
    #[serde(default, skip_serializing)]
    pub name: String,

    #[serde(default)]
    pub label: String,

    pub value: String,

    #[serde(default)]
    pub price: f64,

    #[serde(default)]
    pub weight: f64,
}

impl ItemAttribute {
    /// Creates an attribute with no price or weight delta.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        ItemAttribute {
            label: name.clone(),
            name,
            value: value.into(),
            price: 0.0,
            weight: 0.0,
        }
    }

    /// Checks this attribute against a search criterion.
    ///
    /// A scalar criterion is compared with `value`; a map criterion may
    /// name any of `value`, `label`, `price`, `weight`.
    pub fn matches(&self, criterion: &Value) -> bool {
        match criterion {
            Value::Object(expected) => expected.iter().all(|(key, wanted)| {
                let actual = match key.as_str() {
                    "value" => FieldValue::Text(self.value.clone()),
                    "label" => FieldValue::Text(self.label.clone()),
                    "price" => FieldValue::Number(self.price),
                    "weight" => FieldValue::Number(self.weight),
                    _ => return false,
                };
                FieldValue::from_json(wanted).is_some_and(|w| actual.loosely_equals(&w))
            }),
            scalar => FieldValue::from_json(scalar)
                .is_some_and(|w| FieldValue::Text(self.value.clone()).loosely_equals(&w)),
        }
    }
}

impl Keyed for ItemAttribute {
    fn key(&self) -> &str {
        &self.name
    }

    fn set_key(&mut self, key: String) {
        if self.label.is_empty() {
            self.label = key.clone();
        }
        self.name = key;
    }
}

// =============================================================================
// Item
// =============================================================================

/// A cart line.
///
/// The serialized form is the persisted item record:
/// `{ rowId, id, name, price, quantity, weight, attributes, conditions, ..custom }`.
///
/// ## Example
/// ```rust
/// use basket_core::{Condition, Item, ItemInput, Priceable, Target};
///
/// let input = ItemInput::new("sku-1", "Shirt", 100.0, 5)
///     .condition(&Condition::new("Sale", "discount", Target::Subtotal).with_action("-10%"));
/// let item = Item::from_input(&input).unwrap();
///
/// assert_eq!(item.subtotal(), 500.0);
/// assert_eq!(item.total(), 450.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub(crate) row_id: String,

    pub(crate) id: String,

    pub(crate) name: String,

    pub(crate) price: f64,

    pub(crate) quantity: u32,

    #[serde(default)]
    pub(crate) weight: f64,

    #[serde(default, with = "crate::snapshot::keyed")]
    pub(crate) attributes: Vec<ItemAttribute>,

    #[serde(default)]
    pub(crate) conditions: Vec<Condition>,

    /// Custom fields carried alongside the well-known ones.
    #[serde(flatten)]
    pub(crate) fields: Map<String, Value>,

    #[serde(skip)]
    pub(crate) type_order: TypeOrder,
}

impl Item {
    /// Validates `input` with the default required fields and builds an item.
    pub fn from_input(input: &ItemInput) -> Result<Self, ValidationError> {
        validation::validate_item(input, &RequiredFields::default())
    }

    /// Assembles an item and stamps its row identity.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        id: String,
        name: String,
        price: f64,
        quantity: u32,
        weight: f64,
        attributes: Vec<ItemAttribute>,
        conditions: Vec<Condition>,
        fields: Map<String, Value>,
    ) -> Self {
        let mut item = Item {
            row_id: String::new(),
            id,
            name,
            price,
            quantity,
            weight,
            attributes,
            conditions,
            fields,
            type_order: TypeOrder::default(),
        };
        item.row_id = item.identity();
        item
    }

    /// Content hash of every field except price and quantity.
    ///
    /// Attribute and custom-field order does not matter.
    pub fn identity(&self) -> String {
        let mut attributes: Vec<_> = self
            .attributes
            .iter()
            .map(|a| (&a.name, &a.label, &a.value, a.price, a.weight))
            .collect();
        attributes.sort_by(|a, b| a.0.cmp(b.0));

        let fields: BTreeMap<&String, &Value> = self.fields.iter().collect();

        let canonical = serde_json::json!({
            "id": self.id,
            "name": self.name,
            "weight": self.weight,
            "attributes": attributes,
            "conditions": self.conditions,
            "fields": fields,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(ROW_ID_LENGTH);
        digest
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit price as given, without attribute deltas.
    pub fn unit_price(&self) -> f64 {
        self.price
    }

    /// Unit price including attribute deltas, before conditions.
    pub fn price(&self) -> f64 {
        self.price + self.attributes.iter().map(|a| a.price).sum::<f64>()
    }

    /// Unit price after price-target conditions.
    pub fn price_with_conditions(&self) -> f64 {
        self.pricing().price
    }

    /// Same as [`Priceable::total`].
    pub fn subtotal_with_conditions(&self) -> f64 {
        self.total()
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Own weight plus attribute weights, for one unit.
    pub fn unit_weight(&self) -> f64 {
        self.weight + self.attributes.iter().map(|a| a.weight).sum::<f64>()
    }

    /// `unit_weight × quantity`.
    pub fn weight(&self) -> f64 {
        self.unit_weight() * f64::from(self.quantity)
    }

    pub fn attributes(&self) -> &[ItemAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&ItemAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Custom fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    /// Attaches a condition after the existing ones.
    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Detaches every condition with this name. Returns how many went.
    pub fn remove_condition(&mut self, name: &str) -> usize {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.name() != name);
        before - self.conditions.len()
    }

    pub fn clear_conditions(&mut self) {
        self.conditions.clear();
    }

    pub fn set_type_order(&mut self, order: TypeOrder) {
        self.type_order = order;
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// True if every named attribute criterion matches.
    pub fn has_attributes(&self, criteria: &Value) -> bool {
        match criteria {
            Value::Object(expected) => expected.iter().all(|(name, criterion)| {
                self.attribute(name)
                    .is_some_and(|attribute| attribute.matches(criterion))
            }),
            _ => false,
        }
    }

    /// True if every criterion matches this item.
    ///
    /// `attributes` delegates to [`Item::has_attributes`]; any other key is
    /// looked up as a field and compared loosely (`85` matches `85.0`).
    pub fn matches(&self, criteria: &Map<String, Value>) -> bool {
        criteria.iter().all(|(key, expected)| {
            if key == "attributes" {
                return self.has_attributes(expected);
            }
            match (self.field(key), FieldValue::from_json(expected)) {
                (Some(actual), Some(wanted)) => actual.loosely_equals(&wanted),
                _ => false,
            }
        })
    }
}

impl FieldSource for Item {
    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "rowId" => FieldValue::Text(self.row_id.clone()),
            "id" => FieldValue::Text(self.id.clone()),
            "name" => FieldValue::Text(self.name.clone()),
            "price" => FieldValue::Number(self.price()),
            "quantity" => FieldValue::Number(f64::from(self.quantity)),
            "weight" => FieldValue::Number(self.unit_weight()),
            "subtotal" => FieldValue::Number(self.subtotal()),
            other => {
                if let Some(attribute) = other.strip_prefix("attributes.") {
                    return self
                        .attribute(attribute)
                        .map(|a| FieldValue::Text(a.value.clone()));
                }
                return self.fields.get(other).and_then(FieldValue::from_json);
            }
        };
        Some(value)
    }
}

impl Priceable for Item {
    fn baseline(&self) -> Baseline {
        Baseline::Unit {
            price: self.price(),
            quantity: f64::from(self.quantity),
        }
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn type_order(&self) -> &TypeOrder {
        &self.type_order
    }
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.row_id
    }

    fn set_key(&mut self, key: String) {
        self.row_id = key;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
