//! # Validation Module
//!
//! Turns loosely-typed item records into validated [`Item`]s.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Item Record → Item                                 │
//! │                                                                         │
//! │  ItemInput { "id": .., "name": .., "price": "9.99", "quantity": 2 }     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 1: Required fields present and non-empty                          │
//! │  ├── default: id, name, price, quantity                                 │
//! │  └── configurable per cart (RequiredFields)                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 2: Coercion                                                       │
//! │  ├── price:     number or numeric text, ≥ 0                             │
//! │  ├── quantity:  positive integer (numeric text accepted)                │
//! │  ├── attributes: map of name → body, or list of bodies with "name"      │
//! │  └── conditions: condition records                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 3: Unknown keys kept as custom fields, row id stamped             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use basket_core::validation::{validate_item, validate_quantity, ItemInput, RequiredFields};
//!
//! let input = ItemInput::new("sku-1", "Shirt", 19.99, 2);
//! let item = validate_item(&input, &RequiredFields::default()).unwrap();
//! assert_eq!(item.quantity(), 2);
//!
//! assert!(validate_quantity(0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::Condition;
use crate::error::ValidationError;
use crate::item::{Item, ItemAttribute};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Keys with fixed meaning on an item record. Everything else is custom.
pub const RESERVED_KEYS: [&str; 8] = [
    "rowId",
    "id",
    "name",
    "price",
    "quantity",
    "weight",
    "attributes",
    "conditions",
];

// =============================================================================
// Required Fields
// =============================================================================

/// Keys that must be present, non-null and non-empty on an add record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredFields(Vec<String>);

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequiredFields(fields.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for RequiredFields {
    fn default() -> Self {
        RequiredFields::new(["id", "name", "price", "quantity"])
    }
}

// =============================================================================
// Item Input
// =============================================================================

/// An unvalidated item record.
///
/// Any JSON map is accepted; the builder methods cover the common keys.
///
/// ## Example
/// ```rust
/// use basket_core::validation::ItemInput;
///
/// let input = ItemInput::new("sku-1", "Shirt", 25.0, 1)
///     .attribute("size", "XL", 2.0)
///     .set("brand", "acme");
///
/// assert_eq!(input.get("brand").unwrap(), "acme");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemInput(Map<String, Value>);

impl ItemInput {
    /// Record with the four default required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, quantity: i64) -> Self {
        ItemInput::default()
            .set("id", id.into())
            .set("name", name.into())
            .set("price", price)
            .set("quantity", quantity)
    }

    /// Reads a record from any JSON value.
    pub fn from_value(value: Value) -> ValidationResult<Self> {
        match value {
            Value::Object(map) => Ok(ItemInput(map)),
            other => Err(ValidationError::InvalidRecord {
                kind: json_kind(&other).to_string(),
            }),
        }
    }

    /// Sets any key.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn weight(self, weight: f64) -> Self {
        self.set("weight", weight)
    }

    /// Adds an attribute selection with a price delta.
    pub fn attribute(self, name: &str, value: impl Into<Value>, price: f64) -> Self {
        self.attribute_with_weight(name, value, price, 0.0)
    }

    /// Adds an attribute selection with price and weight deltas.
    pub fn attribute_with_weight(
        mut self,
        name: &str,
        value: impl Into<Value>,
        price: f64,
        weight: f64,
    ) -> Self {
        if !matches!(self.0.get("attributes"), Some(Value::Object(_))) {
            self.0
                .insert("attributes".to_string(), Value::Object(Map::new()));
        }
        if let Some(Value::Object(attributes)) = self.0.get_mut("attributes") {
            attributes.insert(
                name.to_string(),
                serde_json::json!({
                    "value": value.into(),
                    "price": price,
                    "weight": weight,
                }),
            );
        }
        self
    }

    /// Attaches a condition record.
    pub fn condition(mut self, condition: &Condition) -> Self {
        let Ok(record) = serde_json::to_value(condition) else {
            return self;
        };
        if !matches!(self.0.get("conditions"), Some(Value::Array(_))) {
            self.0.insert("conditions".to_string(), Value::Array(Vec::new()));
        }
        if let Some(Value::Array(conditions)) = self.0.get_mut("conditions") {
            conditions.push(record);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ItemInput {
    fn from(map: Map<String, Value>) -> Self {
        ItemInput(map)
    }
}

// =============================================================================
// Item Validators
// =============================================================================

/// Validates an add record and builds the item.
///
/// ## Rules
/// - Every required field present, not null, not blank text
/// - `price` numeric (or numeric text) and not negative; absent means 0
/// - `quantity` a positive integer; absent means 1
/// - `attributes` a map or a list of maps
/// - `conditions` condition records
pub fn validate_item(input: &ItemInput, required: &RequiredFields) -> ValidationResult<Item> {
    let map = input.as_map();

    for field in required.iter() {
        if is_blank(map.get(field)) {
            return Err(ValidationError::missing(field));
        }
    }

    let id = text_field(map, "id")?;
    let name = text_field(map, "name")?;

    let price = match map.get("price") {
        None | Some(Value::Null) => 0.0,
        Some(value) => parse_price(value)?,
    };

    let quantity = match map.get("quantity") {
        None | Some(Value::Null) => 1,
        Some(value) => parse_quantity(value)?,
    };

    let weight = optional_number(map.get("weight"), "weight")?;
    let attributes = parse_attributes(map.get("attributes"))?;
    let conditions = parse_conditions(map.get("conditions"))?;

    let fields = map
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Item::assemble(
        id, name, price, quantity, weight, attributes, conditions, fields,
    ))
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must fit the line quantity type
pub fn validate_quantity(qty: i64) -> ValidationResult<u32> {
    if qty <= 0 {
        return Err(ValidationError::InvalidQuantity {
            value: qty.to_string(),
        });
    }

    u32::try_from(qty).map_err(|_| ValidationError::InvalidQuantity {
        value: qty.to_string(),
    })
}

/// What a field update resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// The line stays, with these contents.
    Keep(Item),

    /// A quantity of zero or less was given: the line goes.
    Remove,
}

/// Applies a partial record to an existing line.
///
/// All keys are validated before anything is decided, so an invalid key
/// rejects the whole update. `rowId` cannot be changed; `conditions`, when
/// present, replace the line's conditions.
pub fn coerce_update(item: &Item, data: &Map<String, Value>) -> ValidationResult<FieldUpdate> {
    let mut next = item.clone();
    let mut remove = false;

    for (key, value) in data {
        match key.as_str() {
            "rowId" => {}
            "id" => next.id = required_text(value, "id")?,
            "name" => next.name = required_text(value, "name")?,
            "price" => next.price = parse_price(value)?,
            "quantity" => {
                let qty = integer_value(value).ok_or_else(|| invalid_quantity(value))?;
                if qty <= 0 {
                    remove = true;
                } else {
                    next.quantity = validate_quantity(qty)?;
                }
            }
            "weight" => next.weight = optional_number(Some(value), "weight")?,
            "attributes" => next.attributes = parse_attributes(Some(value))?,
            "conditions" => next.conditions = parse_conditions(Some(value))?,
            _ => {
                next.fields.insert(key.clone(), value.clone());
            }
        }
    }

    if remove {
        Ok(FieldUpdate::Remove)
    } else {
        Ok(FieldUpdate::Keep(next))
    }
}

// =============================================================================
// Field Coercion
// =============================================================================

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> ValidationResult<String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(value) => scalar_text(value).ok_or_else(|| ValidationError::missing(key)),
    }
}

fn required_text(value: &Value, key: &str) -> ValidationResult<String> {
    if is_blank(Some(value)) {
        return Err(ValidationError::missing(key));
    }
    scalar_text(value).ok_or_else(|| ValidationError::missing(key))
}

fn number_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Whole-number coercion. Fractions are truncated toward zero (`2.9` → 2).
pub(crate) fn integer_value(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let n = number_value(value)?.trunc();
    (n.abs() < i64::MAX as f64).then_some(n as i64)
}

fn parse_price(value: &Value) -> ValidationResult<f64> {
    match number_value(value) {
        Some(price) if price >= 0.0 => Ok(price),
        _ => Err(ValidationError::InvalidPrice {
            value: value.to_string(),
        }),
    }
}

fn invalid_quantity(value: &Value) -> ValidationError {
    ValidationError::InvalidQuantity {
        value: value.to_string(),
    }
}

fn parse_quantity(value: &Value) -> ValidationResult<u32> {
    let qty = integer_value(value).ok_or_else(|| invalid_quantity(value))?;
    validate_quantity(qty).map_err(|_| invalid_quantity(value))
}

fn optional_number(value: Option<&Value>, field: &str) -> ValidationResult<f64> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => number_value(value).ok_or_else(|| ValidationError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_attributes(value: Option<&Value>) -> ValidationResult<Vec<ItemAttribute>> {
    let mut attributes: Vec<ItemAttribute> = Vec::new();
    let mut push = |attribute: ItemAttribute| {
        match attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => attributes.push(attribute),
        }
    };

    match value {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, body) in map {
                push(parse_attribute(name, body)?);
            }
        }
        Some(Value::Array(list)) => {
            for (position, body) in list.iter().enumerate() {
                let name = body
                    .get("name")
                    .and_then(scalar_text)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| ValidationError::InvalidAttributes {
                        reason: format!("attribute at position {} has no name", position),
                    })?;
                push(parse_attribute(&name, body)?);
            }
        }
        Some(other) => {
            return Err(ValidationError::InvalidAttributes {
                reason: format!("expected a map or a list, got {}", json_kind(other)),
            })
        }
    }

    Ok(attributes)
}

fn parse_attribute(name: &str, body: &Value) -> ValidationResult<ItemAttribute> {
    let Value::Object(map) = body else {
        return Err(ValidationError::InvalidAttributes {
            reason: format!("attribute '{}' must be a map", name),
        });
    };

    let value = map
        .get("value")
        .filter(|v| !is_blank(Some(*v)))
        .and_then(scalar_text)
        .ok_or_else(|| ValidationError::missing(format!("attributes.{}.value", name)))?;

    let label = map
        .get("label")
        .and_then(scalar_text)
        .unwrap_or_else(|| name.to_string());

    Ok(ItemAttribute {
        name: name.to_string(),
        label,
        value,
        price: optional_number(map.get("price"), &format!("attributes.{}.price", name))?,
        weight: optional_number(map.get("weight"), &format!("attributes.{}.weight", name))?,
    })
}

fn parse_conditions(value: Option<&Value>) -> ValidationResult<Vec<Condition>> {
    let records = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(list)) => list.clone(),
        Some(record @ Value::Object(_)) => vec![record.clone()],
        Some(other) => {
            return Err(ValidationError::InvalidConditions {
                reason: format!("expected condition records, got {}", json_kind(other)),
            })
        }
    };

    records
        .into_iter()
        .map(|record| {
            serde_json::from_value::<Condition>(record).map_err(|e| {
                ValidationError::InvalidConditions {
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
