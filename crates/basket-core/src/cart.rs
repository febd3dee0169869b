//! # Cart
//!
//! Item CRUD, search, cart-level conditions and metadata over an ordered
//! set of [`Item`] lines.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Caller                     Cart                    Lines               │
//! │  ──────                     ────                    ─────               │
//! │                                                                         │
//! │  add(record) ──────────────► validate ─┬─ new row ──► push(item)        │
//! │                                        └─ same row ─► quantity += n     │
//! │                                                                         │
//! │  add(batch) ───────────────► validate ALL, then commit ALL              │
//! │                                                                         │
//! │  update(row, Set/Adjust) ──► quantity ≤ 0 ? remove : set                │
//! │                                                                         │
//! │  update(row, fields) ──────► coerce + merge (conditions replaced)       │
//! │                                                                         │
//! │  remove(row) / clear() ────► lines.remove / lines.clear                 │
//! │                                                                         │
//! │  total() ──────────────────► Σ item.total() → cart conditions           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by row id; re-adding merges quantity and keeps the
//!   existing line's conditions and attributes
//! - Every line has quantity ≥ 1
//! - A failed call leaves the cart unchanged
//! - Totals are recomputed on every call, nothing is cached

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::condition::{Condition, DISCOUNT, TAX};
use crate::error::{CartError, CartResult, ValidationError};
use crate::item::Item;
use crate::pricing::{Baseline, Priceable, Pricing, TypeOrder};
use crate::rule::{FieldSource, FieldValue};
use crate::snapshot::CartSnapshot;
use crate::validation::{
    coerce_update, integer_value, validate_item, validate_quantity, FieldUpdate, ItemInput,
    RequiredFields, ValidationResult,
};

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// One record or an ordered batch of records.
#[derive(Debug, Clone, PartialEq)]
pub enum AddRequest {
    Single(ItemInput),
    Batch(Vec<ItemInput>),
}

impl AddRequest {
    /// Reads a request from JSON: a list is a batch, anything else a single
    /// record.
    pub fn from_value(value: Value) -> CartResult<Self> {
        match value {
            Value::Array(records) => records
                .into_iter()
                .enumerate()
                .map(|(index, record)| {
                    ItemInput::from_value(record)
                        .map_err(|source| CartError::BatchRecord { index, source })
                })
                .collect::<CartResult<Vec<_>>>()
                .map(AddRequest::Batch),
            record => Ok(AddRequest::Single(ItemInput::from_value(record)?)),
        }
    }
}

impl From<ItemInput> for AddRequest {
    fn from(input: ItemInput) -> Self {
        AddRequest::Single(input)
    }
}

impl From<Vec<ItemInput>> for AddRequest {
    fn from(inputs: Vec<ItemInput>) -> Self {
        AddRequest::Batch(inputs)
    }
}

/// Result of adding one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Added {
    /// The line as it now stands in the cart.
    pub item: Item,

    /// True if the record merged into an existing line.
    pub merged: bool,
}

/// A quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Replace the quantity.
    Set(i64),

    /// Add to the current quantity (negative subtracts).
    Adjust(i64),
}

/// What `update` applies to a line.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    Quantity(QuantityChange),

    /// Partial record merged into the line.
    Fields(Map<String, Value>),
}

impl ItemUpdate {
    /// Reads an update from JSON: a bare number sets the quantity (fractions
    /// are truncated), a map is a partial record.
    pub fn from_value(value: Value) -> ValidationResult<Self> {
        match value {
            Value::Object(fields) => Ok(ItemUpdate::Fields(fields)),
            Value::Number(_) => {
                let qty = integer_value(&value).ok_or_else(|| ValidationError::InvalidQuantity {
                    value: value.to_string(),
                })?;
                Ok(ItemUpdate::Quantity(QuantityChange::Set(qty)))
            }
            other => Err(ValidationError::InvalidRecord {
                kind: other.to_string(),
            }),
        }
    }
}

impl From<QuantityChange> for ItemUpdate {
    fn from(change: QuantityChange) -> Self {
        ItemUpdate::Quantity(change)
    }
}

impl From<Map<String, Value>> for ItemUpdate {
    fn from(fields: Map<String, Value>) -> Self {
        ItemUpdate::Fields(fields)
    }
}

/// What an update did to the line.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Item),

    /// The resulting quantity was ≤ 0 and the line was removed.
    Removed(Item),
}

impl UpdateOutcome {
    pub fn item(&self) -> &Item {
        match self {
            UpdateOutcome::Updated(item) | UpdateOutcome::Removed(item) => item,
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Cart totals summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: u64,
    /// Σ item totals, before cart conditions.
    pub subtotal: f64,
    /// Item and cart discounts combined.
    pub discounts: f64,
    /// Item and cart taxes combined.
    pub taxes: f64,
    pub total: f64,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.count(),
            total_quantity: cart.quantity(),
            subtotal: cart.subtotal(),
            discounts: cart.discounts_total(),
            taxes: cart.taxes_total(),
            total: cart.total(),
        }
    }
}

/// One line's full pricing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePricing {
    pub row_id: String,
    pub pricing: Pricing,
}

/// Every line's pricing plus the cart-level pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartPricing {
    pub lines: Vec<LinePricing>,
    pub cart: Pricing,
}

// =============================================================================
// Cart
// =============================================================================

/// An ordered set of item lines with cart-level conditions and metadata.
///
/// ## Example
/// ```rust
/// use basket_core::{Cart, Condition, ItemInput, Priceable, Target, TAX};
///
/// let mut cart = Cart::new();
/// cart.add(ItemInput::new("sku-1", "Shirt", 20.0, 2)).unwrap();
/// cart.add_condition(Condition::new("VAT", TAX, Target::Subtotal).with_action("10%"));
///
/// assert_eq!(cart.subtotal(), 40.0);
/// assert_eq!(cart.total(), 44.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<Item>,
    conditions: Vec<Condition>,
    type_order: TypeOrder,
    items_type_order: TypeOrder,
    meta_data: Map<String, Value>,
    required_fields: RequiredFields,
}

impl Cart {
    /// Creates an empty cart with the default type orders.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Rebuilds a cart from its persisted state.
    ///
    /// Lines with a quantity of zero are dropped.
    pub fn from_snapshot(snapshot: CartSnapshot) -> Self {
        let CartSnapshot {
            items,
            cart_conditions,
            type_order,
            items_type_order,
            meta_data,
            ..
        } = snapshot;

        let items = items
            .into_iter()
            .filter(|item| item.quantity > 0)
            .map(|mut item| {
                item.set_type_order(items_type_order.clone());
                item
            })
            .collect();

        Cart {
            items,
            conditions: cart_conditions,
            type_order,
            items_type_order,
            meta_data,
            required_fields: RequiredFields::default(),
        }
    }

    /// Captures the persisted state. Timestamps are left to the caller.
    pub fn to_snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            cart_conditions: self.conditions.clone(),
            type_order: self.type_order.clone(),
            items_type_order: self.items_type_order.clone(),
            meta_data: self.meta_data.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_required_fields(mut self, required: RequiredFields) -> Self {
        self.required_fields = required;
        self
    }

    pub fn set_required_fields(&mut self, required: RequiredFields) {
        self.required_fields = required;
    }

    pub fn required_fields(&self) -> &RequiredFields {
        &self.required_fields
    }

    // =========================================================================
    // Item CRUD
    // =========================================================================

    /// Adds one record or a batch.
    ///
    /// ## Behavior
    /// - Same row id as an existing line: quantities are summed
    /// - New row id: a line is appended
    /// - Batch: every record is validated and staged first; on the first
    ///   failure nothing is committed and [`CartError::BatchRecord`] names
    ///   the offending position
    pub fn add(&mut self, request: impl Into<AddRequest>) -> CartResult<Vec<Added>> {
        match request.into() {
            AddRequest::Single(input) => {
                let item = validate_item(&input, &self.required_fields)?;
                let mut staged = self.items.clone();
                let added = stage(&mut staged, item, &self.items_type_order)?;
                self.items = staged;
                Ok(vec![added])
            }
            AddRequest::Batch(inputs) => {
                let mut staged = self.items.clone();
                let mut added = Vec::with_capacity(inputs.len());
                for (index, input) in inputs.iter().enumerate() {
                    let record = validate_item(input, &self.required_fields)
                        .and_then(|item| stage(&mut staged, item, &self.items_type_order))
                        .map_err(|source| CartError::BatchRecord { index, source })?;
                    added.push(record);
                }
                self.items = staged;
                Ok(added)
            }
        }
    }

    /// Updates a line's quantity or fields.
    ///
    /// A resulting quantity ≤ 0 removes the line. Changing an identity field
    /// re-keys the line; if another line already has the new row id, the
    /// quantities are merged into that line and this one goes.
    pub fn update(
        &mut self,
        row_id: &str,
        update: impl Into<ItemUpdate>,
    ) -> CartResult<UpdateOutcome> {
        let index = self.position(row_id)?;
        let current = &self.items[index];

        let next = match update.into() {
            ItemUpdate::Quantity(change) => {
                let qty = match change {
                    QuantityChange::Set(qty) => qty,
                    QuantityChange::Adjust(by) => i64::from(current.quantity).saturating_add(by),
                };
                if qty <= 0 {
                    None
                } else {
                    let mut next = current.clone();
                    next.quantity = validate_quantity(qty)?;
                    Some(next)
                }
            }
            ItemUpdate::Fields(fields) => match coerce_update(current, &fields)? {
                FieldUpdate::Keep(next) => Some(next),
                FieldUpdate::Remove => None,
            },
        };

        let Some(mut next) = next else {
            return Ok(UpdateOutcome::Removed(self.items.remove(index)));
        };

        next.row_id = next.identity();
        let duplicate = self
            .items
            .iter()
            .enumerate()
            .find(|(i, other)| *i != index && other.row_id == next.row_id)
            .map(|(i, _)| i);

        match duplicate {
            Some(other) => {
                let merged =
                    u64::from(self.items[other].quantity) + u64::from(next.quantity);
                self.items[other].quantity =
                    u32::try_from(merged).map_err(|_| ValidationError::InvalidQuantity {
                        value: merged.to_string(),
                    })?;
                let merged = self.items[other].clone();
                self.items.remove(index);
                Ok(UpdateOutcome::Updated(merged))
            }
            None => {
                self.items[index] = next.clone();
                Ok(UpdateOutcome::Updated(next))
            }
        }
    }

    /// Removes a line and returns it.
    pub fn remove(&mut self, row_id: &str) -> CartResult<Item> {
        let index = self.position(row_id)?;
        Ok(self.items.remove(index))
    }

    /// Removes every line, cart condition and metadata entry.
    ///
    /// Type orders and required fields are kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.conditions.clear();
        self.meta_data.clear();
    }

    fn position(&self, row_id: &str) -> CartResult<usize> {
        self.items
            .iter()
            .position(|item| item.row_id == row_id)
            .ok_or_else(|| CartError::ItemNotFound(row_id.to_string()))
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Looks up a line, failing if it does not exist.
    pub fn item(&self, row_id: &str) -> CartResult<&Item> {
        self.get(row_id)
            .ok_or_else(|| CartError::ItemNotFound(row_id.to_string()))
    }

    pub fn get(&self, row_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.row_id == row_id)
    }

    pub fn has(&self, row_id: &str) -> bool {
        self.get(row_id).is_some()
    }

    /// Lines in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Item> {
        self.items.last()
    }

    /// Every line matching all criteria. See [`Item::matches`].
    pub fn find(&self, criteria: &Map<String, Value>) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|item| item.matches(criteria))
            .collect()
    }

    /// Number of lines.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Sum of line quantities.
    pub fn quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of line weights.
    pub fn weight(&self) -> f64 {
        self.items.iter().map(Item::weight).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // =========================================================================
    // Cart Conditions
    // =========================================================================

    /// Attaches a cart-level condition after the existing ones.
    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// First cart condition with this name.
    pub fn get_condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.name() == name)
    }

    /// Detaches every cart condition with this name. Returns how many went.
    pub fn remove_condition(&mut self, name: &str) -> usize {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.name() != name);
        before - self.conditions.len()
    }

    pub fn clear_conditions(&mut self) {
        self.conditions.clear();
    }

    pub fn conditions_by_type(&self, kind: &str) -> Vec<&Condition> {
        self.conditions.iter().filter(|c| c.kind() == kind).collect()
    }

    /// Detaches every cart condition of one type. Returns how many went.
    pub fn remove_conditions_by_type(&mut self, kind: &str) -> usize {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.kind() != kind);
        before - self.conditions.len()
    }

    // =========================================================================
    // Item Conditions
    // =========================================================================

    pub fn add_item_condition(&mut self, row_id: &str, condition: Condition) -> CartResult<()> {
        let index = self.position(row_id)?;
        self.items[index].add_condition(condition);
        Ok(())
    }

    /// Returns how many conditions were detached.
    pub fn remove_item_condition(&mut self, row_id: &str, name: &str) -> CartResult<usize> {
        let index = self.position(row_id)?;
        Ok(self.items[index].remove_condition(name))
    }

    pub fn clear_item_conditions(&mut self, row_id: &str) -> CartResult<()> {
        let index = self.position(row_id)?;
        self.items[index].clear_conditions();
        Ok(())
    }

    // =========================================================================
    // Type Orders
    // =========================================================================

    /// Sets which cart-level condition types apply, and in which order.
    pub fn set_conditions_order(&mut self, order: TypeOrder) {
        self.type_order = order;
    }

    /// Sets which item-level condition types apply, for every line.
    pub fn set_items_conditions_order(&mut self, order: TypeOrder) {
        for item in &mut self.items {
            item.set_type_order(order.clone());
        }
        self.items_type_order = order;
    }

    pub fn conditions_order(&self) -> &TypeOrder {
        &self.type_order
    }

    pub fn items_conditions_order(&self) -> &TypeOrder {
        &self.items_type_order
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Deep-merges `data` into the metadata. Nested maps are merged key by
    /// key; any other value replaces what was there.
    pub fn set_meta_data(&mut self, data: Map<String, Value>) {
        merge_into(&mut self.meta_data, data);
    }

    /// Looks up a dotted path (`"shipping.address.city"`).
    pub fn meta_data(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.meta_data.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn all_meta_data(&self) -> &Map<String, Value> {
        &self.meta_data
    }

    /// Removes the value at a dotted path and returns it.
    pub fn forget_meta_data(&mut self, path: &str) -> Option<Value> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut map = &mut self.meta_data;
        if let Some(parents) = parents {
            for segment in parents.split('.') {
                map = map.get_mut(segment)?.as_object_mut()?;
            }
        }
        map.shift_remove(leaf)
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Item-level contributions summed by name across every line.
    pub fn items_conditions_total(&self, kind: Option<&str>) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for item in &self.items {
            for (name, amount) in item.conditions_total(kind) {
                *totals.entry(name).or_insert(0.0) += amount;
            }
        }
        totals
    }

    /// Cart-level contributions only, summed by name.
    pub fn cart_conditions_total(&self, kind: Option<&str>) -> BTreeMap<String, f64> {
        self.pricing().breakdown.totals_by_name(kind)
    }

    /// Item and cart discounts combined.
    pub fn discounts_total(&self) -> f64 {
        self.conditions_total(Some(DISCOUNT)).values().sum()
    }

    /// Item and cart taxes combined.
    pub fn taxes_total(&self) -> f64 {
        self.conditions_total(Some(TAX)).values().sum()
    }

    /// Every line's pricing plus the cart-level pass.
    pub fn full_pricing(&self) -> CartPricing {
        CartPricing {
            lines: self
                .items
                .iter()
                .map(|item| LinePricing {
                    row_id: item.row_id.clone(),
                    pricing: item.pricing(),
                })
                .collect(),
            cart: self.pricing(),
        }
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

/// Merges `item` into `items`, or appends it.
fn stage(items: &mut Vec<Item>, mut item: Item, order: &TypeOrder) -> ValidationResult<Added> {
    if let Some(existing) = items.iter_mut().find(|e| e.row_id == item.row_id) {
        let merged = u64::from(existing.quantity) + u64::from(item.quantity);
        existing.quantity =
            u32::try_from(merged).map_err(|_| ValidationError::InvalidQuantity {
                value: merged.to_string(),
            })?;
        return Ok(Added {
            item: existing.clone(),
            merged: true,
        });
    }

    item.set_type_order(order.clone());
    items.push(item.clone());
    Ok(Added {
        item,
        merged: false,
    })
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_into(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

impl FieldSource for Cart {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "subtotal" => Some(FieldValue::Number(self.subtotal())),
            "quantity" => Some(FieldValue::Number(self.quantity() as f64)),
            "count" => Some(FieldValue::Number(self.count() as f64)),
            "weight" => Some(FieldValue::Number(self.weight())),
            path => self.meta_data(path).and_then(FieldValue::from_json),
        }
    }
}

impl Priceable for Cart {
    fn baseline(&self) -> Baseline {
        Baseline::Aggregate {
            subtotal: self.items.iter().map(Item::total).sum(),
        }
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn type_order(&self) -> &TypeOrder {
        &self.type_order
    }

    /// Cart and item contributions combined, summed by name.
    fn conditions_total(&self, kind: Option<&str>) -> BTreeMap<String, f64> {
        let mut totals = self.items_conditions_total(kind);
        for (name, amount) in self.cart_conditions_total(kind) {
            *totals.entry(name).or_insert(0.0) += amount;
        }
        totals
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Target, OTHER, SHIPPING};
    use serde_json::json;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn criteria(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn add_one(cart: &mut Cart, input: ItemInput) -> Added {
        cart.add(input).unwrap().remove(0)
    }

    fn regression_cart() -> Cart {
        let mut cart = Cart::new();
        add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 100.0, 5)
                .condition(&Condition::new("Fee", OTHER, Target::Price).with_action("+5"))
                .condition(&Condition::new("Sale", DISCOUNT, Target::Subtotal).with_action("-5%"))
                .condition(&Condition::new("VAT", TAX, Target::Subtotal).with_action("10%")),
        );
        cart.add_condition(
            Condition::new("Cart discount", DISCOUNT, Target::Subtotal).with_action("-5%"),
        );
        cart.add_condition(Condition::new("Cart tax", TAX, Target::Subtotal).with_action("10%"));
        cart
    }

    #[test]
    fn test_regression_cart_total() {
        let cart = regression_cart();

        assert_close(cart.items()[0].total(), 548.625);
        assert_close(cart.subtotal(), 548.625);
        // 548.625 × 0.95 = 521.19375 → × 1.10 = 573.313125
        assert_close(cart.total(), 573.313125);

        let cart_only = cart.cart_conditions_total(None);
        assert_close(cart_only["Cart discount"], -27.43125);
        assert_close(cart_only["Cart tax"], 52.119375);
        assert!(!cart_only.contains_key("VAT"));

        let combined = cart.conditions_total(None);
        assert_close(combined["VAT"], 49.875);
        assert_close(combined["Cart tax"], 52.119375);

        assert_close(cart.discounts_total(), -26.25 - 27.43125);
        assert_close(cart.taxes_total(), 49.875 + 52.119375);
    }

    #[test]
    fn test_totals_are_idempotent() {
        let cart = regression_cart();
        let first = cart.full_pricing();
        for _ in 0..5 {
            assert_eq!(cart.full_pricing(), first);
            assert_close(cart.total(), 573.313125);
        }
        assert_eq!(first.lines.len(), 1);
        assert_close(first.cart.breakdown.total(), 573.313125 - 548.625);
    }

    #[test]
    fn test_add_merges_same_row() {
        let mut cart = Cart::new();
        let first = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2));
        assert!(!first.merged);

        let second = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 9.0, 3));
        assert!(second.merged);
        assert_eq!(second.item.row_id(), first.item.row_id());

        assert_eq!(cart.count(), 1);
        assert_eq!(cart.quantity(), 5);
        // the existing line keeps its price
        assert_close(cart.subtotal(), 20.0);
    }

    #[test]
    fn test_merge_keeps_existing_conditions() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 10.0, 1))
            .item
            .row_id()
            .to_string();
        cart.add_item_condition(
            &row,
            Condition::new("Promo", DISCOUNT, Target::Subtotal).with_action("-1"),
        )
        .unwrap();

        add_one(&mut cart, ItemInput::new("sku-1", "Mug", 10.0, 1));

        let line = cart.item(&row).unwrap();
        assert_eq!(line.quantity(), 2);
        assert_eq!(line.conditions().len(), 1);
        assert_close(cart.total(), 19.0);
    }

    #[test]
    fn test_different_attributes_are_different_rows() {
        let mut cart = Cart::new();
        add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 1).attribute("size", "M", 0.0),
        );
        add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 1).attribute("size", "L", 1.0),
        );
        assert_eq!(cart.count(), 2);
        assert_close(cart.subtotal(), 21.0);
    }

    #[test]
    fn test_add_rejects_invalid_record() {
        let mut cart = Cart::new();
        let bad = ItemInput::new("sku-1", "Mug", 4.0, 0);
        let err = cart.add(bad).unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::InvalidQuantity { .. })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut cart = Cart::new();
        add_one(&mut cart, ItemInput::new("sku-0", "Existing", 1.0, 1));

        let batch = vec![
            ItemInput::new("sku-1", "Mug", 4.0, 1),
            ItemInput::new("sku-0", "Existing", 1.0, 2),
            ItemInput::default().set("id", "sku-3").set("price", "abc"),
        ];
        let err = cart.add(batch).unwrap_err();
        assert!(matches!(err, CartError::BatchRecord { index: 2, .. }));

        assert_eq!(cart.count(), 1);
        assert_eq!(cart.quantity(), 1);

        let batch = vec![
            ItemInput::new("sku-1", "Mug", 4.0, 1),
            ItemInput::new("sku-0", "Existing", 1.0, 2),
        ];
        let added = cart.add(batch).unwrap();
        assert_eq!(added.len(), 2);
        assert!(added[1].merged);
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.quantity(), 4);
    }

    #[test]
    fn test_add_request_from_json() {
        let single = AddRequest::from_value(json!({"id": "1"})).unwrap();
        assert!(matches!(single, AddRequest::Single(_)));

        let batch = AddRequest::from_value(json!([{"id": "1"}, {"id": "2"}])).unwrap();
        assert!(matches!(batch, AddRequest::Batch(ref records) if records.len() == 2));

        let err = AddRequest::from_value(json!([{"id": "1"}, 7])).unwrap_err();
        assert!(matches!(err, CartError::BatchRecord { index: 1, .. }));
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2))
            .item
            .row_id()
            .to_string();

        let outcome = cart.update(&row, QuantityChange::Adjust(3)).unwrap();
        assert_eq!(outcome.item().quantity(), 5);

        let outcome = cart.update(&row, QuantityChange::Set(1)).unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        assert_eq!(cart.quantity(), 1);

        let outcome = cart.update(&row, QuantityChange::Adjust(-1)).unwrap();
        assert!(matches!(outcome, UpdateOutcome::Removed(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_fields() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2))
            .item
            .row_id()
            .to_string();

        let data = criteria(json!({
            "price": "5.5",
            "conditions": [{"name": "Promo", "type": "discount", "actions": [{"value": "-1"}]}]
        }));
        let outcome = cart.update(&row, data).unwrap();

        // New conditions change the identity, so the line is re-keyed
        let row = outcome.item().row_id().to_string();
        let line = cart.item(&row).unwrap();
        assert_close(line.unit_price(), 5.5);
        assert_close(cart.total(), 10.0);

        let outcome = cart.update(&row, criteria(json!({"quantity": -3}))).unwrap();
        assert!(matches!(outcome, UpdateOutcome::Removed(_)));
        assert!(!cart.has(&row));
    }

    #[test]
    fn test_update_from_bare_number() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2))
            .item
            .row_id()
            .to_string();

        cart.update(&row, ItemUpdate::from_value(json!(7)).unwrap())
            .unwrap();
        assert_eq!(cart.quantity(), 7);

        assert_eq!(
            ItemUpdate::from_value(json!(2.5)).unwrap(),
            ItemUpdate::Quantity(QuantityChange::Set(2))
        );
        assert!(ItemUpdate::from_value(json!("x")).is_err());
    }

    #[test]
    fn test_update_price_keeps_row_id() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2))
            .item
            .row_id()
            .to_string();

        cart.update(&row, criteria(json!({"price": 6}))).unwrap();
        assert!(cart.has(&row));
        assert_close(cart.subtotal(), 12.0);
    }

    #[test]
    fn test_update_identity_fields_rekeys_line() {
        let mut cart = Cart::new();
        let old = add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 1).attribute("size", "M", 0.0),
        )
        .item
        .row_id()
        .to_string();

        let outcome = cart
            .update(&old, criteria(json!({"attributes": {"size": {"value": "L"}}})))
            .unwrap();
        let new = outcome.item().row_id().to_string();
        assert_ne!(new, old);
        assert!(!cart.has(&old));

        // Re-adding the same logical item now merges into the updated line
        let added = add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 1).attribute("size", "L", 0.0),
        );
        assert!(added.merged);
        assert_eq!(added.item.row_id(), new);
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.quantity(), 2);
    }

    #[test]
    fn test_update_into_existing_line_merges() {
        let mut cart = Cart::new();
        let medium = add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 2).attribute("size", "M", 0.0),
        )
        .item
        .row_id()
        .to_string();
        let large = add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 10.0, 3).attribute("size", "L", 0.0),
        )
        .item
        .row_id()
        .to_string();

        let outcome = cart
            .update(&medium, criteria(json!({"attributes": {"size": {"value": "L"}}})))
            .unwrap();

        assert_eq!(outcome.item().row_id(), large);
        assert_eq!(outcome.item().quantity(), 5);
        assert_eq!(cart.count(), 1);
        assert!(!cart.has(&medium));
    }

    #[test]
    fn test_failed_update_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("sku-1", "Mug", 4.0, 2))
            .item
            .row_id()
            .to_string();
        let before = cart.clone();

        assert!(cart
            .update(&row, criteria(json!({"name": "New", "price": "free"})))
            .is_err());
        assert_eq!(cart, before);

        assert!(matches!(
            cart.update("missing", QuantityChange::Set(1)),
            Err(CartError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = regression_cart();
        cart.set_meta_data(criteria(json!({"note": "gift"})));
        let row = cart.first().unwrap().row_id().to_string();

        assert!(matches!(cart.remove("nope"), Err(CartError::ItemNotFound(_))));
        let removed = cart.remove(&row).unwrap();
        assert_eq!(removed.row_id(), row);
        assert!(cart.is_empty());

        cart.set_conditions_order(TypeOrder::new([TAX]));
        cart.clear();
        assert!(cart.conditions().is_empty());
        assert!(cart.all_meta_data().is_empty());
        assert_eq!(cart.conditions_order(), &TypeOrder::new([TAX]));
        assert_close(cart.total(), 0.0);
    }

    #[test]
    fn test_find() {
        let mut cart = Cart::new();
        add_one(
            &mut cart,
            ItemInput::new("sku-1", "Shirt", 85.0, 1).attribute("size", "M", 0.0),
        );
        add_one(
            &mut cart,
            ItemInput::new("sku-2", "Shirt", 85.0, 2).attribute("size", "L", 0.0),
        );
        add_one(&mut cart, ItemInput::new("sku-3", "Hat", 20.0, 1));

        assert_eq!(cart.find(&criteria(json!({"price": 85}))).len(), 2);

        let found = cart.find(&criteria(json!({"name": "Shirt", "attributes": {"size": "L"}})));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "sku-2");

        assert!(cart.find(&criteria(json!({"name": "Socks"}))).is_empty());
    }

    #[test]
    fn test_first_last_weight() {
        let mut cart = Cart::new();
        assert!(cart.first().is_none());

        add_one(&mut cart, ItemInput::new("a", "A", 1.0, 2).weight(1.5));
        add_one(&mut cart, ItemInput::new("b", "B", 1.0, 1).weight(0.5));

        assert_eq!(cart.first().unwrap().id(), "a");
        assert_eq!(cart.last().unwrap().id(), "b");
        assert_close(cart.weight(), 3.5);
    }

    #[test]
    fn test_cart_condition_management() {
        let mut cart = regression_cart();
        cart.add_condition(Condition::new("Courier", SHIPPING, Target::Subtotal).with_action("+15"));

        // shipping is not in the default order
        assert_close(cart.total(), 573.313125);

        cart.set_conditions_order(TypeOrder::new([DISCOUNT, OTHER, TAX, SHIPPING]));
        assert_close(cart.total(), 588.313125);

        assert_eq!(cart.conditions_by_type(TAX).len(), 1);
        assert!(cart.get_condition("Courier").is_some());
        assert_eq!(cart.remove_conditions_by_type(SHIPPING), 1);
        assert_eq!(cart.remove_condition("Cart tax"), 1);
        assert_close(cart.total(), 548.625 * 0.95);

        cart.clear_conditions();
        assert_close(cart.total(), 548.625);
    }

    #[test]
    fn test_cart_rules_see_cart_fields() {
        let mut cart = Cart::new();
        add_one(&mut cart, ItemInput::new("a", "A", 300.0, 1));
        cart.add_condition(
            Condition::new("Big order", DISCOUNT, Target::Subtotal)
                .with_action("-10%")
                .with_rule("subtotal > 500"),
        );
        assert_close(cart.total(), 300.0);

        add_one(&mut cart, ItemInput::new("b", "B", 300.0, 1));
        assert_close(cart.total(), 540.0);
    }

    #[test]
    fn test_price_target_on_cart_is_inert() {
        let mut cart = Cart::new();
        add_one(&mut cart, ItemInput::new("a", "A", 50.0, 2));
        cart.add_condition(Condition::new("Odd", DISCOUNT, Target::Price).with_action("-10"));
        assert_close(cart.total(), 100.0);
        assert!(cart.cart_conditions_total(None).is_empty());
    }

    #[test]
    fn test_items_conditions_order() {
        let mut cart = regression_cart();
        cart.set_items_conditions_order(TypeOrder::new([DISCOUNT]));

        // item: 500 × 0.95 = 475 (fee and VAT no longer apply)
        assert_close(cart.subtotal(), 475.0);

        add_one(&mut cart, ItemInput::new("sku-2", "Hat", 10.0, 1).condition(
            &Condition::new("Hat tax", TAX, Target::Subtotal).with_action("10%"),
        ));
        assert_close(cart.subtotal(), 485.0);
    }

    #[test]
    fn test_item_condition_management() {
        let mut cart = Cart::new();
        let row = add_one(&mut cart, ItemInput::new("a", "A", 10.0, 1))
            .item
            .row_id()
            .to_string();

        cart.add_item_condition(&row, Condition::new("X", TAX, Target::Subtotal).with_action("+1"))
            .unwrap();
        assert_close(cart.total(), 11.0);
        assert_eq!(cart.remove_item_condition(&row, "X").unwrap(), 1);
        cart.clear_item_conditions(&row).unwrap();
        assert_close(cart.total(), 10.0);

        assert!(cart
            .add_item_condition("missing", Condition::new("X", TAX, Target::Subtotal))
            .is_err());
    }

    #[test]
    fn test_meta_data_deep_merge() {
        let mut cart = Cart::new();
        cart.set_meta_data(criteria(json!({
            "shipping": {"address": {"city": "Lahore", "zip": "54000"}, "method": "courier"}
        })));
        cart.set_meta_data(criteria(json!({
            "shipping": {"address": {"city": "Karachi"}},
            "note": "leave at door"
        })));

        assert_eq!(cart.meta_data("shipping.address.city").unwrap(), "Karachi");
        assert_eq!(cart.meta_data("shipping.address.zip").unwrap(), "54000");
        assert_eq!(cart.meta_data("shipping.method").unwrap(), "courier");
        assert_eq!(cart.meta_data("note").unwrap(), "leave at door");
        assert!(cart.meta_data("shipping.carrier").is_none());

        assert_eq!(cart.forget_meta_data("shipping.address.zip"), Some(json!("54000")));
        assert!(cart.meta_data("shipping.address.zip").is_none());
        assert_eq!(cart.forget_meta_data("note"), Some(json!("leave at door")));
        assert_eq!(cart.forget_meta_data("missing.path"), None);
    }

    #[test]
    fn test_forget_meta_data_keeps_order() {
        let mut cart = Cart::new();
        cart.set_meta_data(criteria(json!({
            "a": 1, "b": 2, "c": 3,
            "d": {"x": 1, "y": 2, "z": 3}
        })));

        cart.forget_meta_data("a");
        cart.forget_meta_data("d.x");

        let keys: Vec<&str> = cart.all_meta_data().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "c", "d"]);
        let nested: Vec<&str> = cart
            .meta_data("d")
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(nested, vec!["y", "z"]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut cart = regression_cart();
        cart.set_meta_data(criteria(json!({"channel": "web"})));
        cart.set_items_conditions_order(TypeOrder::new([DISCOUNT, OTHER, TAX, SHIPPING]));

        let snapshot = cart.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = Cart::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored, cart);
        assert_close(restored.total(), 573.313125);
    }

    #[test]
    fn test_snapshot_drops_zero_quantity_lines() {
        let json = json!({
            "items": {
                "r1": {"id": "a", "name": "A", "price": 1.0, "quantity": 0},
                "r2": {"id": "b", "name": "B", "price": 2.0, "quantity": 1}
            }
        });
        let cart = Cart::from_snapshot(serde_json::from_value(json).unwrap());
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.first().unwrap().row_id(), "r2");
    }

    #[test]
    fn test_totals_summary() {
        let totals = regression_cart().totals();
        assert_eq!(totals.item_count, 1);
        assert_eq!(totals.total_quantity, 5);
        assert_close(totals.subtotal, 548.625);
        assert_close(totals.total, 573.313125);

        let json = serde_json::to_value(&totals).unwrap();
        assert!(json.get("itemCount").is_some());
    }
}
