//! # Snapshot
//!
//! The persisted layout of one cart instance.
//!
//! ```json
//! {
//!   "items": {
//!     "4f0c..": { "rowId": "4f0c..", "id": "sku-1", "name": "Shirt", "price": 100.0,
//!                 "quantity": 5, "weight": 0.0,
//!                 "attributes": { "size": { "label": "size", "value": "XL", "price": 5.0, "weight": 0.0 } },
//!                 "conditions": [] }
//!   },
//!   "cartConditions": [ { "name": "VAT", "type": "tax", "target": "subtotal",
//!                         "actions": [{ "value": "10%", "inclusive": false }], "rules": [] } ],
//!   "typeOrder": ["discount", "other", "tax"],
//!   "itemsTypeOrder": ["discount", "other", "tax"],
//!   "metaData": {}
//! }
//! ```
//!
//! Keyed collections (`items`, `attributes`) are kept as ordered `Vec`s in
//! memory and written as maps through the [`keyed`] serde helper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::Condition;
use crate::item::Item;
use crate::pricing::TypeOrder;

/// A persisted item line.
pub type ItemRecord = Item;

/// A persisted condition.
pub type ConditionRecord = Condition;

/// Full state of one cart instance, as handed to the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(default, with = "keyed")]
    pub items: Vec<ItemRecord>,

    #[serde(default)]
    pub cart_conditions: Vec<ConditionRecord>,

    #[serde(default)]
    pub type_order: TypeOrder,

    #[serde(default)]
    pub items_type_order: TypeOrder,

    #[serde(default)]
    pub meta_data: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    /// True if there are no items, no cart conditions and no metadata.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.cart_conditions.is_empty() && self.meta_data.is_empty()
    }
}

// =============================================================================
// Keyed Collections
// =============================================================================

/// An entry stored under its own key in a persisted map.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Restores the key after the entry was read back from a map.
    fn set_key(&mut self, key: String);
}

/// `#[serde(with = "keyed")]` for `Vec<T: Keyed>`: written as an ordered
/// map of `key → entry`, read back in map order.
pub mod keyed {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    use super::Keyed;

    pub fn serialize<S, T>(entries: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Keyed + Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for entry in entries {
            map.serialize_entry(entry.key(), entry)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Keyed + Deserialize<'de>,
    {
        deserializer.deserialize_map(KeyedVisitor(PhantomData))
    }

    struct KeyedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for KeyedVisitor<T>
    where
        T: Keyed + Deserialize<'de>,
    {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of keyed entries")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, mut entry)) = access.next_entry::<String, T>()? {
                entry.set_key(key);
                entries.push(entry);
            }
            Ok(entries)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Target, TAX};
    use crate::validation::ItemInput;
    use serde_json::json;

    #[test]
    fn test_empty_snapshot_defaults() {
        let snapshot: CartSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.type_order, TypeOrder::default());
        assert!(snapshot.created_at.is_none());
    }

    #[test]
    fn test_items_written_as_map_in_order() {
        let first = Item::from_input(&ItemInput::new("b", "Second name", 1.0, 1)).unwrap();
        let second = Item::from_input(&ItemInput::new("a", "First name", 2.0, 1)).unwrap();
        let snapshot = CartSnapshot {
            items: vec![first.clone(), second.clone()],
            cart_conditions: vec![Condition::new("VAT", TAX, Target::Subtotal).with_action("10%")],
            ..CartSnapshot::default()
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        let keys: Vec<&str> = json["items"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec![first.row_id(), second.row_id()]);
        assert_eq!(json["cartConditions"][0]["type"], "tax");
        assert_eq!(json["itemsTypeOrder"], json!(["discount", "other", "tax"]));
        assert!(json.get("createdAt").is_none());

        let back: CartSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_map_key_is_the_row_id() {
        let json = json!({
            "items": {
                "row-1": {"id": "sku-1", "name": "Mug", "price": 4.5, "quantity": 2}
            }
        });
        let snapshot: CartSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.items[0].row_id(), "row-1");
        assert_eq!(snapshot.items[0].quantity(), 2);
    }
}
