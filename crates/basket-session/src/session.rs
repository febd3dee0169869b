//! # Cart Session
//!
//! Named cart instances behind a storage collaborator and an event sink.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Read-Modify-Write Cycle                              │
//! │                                                                         │
//! │  session.add(record)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store.get(instance) ──── None ──► empty cart, put, emit Created        │
//! │       │ Some(snapshot)                                                  │
//! │       ▼                                                                 │
//! │  Cart::from_snapshot ──► cart.add(record)                               │
//! │                               │                                         │
//! │                 ┌─────────────┴─────────────┐                           │
//! │                 ▼                           ▼                           │
//! │              Err(e)                       Ok(added)                     │
//! │          nothing written            store.put(snapshot)                 │
//! │          nothing emitted            emit Added per record               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Instances
//! A session points at one instance at a time (`"main"` by default).
//! Switching with [`CartSession::instance`] only changes which snapshot the
//! next call reads and writes; instances never share state.
//!
//! ## Concurrency
//! A session is single-threaded. Callers that share a store between
//! sessions must serialize access to an instance themselves.

use basket_core::{
    AddRequest, Cart, CartPricing, CartResult, CartSnapshot, CartTotals, Condition, Item,
    ItemUpdate, Priceable, RequiredFields, TypeOrder, UpdateOutcome,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::events::{CartEvent, CartEventKind, EventSink, TracingSink};
use crate::storage::{validate_instance_name, CartStore};

/// Instance a session starts on unless configured otherwise.
pub const DEFAULT_INSTANCE: &str = "main";

// =============================================================================
// Cart Session
// =============================================================================

/// A cart whose state lives in a [`CartStore`].
///
/// Every call reads the current instance's snapshot, and every successful
/// mutation writes it back before any event is emitted.
///
/// ## Example
/// ```rust
/// use basket_core::ItemInput;
/// use basket_session::{CartSession, MemoryStore, RecordingSink};
///
/// let mut session = CartSession::new(MemoryStore::new(), RecordingSink::new());
/// session.add(ItemInput::new("sku-1", "Mug", 12.5, 2)).unwrap();
///
/// assert_eq!(session.subtotal().unwrap(), 25.0);
/// assert_eq!(session.sink().kinds(), vec!["created", "added"]);
///
/// session.instance("wishlist").unwrap();
/// assert!(session.is_empty().unwrap());
/// ```
#[derive(Debug)]
pub struct CartSession<S: CartStore, E: EventSink> {
    store: S,
    sink: E,
    instance: String,
    events_enabled: bool,
    required_fields: RequiredFields,
    conditions_order: TypeOrder,
    items_conditions_order: TypeOrder,
}

impl<S: CartStore, E: EventSink> CartSession<S, E> {
    /// Creates a session on the `"main"` instance with default settings.
    pub fn new(store: S, sink: E) -> Self {
        CartSession {
            store,
            sink,
            instance: DEFAULT_INSTANCE.to_string(),
            events_enabled: true,
            required_fields: RequiredFields::default(),
            conditions_order: TypeOrder::default(),
            items_conditions_order: TypeOrder::default(),
        }
    }

    /// Creates a session using the cart and event settings of `config`.
    pub fn from_config(config: &SessionConfig, store: S, sink: E) -> SessionResult<Self> {
        config.validate()?;
        Ok(CartSession {
            store,
            sink,
            instance: config.cart.default_instance.clone(),
            events_enabled: config.events.enabled,
            required_fields: config.cart.required_fields.clone(),
            conditions_order: config.cart.conditions_order.clone(),
            items_conditions_order: config.cart.items_conditions_order.clone(),
        })
    }

    /// Turns event emission on or off for the lifetime of the session.
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.events_enabled = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn into_parts(self) -> (S, E) {
        (self.store, self.sink)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Switches to another named instance.
    ///
    /// Returns the session so calls can be chained:
    /// `session.instance("wishlist")?.add(record)?`.
    pub fn instance(&mut self, name: &str) -> SessionResult<&mut Self> {
        validate_instance_name(name)?;
        if name != self.instance {
            let from = std::mem::replace(&mut self.instance, name.to_string());
            info!(from = %from, to = %name, "Switched cart instance");
            self.emit(CartEventKind::InstanceChanged {
                from,
                to: name.to_string(),
            });
        }
        Ok(self)
    }

    pub fn current_instance(&self) -> &str {
        &self.instance
    }

    /// Every instance the store holds a snapshot for.
    pub fn instances(&self) -> SessionResult<Vec<String>> {
        Ok(self.store.list_instances()?)
    }

    /// Forgets the current instance's snapshot. The next access starts over
    /// with an empty cart.
    pub fn destroy(&mut self) -> SessionResult<()> {
        self.store.forget(&self.instance)?;
        info!(instance = %self.instance, "Cart instance destroyed");
        Ok(())
    }

    /// Runs `f` with events suppressed, then restores the previous setting.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::ItemInput;
    /// use basket_session::{CartSession, MemoryStore, RecordingSink};
    ///
    /// let mut session = CartSession::new(MemoryStore::new(), RecordingSink::new());
    /// session
    ///     .silently(|s| s.add(ItemInput::new("sku-1", "Mug", 12.5, 2)))
    ///     .unwrap();
    ///
    /// assert!(session.sink().events().is_empty());
    /// ```
    pub fn silently<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.events_enabled, false);
        let result = f(self);
        self.events_enabled = previous;
        result
    }

    // =========================================================================
    // Loading & Persisting
    // =========================================================================

    /// The current instance's stored snapshot, created on first access.
    pub fn snapshot(&mut self) -> SessionResult<CartSnapshot> {
        if let Some(snapshot) = self.store.get(&self.instance)? {
            debug!(instance = %self.instance, items = snapshot.items.len(), "Cart snapshot loaded");
            return Ok(snapshot);
        }

        let mut cart = Cart::new();
        cart.set_conditions_order(self.conditions_order.clone());
        cart.set_items_conditions_order(self.items_conditions_order.clone());

        let now = Utc::now();
        let mut snapshot = cart.to_snapshot();
        snapshot.created_at = Some(now);
        snapshot.updated_at = Some(now);
        self.store.put(&self.instance, Some(&snapshot))?;

        debug!(instance = %self.instance, "Empty cart created");
        self.emit(CartEventKind::Created);
        Ok(snapshot)
    }

    /// The current instance as a [`Cart`].
    pub fn cart(&mut self) -> SessionResult<Cart> {
        let snapshot = self.snapshot()?;
        Ok(Cart::from_snapshot(snapshot).with_required_fields(self.required_fields.clone()))
    }

    /// Loads the cart, applies `f`, and writes the result back if `f`
    /// succeeded. A failed `f` leaves the stored snapshot untouched.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut Cart) -> CartResult<T>) -> SessionResult<(Cart, T)> {
        let snapshot = self.snapshot()?;
        let created_at = snapshot.created_at;
        let mut cart =
            Cart::from_snapshot(snapshot).with_required_fields(self.required_fields.clone());

        let value = f(&mut cart)?;
        self.persist(&cart, created_at)?;
        Ok((cart, value))
    }

    fn persist(
        &mut self,
        cart: &Cart,
        created_at: Option<DateTime<Utc>>,
    ) -> SessionResult<()> {
        let now = Utc::now();
        let mut snapshot = cart.to_snapshot();
        snapshot.created_at = created_at.or(Some(now));
        snapshot.updated_at = Some(now);

        self.store.put(&self.instance, Some(&snapshot))?;
        debug!(instance = %self.instance, items = snapshot.items.len(), "Cart snapshot persisted");
        Ok(())
    }

    fn emit(&self, kind: CartEventKind) {
        if self.events_enabled {
            self.sink.emit(&CartEvent::new(&self.instance, kind));
        }
    }

    // =========================================================================
    // Item CRUD
    // =========================================================================

    /// Adds one record or a batch. See [`Cart::add`].
    ///
    /// Emits one `added` event per record, each carrying the totals after
    /// the whole request.
    pub fn add(&mut self, request: impl Into<AddRequest>) -> SessionResult<Vec<Item>> {
        let (cart, added) = self.mutate(|cart| cart.add(request))?;
        let totals = cart.totals();

        let mut items = Vec::with_capacity(added.len());
        for record in added {
            info!(
                instance = %self.instance,
                row_id = %record.item.row_id(),
                quantity = record.item.quantity(),
                merged = record.merged,
                "Item added to cart"
            );
            self.emit(CartEventKind::Added {
                item: record.item.clone(),
                totals: totals.clone(),
            });
            items.push(record.item);
        }
        Ok(items)
    }

    /// Updates a line's quantity or fields. See [`Cart::update`].
    pub fn update(
        &mut self,
        row_id: &str,
        update: impl Into<ItemUpdate>,
    ) -> SessionResult<UpdateOutcome> {
        let (cart, outcome) = self.mutate(|cart| cart.update(row_id, update))?;
        let totals = cart.totals();

        match &outcome {
            UpdateOutcome::Updated(item) => {
                debug!(instance = %self.instance, row_id = %row_id, "Item updated");
                self.emit(CartEventKind::Updated {
                    item: item.clone(),
                    totals,
                });
            }
            UpdateOutcome::Removed(item) => {
                info!(instance = %self.instance, row_id = %row_id, "Item removed by update");
                self.emit(CartEventKind::Removed {
                    item: item.clone(),
                    totals,
                });
            }
        }
        Ok(outcome)
    }

    /// Removes a line and returns it.
    pub fn remove(&mut self, row_id: &str) -> SessionResult<Item> {
        let (cart, item) = self.mutate(|cart| cart.remove(row_id))?;

        info!(instance = %self.instance, row_id = %row_id, "Item removed from cart");
        self.emit(CartEventKind::Removed {
            item: item.clone(),
            totals: cart.totals(),
        });
        Ok(item)
    }

    /// Empties the current instance and restarts its creation timestamp.
    pub fn clear(&mut self) -> SessionResult<()> {
        let mut cart = self.cart()?;
        cart.clear();
        self.persist(&cart, None)?;

        info!(instance = %self.instance, "Cart cleared");
        self.emit(CartEventKind::Cleared);
        Ok(())
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    pub fn add_condition(&mut self, condition: Condition) -> SessionResult<()> {
        self.mutate(|cart| {
            cart.add_condition(condition);
            Ok(())
        })
        .map(|_| ())
    }

    /// Removes every cart condition with this name; returns how many went.
    pub fn remove_condition(&mut self, name: &str) -> SessionResult<usize> {
        self.mutate(|cart| Ok(cart.remove_condition(name)))
            .map(|(_, removed)| removed)
    }

    pub fn clear_conditions(&mut self) -> SessionResult<()> {
        self.mutate(|cart| {
            cart.clear_conditions();
            Ok(())
        })
        .map(|_| ())
    }

    pub fn remove_conditions_by_type(&mut self, kind: &str) -> SessionResult<usize> {
        self.mutate(|cart| Ok(cart.remove_conditions_by_type(kind)))
            .map(|(_, removed)| removed)
    }

    pub fn add_item_condition(&mut self, row_id: &str, condition: Condition) -> SessionResult<()> {
        self.mutate(|cart| cart.add_item_condition(row_id, condition))
            .map(|_| ())
    }

    pub fn remove_item_condition(&mut self, row_id: &str, name: &str) -> SessionResult<usize> {
        self.mutate(|cart| cart.remove_item_condition(row_id, name))
            .map(|(_, removed)| removed)
    }

    pub fn clear_item_conditions(&mut self, row_id: &str) -> SessionResult<()> {
        self.mutate(|cart| cart.clear_item_conditions(row_id))
            .map(|_| ())
    }

    pub fn get_condition(&mut self, name: &str) -> SessionResult<Option<Condition>> {
        Ok(self.cart()?.get_condition(name).cloned())
    }

    pub fn set_conditions_order(&mut self, order: TypeOrder) -> SessionResult<()> {
        self.mutate(|cart| {
            cart.set_conditions_order(order);
            Ok(())
        })
        .map(|_| ())
    }

    pub fn set_items_conditions_order(&mut self, order: TypeOrder) -> SessionResult<()> {
        self.mutate(|cart| {
            cart.set_items_conditions_order(order);
            Ok(())
        })
        .map(|_| ())
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn set_meta_data(&mut self, data: Map<String, Value>) -> SessionResult<()> {
        self.mutate(|cart| {
            cart.set_meta_data(data);
            Ok(())
        })
        .map(|_| ())
    }

    pub fn meta_data(&mut self, path: &str) -> SessionResult<Option<Value>> {
        Ok(self.cart()?.meta_data(path).cloned())
    }

    pub fn forget_meta_data(&mut self, path: &str) -> SessionResult<Option<Value>> {
        self.mutate(|cart| Ok(cart.forget_meta_data(path)))
            .map(|(_, value)| value)
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    pub fn items(&mut self) -> SessionResult<Vec<Item>> {
        Ok(self.cart()?.items().to_vec())
    }

    pub fn item(&mut self, row_id: &str) -> SessionResult<Item> {
        Ok(self.cart()?.item(row_id)?.clone())
    }

    pub fn has(&mut self, row_id: &str) -> SessionResult<bool> {
        Ok(self.cart()?.has(row_id))
    }

    pub fn find(&mut self, criteria: &Map<String, Value>) -> SessionResult<Vec<Item>> {
        Ok(self.cart()?.find(criteria).into_iter().cloned().collect())
    }

    pub fn count(&mut self) -> SessionResult<usize> {
        Ok(self.cart()?.count())
    }

    pub fn quantity(&mut self) -> SessionResult<u64> {
        Ok(self.cart()?.quantity())
    }

    pub fn weight(&mut self) -> SessionResult<f64> {
        Ok(self.cart()?.weight())
    }

    pub fn is_empty(&mut self) -> SessionResult<bool> {
        Ok(self.cart()?.is_empty())
    }

    pub fn subtotal(&mut self) -> SessionResult<f64> {
        Ok(self.cart()?.subtotal())
    }

    pub fn total(&mut self) -> SessionResult<f64> {
        Ok(self.cart()?.total())
    }

    /// Item and cart contributions summed by name.
    pub fn conditions_total(&mut self, kind: Option<&str>) -> SessionResult<BTreeMap<String, f64>> {
        Ok(self.cart()?.conditions_total(kind))
    }

    pub fn items_conditions_total(
        &mut self,
        kind: Option<&str>,
    ) -> SessionResult<BTreeMap<String, f64>> {
        Ok(self.cart()?.items_conditions_total(kind))
    }

    pub fn discounts_total(&mut self) -> SessionResult<f64> {
        Ok(self.cart()?.discounts_total())
    }

    pub fn taxes_total(&mut self) -> SessionResult<f64> {
        Ok(self.cart()?.taxes_total())
    }

    pub fn totals(&mut self) -> SessionResult<CartTotals> {
        Ok(self.cart()?.totals())
    }

    pub fn full_pricing(&mut self) -> SessionResult<CartPricing> {
        Ok(self.cart()?.full_pricing())
    }
}

impl CartSession<Box<dyn CartStore>, TracingSink> {
    /// Opens the configured store and logs events through `tracing`.
    pub fn open(config: &SessionConfig) -> SessionResult<Self> {
        let store = config.open_store()?;
        CartSession::from_config(config, store, TracingSink)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
