//! # Cart Events
//!
//! Fire-and-forget notifications about cart changes.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  session.add(..) ──► cart mutated ──► snapshot persisted                │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                       CartEvent { id, instance, occurredAt, kind }      │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                       sink.emit(&event)    (no return value, no retry)  │
//! │                                                                         │
//! │  Kinds: created, added, updated, removed, cleared, instance_changed     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are only emitted after the snapshot was written, so a sink never
//! hears about a change that was not persisted.

use std::sync::{Arc, Mutex, PoisonError};

use basket_core::{CartTotals, Item};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

// =============================================================================
// Event Envelope
// =============================================================================

/// One cart notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEvent {
    pub id: Uuid,
    pub instance: String,
    pub occurred_at: DateTime<Utc>,
    pub kind: CartEventKind,
}

impl CartEvent {
    pub fn new(instance: impl Into<String>, kind: CartEventKind) -> Self {
        CartEvent {
            id: Uuid::new_v4(),
            instance: instance.into(),
            occurred_at: Utc::now(),
            kind,
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEventKind {
    /// An empty cart was created and persisted on first access.
    Created,

    Added { item: Item, totals: CartTotals },

    Updated { item: Item, totals: CartTotals },

    Removed { item: Item, totals: CartTotals },

    Cleared,

    InstanceChanged { from: String, to: String },
}

impl CartEventKind {
    /// Short name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CartEventKind::Created => "created",
            CartEventKind::Added { .. } => "added",
            CartEventKind::Updated { .. } => "updated",
            CartEventKind::Removed { .. } => "removed",
            CartEventKind::Cleared => "cleared",
            CartEventKind::InstanceChanged { .. } => "instance_changed",
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// The event collaborator.
pub trait EventSink {
    fn emit(&self, event: &CartEvent);
}

impl<E: EventSink + ?Sized> EventSink for Box<E> {
    fn emit(&self, event: &CartEvent) {
        (**self).emit(event)
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &CartEvent) {}
}

/// Logs every event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CartEvent) {
        info!(
            event_id = %event.id,
            instance = %event.instance,
            kind = event.kind.name(),
            "Cart event"
        );
    }
}

/// Keeps every event in memory. Clones share the same buffer.
///
/// ## Usage
/// ```rust
/// use basket_session::events::{CartEvent, CartEventKind, EventSink, RecordingSink};
///
/// let sink = RecordingSink::new();
/// let handle = sink.clone();
///
/// sink.emit(&CartEvent::new("main", CartEventKind::Cleared));
/// assert_eq!(handle.kinds(), vec!["cleared"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<CartEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far, oldest first.
    pub fn events(&self) -> Vec<CartEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kind names of every event recorded so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.kind.name())
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &CartEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::{Cart, ItemInput};

    #[test]
    fn test_envelope() {
        let a = CartEvent::new("main", CartEventKind::Created);
        let b = CartEvent::new("main", CartEventKind::Created);
        assert_ne!(a.id, b.id);
        assert_eq!(a.instance, "main");

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["kind"]["type"], "created");
        assert!(json.get("occurredAt").is_some());
    }

    #[test]
    fn test_payload_serialization() {
        let mut cart = Cart::new();
        let added = cart
            .add(ItemInput::new("sku-1", "Mug", 3.0, 2))
            .unwrap()
            .remove(0);
        let event = CartEvent::new(
            "main",
            CartEventKind::Added {
                item: added.item,
                totals: cart.totals(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "added");
        assert_eq!(json["kind"]["item"]["id"], "sku-1");
        assert_eq!(json["kind"]["totals"]["totalQuantity"], 2);
    }

    #[test]
    fn test_recording_sink_shares_buffer() {
        let sink = RecordingSink::new();
        let handle = sink.clone();

        sink.emit(&CartEvent::new("main", CartEventKind::Created));
        sink.emit(&CartEvent::new(
            "main",
            CartEventKind::InstanceChanged {
                from: "main".into(),
                to: "wishlist".into(),
            },
        ));

        assert_eq!(handle.kinds(), vec!["created", "instance_changed"]);
        assert_eq!(handle.events().len(), 2);

        handle.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_and_tracing_sinks_accept_events() {
        let event = CartEvent::new("main", CartEventKind::Cleared);
        NullSink.emit(&event);
        TracingSink.emit(&event);
        let boxed: Box<dyn EventSink> = Box::new(NullSink);
        boxed.emit(&event);
    }
}
