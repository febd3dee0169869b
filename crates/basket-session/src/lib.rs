//! # basket-session: Cart Instances for Basket
//!
//! Puts [`basket_core::Cart`] behind a storage collaborator and an event
//! sink, so that carts survive between requests.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        basket-session                                   │
//! │                                                                         │
//! │   SessionConfig ──────────► CartSession<S: CartStore, E: EventSink>     │
//! │   (TOML + env)                     │                  │                 │
//! │                                    │ get / put        │ emit            │
//! │                                    ▼                  ▼                 │
//! │                            ┌──────────────┐   ┌────────────────┐       │
//! │                            │ MemoryStore  │   │ NullSink       │       │
//! │                            │ JsonFileStore│   │ TracingSink    │       │
//! │                            └──────────────┘   │ RecordingSink  │       │
//! │                                               └────────────────┘       │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │                         basket-core (pure pricing)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Instance switching and the read-modify-write cycle
//! - [`storage`] - The storage collaborator and its backends
//! - [`events`] - Event envelope and sinks
//! - [`config`] - Session configuration
//! - [`error`] - Session and storage errors
//!
//! ## Example Usage
//!
//! ```rust
//! use basket_core::{Condition, ItemInput, Target, TAX};
//! use basket_session::{CartSession, MemoryStore, NullSink};
//!
//! let mut session = CartSession::new(MemoryStore::new(), NullSink);
//! session.add(ItemInput::new("sku-1", "Shirt", 20.0, 2)).unwrap();
//! session
//!     .add_condition(Condition::new("VAT", TAX, Target::Subtotal).with_action("10%"))
//!     .unwrap();
//!
//! assert!((session.total().unwrap() - 44.0).abs() < 1e-9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    CartSettings, EventSettings, SessionConfig, StorageBackend, StorageSettings,
};
pub use error::{SessionError, SessionResult, StoreError, StoreResult};
pub use events::{CartEvent, CartEventKind, EventSink, NullSink, RecordingSink, TracingSink};
pub use session::{CartSession, DEFAULT_INSTANCE};
pub use storage::{validate_instance_name, CartStore, JsonFileStore, MemoryStore};
