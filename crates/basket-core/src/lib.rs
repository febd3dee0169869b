//! # basket-core: Pure Cart & Pricing Logic for Basket
//!
//! This crate is the **heart** of Basket. It holds the cart model and the
//! condition application engine as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Caller (web handler, CLI, job)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              basket-session (I/O edge)                          │   │
//! │  │    instances, storage round-trips, event sinks, config         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ basket-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ condition │  │  pricing  │  │   cart    │  │ validation│  │   │
//! │  │   │   rule    │  │ TypeOrder │  │   Item    │  │ ItemInput │  │   │
//! │  │   │   value   │  │ Breakdown │  │ snapshot  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO LOGGING • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`condition`] - Named, typed pricing adjustments
//! - [`value`] - Fixed and percentage action values
//! - [`rule`] - Eligibility expressions (`price <= 125`)
//! - [`pricing`] - The two-pass application engine
//! - [`item`] - Cart lines and row identity
//! - [`cart`] - Item CRUD, search, cart conditions, metadata
//! - [`validation`] - Item record validation
//! - [`snapshot`] - Persisted layout
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every total is recomputed from scratch, so the
//!    same cart always prices the same way
//! 2. **No I/O**: storage and events live in `basket-session`
//! 3. **Fail Closed**: a broken rule or action makes its condition inert,
//!    pricing itself never errors
//! 4. **Explicit Errors**: CRUD failures are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use basket_core::{Cart, Condition, ItemInput, Priceable, Target, DISCOUNT, OTHER, TAX};
//!
//! let mut cart = Cart::new();
//! cart.add(
//!     ItemInput::new("sku-1", "Shirt", 100.0, 5)
//!         .condition(&Condition::new("Fee", OTHER, Target::Price).with_action("+5"))
//!         .condition(&Condition::new("Sale", DISCOUNT, Target::Subtotal).with_action("-5%"))
//!         .condition(&Condition::new("VAT", TAX, Target::Subtotal).with_action("10%")),
//! )
//! .unwrap();
//!
//! // (100 + 5) × 5 = 525 → -5% → +10%
//! assert!((cart.subtotal() - 548.625).abs() < 1e-9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod condition;
pub mod error;
pub mod item;
pub mod pricing;
pub mod rule;
pub mod snapshot;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use basket_core::Cart` instead of
// `use basket_core::cart::Cart`

pub use cart::{
    AddRequest, Added, Cart, CartPricing, CartTotals, ItemUpdate, LinePricing, QuantityChange,
    UpdateOutcome,
};
pub use condition::{Condition, ConditionResult, Target, DISCOUNT, OTHER, SHIPPING, TAX};
pub use error::{CartError, CartResult, ValidationError};
pub use item::{Item, ItemAttribute};
pub use pricing::{apply_conditions, Baseline, Breakdown, Priceable, Pricing, TypeOrder};
pub use rule::{CompareOp, FieldSource, FieldValue, Rule};
pub use snapshot::{CartSnapshot, ConditionRecord, ItemRecord};
pub use validation::{ItemInput, RequiredFields, ValidationResult};
pub use value::{ActionValue, ConditionAction};
