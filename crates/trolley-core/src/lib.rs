//! # trolley-core
//!
//! Cart pricing for Trolley: the BOGOF / bulk / loyalty engine, the rules
//! for adding and changing cart lines, and the money type they share.
//! Nothing in here touches a database, a clock-driven lock or the network.
//!
//! ## Where It Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (HTTP handler, CLI, seed binary)                                │
//! │    add_product · update_quantity · remove_item · toggle_loyalty         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  trolley-db::CartStore    lock user ─► load ─► mutate ─► price ─► save  │
//! │        │                                    │          │                │
//! │        │                         cart::CartDraft   pricing::recompute   │
//! │        ▼                                    └────┬─────┘                │
//! │  SQLite                                  trolley-core (this crate)      │
//! │                                          types · money · validation     │
//! │                                          plain data in, plain data out  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Persisted records (Product, User, Cart, CartItem) and [`DiscountRate`]
//! - [`money`] - Cent-exact [`Money`] and the single rounding step
//! - [`pricing`] - The pricing engine: BOGOF, bulk and loyalty discounts
//! - [`cart`] - Line mutation policy and cart snapshots
//! - [`error`] - Why an operation was refused
//! - [`validation`] - Input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use trolley_core::money::Money;
//! use trolley_core::pricing::{recompute, PricingLine};
//!
//! let lines = vec![
//!     PricingLine::new("cat", Money::from_cents(1000), true, 4),
//!     PricingLine::new("apple", Money::from_cents(200), false, 1),
//! ];
//!
//! let pricing = recompute(&lines, true);
//!
//! assert_eq!(pricing.subtotal.to_string(), "22.00");
//! assert_eq!(pricing.total.to_string(), "19.40");
//! ```

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart::{CartDraft, CartLineView, CartSnapshot, DraftLine, LineChange};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::{recompute, CartPricing, LineCharge, PricingLine, PricingPolicy};
pub use types::*;

// =============================================================================
// Limits
// =============================================================================

/// Distinct products one cart may hold.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typos (1000 instead of 10) and keeps
/// `quantity * unit_price` far away from `i64` overflow.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest catalog unit price: 99,999,999.99.
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_CART_ITEMS`] a cart subtotal stays
/// below 10^15 cents.
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;
