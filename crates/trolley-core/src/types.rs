//! # Records
//!
//! The persisted shapes: catalog products, users, carts and cart lines.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐ 1:1 ┌─────────────────┐ 1:N ┌─────────────────┐  │
//! │  │      User       │◄────│      Cart       │◄────│    CartItem     │  │
//! │  │  ─────────────  │     │  ─────────────  │     │  ─────────────  │  │
//! │  │  id (UUID)      │     │  id (UUID)      │     │  id (UUID)      │  │
//! │  │  email          │     │  user_id        │     │  cart_id        │  │
//! │  │  loyalty_card   │     │  total_cents    │     │  product_id ──┐ │  │
//! │  └─────────────────┘     └─────────────────┘     │  quantity     │ │  │
//! │                                                   │  price_cents  │ │  │
//! │  ┌─────────────────┐                              └───────────────┼─┘  │
//! │  │    Product      │◄─────────────────────────────────────────────┘    │
//! │  │  ─────────────  │                                                   │
//! │  │  id (UUID)      │     ┌─────────────────┐                           │
//! │  │  title          │     │  DiscountRate   │                           │
//! │  │  price_cents    │     │  ─────────────  │                           │
//! │  │  bogof          │     │  bps (u32)      │                           │
//! │  └─────────────────┘     │  1000 = 10%     │                           │
//! │                          └─────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Cart.total_cents` and `CartItem.price_cents` are outputs of the pricing
//! engine. Nothing else writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// A percentage discount in basis points: 1000 is the 10% bulk discount,
/// 200 the 2% loyalty discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Share of the amount that survives the discount, in basis points.
    ///
    /// 10% off retains 9000 bps. Rates above 100% retain nothing.
    #[inline]
    pub const fn retained_bps(&self) -> u32 {
        Self::FULL_BPS.saturating_sub(self.0)
    }

    /// For log lines only; pricing never leaves integers.
    #[inline]
    pub fn percentage(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Zero discount.
    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// Immutable from the pricing engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Shown to the shopper; trimmed on insert.
    pub title: String,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Buy-one-get-one-free: every second unit is not charged.
    pub bogof: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with a fresh id.
    pub fn new(title: impl Into<String>, price: Money, bogof: bool) -> Self {
        Product {
            id: generate_id(),
            title: title.into(),
            price_cents: price.cents(),
            bogof,
            created_at: Utc::now(),
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// User
// =============================================================================

/// The owner of a cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Active loyalty card: 2% off the (possibly bulk-discounted) total.
    pub loyalty_card: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user without a loyalty card.
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        User {
            id: generate_id(),
            email: email.into(),
            loyalty_card: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A user's cart. Exactly one per user, created lazily on first add.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    /// Cart total after discounts, in cents. Written only by the pricing engine.
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Cart {
            id: generate_id(),
            user_id: user_id.into(),
            total_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A line in a cart: one product and its quantity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Charged price for the line, in cents. Written only by the pricing engine.
    pub price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Returns the charged price as Money.
    #[inline]
    pub fn charged_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Generates a new entity id (UUID v4).
///
/// Globally unique without coordination, so new lines can be named before
/// they are written.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
