//! # Cart Line Policy
//!
//! In-memory working copy of a cart's lines. The Cart Store loads the
//! persisted lines into a [`CartDraft`], applies ONE mutation, asks the
//! pricing engine for a full recompute, and writes the result back.
//!
//! ## Mutation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation                  Existing line?   Result                     │
//! │  ─────────────────────────  ──────────────   ────────────────────────   │
//! │  add_product(p)             no               new line, qty 1 (Created)  │
//! │  add_product(p)             yes              qty + 1 (QuantityChanged)  │
//! │  set_quantity(item, n > 0)  yes              qty = n (QuantityChanged)  │
//! │  set_quantity(item, n <= 0) yes              line deleted (Removed)     │
//! │  remove(item)               yes              line deleted (Removed)     │
//! │  any item operation         no               CartItemNotFound           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no incremental recompute: crossing the bulk threshold depends
//! on the whole cart, so [`CartDraft::price`] always prices every line.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{CartPricing, PricingLine, PricingPolicy};
use crate::types::{generate_id, Product};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Draft Lines
// =============================================================================

/// A cart line joined with the product fields pricing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub item_id: String,
    pub product_id: String,
    pub title: String,
    pub unit_price: Money,
    pub bogof: bool,
    pub quantity: i64,
}

impl DraftLine {
    fn for_product(product: &Product) -> Self {
        DraftLine {
            item_id: generate_id(),
            product_id: product.id.clone(),
            title: product.title.clone(),
            unit_price: product.price(),
            bogof: product.bogof,
            quantity: 1,
        }
    }
}

/// Which row a mutation touched, so the store writes exactly that row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    /// A new line was added at quantity 1.
    Created { item_id: String },
    /// An existing line now has `quantity`.
    QuantityChanged { item_id: String, quantity: i64 },
    /// The line is gone.
    Removed { item_id: String },
}

impl LineChange {
    pub fn item_id(&self) -> &str {
        match self {
            LineChange::Created { item_id }
            | LineChange::QuantityChanged { item_id, .. }
            | LineChange::Removed { item_id } => item_id,
        }
    }
}

// =============================================================================
// Cart Draft
// =============================================================================

/// Working copy of a cart's lines.
///
/// ## Invariants
/// - At most one line per product
/// - Every line has 1..=MAX_ITEM_QUANTITY units
/// - At most MAX_CART_ITEMS lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartDraft {
    lines: Vec<DraftLine>,
}

impl CartDraft {
    /// Wraps lines loaded from storage.
    pub fn new(lines: Vec<DraftLine>) -> Self {
        CartDraft { lines }
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn line(&self, item_id: &str) -> Option<&DraftLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds one unit of a product.
    ///
    /// ```rust
    /// use trolley_core::cart::{CartDraft, LineChange};
    /// use trolley_core::money::Money;
    /// use trolley_core::types::Product;
    ///
    /// let apple = Product::new("Apple", Money::from_cents(200), false);
    /// let mut draft = CartDraft::default();
    ///
    /// let first = draft.add_product(&apple).unwrap();
    /// assert!(matches!(first, LineChange::Created { .. }));
    ///
    /// let second = draft.add_product(&apple).unwrap();
    /// assert!(matches!(second, LineChange::QuantityChanged { quantity: 2, .. }));
    /// ```
    pub fn add_product(&mut self, product: &Product) -> CoreResult<LineChange> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let quantity = line.quantity + 1;
            if quantity > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: quantity,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = quantity;
            return Ok(LineChange::QuantityChanged {
                item_id: line.item_id.clone(),
                quantity,
            });
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        let line = DraftLine::for_product(product);
        let item_id = line.item_id.clone();
        self.lines.push(line);
        Ok(LineChange::Created { item_id })
    }

    /// Sets a line's quantity. Zero or less deletes the line.
    pub fn set_quantity(&mut self, item_id: &str, quantity: i64) -> CoreResult<LineChange> {
        if quantity <= 0 {
            return self.remove(item_id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| CoreError::CartItemNotFound(item_id.to_string()))?;

        line.quantity = quantity;
        Ok(LineChange::QuantityChanged {
            item_id: item_id.to_string(),
            quantity,
        })
    }

    /// Deletes a line.
    pub fn remove(&mut self, item_id: &str) -> CoreResult<LineChange> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);

        if self.lines.len() == initial_len {
            return Err(CoreError::CartItemNotFound(item_id.to_string()));
        }

        Ok(LineChange::Removed {
            item_id: item_id.to_string(),
        })
    }

    /// Engine input for every current line.
    pub fn pricing_lines(&self) -> Vec<PricingLine> {
        self.lines
            .iter()
            .map(|l| PricingLine::new(l.item_id.clone(), l.unit_price, l.bogof, l.quantity))
            .collect()
    }

    /// Full recompute over every current line.
    pub fn price(&self, policy: &PricingPolicy, loyalty_card: bool) -> CartPricing {
        policy.recompute(&self.pricing_lines(), loyalty_card)
    }

    /// Renders the draft with its pricing for the API boundary.
    pub fn snapshot(
        &self,
        cart_id: &str,
        user_id: &str,
        loyalty_card: bool,
        pricing: &CartPricing,
    ) -> CartSnapshot {
        let items = self
            .lines
            .iter()
            .map(|line| CartLineView {
                item_id: line.item_id.clone(),
                product_id: line.product_id.clone(),
                title: line.title.clone(),
                unit_price: line.unit_price,
                bogof: line.bogof,
                quantity: line.quantity,
                charged_price: pricing.charge_for(&line.item_id).unwrap_or_default(),
            })
            .collect();

        CartSnapshot {
            cart_id: cart_id.to_string(),
            user_id: user_id.to_string(),
            loyalty_card,
            items,
            subtotal: pricing.subtotal,
            total: pricing.total,
        }
    }
}

// =============================================================================
// Boundary DTOs
// =============================================================================

/// One line as returned to an API caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub item_id: String,
    pub product_id: String,
    pub title: String,
    #[ts(type = "string")]
    pub unit_price: Money,
    pub bogof: bool,
    pub quantity: i64,
    #[ts(type = "string")]
    pub charged_price: Money,
}

/// A priced cart as returned to an API caller.
///
/// ## Serialization
/// Money is a fixed-point string, never a float:
/// ```json
/// {
///   "cartId": "…",
///   "userId": "…",
///   "loyaltyCard": true,
///   "items": [{ "itemId": "…", "title": "Cat", "unitPrice": "10.00",
///               "bogof": true, "quantity": 4, "chargedPrice": "20.00", … }],
///   "subtotal": "22.00",
///   "total": "19.40"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_id: String,
    pub user_id: String,
    pub loyalty_card: bool,
    pub items: Vec<CartLineView>,
    #[ts(type = "string")]
    pub subtotal: Money,
    #[ts(type = "string")]
    pub total: Money,
}

impl CartSnapshot {
    pub fn item(&self, item_id: &str) -> Option<&CartLineView> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_for_product(&self, product_id: &str) -> Option<&CartLineView> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
