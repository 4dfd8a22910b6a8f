//! # Pricing Engine
//!
//! Computes every line's charged price and the cart total from the current
//! lines and the owner's loyalty flag. Pure: no state between calls, no I/O.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      recompute(lines, loyalty_card)                     │
//! │                                                                         │
//! │  For each line:                                                        │
//! │    bogof? paid = qty - qty / 2        (every second unit free)         │
//! │    else   paid = qty                                                   │
//! │    charged_price = paid × unit_price                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  subtotal = Σ charged_price                                            │
//! │       │                                                                 │
//! │       ├── subtotal > 20.00 (strict)? ──► running × 0.90   (bulk)       │
//! │       │                                                                 │
//! │       ├── loyalty_card?              ──► running × 0.98   (loyalty)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total = round(running, cents)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discounts compound on the running total in the fixed order bulk then
//! loyalty. They are never both taken off the untouched subtotal.
//!
//! ## Scenario
//! ```rust
//! use trolley_core::money::Money;
//! use trolley_core::pricing::{recompute, PricingLine};
//!
//! let pricing = recompute(
//!     &[
//!         PricingLine::new("cat", Money::from_cents(1000), true, 4),    // pay for 2
//!         PricingLine::new("apple", Money::from_cents(200), false, 1),
//!     ],
//!     true,
//! );
//!
//! assert_eq!(pricing.charge_for("cat"), Some(Money::from_cents(2000)));
//! assert_eq!(pricing.charge_for("apple"), Some(Money::from_cents(200)));
//! assert_eq!(pricing.subtotal, Money::from_cents(2200));
//! assert_eq!(pricing.total, Money::from_cents(1940)); // 22.00 × 0.9 × 0.98 = 19.404
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::money::Money;
use crate::types::DiscountRate;

// =============================================================================
// Inputs
// =============================================================================

/// One line as the engine sees it: a quantity and its resolved product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingLine {
    pub item_id: String,
    pub unit_price: Money,
    pub bogof: bool,
    /// Zero means "pending removal" and prices to zero.
    pub quantity: i64,
}

impl PricingLine {
    pub fn new(item_id: impl Into<String>, unit_price: Money, bogof: bool, quantity: i64) -> Self {
        PricingLine {
            item_id: item_id.into(),
            unit_price,
            bogof,
            quantity,
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// The engine's verdict for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCharge {
    pub item_id: String,
    pub quantity: i64,
    /// Units actually charged after BOGOF.
    pub paid_quantity: i64,
    pub charged_price: Money,
}

/// Result of a full cart recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPricing {
    /// One entry per input line, in input order.
    pub lines: Vec<LineCharge>,
    pub subtotal: Money,
    pub bulk_discount_applied: bool,
    pub loyalty_discount_applied: bool,
    pub total: Money,
}

impl CartPricing {
    /// Charged price for a line, if the line was part of the recompute.
    pub fn charge_for(&self, item_id: &str) -> Option<Money> {
        self.lines
            .iter()
            .find(|line| line.item_id == item_id)
            .map(|line| line.charged_price)
    }

    /// Amount taken off the subtotal by percentage discounts.
    pub fn discount(&self) -> Money {
        self.subtotal - self.total
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Threshold and rates for the cart-level discounts.
///
/// [`PricingPolicy::standard`] is the production policy: more than 20.00
/// earns 10% off, a loyalty card earns a further 2%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// The bulk discount applies when the subtotal is strictly greater.
    pub bulk_threshold: Money,
    pub bulk_discount: DiscountRate,
    pub loyalty_discount: DiscountRate,
}

impl PricingPolicy {
    /// 20.00 threshold, 10% bulk, 2% loyalty.
    pub const fn standard() -> Self {
        PricingPolicy {
            bulk_threshold: Money::from_cents(2000),
            bulk_discount: DiscountRate::from_bps(1000),
            loyalty_discount: DiscountRate::from_bps(200),
        }
    }

    /// Prices every line and the cart total.
    ///
    /// Deterministic and order-independent for the total. Always recompute
    /// the whole cart: the bulk threshold depends on every line.
    pub fn recompute(&self, lines: &[PricingLine], loyalty_card: bool) -> CartPricing {
        let charges: Vec<LineCharge> = lines.iter().map(price_line).collect();
        let subtotal: Money = charges.iter().map(|c| c.charged_price).sum();

        let mut discounts = Vec::with_capacity(2);

        let bulk_discount_applied = subtotal > self.bulk_threshold;
        if bulk_discount_applied {
            discounts.push(self.bulk_discount);
        }
        if loyalty_card {
            discounts.push(self.loyalty_discount);
        }

        let total = subtotal.apply_discounts(&discounts);

        debug!(
            lines = charges.len(),
            subtotal = %subtotal,
            bulk = bulk_discount_applied,
            loyalty = loyalty_card,
            total = %total,
            "Cart recomputed"
        );

        CartPricing {
            lines: charges,
            subtotal,
            bulk_discount_applied,
            loyalty_discount_applied: loyalty_card,
            total,
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy::standard()
    }
}

// =============================================================================
// Engine Entry Points
// =============================================================================

/// Recomputes a cart under the standard policy.
pub fn recompute(lines: &[PricingLine], loyalty_card: bool) -> CartPricing {
    PricingPolicy::standard().recompute(lines, loyalty_card)
}

/// Units charged for a quantity.
///
/// BOGOF charges `qty - qty / 2`: 1→1, 2→1, 3→2, 4→2, 5→3.
/// Negative quantities are a caller bug and are treated as zero.
///
/// ```rust
/// use trolley_core::pricing::paid_quantity;
///
/// assert_eq!(paid_quantity(5, true), 3);
/// assert_eq!(paid_quantity(5, false), 5);
/// ```
pub const fn paid_quantity(quantity: i64, bogof: bool) -> i64 {
    let quantity = if quantity < 0 { 0 } else { quantity };
    if bogof {
        quantity - quantity / 2
    } else {
        quantity
    }
}

fn price_line(line: &PricingLine) -> LineCharge {
    let paid = paid_quantity(line.quantity, line.bogof);
    let charged_price = line.unit_price.multiply_quantity(paid);

    trace!(
        item_id = %line.item_id,
        quantity = line.quantity,
        paid,
        charged = %charged_price,
        "Line priced"
    );

    LineCharge {
        item_id: line.item_id.clone(),
        quantity: line.quantity,
        paid_quantity: paid,
        charged_price,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(id: &str, cents: i64, qty: i64) -> PricingLine {
        PricingLine::new(id, Money::from_cents(cents), false, qty)
    }

    fn bogof(id: &str, cents: i64, qty: i64) -> PricingLine {
        PricingLine::new(id, Money::from_cents(cents), true, qty)
    }

    #[test]
    fn test_plain_line_charges_quantity_times_price() {
        let pricing = recompute(&[plain("a", 299, 3)], false);
        assert_eq!(pricing.charge_for("a"), Some(Money::from_cents(897)));
        assert_eq!(pricing.lines[0].paid_quantity, 3);
    }

    #[test]
    fn test_bogof_every_second_unit_free() {
        let expected = [(1, 1), (2, 1), (3, 2), (4, 2), (5, 3)];
        for (qty, paid) in expected {
            let pricing = recompute(&[bogof("cat", 1000, qty)], false);
            assert_eq!(
                pricing.charge_for("cat"),
                Some(Money::from_cents(1000 * paid)),
                "qty {qty} should pay for {paid}"
            );
        }
    }

    #[test]
    fn test_zero_quantity_prices_to_zero() {
        assert_eq!(paid_quantity(0, true), 0);
        assert_eq!(paid_quantity(0, false), 0);

        let pricing = recompute(&[bogof("cat", 1000, 0)], false);
        assert_eq!(pricing.charge_for("cat"), Some(Money::zero()));
        assert!(pricing.total.is_zero());
    }

    #[test]
    fn test_negative_quantity_never_prices_negative() {
        let pricing = recompute(&[plain("a", 500, -3)], false);
        assert_eq!(pricing.charge_for("a"), Some(Money::zero()));
    }

    #[test]
    fn test_empty_cart() {
        let pricing = recompute(&[], true);
        assert!(pricing.lines.is_empty());
        assert!(pricing.subtotal.is_zero());
        assert!(pricing.total.is_zero());
    }

    #[test]
    fn test_subtotal_is_sum_of_charges() {
        let pricing = recompute(
            &[plain("a", 200, 2), bogof("b", 350, 3), plain("c", 99, 1)],
            false,
        );
        let sum: Money = pricing.lines.iter().map(|l| l.charged_price).sum();
        assert_eq!(pricing.subtotal, sum);
        assert_eq!(pricing.subtotal, Money::from_cents(400 + 700 + 99));
    }

    #[test]
    fn test_bulk_threshold_is_strict() {
        // Exactly 20.00: no bulk discount
        let pricing = recompute(&[plain("a", 1000, 2)], false);
        assert!(!pricing.bulk_discount_applied);
        assert_eq!(pricing.total, Money::from_cents(2000));

        // 20.01: 10% off → 18.009 → 18.01
        let pricing = recompute(&[plain("a", 2001, 1)], false);
        assert!(pricing.bulk_discount_applied);
        assert_eq!(pricing.total, Money::from_cents(1801));
    }

    #[test]
    fn test_bulk_then_loyalty_compound() {
        let pricing = recompute(&[plain("a", 2500, 1)], true);

        // 25.00 × 0.90 × 0.98 = 22.05
        assert_eq!(pricing.total, Money::from_cents(2205));
        // Not 25.00 × (1 - 0.10 - 0.02) = 22.00
        assert_ne!(pricing.total, Money::from_cents(2200));
        assert_eq!(pricing.discount(), Money::from_cents(295));
    }

    #[test]
    fn test_loyalty_without_bulk() {
        // 10.00 × 0.98 = 9.80
        let pricing = recompute(&[plain("a", 1000, 1)], true);
        assert!(!pricing.bulk_discount_applied);
        assert!(pricing.loyalty_discount_applied);
        assert_eq!(pricing.total, Money::from_cents(980));
    }

    #[test]
    fn test_scenario_bogof_plus_plain_with_loyalty() {
        let pricing = recompute(&[bogof("cat", 1000, 4), plain("apple", 200, 1)], true);

        assert_eq!(pricing.charge_for("cat"), Some(Money::from_cents(2000)));
        assert_eq!(pricing.charge_for("apple"), Some(Money::from_cents(200)));
        assert_eq!(pricing.subtotal, Money::from_cents(2200));
        assert!(pricing.bulk_discount_applied);
        assert_eq!(pricing.total.to_string(), "19.40");
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let lines = [bogof("cat", 1000, 3), plain("butter", 400, 2), plain("apple", 200, 5)];
        let first = recompute(&lines, true);
        let second = recompute(&lines, true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_order_does_not_change_total() {
        let forward = [bogof("cat", 1000, 3), plain("butter", 400, 2), plain("apple", 333, 7)];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(recompute(&forward, true).total, recompute(&reversed, true).total);
    }

    #[test]
    fn test_zero_quantity_line_same_as_absent() {
        let with_removed = recompute(&[plain("a", 1500, 1), plain("b", 800, 0)], true);
        let without = recompute(&[plain("a", 1500, 1)], true);

        assert_eq!(with_removed.total, without.total);
        assert_eq!(with_removed.subtotal, without.subtotal);
    }

    #[test]
    fn test_custom_policy() {
        let policy = PricingPolicy {
            bulk_threshold: Money::from_cents(5000),
            bulk_discount: DiscountRate::from_bps(2000),
            loyalty_discount: DiscountRate::zero(),
        };

        assert_eq!(policy.recompute(&[plain("a", 5000, 1)], true).total, Money::from_cents(5000));
        assert_eq!(policy.recompute(&[plain("a", 5001, 1)], false).total, Money::from_cents(4001));
    }

    #[test]
    fn test_standard_policy_is_default() {
        assert_eq!(PricingPolicy::default(), PricingPolicy::standard());
    }
}
