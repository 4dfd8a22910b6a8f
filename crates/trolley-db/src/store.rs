//! # Cart Store
//!
//! Owns every write to `carts` and `cart_items`. Each mutation loads the
//! cart, applies one line change, runs a full recompute through the pricing
//! engine and persists exactly what the engine returned.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_product / update_quantity / remove_item / toggle_loyalty           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate input (negative quantity → invalid input, nothing opened)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartLocks::acquire(user_id)      ← one mutation per cart at a time    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────── attempt (retried while SQLite is busy) ──────────────┐  │
//! │  │ BEGIN                                                             │  │
//! │  │   resolve user + product      → UserNotFound / ProductNotFound    │  │
//! │  │   load lines into CartDraft                                       │  │
//! │  │   apply LineChange            → CartItemNotFound / limits         │  │
//! │  │   write the changed row                                           │  │
//! │  │   recompute all lines         (PricingPolicy::recompute)          │  │
//! │  │   write every charged price + cart total  (or delete empty cart)  │  │
//! │  │ COMMIT                                                            │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ├── Busy, attempts left  → sleep(n × backoff) and retry          │
//! │       ├── Busy, exhausted      → DbError::Conflict { attempts }        │
//! │       └── Ok                   → CartSnapshot                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error drops the transaction, which rolls it back: a partial total is
//! never visible.

use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::{RetryPolicy, StoreConfig};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cart::{self as cart_rows, LineRecord};
use crate::repository::{product as product_rows, user as user_rows};
use trolley_core::validation::validate_quantity_update;
use trolley_core::{
    Cart, CartDraft, CartLineView, CartSnapshot, CoreError, LineChange, Money, PricingPolicy, User,
};

// =============================================================================
// Per-cart Locks
// =============================================================================

/// In-process async mutex per user.
///
/// Keyed by user id rather than cart id: a user's cart may not exist yet,
/// and two first adds must not both create one.
#[derive(Debug, Default)]
pub struct CartLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CartLocks {
    pub fn new() -> Self {
        CartLocks::default()
    }

    /// Waits for exclusive access to a user's cart.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id.to_string()).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Number of users with a held or awaited lock.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`CartStore::toggle_loyalty`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyToggle {
    /// The flag after the toggle.
    pub loyalty_card: bool,
    /// The repriced cart, when the user has one.
    pub cart: Option<CartSnapshot>,
}

// =============================================================================
// Cart Store
// =============================================================================

/// Cart persistence with pricing on every mutation.
///
/// Clones share the same locks, so hand clones to concurrent tasks rather
/// than building a second store over the same database.
///
/// ## Usage
/// ```rust,ignore
/// let store = CartStore::new(db, PricingPolicy::standard());
///
/// let cart = store.add_product(&user.id, &cat.id).await?;
/// println!("{}", cart.total); // "10.00"
/// ```
#[derive(Debug, Clone)]
pub struct CartStore {
    db: Database,
    policy: PricingPolicy,
    retry: RetryPolicy,
    locks: Arc<CartLocks>,
}

impl CartStore {
    /// Creates a store with the default retry policy.
    pub fn new(db: Database, policy: PricingPolicy) -> Self {
        CartStore {
            db,
            policy,
            retry: RetryPolicy::default(),
            locks: Arc::new(CartLocks::new()),
        }
    }

    /// Sets the busy-retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Opens the configured database and builds a store over it.
    pub async fn open(config: &StoreConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()?).await?;
        let policy = config.pricing_policy();
        info!(
            bulk_threshold = %policy.bulk_threshold,
            bulk_pct = policy.bulk_discount.percentage(),
            loyalty_pct = policy.loyalty_discount.percentage(),
            max_attempts = config.retry.max_attempts,
            "Cart Store ready"
        );
        Ok(CartStore::new(db, policy).with_retry(config.retry))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Adds one unit of a product to the user's cart, creating the cart if
    /// needed.
    ///
    /// ## Errors
    /// * `CoreError::UserNotFound` / `CoreError::ProductNotFound` - nothing written
    /// * `CoreError::QuantityTooLarge` / `CoreError::CartTooLarge` - limits hit
    /// * `DbError::Conflict` - still busy after every retry
    pub async fn add_product(&self, user_id: &str, product_id: &str) -> DbResult<CartSnapshot> {
        debug!(user_id = %user_id, product_id = %product_id, "Adding product to cart");

        let snapshot = self
            .retrying("add_product", user_id, move || self.try_add_product(user_id, product_id))
            .await?;

        info!(
            user_id = %user_id,
            cart_id = %snapshot.cart_id,
            total = %snapshot.total,
            "Product added to cart"
        );
        Ok(snapshot)
    }

    /// Sets a line's quantity. Zero deletes the line, and the cart with it
    /// when it was the last one (`Ok(None)`).
    ///
    /// ## Errors
    /// * `ValidationError::MustNotBeNegative` - negative quantity, nothing opened
    /// * `CoreError::CartItemNotFound` - item is not in this user's cart
    pub async fn update_quantity(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<Option<CartSnapshot>> {
        validate_quantity_update(quantity)?;

        debug!(user_id = %user_id, item_id = %item_id, quantity, "Updating line quantity");

        let snapshot = self
            .retrying("update_quantity", user_id, move || {
                self.try_update_quantity(user_id, item_id, quantity)
            })
            .await?;

        log_outcome(user_id, "Line quantity updated", snapshot.as_ref());
        Ok(snapshot)
    }

    /// Deletes a line. Returns `Ok(None)` when the cart became empty and was
    /// deleted.
    pub async fn remove_item(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> DbResult<Option<CartSnapshot>> {
        debug!(user_id = %user_id, item_id = %item_id, "Removing line");

        let snapshot = self
            .retrying("remove_item", user_id, move || self.try_remove_item(user_id, item_id))
            .await?;

        log_outcome(user_id, "Line removed", snapshot.as_ref());
        Ok(snapshot)
    }

    /// Flips the user's loyalty flag and reprices their cart, if any, in
    /// the same transaction.
    pub async fn toggle_loyalty(&self, user_id: &str) -> DbResult<LoyaltyToggle> {
        let toggle = self
            .retrying("toggle_loyalty", user_id, move || self.try_toggle_loyalty(user_id))
            .await?;

        info!(
            user_id = %user_id,
            loyalty_card = toggle.loyalty_card,
            total = ?toggle.cart.as_ref().map(|c| c.total.to_string()),
            "Loyalty card toggled"
        );
        Ok(toggle)
    }

    /// Reads the persisted cart. Nothing is recomputed: the charged prices
    /// and total are the ones the last mutation wrote.
    ///
    /// ## Returns
    /// * `Ok(None)` - The user has no cart
    /// * `Err(CoreError::UserNotFound)` - Unknown user
    pub async fn get_cart(&self, user_id: &str) -> DbResult<Option<CartSnapshot>> {
        // Read transaction: cart row and lines come from one snapshot
        let mut tx = self.db.pool().begin().await?;

        let user = require_user(&mut tx, user_id).await?;
        let Some(cart) = cart_rows::fetch_cart_for_user(&mut *tx, user_id).await? else {
            return Ok(None);
        };
        let lines = cart_rows::fetch_lines(&mut *tx, &cart.id).await?;

        tx.commit().await?;

        Ok(Some(persisted_snapshot(&cart, &user, &lines)))
    }

    // =========================================================================
    // Attempts
    // =========================================================================

    async fn try_add_product(&self, user_id: &str, product_id: &str) -> DbResult<CartSnapshot> {
        let mut tx = self.db.pool().begin().await?;

        let user = require_user(&mut tx, user_id).await?;
        let product = product_rows::fetch_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let (cart, mut draft) = match cart_rows::fetch_cart_for_user(&mut *tx, user_id).await? {
            Some(cart) => {
                let draft = load_draft(&mut tx, &cart.id).await?;
                (cart, draft)
            }
            None => {
                let cart = Cart::new(user_id);
                cart_rows::insert_cart(&mut *tx, &cart).await?;
                (cart, CartDraft::default())
            }
        };

        let change = draft.add_product(&product)?;
        let snapshot = self
            .persist(&mut tx, &cart, user.loyalty_card, &draft, Some(&change))
            .await?
            .ok_or_else(|| DbError::Internal("cart empty after add".to_string()))?;

        tx.commit().await?;
        Ok(snapshot)
    }

    async fn try_update_quantity(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<Option<CartSnapshot>> {
        let mut tx = self.db.pool().begin().await?;

        let user = require_user(&mut tx, user_id).await?;
        let cart = require_cart(&mut tx, user_id, item_id).await?;
        let mut draft = load_draft(&mut tx, &cart.id).await?;

        let change = draft.set_quantity(item_id, quantity)?;
        let snapshot = self
            .persist(&mut tx, &cart, user.loyalty_card, &draft, Some(&change))
            .await?;

        tx.commit().await?;
        Ok(snapshot)
    }

    async fn try_remove_item(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> DbResult<Option<CartSnapshot>> {
        let mut tx = self.db.pool().begin().await?;

        let user = require_user(&mut tx, user_id).await?;
        let cart = require_cart(&mut tx, user_id, item_id).await?;
        let mut draft = load_draft(&mut tx, &cart.id).await?;

        let change = draft.remove(item_id)?;
        let snapshot = self
            .persist(&mut tx, &cart, user.loyalty_card, &draft, Some(&change))
            .await?;

        tx.commit().await?;
        Ok(snapshot)
    }

    async fn try_toggle_loyalty(&self, user_id: &str) -> DbResult<LoyaltyToggle> {
        let mut tx = self.db.pool().begin().await?;

        let user = require_user(&mut tx, user_id).await?;
        let loyalty_card = !user.loyalty_card;
        user_rows::set_loyalty_card(&mut *tx, user_id, loyalty_card).await?;

        let cart = match cart_rows::fetch_cart_for_user(&mut *tx, user_id).await? {
            Some(cart) => {
                let draft = load_draft(&mut tx, &cart.id).await?;
                self.persist(&mut tx, &cart, loyalty_card, &draft, None).await?
            }
            None => None,
        };

        tx.commit().await?;
        Ok(LoyaltyToggle { loyalty_card, cart })
    }

    /// Writes one line change, then the engine's output for the whole cart.
    ///
    /// Returns `None` after deleting a cart that has no lines left.
    async fn persist(
        &self,
        conn: &mut SqliteConnection,
        cart: &Cart,
        loyalty_card: bool,
        draft: &CartDraft,
        change: Option<&LineChange>,
    ) -> DbResult<Option<CartSnapshot>> {
        match change {
            Some(LineChange::Created { item_id }) => {
                let line = draft
                    .line(item_id)
                    .ok_or_else(|| DbError::Internal(format!("created line {item_id} missing")))?;
                cart_rows::insert_item(&mut *conn, &cart.id, line).await?;
            }
            Some(LineChange::QuantityChanged { item_id, quantity }) => {
                cart_rows::update_item_quantity(&mut *conn, item_id, *quantity).await?;
            }
            Some(LineChange::Removed { item_id }) => {
                cart_rows::delete_item(&mut *conn, item_id).await?;
            }
            None => {}
        }

        if draft.is_empty() {
            cart_rows::delete_cart(&mut *conn, &cart.id).await?;
            return Ok(None);
        }

        let pricing = draft.price(&self.policy, loyalty_card);
        for charge in &pricing.lines {
            cart_rows::update_item_price(&mut *conn, &charge.item_id, charge.charged_price).await?;
        }
        cart_rows::update_cart_total(&mut *conn, &cart.id, pricing.total).await?;

        debug!(
            cart_id = %cart.id,
            subtotal = %pricing.subtotal,
            total = %pricing.total,
            bulk = pricing.bulk_discount_applied,
            loyalty = pricing.loyalty_discount_applied,
            "Cart repriced"
        );

        Ok(Some(draft.snapshot(&cart.id, &cart.user_id, loyalty_card, &pricing)))
    }

    /// Runs `attempt` under the user's lock, retrying while SQLite is busy.
    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        user_id: &str,
        mut attempt: F,
    ) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let _guard = self.locks.acquire(user_id).await;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 1;

        loop {
            match attempt().await {
                Err(err) if err.is_retryable() => {
                    if attempts >= max_attempts {
                        warn!(
                            operation,
                            user_id = %user_id,
                            attempts,
                            "Giving up on busy database"
                        );
                        return Err(DbError::Conflict { attempts });
                    }

                    let delay = self.retry.backoff(attempts);
                    warn!(
                        operation,
                        user_id = %user_id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Database busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                }
                result => return result,
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn require_user(conn: &mut SqliteConnection, user_id: &str) -> DbResult<User> {
    user_rows::fetch_user(conn, user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()).into())
}

/// The user's cart; an item operation without one names an item that
/// cannot be theirs.
async fn require_cart(conn: &mut SqliteConnection, user_id: &str, item_id: &str) -> DbResult<Cart> {
    cart_rows::fetch_cart_for_user(conn, user_id)
        .await?
        .ok_or_else(|| CoreError::CartItemNotFound(item_id.to_string()).into())
}

async fn load_draft(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<CartDraft> {
    let lines = cart_rows::fetch_lines(conn, cart_id).await?;
    Ok(CartDraft::new(lines.iter().map(LineRecord::to_draft_line).collect()))
}

fn persisted_snapshot(cart: &Cart, user: &User, lines: &[LineRecord]) -> CartSnapshot {
    let items: Vec<CartLineView> = lines
        .iter()
        .map(|line| CartLineView {
            item_id: line.item_id.clone(),
            product_id: line.product_id.clone(),
            title: line.title.clone(),
            unit_price: Money::from_cents(line.unit_price_cents),
            bogof: line.bogof,
            quantity: line.quantity,
            charged_price: line.charged_price(),
        })
        .collect();

    CartSnapshot {
        cart_id: cart.id.clone(),
        user_id: cart.user_id.clone(),
        loyalty_card: user.loyalty_card,
        subtotal: items.iter().map(|i| i.charged_price).sum(),
        total: cart.total(),
        items,
    }
}

fn log_outcome(user_id: &str, message: &str, snapshot: Option<&CartSnapshot>) {
    match snapshot {
        Some(cart) => info!(
            user_id = %user_id,
            cart_id = %cart.cart_id,
            total = %cart.total,
            "{message}"
        ),
        None => info!(user_id = %user_id, "{message}; cart now empty and deleted"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use trolley_core::{ErrorKind, Product, ValidationError, MAX_PRICE_CENTS};

    struct Shop {
        store: CartStore,
        user: User,
        apple: Product,
        cat: Product,
        butter: Product,
    }

    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let products = db.products();
        let apple = products
            .insert(&Product::new("Apple", Money::from_cents(200), false))
            .await
            .unwrap();
        let cat = products
            .insert(&Product::new("Cat", Money::from_cents(1000), true))
            .await
            .unwrap();
        let butter = products
            .insert(&Product::new("Butter", Money::from_cents(400), false))
            .await
            .unwrap();
        let user = db.users().insert(&User::new("ad@min.com")).await.unwrap();

        Shop {
            store: CartStore::new(db, PricingPolicy::standard()),
            user,
            apple,
            cat,
            butter,
        }
    }

    fn core_kind(err: &DbError) -> Option<ErrorKind> {
        match err {
            DbError::Core(core) => Some(core.kind()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_first_add_creates_cart_and_line() {
        let s = shop().await;
        assert!(s.store.get_cart(&s.user.id).await.unwrap().is_none());

        let cart = s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.items[0].charged_price, Money::from_cents(200));
        assert_eq!(cart.total, Money::from_cents(200));
        assert_eq!(s.store.database().carts().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_catalog_price_ceiling_keeps_totals_exact() {
        let s = shop().await;
        let products = s.store.database().products();

        let err = products
            .insert(&Product::new("Gold", Money::from_cents(i64::MAX / 2 + 1), false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(products.count().await.unwrap(), 3);

        let bullion = products
            .insert(&Product::new("Bullion", Money::from_cents(MAX_PRICE_CENTS), false))
            .await
            .unwrap();
        s.store.add_product(&s.user.id, &bullion.id).await.unwrap();
        let cart = s.store.add_product(&s.user.id, &bullion.id).await.unwrap();

        // 19,999,999,998 less 10% = 17,999,999,998.2
        assert_eq!(cart.subtotal, Money::from_cents(2 * MAX_PRICE_CENTS));
        assert_eq!(cart.total, Money::from_cents(17_999_999_998));
    }

    #[tokio::test]
    async fn test_second_add_increments() {
        let s = shop().await;

        let first = s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        let second = s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();

        assert_eq!(first.cart_id, second.cart_id);
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].item_id, first.items[0].item_id);
        assert_eq!(second.items[0].quantity, 2);
        // BOGOF: two cats, one paid
        assert_eq!(second.total, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_unknown_product_creates_nothing() {
        let s = shop().await;

        let err = s.store.add_product(&s.user.id, "no-such-product").await.unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::ProductNotFound(_))));
        assert_eq!(core_kind(&err), Some(ErrorKind::InvalidReference));
        assert!(s.store.get_cart(&s.user.id).await.unwrap().is_none());
        assert_eq!(s.store.database().carts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let s = shop().await;

        let err = s.store.add_product("ghost", &s.apple.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UserNotFound(_))));

        let err = s.store.get_cart("ghost").await.unwrap_err();
        assert_eq!(core_kind(&err), Some(ErrorKind::InvalidReference));
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let s = shop().await;
        for _ in 0..4 {
            s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        }
        let without_loyalty = s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();

        // 22.00 > 20.00: bulk only
        assert_eq!(without_loyalty.subtotal, Money::from_cents(2200));
        assert_eq!(without_loyalty.total, Money::from_cents(1980));

        let toggle = s.store.toggle_loyalty(&s.user.id).await.unwrap();
        assert!(toggle.loyalty_card);

        let cart = toggle.cart.unwrap();
        assert!(cart.loyalty_card);
        assert_eq!(
            cart.item_for_product(&s.cat.id).unwrap().charged_price,
            Money::from_cents(2000)
        );
        assert_eq!(
            cart.item_for_product(&s.apple.id).unwrap().charged_price,
            Money::from_cents(200)
        );
        assert_eq!(cart.subtotal, Money::from_cents(2200));
        assert_eq!(cart.total, Money::from_cents(1940));

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["total"], "19.40");
    }

    #[tokio::test]
    async fn test_persisted_values_match_engine() {
        let s = shop().await;
        s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        let returned = s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();

        let stored = s.store.get_cart(&s.user.id).await.unwrap().unwrap();

        assert_eq!(stored.total, returned.total);
        assert_eq!(stored.subtotal, returned.subtotal);
        assert_eq!(stored.items.len(), returned.items.len());
        for item in &returned.items {
            assert_eq!(stored.item(&item.item_id), Some(item));
        }

        let cart_row = s.store.database().carts().get_for_user(&s.user.id).await.unwrap().unwrap();
        assert_eq!(cart_row.total(), returned.total);
    }

    #[tokio::test]
    async fn test_bulk_threshold_is_strict() {
        let s = shop().await;
        let first = s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();
        let item_id = first.items[0].item_id.clone();

        let at_threshold = s
            .store
            .update_quantity(&s.user.id, &item_id, 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(at_threshold.total, Money::from_cents(2000));

        let above = s
            .store
            .update_quantity(&s.user.id, &item_id, 6)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(above.subtotal, Money::from_cents(2400));
        assert_eq!(above.total, Money::from_cents(2160));

        // Dropping back below removes the discount again
        let back = s
            .store
            .update_quantity(&s.user.id, &item_id, 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(back.total, Money::from_cents(2000));
    }

    #[tokio::test]
    async fn test_update_to_zero_deletes_line_and_reprices() {
        let s = shop().await;
        s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();
        let cart = s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();
        let butter_line = cart.item_for_product(&s.butter.id).unwrap().item_id.clone();

        let cart = s
            .store
            .update_quantity(&s.user.id, &butter_line, 0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert!(cart.item(&butter_line).is_none());
        assert_eq!(cart.total, Money::from_cents(200));
    }

    #[tokio::test]
    async fn test_removing_last_line_deletes_cart() {
        let s = shop().await;
        let cart = s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();
        let item_id = cart.items[0].item_id.clone();

        let result = s.store.update_quantity(&s.user.id, &item_id, 0).await.unwrap();

        assert!(result.is_none());
        assert!(s.store.get_cart(&s.user.id).await.unwrap().is_none());
        assert_eq!(s.store.database().carts().count().await.unwrap(), 0);

        // The next add starts a fresh cart
        let fresh = s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();
        assert_ne!(fresh.cart_id, cart.cart_id);
        assert_eq!(fresh.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected_without_changes() {
        let s = shop().await;
        let cart = s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();
        let item_id = cart.items[0].item_id.clone();

        let err = s
            .store
            .update_quantity(&s.user.id, &item_id, -1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::MustNotBeNegative { .. }))
        ));
        assert_eq!(core_kind(&err), Some(ErrorKind::InvalidInput));
        assert_eq!(s.store.get_cart(&s.user.id).await.unwrap(), Some(cart));
    }

    #[tokio::test]
    async fn test_item_of_another_users_cart_is_invalid_reference() {
        let s = shop().await;
        let other = s
            .store
            .database()
            .users()
            .insert(&User::new("other@example.com"))
            .await
            .unwrap();
        let theirs = s.store.add_product(&other.id, &s.apple.id).await.unwrap();
        let their_item = theirs.items[0].item_id.clone();

        // No cart at all
        let err = s
            .store
            .update_quantity(&s.user.id, &their_item, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CartItemNotFound(_))));

        // A cart, but not containing that item
        s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();
        let err = s.store.remove_item(&s.user.id, &their_item).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CartItemNotFound(_))));

        let untouched = s.store.get_cart(&other.id).await.unwrap().unwrap();
        assert_eq!(untouched, theirs);
    }

    #[tokio::test]
    async fn test_remove_item() {
        let s = shop().await;
        s.store.add_product(&s.user.id, &s.cat.id).await.unwrap();
        let cart = s.store.add_product(&s.user.id, &s.apple.id).await.unwrap();
        let cat_line = cart.item_for_product(&s.cat.id).unwrap().item_id.clone();

        let cart = s.store.remove_item(&s.user.id, &cat_line).await.unwrap().unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total, Money::from_cents(200));
    }

    #[tokio::test]
    async fn test_toggle_loyalty_without_cart() {
        let s = shop().await;

        let on = s.store.toggle_loyalty(&s.user.id).await.unwrap();
        assert_eq!(on, LoyaltyToggle { loyalty_card: true, cart: None });

        let user = s.store.database().users().get_by_id(&s.user.id).await.unwrap().unwrap();
        assert!(user.loyalty_card);

        // The flag applies to the next cart
        let cart = s.store.add_product(&s.user.id, &s.butter.id).await.unwrap();
        assert_eq!(cart.total, Money::from_cents(392));

        let off = s.store.toggle_loyalty(&s.user.id).await.unwrap();
        assert!(!off.loyalty_card);
        assert_eq!(off.cart.unwrap().total, Money::from_cents(400));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_adds_both_land() {
        let s = shop().await;

        let a = tokio::spawn({
            let store = s.store.clone();
            let (user_id, product_id) = (s.user.id.clone(), s.cat.id.clone());
            async move { store.add_product(&user_id, &product_id).await }
        });
        let b = tokio::spawn({
            let store = s.store.clone();
            let (user_id, product_id) = (s.user.id.clone(), s.cat.id.clone());
            async move { store.add_product(&user_id, &product_id).await }
        });

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let cart = s.store.get_cart(&s.user.id).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.total, Money::from_cents(1000));
        assert_eq!(s.store.locks.active(), 0);
    }

    #[tokio::test]
    async fn test_busy_attempts_are_retried() {
        let s = shop().await;
        let store = s.store.with_retry(RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        });
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = store
            .retrying("test", "user", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DbError::Busy)
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_busy_exhaustion_is_conflict() {
        let s = shop().await;
        let store = s.store.with_retry(RetryPolicy {
            max_attempts: 2,
            backoff_ms: 1,
        });
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: DbResult<()> = store
            .retrying("test", "user", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::Busy)
            })
            .await;

        assert!(matches!(result, Err(DbError::Conflict { attempts: 2 })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let s = shop().await;
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: DbResult<()> = s
            .store
            .retrying("test", "user", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::not_found("Cart", "x"))
            })
            .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
