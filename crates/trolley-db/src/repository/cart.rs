//! # Cart Repository
//!
//! Row-level access to `carts` and `cart_items`.
//!
//! Writes are free functions over a [`SqliteExecutor`] so the Cart Store can
//! run every write of one mutation on the same transaction. The
//! [`CartRepository`] handle exposes only reads: nothing outside the store
//! may write a charged price or a total.
//!
//! ## Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  carts                          cart_items                              │
//! │  ─────────────                  ─────────────────────                   │
//! │  id            ◄──────────────  cart_id  (ON DELETE CASCADE)            │
//! │  user_id  (UNIQUE)              product_id ──► products.id              │
//! │  total_cents   ← engine         quantity  (CHECK > 0)                   │
//! │                                 price_cents ← engine                    │
//! │                                 UNIQUE (cart_id, product_id)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use trolley_core::{Cart, CartItem, DraftLine, Money};

// =============================================================================
// Line Records
// =============================================================================

/// A cart line joined with its product, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LineRecord {
    pub item_id: String,
    pub product_id: String,
    pub title: String,
    pub unit_price_cents: i64,
    pub bogof: bool,
    pub quantity: i64,
    /// Last charged price written by the store.
    pub price_cents: i64,
}

impl LineRecord {
    pub fn charged_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn to_draft_line(&self) -> DraftLine {
        DraftLine {
            item_id: self.item_id.clone(),
            product_id: self.product_id.clone(),
            title: self.title.clone(),
            unit_price: Money::from_cents(self.unit_price_cents),
            bogof: self.bogof,
            quantity: self.quantity,
        }
    }
}

// =============================================================================
// Read Handle
// =============================================================================

/// Read-only repository for persisted carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the cart owned by a user, if any.
    pub async fn get_for_user(&self, user_id: &str) -> DbResult<Option<Cart>> {
        fetch_cart_for_user(&self.pool, user_id).await
    }

    /// Gets the raw line rows of a cart.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, price_cents, created_at, updated_at
            FROM cart_items
            WHERE cart_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets a cart's lines joined with their products.
    pub async fn lines(&self, cart_id: &str) -> DbResult<Vec<LineRecord>> {
        fetch_lines(&self.pool, cart_id).await
    }

    /// Counts carts (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-level Queries
// =============================================================================

pub(crate) async fn fetch_cart_for_user<'e, E>(executor: E, user_id: &str) -> DbResult<Option<Cart>>
where
    E: SqliteExecutor<'e>,
{
    let cart = sqlx::query_as::<_, Cart>(
        r#"
        SELECT id, user_id, total_cents, created_at, updated_at
        FROM carts
        WHERE user_id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(cart)
}

pub(crate) async fn fetch_lines<'e, E>(executor: E, cart_id: &str) -> DbResult<Vec<LineRecord>>
where
    E: SqliteExecutor<'e>,
{
    let lines = sqlx::query_as::<_, LineRecord>(
        r#"
        SELECT
            ci.id AS item_id,
            ci.product_id,
            p.title,
            p.price_cents AS unit_price_cents,
            p.bogof,
            ci.quantity,
            ci.price_cents
        FROM cart_items ci
        INNER JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = ?1
        ORDER BY ci.created_at, ci.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(executor)
    .await?;

    Ok(lines)
}

pub(crate) async fn insert_cart<'e, E>(executor: E, cart: &Cart) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(cart_id = %cart.id, user_id = %cart.user_id, "Creating cart");

    sqlx::query(
        r#"
        INSERT INTO carts (id, user_id, total_cents, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&cart.id)
    .bind(&cart.user_id)
    .bind(cart.total_cents)
    .bind(cart.created_at)
    .bind(cart.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Deletes a cart; its lines go with it (`ON DELETE CASCADE`).
pub(crate) async fn delete_cart<'e, E>(executor: E, cart_id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(cart_id = %cart_id, "Deleting empty cart");

    let result = sqlx::query("DELETE FROM carts WHERE id = ?1")
        .bind(cart_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart", cart_id));
    }

    Ok(())
}

pub(crate) async fn update_cart_total<'e, E>(
    executor: E,
    cart_id: &str,
    total: Money,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE carts SET total_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(cart_id)
        .bind(total.cents())
        .bind(Utc::now())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart", cart_id));
    }

    Ok(())
}

pub(crate) async fn insert_item<'e, E>(executor: E, cart_id: &str, line: &DraftLine) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO cart_items
            (id, cart_id, product_id, quantity, price_cents, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
        "#,
    )
    .bind(&line.item_id)
    .bind(cart_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn update_item_quantity<'e, E>(
    executor: E,
    item_id: &str,
    quantity: i64,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE cart_items SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(item_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CartItem", item_id));
    }

    Ok(())
}

/// Writes a charged price. Skips the write when nothing changed.
pub(crate) async fn update_item_price<'e, E>(
    executor: E,
    item_id: &str,
    price: Money,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE cart_items SET price_cents = ?2, updated_at = ?3
        WHERE id = ?1 AND price_cents != ?2
        "#,
    )
    .bind(item_id)
    .bind(price.cents())
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn delete_item<'e, E>(executor: E, item_id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1")
        .bind(item_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CartItem", item_id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use trolley_core::{Product, User};

    struct Fixture {
        db: Database,
        cart: Cart,
        apple: Product,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().insert(&User::new("ad@min.com")).await.unwrap();
        let apple = db
            .products()
            .insert(&Product::new("Apple", Money::from_cents(200), false))
            .await
            .unwrap();

        let cart = Cart::new(&user.id);
        insert_cart(db.pool(), &cart).await.unwrap();

        Fixture { db, cart, apple }
    }

    fn line_for(product: &Product, quantity: i64) -> DraftLine {
        DraftLine {
            item_id: trolley_core::generate_id(),
            product_id: product.id.clone(),
            title: product.title.clone(),
            unit_price: product.price(),
            bogof: product.bogof,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_item_lifecycle() {
        let f = fixture().await;
        let carts = f.db.carts();
        let line = line_for(&f.apple, 1);

        insert_item(f.db.pool(), &f.cart.id, &line).await.unwrap();
        update_item_quantity(f.db.pool(), &line.item_id, 3).await.unwrap();
        update_item_price(f.db.pool(), &line.item_id, Money::from_cents(600))
            .await
            .unwrap();

        let lines = carts.lines(&f.cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[0].title, "Apple");
        assert_eq!(lines[0].charged_price(), Money::from_cents(600));
        assert_eq!(lines[0].to_draft_line().unit_price, Money::from_cents(200));

        delete_item(f.db.pool(), &line.item_id).await.unwrap();
        assert!(carts.items(&f.cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_line_per_product() {
        let f = fixture().await;

        insert_item(f.db.pool(), &f.cart.id, &line_for(&f.apple, 1))
            .await
            .unwrap();
        let err = insert_item(f.db.pool(), &f.cart.id, &line_for(&f.apple, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected_by_schema() {
        let f = fixture().await;
        let line = line_for(&f.apple, 1);
        insert_item(f.db.pool(), &f.cart.id, &line).await.unwrap();

        let err = update_item_quantity(f.db.pool(), &line.item_id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_deleting_cart_cascades_to_items() {
        let f = fixture().await;
        insert_item(f.db.pool(), &f.cart.id, &line_for(&f.apple, 2))
            .await
            .unwrap();
        update_cart_total(f.db.pool(), &f.cart.id, Money::from_cents(400))
            .await
            .unwrap();

        let stored = f.db.carts().get_for_user(&f.cart.user_id).await.unwrap().unwrap();
        assert_eq!(stored.total(), Money::from_cents(400));

        delete_cart(f.db.pool(), &f.cart.id).await.unwrap();

        assert!(f.db.carts().get_for_user(&f.cart.user_id).await.unwrap().is_none());
        assert!(f.db.carts().items(&f.cart.id).await.unwrap().is_empty());
        assert_eq!(f.db.carts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_rows_report_not_found() {
        let f = fixture().await;
        assert!(matches!(
            delete_item(f.db.pool(), "ghost").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            update_cart_total(f.db.pool(), "ghost", Money::zero()).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
