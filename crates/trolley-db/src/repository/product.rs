//! # Product Repository
//!
//! The Catalog: resolves a product id to its unit price and BOGOF flag.
//!
//! ## Lookup Inside a Cart Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartStore::add_product(user, product_id)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fetch_product(&mut *tx, product_id)   ← same transaction as the write │
//! │       │                                                                 │
//! │       ├── None      → CoreError::ProductNotFound (nothing written)     │
//! │       └── Some(p)   → p.price_cents, p.bogof feed the pricing engine   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use trolley_core::validation::{validate_price_cents, validate_product_title};
use trolley_core::Product;

/// Catalog queries.
///
/// ```rust,ignore
/// let repo = db.products();
///
/// let cat = repo.insert(&Product::new("Cat", Money::from_cents(1000), true)).await?;
/// let found = repo.get_by_id(&cat.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Adds a product to the catalog, storing the title trimmed.
    ///
    /// Blank or overlong titles and negative prices fail with
    /// `DbError::Core(Validation)` and nothing is written.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product_title(&product.title)?;
        validate_price_cents(product.price_cents)?;

        debug!(id = %product.id, title = %product.title, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, title, price_cents, bogof, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(product.title.trim())
        .bind(product.price_cents)
        .bind(product.bogof)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(Product {
            title: product.title.trim().to_string(),
            ..product.clone()
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Lists products ordered by title.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, title, price_cents, bogof, created_at
            FROM products
            ORDER BY title, id
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Catalog size. The seed tool skips seeding when this is non-zero.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Looks a product up on any executor (pool or open transaction).
pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, title, price_cents, bogof, created_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(product)
}
