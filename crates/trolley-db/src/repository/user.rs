//! # User Repository
//!
//! Database operations for cart owners. The pricing engine only ever reads
//! `loyalty_card`; the flag is flipped by [`crate::CartStore::toggle_loyalty`]
//! so the owner's cart is repriced in the same transaction.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use trolley_core::validation::validate_email;
use trolley_core::User;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a new user.
    ///
    /// ## Returns
    /// * `Ok(User)` - The inserted user
    /// * `Err(DbError::UniqueViolation)` - Email already registered
    /// * `Err(DbError::Core(Validation))` - Malformed email
    pub async fn insert(&self, user: &User) -> DbResult<User> {
        validate_email(&user.email)?;
        let email = user.email.trim();

        debug!(id = %user.id, "Inserting user");

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, loyalty_card, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&user.id)
        .bind(email)
        .bind(user.loyalty_card)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                email: email.to_string(),
                ..user.clone()
            }),
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if field.contains("email") => {
                    Err(DbError::duplicate("email", email))
                }
                other => Err(other),
            },
        }
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        fetch_user(&self.pool, id).await
    }

    /// Gets a user by email.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, loyalty_card, created_at, updated_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Looks a user up on any executor (pool or open transaction).
pub(crate) async fn fetch_user<'e, E>(executor: E, id: &str) -> DbResult<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, loyalty_card, created_at, updated_at
        FROM users
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Writes the loyalty flag.
pub(crate) async fn set_loyalty_card<'e, E>(
    executor: E,
    id: &str,
    loyalty_card: bool,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE users SET loyalty_card = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(loyalty_card)
        .bind(Utc::now())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("User", id));
    }

    Ok(())
}
