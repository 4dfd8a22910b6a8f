//! # trolley-db: Cart Store and Catalog for Trolley
//!
//! SQLite persistence (via sqlx) for products, users and carts, and the
//! [`CartStore`] that reprices a cart on every mutation.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartStore (store.rs)                                                   │
//! │    CartLocks ── one async mutex per user id                             │
//! │    retrying ── SQLITE_BUSY ─► back off ─► again, Conflict when spent    │
//! │    one transaction per mutation:                                        │
//! │      repository::{user, cart, product} ─► CartDraft ─► recompute        │
//! │        ─► line prices + cart total written back                         │
//! │                                                                         │
//! │  Database (pool.rs)   SqlitePool, WAL, embedded migrations              │
//! │  StoreConfig (config.rs)   trolley.toml + TROLLEY_* overrides           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`config`] - TOML configuration with environment overrides
//! - [`pool`] - Opening the database
//! - [`migrations`] - The embedded schema
//! - [`error`] - Store errors and the sqlx mapping
//! - [`repository`] - Product, user and cart queries
//! - [`store`] - The Cart Store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trolley_db::{CartStore, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("trolley.db")).await?;
//! let store = CartStore::new(db, PricingPolicy::standard());
//!
//! let cart = store.add_product(&user_id, &product_id).await?;
//! ```

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{RetryPolicy, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{CartLocks, CartStore, LoyaltyToggle};
pub use repository::cart::{CartRepository, LineRecord};
pub use repository::product::ProductRepository;
pub use repository::user::UserRepository;
