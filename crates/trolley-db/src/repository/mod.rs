//! # Repository Module
//!
//! Database repository implementations for Trolley.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Writes What                                      │
//! │                                                                         │
//! │  Seed tool / API layer                                                 │
//! │       │                                                                 │
//! │       ├── db.products().insert(..)   ──► products                      │
//! │       ├── db.users().insert(..)      ──► users                         │
//! │       │                                                                 │
//! │       └── CartStore                                                    │
//! │             ├── product::fetch_product / user::fetch_user  (reads)     │
//! │             └── cart::insert_item / update_item_price / ...            │
//! │                     │        (one transaction per mutation)            │
//! │                     ▼                                                   │
//! │                carts, cart_items                                        │
//! │                                                                         │
//! │  db.carts() is read-only: charged prices and totals come only from     │
//! │  the pricing engine, through the store.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - The catalog
//! - [`UserRepository`](user::UserRepository) - Cart owners and their loyalty flag
//! - [`CartRepository`](cart::CartRepository) - Persisted carts and lines

pub mod cart;
pub mod product;
pub mod user;
