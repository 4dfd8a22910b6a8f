//! # Seed Data Generator
//!
//! Populates the database with the reference catalog and a default user,
//! then fills that user's cart and logs how it was priced.
//!
//! ## Usage
//! ```bash
//! # Default config location and database
//! cargo run -p trolley-db --bin seed
//!
//! # Specify database path
//! cargo run -p trolley-db --bin seed -- --db ./data/trolley.db
//!
//! # Specify config file
//! cargo run -p trolley-db --bin seed -- --config ./trolley.toml
//! ```
//!
//! ## Reference Catalog
//! ```text
//! ┌──────────┬─────────┬────────┐
//! │ Title    │ Price   │ BOGOF  │
//! ├──────────┼─────────┼────────┤
//! │ Apple    │  2.00   │  no    │
//! │ Cat      │ 10.00   │  yes   │
//! │ Butter   │  4.00   │  no    │
//! └──────────┴─────────┴────────┘
//! ```
//!
//! Sample cart for `ad@min.com`: 4 × Cat + 1 × Apple. With the loyalty card
//! on this prices to 19.40.

use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trolley_core::{Money, Product, User};
use trolley_db::{CartStore, StoreConfig};

const DEFAULT_USER_EMAIL: &str = "ad@min.com";

/// Reference catalog: (title, price in cents, BOGOF)
const CATALOG: &[(&str, i64, bool)] = &[
    ("Apple", 200, false),
    ("Cat", 1000, true),
    ("Butter", 400, false),
];

/// Sample cart: (title, quantity)
const SAMPLE_CART: &[(&str, u32)] = &[("Cat", 4), ("Apple", 1)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Trolley Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: platform data dir)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = StoreConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }

    let store = CartStore::open(&config).await?;
    let db = store.database();

    // Catalog
    let existing = db.products().count().await?;
    if existing > 0 {
        info!(existing, "Catalog already seeded, skipping products");
    } else {
        for (title, cents, bogof) in CATALOG {
            let product = db
                .products()
                .insert(&Product::new(*title, Money::from_cents(*cents), *bogof))
                .await?;
            info!(
                id = %product.id,
                title = %product.title,
                price = %product.price(),
                bogof,
                "Product created"
            );
        }
    }

    // Default user
    let user = match db.users().get_by_email(DEFAULT_USER_EMAIL).await? {
        Some(user) => user,
        None => {
            let user = db.users().insert(&User::new(DEFAULT_USER_EMAIL)).await?;
            info!(id = %user.id, email = %user.email, "User created");
            user
        }
    };

    // Sample cart
    if let Some(cart) = store.get_cart(&user.id).await? {
        info!(
            cart_id = %cart.cart_id,
            total = %cart.total,
            "User already has a cart, leaving it alone"
        );
        println!("{}", serde_json::to_string_pretty(&cart)?);
        return Ok(());
    }

    let products = db.products().list(100).await?;
    let mut cart = None;
    for (title, quantity) in SAMPLE_CART {
        let Some(product) = products.iter().find(|p| p.title == *title) else {
            warn!(title = %title, "Sample product missing from catalog");
            continue;
        };
        for _ in 0..*quantity {
            cart = Some(store.add_product(&user.id, &product.id).await?);
        }
    }

    if !user.loyalty_card {
        cart = store.toggle_loyalty(&user.id).await?.cart;
    }

    match cart {
        Some(cart) => {
            info!(
                subtotal = %cart.subtotal,
                total = %cart.total,
                discount = %(cart.subtotal - cart.total),
                "Sample cart priced"
            );
            println!("{}", serde_json::to_string_pretty(&cart)?);
        }
        None => warn!("Sample cart is empty"),
    }

    info!("Seed complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=trolley=trace` - Show trace for trolley crates only
/// - Default: `info,trolley=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,trolley=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
