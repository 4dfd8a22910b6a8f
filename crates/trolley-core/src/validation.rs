//! # Input Checks
//!
//! Cheap checks the Cart Store and repositories run before a request
//! reaches the pricing engine or the database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller input                                                           │
//! │    quantity ──► validate_quantity_update   (0 removes, < 0 rejected)    │
//! │    product  ──► validate_product_title, validate_price_cents            │
//! │    user     ──► validate_email                                          │
//! │    config   ──► validate_discount_bps                                   │
//! │                                                                         │
//! │  SQLite backs these up with its own constraints:                        │
//! │    CHECK (quantity > 0)   CHECK (price_cents BETWEEN 0 AND 10^10-1)     │
//! │    UNIQUE (cart_id, product_id)   UNIQUE (email)   foreign keys         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use trolley_core::validation::{validate_quantity_update, validate_price_cents};
//!
//! assert!(validate_quantity_update(0).is_ok());
//! assert!(validate_quantity_update(-1).is_err());
//! assert!(validate_price_cents(0).is_ok());
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// A title is non-blank once trimmed and at most 255 characters.
pub fn validate_product_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.chars().count() > 255 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 255,
        });
    }

    Ok(())
}

/// Validates a user email.
///
/// Only a shape check: one `@` with text on both sides and a dot in the
/// domain. Deliverability is not our concern.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 255,
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Quantity requested by `update_quantity`.
///
/// `0` is legal and deletes the line. Negative values are rejected before
/// anything is written; so is anything above [`MAX_ITEM_QUANTITY`].
pub fn validate_quantity_update(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Unit prices may be zero but never negative, and at most
/// [`MAX_PRICE_CENTS`].
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a discount rate in basis points (0% to 100%).
pub fn validate_discount_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > crate::types::DiscountRate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::from(crate::types::DiscountRate::FULL_BPS),
        });
    }

    Ok(())
}
