//! # Error Types
//!
//! Why a cart operation was refused.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError   malformed input: negative quantity, blank title,     │
//! │        │           bad email, discount above 100%                       │
//! │        ▼  (#[from])                                                     │
//! │  CoreError         unknown product / user / line, cart limits           │
//! │        │                                                                │
//! │        ▼  (#[from], trolley-db)                                         │
//! │  DbError::Core     next to storage failures, Busy and Conflict          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pricing engine itself never fails. Everything here is raised by the
//! line mutation policy or by validation, before a recompute runs.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification an API layer can map onto a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced product, user or cart line does not exist.
    InvalidReference,
    /// The request itself is malformed (negative quantity, bad email, ...).
    InvalidInput,
}

// =============================================================================
// Core Error
// =============================================================================

/// A request the cart rules refuse.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The catalog has no such product.
    ///
    /// ## User Workflow
    /// ```text
    /// add_product(user, "no-such-id")
    ///      │
    ///      ▼
    /// Catalog lookup: None
    ///      │
    ///      ▼
    /// ProductNotFound("no-such-id")   ← no cart is created
    /// ```
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// No user with this id.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The line does not exist in the user's cart.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    /// Adding a new product would push the cart past `MAX_CART_ITEMS` lines.
    #[error("Cart already holds the maximum of {max} lines")]
    CartTooLarge { max: usize },

    /// A line would go above `MAX_ITEM_QUANTITY`.
    #[error("Quantity {requested} is above the per-line limit of {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::CartItemNotFound(_) => ErrorKind::InvalidReference,
            CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed input, caught before any cart rule runs.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Blank after trimming.
    #[error("{field} must not be blank")]
    Required { field: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must lie within {min}..={max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Unparseable text: a money string, an email address.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
