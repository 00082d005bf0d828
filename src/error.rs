//! Error types for order book reconstruction.
//!
//! Clean error handling using `thiserror` for ergonomic error definitions.
//! Note that the message-processing entry points of the reconstructor never
//! surface these to the caller; they are absorbed, logged and counted there.

use thiserror::Error;

/// Result type alias for book operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Main error type for book operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Record has no `type` field (or it is not a string)
    #[error("Invalid message, type is not included in message")]
    MissingType,

    /// A field required by the declared message type is absent
    #[error("Missing field `{field}` in `{msg_type}` message")]
    MissingField {
        msg_type: &'static str,
        field: &'static str,
    },

    /// A field is present but cannot be interpreted
    #[error("Invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },

    /// Side is not `buy` or `sell`
    #[error("Invalid side: {0}")]
    InvalidSide(String),

    /// Price is zero or negative
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Quantity is zero or negative
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Product not tracked (for multi-product routing)
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl BookError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        BookError::Generic(msg.into())
    }

    /// True for errors caused by the content of a feed record.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            BookError::MissingType
                | BookError::MissingField { .. }
                | BookError::InvalidField { .. }
                | BookError::InvalidSide(_)
                | BookError::InvalidPrice(_)
                | BookError::InvalidQuantity(_)
                | BookError::Json(_)
        )
    }
}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        BookError::Generic(format!("IO error: {err}"))
    }
}

impl From<serde_json::Error> for BookError {
    fn from(err: serde_json::Error) -> Self {
        BookError::Json(err.to_string())
    }
}
