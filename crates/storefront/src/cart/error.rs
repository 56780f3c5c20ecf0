//! Cart operation errors.

use shopez_core::IdError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by cart operations.
///
/// None of these are retried by the cart service. Local cache failures never
/// appear here; they are logged and swallowed.
#[derive(Debug, Error)]
pub enum CartError {
    /// The caller passed something unusable (no user, no product id, zero
    /// increment).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Neither the stored record nor the incoming product carries enough data
    /// to render the cart line.
    #[error("Product data incomplete; cannot add to cart.")]
    DataIncomplete {
        /// Product the add was refused for.
        product_id: String,
    },

    /// Remote store call failed.
    #[error("Cart store error: {0}")]
    Store(#[from] StoreError),
}

impl CartError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    #[must_use]
    pub const fn is_data_incomplete(&self) -> bool {
        matches!(self, Self::DataIncomplete { .. })
    }

    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<IdError> for CartError {
    fn from(err: IdError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_incomplete_message() {
        let err = CartError::DataIncomplete {
            product_id: "9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Product data incomplete; cannot add to cart."
        );
        assert!(err.is_data_incomplete());
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn test_id_error_is_invalid_input() {
        let err = CartError::from(IdError::Empty);
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_store_error_wraps() {
        let err = CartError::from(StoreError::PermissionDenied);
        assert!(err.is_store());
        assert_eq!(err.to_string(), "Cart store error: permission denied");
    }
}
