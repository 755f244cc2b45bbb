//! Client Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout failures, each reduced to a single message for display
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("User not authenticated")]
    NotAuthenticated,

    /// The free plan has no checkout
    #[error("The free plan does not require checkout")]
    NothingToPurchase,

    /// The session-creation function answered with an error body
    #[error("{0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No checkout URL returned")]
    MissingUrl,
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
