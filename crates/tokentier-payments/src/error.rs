//! Payment Error Types

use thiserror::Error;
use tokentier_core::CoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// No user, or the access token was rejected
    #[error("User not authenticated")]
    Unauthenticated,

    /// Request body lacks a required field
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Request body is present but not acceptable
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error talking to Supabase
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<CoreError> for PaymentError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingParameter(name) => Self::MissingParameter(name.into()),
            other => Self::InvalidParameter(other.to_string()),
        }
    }
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_) | Self::Storage(_) | Self::Http(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "User not authenticated".into(),
            Self::MissingParameter(_) => "Missing required parameters".into(),
            Self::InvalidParameter(msg) => msg.clone(),
            Self::Stripe(_) => "Payment processing failed. Please try again.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}
