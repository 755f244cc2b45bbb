//! Application State

use std::sync::Arc;

use tokentier_payments::{Authenticator, CheckoutProvider, SubscriptionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Access-token verification (None if Supabase is not configured)
    pub auth: Option<Arc<dyn Authenticator>>,

    /// Subscription rows
    pub store: Arc<dyn SubscriptionStore>,

    /// Stripe (None if not configured)
    pub payments: Option<Payments>,

    /// Redirect origin for requests without an `Origin` header
    pub default_origin: String,
}

#[derive(Clone)]
pub struct Payments {
    pub provider: Arc<dyn CheckoutProvider>,
    pub webhook_secret: String,
}
