//! tokentier HTTP server
//!
//! Axum router for the checkout flow: plan catalog, subscription read,
//! checkout session creation and the Stripe webhook.

pub mod config;
mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{create_checkout, get_subscription, health_check, list_plans, stripe_webhook};
pub use crate::config::ServerConfig;
pub use crate::state::{AppState, Payments};

/// Build the application router
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & catalog
        .route("/health", get(health_check))
        .route("/api/plans", get(list_plans))

        // Subscriptions
        .route("/api/subscription", get(get_subscription))
        .route("/api/checkout", post(create_checkout))

        // Payments
        .route("/webhook/stripe", post(stripe_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
