//! tokentier server binary

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokentier_payments::{
    Authenticator, MemorySubscriptionStore, StripeClient, SubscriptionStore, SupabaseAuth,
    SupabaseConfig, SupabaseSubscriptionStore,
};
use tokentier_server::{AppState, Payments, ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    // Supabase: auth and persistence
    let (auth, store): (Option<Arc<dyn Authenticator>>, Arc<dyn SubscriptionStore>) =
        match SupabaseConfig::from_env() {
            Ok(supabase) => {
                tracing::info!(url = %supabase.url, "✓ Supabase configured");
                (
                    Some(Arc::new(SupabaseAuth::new(supabase.clone()))),
                    Arc::new(SupabaseSubscriptionStore::new(supabase)),
                )
            }
            Err(e) => {
                tracing::warn!("⚠ Supabase not configured ({e}) - using in-memory store");
                tracing::warn!("  Authenticated routes will answer 503");
                (None, Arc::new(MemorySubscriptionStore::new()))
            }
        };

    // Stripe
    let payments = match StripeClient::from_env() {
        Ok(stripe) => {
            tracing::info!("✓ Stripe configured");
            let webhook_secret = stripe.webhook_secret().to_string();
            Some(Payments {
                provider: Arc::new(stripe),
                webhook_secret,
            })
        }
        Err(e) => {
            tracing::warn!("⚠ Stripe not configured ({e}) - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    let app = router(AppState {
        auth,
        store,
        payments,
        default_origin: config.app_origin.clone(),
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("tokentier server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/plans        - Plan catalog");
    tracing::info!("  GET  /api/subscription - Current subscription");
    tracing::info!("  POST /api/checkout     - Create Stripe checkout");
    tracing::info!("  POST /webhook/stripe   - Stripe events");

    axum::serve(listener, app).await?;

    Ok(())
}
