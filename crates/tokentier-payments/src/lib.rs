//! # tokentier-payments
//!
//! Stripe checkout, webhook processing and subscription persistence.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  POST /api/checkout  ┌─────────────────┐
//! │   Client    │─────────────────────▶│ create_checkout │──▶ Stripe session
//! │ (pricing)   │◀──────── {url} ──────│    _session     │
//! └──────┬──────┘                      └─────────────────┘
//!        │ redirect
//!        ▼
//! ┌─────────────────┐  signed POST   ┌────────────────┐   upsert(user_id)
//! │  Stripe Hosted  │───────────────▶│ WebhookHandler │──────────────────▶ store
//! │  Checkout Page  │                └────────────────┘
//! └─────────────────┘
//! ```
//!
//! The provider and the store sit behind traits ([`CheckoutProvider`],
//! [`SubscriptionStore`], [`Authenticator`]) so the flow can run against
//! Stripe and Supabase in production and in-memory fakes in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tokentier_payments::{create_checkout_session, CheckoutRequest, StripeClient};
//!
//! let stripe = StripeClient::new("sk_test_xxx", "whsec_xxx");
//! let session = create_checkout_session(&stripe, &CheckoutRequest {
//!     user,
//!     payload,
//!     origin: "https://yoursite.com".into(),
//! }).await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod auth;
mod checkout;
mod error;
pub mod signature;
mod store;
mod supabase;
mod webhook;

pub use auth::{AuthUser, Authenticator, bearer_token};
pub use checkout::{
    CheckoutMetadata, CheckoutProvider, CheckoutRequest, CheckoutSession, SessionParams,
    StripeClient, create_checkout_session,
};
pub use error::{PaymentError, Result};
pub use store::{MemorySubscriptionStore, SubscriptionStore, load_or_create};
pub use supabase::{SupabaseAuth, SupabaseConfig, SupabaseSubscriptionStore};
pub use webhook::{StripeEvent, StripeEventData, WebhookEvent, WebhookHandler};
