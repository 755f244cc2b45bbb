//! # tokentier-core
//!
//! Subscription model and pricing logic for token-tier plans.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Catalog    │──▶│   Reducer    │──▶│   Checkout   │──▶│   Webhook    │
//! │ (cycle → $)  │   │ (selection)  │   │   payload    │   │   upsert     │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! A token covers one monthly active user. Paid plans are sold in
//! (tokens, price) tiers; annual billing takes 10% off every tier.

pub mod api;
pub mod catalog;
pub mod error;
pub mod selection;
pub mod subscription;

pub use api::{CheckoutPayload, CheckoutResponse, ErrorResponse};
pub use catalog::{PlanDescriptor, FREE_MONTHLY_TOKENS, catalog};
pub use error::{CoreError, Result};
pub use selection::{PricingAction, PricingState, TierSelection, reduce};
pub use subscription::{BillingCycle, PlanType, Subscription, TokenTier};
