//! # tokentier-client
//!
//! Client half of the checkout flow: take the selection from the pricing
//! page, ask the server for a hosted checkout session and redirect to it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokentier_client::{CheckoutOrchestrator, HttpSessionFunction};
//!
//! let orchestrator = CheckoutOrchestrator::new(
//!     Arc::new(HttpSessionFunction::new("https://api.example.com")),
//!     Arc::new(BrowserNavigator),
//! );
//! orchestrator.checkout_selection(session.as_ref(), &pricing_state).await?;
//! ```

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::{CheckoutError, Result};
pub use orchestrator::{CheckoutOrchestrator, CheckoutStatus, Navigator};
pub use session::{AuthSession, HttpSessionFunction, SessionFunction};
