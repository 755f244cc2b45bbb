//! Checkout Orchestrator
//!
//! Authenticated user + selection → session-creation call → full-page
//! redirect. Progress is published on a watch channel so a view can render
//! the loading and error state.

use std::sync::Arc;

use tokio::sync::watch;
use tokentier_core::{BillingCycle, CheckoutPayload, PlanType, PricingState, TokenTier};

use crate::error::{CheckoutError, Result};
use crate::session::{AuthSession, SessionFunction};

/// Performs the browser redirect to the hosted checkout page
pub trait Navigator: Send + Sync {
    fn redirect(&self, url: &str);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutStatus {
    /// True only while a session is being created
    pub loading: bool,

    /// Message of the most recent failure, cleared when a new attempt starts
    pub error: Option<String>,
}

pub struct CheckoutOrchestrator {
    sessions: Arc<dyn SessionFunction>,
    navigator: Arc<dyn Navigator>,
    status: watch::Sender<CheckoutStatus>,
}

impl CheckoutOrchestrator {
    pub fn new(sessions: Arc<dyn SessionFunction>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            sessions,
            navigator,
            status: watch::Sender::new(CheckoutStatus::default()),
        }
    }

    pub fn status(&self) -> CheckoutStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.status.subscribe()
    }

    /// Start checkout for an explicit plan, tier and cycle.
    ///
    /// Without `auth` this fails before any network call. On success the
    /// navigator has been sent to the returned URL.
    pub async fn create_checkout_session(
        &self,
        auth: Option<&AuthSession>,
        plan: PlanType,
        tier: TokenTier,
        cycle: BillingCycle,
    ) -> Result<String> {
        self.run(auth, Some(CheckoutPayload::new(plan, tier, cycle)))
            .await
    }

    /// Start checkout for whatever the pricing page currently has selected
    pub async fn checkout_selection(
        &self,
        auth: Option<&AuthSession>,
        state: &PricingState,
    ) -> Result<String> {
        self.run(auth, CheckoutPayload::from_state(state)).await
    }

    async fn run(&self, auth: Option<&AuthSession>, payload: Option<CheckoutPayload>) -> Result<String> {
        self.status.send_replace(CheckoutStatus {
            loading: true,
            error: None,
        });

        let result = self.redirect_to_checkout(auth, payload).await;

        self.status.send_replace(CheckoutStatus {
            loading: false,
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    async fn redirect_to_checkout(
        &self,
        auth: Option<&AuthSession>,
        payload: Option<CheckoutPayload>,
    ) -> Result<String> {
        let auth = auth.ok_or(CheckoutError::NotAuthenticated)?;
        let payload = payload.ok_or(CheckoutError::NothingToPurchase)?;

        tracing::debug!(user_id = %auth.user_id, "Creating checkout session");
        let url = self
            .sessions
            .create_session(&auth.access_token, &payload)
            .await
            .inspect_err(|e| tracing::warn!(user_id = %auth.user_id, error = %e, "Checkout failed"))?
            .ok_or(CheckoutError::MissingUrl)?;

        self.navigator.redirect(&url);
        Ok(url)
    }
}
