//! Wire Types
//!
//! JSON bodies exchanged between the pricing client and the checkout
//! endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::selection::PricingState;
use crate::subscription::{BillingCycle, PlanType, TokenTier};

/// Body of a checkout session request.
///
/// Every field is optional on the wire so a partial body can be reported
/// as a missing parameter rather than a decode failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[serde(default)]
    pub plan_type: Option<PlanType>,
    #[serde(default)]
    pub token_tier: Option<TokenTier>,
    #[serde(default)]
    pub billing_cycle: Option<BillingCycle>,
}

impl CheckoutPayload {
    pub const fn new(plan_type: PlanType, token_tier: TokenTier, billing_cycle: BillingCycle) -> Self {
        Self {
            plan_type: Some(plan_type),
            token_tier: Some(token_tier),
            billing_cycle: Some(billing_cycle),
        }
    }

    /// Payload for the plan currently selected on the pricing page.
    ///
    /// `None` when the free plan is selected: there is nothing to pay for.
    pub fn from_state(state: &PricingState) -> Option<Self> {
        let sub = &state.subscription;
        sub.token_tier
            .map(|tier| Self::new(sub.plan_type, tier, sub.billing_cycle))
    }

    /// All three fields, or the name of the first missing one
    pub fn require(&self) -> Result<(PlanType, TokenTier, BillingCycle)> {
        let plan = self.plan_type.ok_or(CoreError::MissingParameter("planType"))?;
        let tier = self.token_tier.ok_or(CoreError::MissingParameter("tokenTier"))?;
        let cycle = self
            .billing_cycle
            .ok_or(CoreError::MissingParameter("billingCycle"))?;
        Ok((plan, tier, cycle))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub code: String,
}
