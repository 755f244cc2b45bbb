//! Plan Selection
//!
//! Reducer over the pricing page state. Every action recomputes the catalog
//! for the current billing cycle and then the subscription fields that
//! depend on the selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{self, PlanDescriptor};
use crate::error::{CoreError, Result};
use crate::subscription::{BillingCycle, PlanType, Subscription, TokenTier};

/// A chosen plan card and, for paid plans, the index of the chosen tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSelection {
    pub plan: PlanType,
    #[serde(default)]
    pub tier_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PricingAction {
    SetBillingCycle(BillingCycle),
    SelectPlan(TierSelection),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingState {
    pub billing_cycle: BillingCycle,
    pub selected: Option<TierSelection>,
    pub subscription: Subscription,
}

impl PricingState {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            billing_cycle: subscription.billing_cycle,
            selected: None,
            subscription,
        }
    }

    /// Catalog priced for the current billing cycle
    pub fn catalog(&self) -> Vec<PlanDescriptor> {
        catalog::catalog(self.billing_cycle)
    }
}

/// Apply an action, returning the next state.
///
/// The input state is never modified; an invalid selection returns an error.
pub fn reduce(state: &PricingState, action: PricingAction, now: DateTime<Utc>) -> Result<PricingState> {
    let mut next = state.clone();

    match action {
        PricingAction::SetBillingCycle(cycle) => next.billing_cycle = cycle,
        PricingAction::SelectPlan(selection) => next.selected = Some(selection),
    }

    match next.selected {
        Some(selection) => {
            let tier = resolve_tier(selection, next.billing_cycle)?;
            next.subscription
                .apply_plan(selection.plan, tier, next.billing_cycle, now)?;
        }
        None => next.subscription.set_billing_cycle(next.billing_cycle, now)?,
    }

    Ok(next)
}

fn resolve_tier(selection: TierSelection, cycle: BillingCycle) -> Result<Option<TokenTier>> {
    if !selection.plan.is_paid() {
        return Ok(None);
    }

    catalog::tiers(selection.plan, cycle)
        .get(selection.tier_index)
        .copied()
        .map(Some)
        .ok_or(CoreError::TierIndexOutOfRange {
            plan: selection.plan,
            index: selection.tier_index,
        })
}
