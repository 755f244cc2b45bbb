//! Subscription Record
//!
//! The persisted per-user subscription row. Field names serialize in
//! snake_case and match the `user_subscriptions` table one to one.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{self, FREE_MONTHLY_TOKENS};
use crate::error::{CoreError, Result};

/// Subscription plan types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    #[serde(alias = "freemium")]
    Free,
    Developer,
    Enterprise,
}

impl PlanType {
    /// All plans in display order
    pub const ALL: [Self; 3] = [Self::Free, Self::Developer, Self::Enterprise];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Developer => "developer",
            Self::Enterprise => "enterprise",
        }
    }

    /// Paid plans are sold in token tiers
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "free" | "freemium" => Ok(Self::Free),
            "developer" => Ok(Self::Developer),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(CoreError::Parse(format!("unknown plan type '{other}'"))),
        }
    }
}

/// Billing cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Annual,
}

impl BillingCycle {
    pub const fn from_annual(annual: bool) -> Self {
        if annual { Self::Annual } else { Self::Monthly }
    }

    pub const fn is_annual(self) -> bool {
        matches!(self, Self::Annual)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }

    /// Calendar months covered by one charge
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Annual => 12,
        }
    }

    /// Date of the next charge when one is taken at `from`.
    ///
    /// Adds calendar months, so the 31st of a month lands on the last day
    /// of a shorter target month.
    pub fn next_billing_date(self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        from.checked_add_months(Months::new(self.months()))
            .ok_or(CoreError::DateOutOfRange)
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            other => Err(CoreError::Parse(format!("unknown billing cycle '{other}'"))),
        }
    }
}

/// A (token count, price) pair offered under a paid plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTier {
    pub tokens: u64,

    /// Price in EUR for one billing period
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl TokenTier {
    pub const fn new(tokens: u64, price: Decimal) -> Self {
        Self { tokens, price }
    }

    /// Price in whole cents, rounded half away from zero
    pub fn unit_amount_cents(&self) -> Result<i64> {
        (self.price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| CoreError::Parse(format!("price {} out of range", self.price)))
    }
}

/// A user's subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_type: PlanType,
    pub plan_name: String,
    pub token_tier: Option<TokenTier>,
    pub billing_cycle: BillingCycle,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub remaining_tokens: u64,
    pub total_tokens_purchased: u64,

    /// Display only
    #[serde(default)]
    pub features: Vec<String>,
}

impl Subscription {
    /// The free subscription every user starts with
    pub fn default_for(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            plan_type: PlanType::Free,
            plan_name: catalog::plan_name(PlanType::Free).into(),
            token_tier: None,
            billing_cycle: BillingCycle::Monthly,
            is_active: true,
            created_at: now,
            updated_at: now,
            next_billing_date: None,
            remaining_tokens: FREE_MONTHLY_TOKENS,
            total_tokens_purchased: FREE_MONTHLY_TOKENS,
            features: owned_features(PlanType::Free),
        }
    }

    /// Replace the plan wholesale.
    ///
    /// Paid plans grant the tier's tokens and schedule the next charge one
    /// billing cycle after `now`. The free plan grants its monthly allowance
    /// and has no next charge. On error the subscription is left untouched.
    pub fn apply_plan(
        &mut self,
        plan: PlanType,
        tier: Option<TokenTier>,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (next_billing_date, tokens) = match (plan.is_paid(), tier) {
            (true, Some(tier)) => (Some(cycle.next_billing_date(now)?), tier.tokens),
            (true, None) => return Err(CoreError::TierRequired(plan)),
            (false, Some(_)) => return Err(CoreError::TierNotAllowed(plan)),
            (false, None) => (None, FREE_MONTHLY_TOKENS),
        };

        self.plan_type = plan;
        self.plan_name = catalog::plan_name(plan).into();
        self.features = owned_features(plan);
        self.token_tier = tier;
        self.billing_cycle = cycle;
        self.next_billing_date = next_billing_date;
        self.is_active = true;
        self.grant_tokens(tokens, now);

        Ok(())
    }

    /// Switch billing cycle without changing the plan.
    ///
    /// A scheduled charge moves to one new cycle after `now`.
    pub fn set_billing_cycle(&mut self, cycle: BillingCycle, now: DateTime<Utc>) -> Result<()> {
        if self.next_billing_date.is_some() {
            self.next_billing_date = Some(cycle.next_billing_date(now)?);
        }
        self.billing_cycle = cycle;
        self.updated_at = now;
        Ok(())
    }

    /// Reset the token balance to a fresh grant
    pub fn grant_tokens(&mut self, tokens: u64, now: DateTime<Utc>) {
        self.remaining_tokens = tokens;
        self.total_tokens_purchased = tokens;
        self.updated_at = now;
    }

    pub fn validate(&self) -> Result<()> {
        if self.remaining_tokens > self.total_tokens_purchased {
            return Err(CoreError::Invariant(format!(
                "remaining tokens {} exceed total purchased {}",
                self.remaining_tokens, self.total_tokens_purchased
            )));
        }
        if self.plan_type.is_paid() != self.token_tier.is_some() {
            return Err(CoreError::Invariant(format!(
                "plan {} with token tier {:?}",
                self.plan_type, self.token_tier
            )));
        }
        if self.plan_type.is_paid() != self.next_billing_date.is_some() {
            return Err(CoreError::Invariant(format!(
                "plan {} with next billing date {:?}",
                self.plan_type, self.next_billing_date
            )));
        }
        Ok(())
    }
}

fn owned_features(plan: PlanType) -> Vec<String> {
    catalog::features(plan).iter().map(|f| (*f).to_string()).collect()
}
