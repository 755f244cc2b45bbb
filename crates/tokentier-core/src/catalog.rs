//! Pricing Catalog
//!
//! Three plans; the paid ones are sold in token tiers. The catalog is a pure
//! function of the billing cycle: annual billing takes 10% off every tier,
//! rounded to the cent.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::subscription::{BillingCycle, PlanType, TokenTier};

/// Tokens granted each month on the free plan
pub const FREE_MONTHLY_TOKENS: u64 = 500;

/// (tokens, monthly price in cents)
const DEVELOPER_TIERS: &[(u64, i64)] = &[(1_000, 100), (5_000, 400), (10_000, 700)];
const ENTERPRISE_TIERS: &[(u64, i64)] = &[(1_000, 500), (5_000, 2_000), (10_000, 3_500)];

const FREE_FEATURES: &[&str] = &[
    "Basic authentication flows",
    "Basic user management",
    "Standard API & SDK access",
];

const DEVELOPER_FEATURES: &[&str] = &["Same as Freemium SaaS"];

const ENTERPRISE_FEATURES: &[&str] = &[
    "Same as Developer SaaS",
    "SAML and OIDC integration",
    "Hierarchical organization",
    "Active Directory integration",
    "User synchronization & provisioning",
    "Enterprise SLA",
];

/// One plan card as offered for a given billing cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDescriptor {
    pub plan_type: PlanType,
    pub title: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],

    /// Present for paid plans only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_tiers: Option<Vec<TokenTier>>,

    /// Present for the free plan only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_tokens: Option<u64>,

    pub is_popular: bool,
    pub is_free: bool,
}

/// All plans for the billing cycle, in display order
pub fn catalog(cycle: BillingCycle) -> Vec<PlanDescriptor> {
    PlanType::ALL.iter().map(|plan| plan.descriptor(cycle)).collect()
}

impl PlanType {
    pub fn descriptor(self, cycle: BillingCycle) -> PlanDescriptor {
        PlanDescriptor {
            plan_type: self,
            title: plan_name(self),
            description: description(self),
            features: features(self),
            token_tiers: self.is_paid().then(|| tiers(self, cycle)),
            monthly_tokens: (!self.is_paid()).then_some(FREE_MONTHLY_TOKENS),
            is_popular: matches!(self, Self::Developer),
            is_free: !self.is_paid(),
        }
    }
}

/// Tiers of a plan priced for the billing cycle; empty for the free plan
pub fn tiers(plan: PlanType, cycle: BillingCycle) -> Vec<TokenTier> {
    monthly_tiers(plan)
        .iter()
        .map(|&(tokens, cents)| TokenTier::new(tokens, apply_discount(Decimal::new(cents, 2), cycle)))
        .collect()
}

/// Look up the tier of `plan` with exactly `tokens` tokens
pub fn find_tier(plan: PlanType, tokens: u64, cycle: BillingCycle) -> Result<TokenTier> {
    tiers(plan, cycle)
        .into_iter()
        .find(|tier| tier.tokens == tokens)
        .ok_or(CoreError::UnknownTier { plan, tokens })
}

/// Annual billing takes 10% off, rounded half away from zero to the cent
pub fn apply_discount(monthly_price: Decimal, cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Monthly => monthly_price,
        BillingCycle::Annual => (monthly_price * dec!(0.9))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    }
}

pub const fn plan_name(plan: PlanType) -> &'static str {
    match plan {
        PlanType::Free => "Freemium SaaS",
        PlanType::Developer => "Developer SaaS",
        PlanType::Enterprise => "Enterprise SaaS",
    }
}

pub const fn features(plan: PlanType) -> &'static [&'static str] {
    match plan {
        PlanType::Free => FREE_FEATURES,
        PlanType::Developer => DEVELOPER_FEATURES,
        PlanType::Enterprise => ENTERPRISE_FEATURES,
    }
}

const fn description(plan: PlanType) -> &'static str {
    match plan {
        PlanType::Free => "Forever free for small projects and testing. Never Billed!",
        PlanType::Developer => "Supporting more applications and higher authentication needs.",
        PlanType::Enterprise => "Solution for organizations with complex requirements.",
    }
}

const fn monthly_tiers(plan: PlanType) -> &'static [(u64, i64)] {
    match plan {
        PlanType::Free => &[],
        PlanType::Developer => DEVELOPER_TIERS,
        PlanType::Enterprise => ENTERPRISE_TIERS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_three_plans() {
        let plans = catalog(BillingCycle::Monthly);
        assert_eq!(plans.len(), 3);
        assert!(plans[0].is_free);
        assert_eq!(plans[0].monthly_tokens, Some(500));
        assert!(plans[0].token_tiers.is_none());
        assert!(plans[1].is_popular);
        assert_eq!(plans[2].features.len(), 6);
    }

    #[test]
    fn test_annual_prices_are_discounted_monthly_prices() {
        let monthly = catalog(BillingCycle::Monthly);
        let annual = catalog(BillingCycle::Annual);

        for (m, a) in monthly.iter().zip(&annual) {
            let (Some(m_tiers), Some(a_tiers)) = (&m.token_tiers, &a.token_tiers) else {
                continue;
            };
            assert_eq!(m_tiers.len(), a_tiers.len());
            for (m_tier, a_tier) in m_tiers.iter().zip(a_tiers) {
                assert_eq!(m_tier.tokens, a_tier.tokens);
                assert_eq!(a_tier.price, (m_tier.price * dec!(0.9)).round_dp(2));
            }
        }
    }

    #[test]
    fn test_known_annual_prices() {
        let dev = tiers(PlanType::Developer, BillingCycle::Annual);
        assert_eq!(dev[0].price, dec!(0.90));
        assert_eq!(dev[1].price, dec!(3.60));
        assert_eq!(dev[2].price, dec!(6.30));

        let ent = tiers(PlanType::Enterprise, BillingCycle::Annual);
        assert_eq!(ent[2].price, dec!(31.50));
    }

    #[test]
    fn test_discount_rounds_half_away_from_zero() {
        // 0.05 * 0.9 = 0.045
        assert_eq!(apply_discount(dec!(0.05), BillingCycle::Annual), dec!(0.05));
        assert_eq!(apply_discount(dec!(0.05), BillingCycle::Monthly), dec!(0.05));
    }

    #[test]
    fn test_find_tier() {
        let tier = find_tier(PlanType::Enterprise, 5_000, BillingCycle::Monthly).unwrap();
        assert_eq!(tier.price, dec!(20));

        assert_eq!(
            find_tier(PlanType::Developer, 2_000, BillingCycle::Monthly).unwrap_err(),
            CoreError::UnknownTier { plan: PlanType::Developer, tokens: 2_000 }
        );
        assert!(find_tier(PlanType::Free, 500, BillingCycle::Monthly).is_err());
    }
}
