//! Error Types for the subscription model

use thiserror::Error;

use crate::subscription::PlanType;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Plan {0} requires a token tier")]
    TierRequired(PlanType),

    #[error("Plan {0} does not take a token tier")]
    TierNotAllowed(PlanType),

    #[error("Unknown token tier: {tokens} tokens on plan {plan}")]
    UnknownTier { plan: PlanType, tokens: u64 },

    #[error("Tier index {index} out of range for plan {plan}")]
    TierIndexOutOfRange { plan: PlanType, index: usize },

    #[error("Subscription invariant violated: {0}")]
    Invariant(String),

    #[error("Billing date out of range")]
    DateOutOfRange,

    #[error("Invalid value: {0}")]
    Parse(String),
}
