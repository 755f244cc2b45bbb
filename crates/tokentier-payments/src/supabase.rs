//! Supabase Integration
//!
//! Access-token verification through Supabase Auth and the
//! `user_subscriptions` table through PostgREST.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use tokentier_core::{BillingCycle, PlanType, Subscription, TokenTier};

use crate::auth::{AuthUser, Authenticator};
use crate::error::{PaymentError, Result};
use crate::store::SubscriptionStore;

const SUBSCRIPTIONS_TABLE: &str = "user_subscriptions";

/// Supabase project settings
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public key, sent alongside user access tokens
    pub anon_key: String,

    /// Privileged key used for server-side writes
    pub service_role_key: String,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str, service_role_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
        };

        Ok(Self::new(
            &var("SUPABASE_URL")?,
            &var("SUPABASE_ANON_KEY")?,
            &var("SUPABASE_SERVICE_ROLE_KEY")?,
        ))
    }
}

/// Verifies user access tokens against `GET /auth/v1/user`
pub struct SupabaseAuth {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    async fn authenticate(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.url))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_client_error() {
            tracing::debug!(status = %response.status(), "Access token rejected");
            return Err(PaymentError::Unauthenticated);
        }

        Ok(response.error_for_status()?.json().await?)
    }
}

/// Subscription rows in Supabase, written with the service-role key
pub struct SupabaseSubscriptionStore {
    http: reqwest::Client,
    config: SupabaseConfig,
}

/// Columns sent on upsert; `id` and `created_at` stay database-owned
#[derive(Serialize)]
struct UpsertRow<'a> {
    user_id: &'a str,
    plan_type: PlanType,
    plan_name: &'a str,
    token_tier: Option<TokenTier>,
    billing_cycle: BillingCycle,
    is_active: bool,
    remaining_tokens: u64,
    total_tokens_purchased: u64,
    features: &'a [String],
    next_billing_date: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Subscription> for UpsertRow<'a> {
    fn from(sub: &'a Subscription) -> Self {
        Self {
            user_id: &sub.user_id,
            plan_type: sub.plan_type,
            plan_name: &sub.plan_name,
            token_tier: sub.token_tier,
            billing_cycle: sub.billing_cycle,
            is_active: sub.is_active,
            remaining_tokens: sub.remaining_tokens,
            total_tokens_purchased: sub.total_tokens_purchased,
            features: &sub.features,
            next_billing_date: sub.next_billing_date,
            updated_at: sub.updated_at,
        }
    }
}

#[derive(Serialize)]
struct TokenGrant {
    remaining_tokens: u64,
    total_tokens_purchased: u64,
    updated_at: DateTime<Utc>,
}

impl SupabaseSubscriptionStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(
                method,
                format!("{}/rest/v1/{SUBSCRIPTIONS_TABLE}", self.config.url),
            )
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    async fn rows(response: Response) -> Result<Vec<Subscription>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Storage(format!("{status}: {body}")))
    }
}

#[async_trait]
impl SubscriptionStore for SupabaseSubscriptionStore {
    async fn upsert(&self, subscription: &Subscription) -> Result<Subscription> {
        let response = self
            .request(Method::POST)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&UpsertRow::from(subscription))
            .send()
            .await?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PaymentError::Storage("upsert returned no row".into()))
    }

    async fn find_active(&self, user_id: &str) -> Result<Option<Subscription>> {
        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("is_active", "eq.true".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn grant_tokens(&self, user_id: &str, tokens: u64, now: DateTime<Utc>) -> Result<bool> {
        let response = self
            .request(Method::PATCH)
            .query(&[("user_id", format!("eq.{user_id}"))])
            .header("Prefer", "return=representation")
            .json(&TokenGrant {
                remaining_tokens: tokens,
                total_tokens_purchased: tokens,
                updated_at: now,
            })
            .send()
            .await?;

        Ok(!Self::rows(response).await?.is_empty())
    }
}
