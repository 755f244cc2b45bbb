//! Stripe Checkout Integration
//!
//! Hosted checkout: the server creates a session for the selected tier and
//! hands the browser its URL. The charge is computed from the server-side
//! catalog; the price the client sends is not trusted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    CreateCheckoutSessionSubscriptionData, Currency, ListCheckoutSessions, SubscriptionId,
};
use tokentier_core::catalog;
use tokentier_core::{BillingCycle, CheckoutPayload, CoreError, PlanType, TokenTier};

use crate::auth::AuthUser;
use crate::error::{PaymentError, Result};

/// Everything needed to open a hosted subscription checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub customer_email: Option<String>,
    pub product_name: String,
    pub description: String,

    /// Charge per billing period, in euro cents
    pub unit_amount: i64,
    pub interval: BillingCycle,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,
}

/// The payment provider as seen by checkout and webhook processing
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, params: &SessionParams) -> Result<CheckoutSession>;

    /// Metadata of the checkout session that started `subscription_id`
    async fn subscription_metadata(
        &self,
        subscription_id: &str,
    ) -> Result<Option<HashMap<String, String>>>;
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_session(&self, params: &SessionParams) -> Result<CheckoutSession> {
        let mut create = CreateCheckoutSession::new();
        create.customer_email = params.customer_email.as_deref();
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.mode = Some(CheckoutSessionMode::Subscription);
        create.metadata = Some(params.metadata.clone());

        // Carried on the subscription so renewal invoices can be attributed
        create.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(params.metadata.clone()),
            ..Default::default()
        });

        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::EUR,
                unit_amount: Some(params.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: params.product_name.clone(),
                    description: Some(params.description.clone()),
                    ..Default::default()
                }),
                recurring: Some(CreateCheckoutSessionLineItemsPriceDataRecurring {
                    interval: match params.interval {
                        BillingCycle::Monthly => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
                        BillingCycle::Annual => CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
                    },
                    interval_count: Some(1),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, create)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn subscription_metadata(
        &self,
        subscription_id: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        let subscription_id: SubscriptionId = subscription_id
            .parse()
            .map_err(|_| PaymentError::WebhookParse(format!("bad subscription id {subscription_id}")))?;

        let mut params = ListCheckoutSessions::new();
        params.subscription = Some(subscription_id);
        params.limit = Some(1);

        let sessions = StripeCheckoutSession::list(&self.client, &params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(sessions.data.into_iter().next().and_then(|session| session.metadata))
    }
}

/// Metadata attached to a checkout session and its subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: String,
    pub plan_type: PlanType,
    pub token_tier: TokenTier,
    pub billing_cycle: BillingCycle,
}

impl CheckoutMetadata {
    pub fn to_map(&self) -> Result<HashMap<String, String>> {
        let token_tier = serde_json::to_string(&self.token_tier)
            .map_err(|e| PaymentError::InvalidParameter(e.to_string()))?;

        Ok(HashMap::from([
            ("user_id".to_string(), self.user_id.clone()),
            ("plan_type".to_string(), self.plan_type.to_string()),
            ("token_tier".to_string(), token_tier),
            ("billing_cycle".to_string(), self.billing_cycle.to_string()),
        ]))
    }

    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let field = |name: &str| {
            map.get(name)
                .ok_or_else(|| PaymentError::WebhookParse(format!("metadata missing {name}")))
        };
        let invalid = |name: &str, e: String| {
            PaymentError::WebhookParse(format!("metadata {name} invalid: {e}"))
        };

        Ok(Self {
            user_id: field("user_id")?.clone(),
            plan_type: field("plan_type")?
                .parse()
                .map_err(|e: CoreError| invalid("plan_type", e.to_string()))?,
            token_tier: serde_json::from_str(field("token_tier")?)
                .map_err(|e| invalid("token_tier", e.to_string()))?,
            billing_cycle: field("billing_cycle")?
                .parse()
                .map_err(|e: CoreError| invalid("billing_cycle", e.to_string()))?,
        })
    }
}

/// A checkout request from an authenticated user
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub user: AuthUser,
    pub payload: CheckoutPayload,

    /// Base URL the browser returns to
    pub origin: String,
}

impl CheckoutRequest {
    /// Validate the payload and price the session from the catalog
    pub fn session_params(&self) -> Result<SessionParams> {
        let (plan, requested, cycle) = self.payload.require()?;
        if !plan.is_paid() {
            return Err(PaymentError::InvalidParameter(
                "the free plan has no checkout".into(),
            ));
        }

        let tier = catalog::find_tier(plan, requested.tokens, cycle)?;
        if tier.price != requested.price {
            tracing::debug!(
                requested = %requested.price,
                catalog = %tier.price,
                "Client tier price differs from catalog"
            );
        }

        let metadata = CheckoutMetadata {
            user_id: self.user.id.clone(),
            plan_type: plan,
            token_tier: tier,
            billing_cycle: cycle,
        };

        let origin = self.origin.trim_end_matches('/');
        Ok(SessionParams {
            customer_email: self.user.email.clone(),
            product_name: format!(
                "{} - {} tokens",
                catalog::plan_name(plan),
                group_thousands(tier.tokens)
            ),
            description: match cycle {
                BillingCycle::Monthly => "Monthly subscription",
                BillingCycle::Annual => "Annual subscription",
            }
            .to_string(),
            unit_amount: tier.unit_amount_cents()?,
            interval: cycle,
            success_url: format!("{origin}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{origin}/"),
            metadata: metadata.to_map()?,
        })
    }
}

/// Create a hosted checkout session for the request
pub async fn create_checkout_session(
    provider: &dyn CheckoutProvider,
    request: &CheckoutRequest,
) -> Result<CheckoutSession> {
    let params = request.session_params()?;

    tracing::info!(
        user_id = %request.user.id,
        product = %params.product_name,
        unit_amount = params.unit_amount,
        interval = %params.interval,
        "Creating checkout session"
    );

    let session = provider.create_session(&params).await?;
    tracing::info!(session_id = %session.id, "Checkout session created");

    Ok(session)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
