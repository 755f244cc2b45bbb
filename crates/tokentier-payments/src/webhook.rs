//! Stripe Webhook Handling
//!
//! Verifies inbound events and applies them to the subscription store.
//! There is no event-id deduplication: every write is an upsert or a token
//! reset keyed by user, so a replayed event re-applies the same values.
//!
//! Event objects are read as untyped JSON so both the older
//! `invoice.subscription` shape and the newer `parent.subscription_details`
//! shape of Stripe API versions are accepted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokentier_core::Subscription;

use crate::checkout::{CheckoutMetadata, CheckoutProvider};
use crate::error::{PaymentError, Result};
use crate::signature;
use crate::store::SubscriptionStore;

/// Raw Stripe event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed - replace the user's subscription
    CheckoutCompleted {
        session_id: String,
        metadata: CheckoutMetadata,
    },

    /// Recurring charge succeeded - re-grant the tier's tokens
    PaymentSucceeded {
        invoice_id: String,
        subscription_id: Option<String>,

        /// Subscription metadata when the invoice carries it inline
        metadata: Option<HashMap<String, String>>,
    },

    /// Payment failed - logged only
    PaymentFailed {
        invoice_id: String,
        subscription_id: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler {
    store: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn CheckoutProvider>,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, provider: Arc<dyn CheckoutProvider>) -> Self {
        Self { store, provider }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(payload: &[u8], signature: &str, secret: &str) -> Result<StripeEvent> {
        Self::parse_event_at(payload, signature, secret, Utc::now())
    }

    pub fn parse_event_at(
        payload: &[u8],
        signature: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<StripeEvent> {
        signature::verify(payload, signature, secret, now)?;
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Process a webhook event
    pub async fn handle(&self, event: StripeEvent) -> Result<WebhookEvent> {
        self.handle_at(event, Utc::now()).await
    }

    /// Process a webhook event as of `now`
    pub async fn handle_at(&self, event: StripeEvent, now: DateTime<Utc>) -> Result<WebhookEvent> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        let parsed = parse_webhook_event(&event)?;

        match &parsed {
            WebhookEvent::CheckoutCompleted { session_id, metadata } => {
                let mut subscription = Subscription::default_for(&metadata.user_id, now);
                subscription
                    .apply_plan(
                        metadata.plan_type,
                        Some(metadata.token_tier),
                        metadata.billing_cycle,
                        now,
                    )
                    .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

                let stored = self.store.upsert(&subscription).await?;

                tracing::info!(
                    session_id = %session_id,
                    user_id = %stored.user_id,
                    plan = %stored.plan_type,
                    tokens = stored.total_tokens_purchased,
                    next_billing_date = ?stored.next_billing_date,
                    "Subscription activated"
                );
            }

            WebhookEvent::PaymentSucceeded {
                invoice_id,
                subscription_id,
                metadata,
            } => {
                let metadata = match (metadata, subscription_id) {
                    (Some(inline), _) => Some(inline.clone()),
                    (None, Some(sub_id)) => self.provider.subscription_metadata(sub_id).await?,
                    (None, None) => None,
                };

                if let Some(metadata) = metadata {
                    self.regrant(invoice_id, &CheckoutMetadata::from_map(&metadata)?, now)
                        .await?;
                } else {
                    tracing::info!(invoice_id = %invoice_id, "Invoice has no checkout metadata, skipping");
                }
            }

            WebhookEvent::PaymentFailed {
                invoice_id,
                subscription_id,
            } => {
                tracing::warn!(
                    invoice_id = %invoice_id,
                    subscription_id = ?subscription_id,
                    "Payment failed"
                );
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(parsed)
    }

    /// Reset the balance to the full tier; unused tokens do not roll over
    async fn regrant(
        &self,
        invoice_id: &str,
        metadata: &CheckoutMetadata,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tokens = metadata.token_tier.tokens;

        if self.store.grant_tokens(&metadata.user_id, tokens, now).await? {
            tracing::info!(
                invoice_id = %invoice_id,
                user_id = %metadata.user_id,
                tokens,
                "Tokens re-granted"
            );
        } else {
            tracing::warn!(
                invoice_id = %invoice_id,
                user_id = %metadata.user_id,
                "No subscription row for recurring payment"
            );
        }

        Ok(())
    }
}

/// Parse Stripe event into our event type
fn parse_webhook_event(event: &StripeEvent) -> Result<WebhookEvent> {
    let object = &event.data.object;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let metadata = string_map(object.get("metadata")).ok_or_else(|| {
                PaymentError::WebhookParse("checkout session has no metadata".into())
            })?;

            Ok(WebhookEvent::CheckoutCompleted {
                session_id: object_id(object)?,
                metadata: CheckoutMetadata::from_map(&metadata)?,
            })
        }

        "invoice.payment_succeeded" => Ok(WebhookEvent::PaymentSucceeded {
            invoice_id: object_id(object)?,
            subscription_id: invoice_subscription(object),
            metadata: ["/subscription_details/metadata", "/parent/subscription_details/metadata"]
                .into_iter()
                .find_map(|pointer| {
                    string_map(object.pointer(pointer)).filter(|m| m.contains_key("user_id"))
                }),
        }),

        "invoice.payment_failed" => Ok(WebhookEvent::PaymentFailed {
            invoice_id: object_id(object)?,
            subscription_id: invoice_subscription(object),
        }),

        other => Ok(WebhookEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

fn object_id(object: &Value) -> Result<String> {
    object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PaymentError::WebhookParse("event object has no id".into()))
}

/// Older API versions put the subscription on the invoice, newer ones under `parent`
fn invoice_subscription(object: &Value) -> Option<String> {
    object
        .get("subscription")
        .and_then(Value::as_str)
        .or_else(|| {
            object
                .pointer("/parent/subscription_details/subscription")
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

fn string_map(value: Option<&Value>) -> Option<HashMap<String, String>> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}
