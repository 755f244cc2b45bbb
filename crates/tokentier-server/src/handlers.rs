//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tokentier_core::{
    BillingCycle, CheckoutPayload, CheckoutResponse, ErrorResponse, PlanDescriptor, Subscription,
    catalog,
};
use tokentier_payments::{
    AuthUser, CheckoutRequest, PaymentError, WebhookHandler, bearer_token,
    create_checkout_session, load_or_create,
};

use crate::state::{AppState, Payments};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Map a payment error to its response. Internal detail is logged, not sent.
fn payment_error(err: &PaymentError) -> ApiError {
    let (status, code) = match err {
        PaymentError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        PaymentError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "MISSING_PARAMETER"),
        PaymentError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_EVENT"),
        PaymentError::Stripe(_) => (StatusCode::BAD_GATEWAY, "CHECKOUT_ERROR"),
        PaymentError::Storage(_) | PaymentError::Http(_) | PaymentError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    if status.is_server_error() {
        tracing::error!(error = %err, retryable = err.is_retryable(), "Request failed");
    } else {
        tracing::warn!(error = %err, "Request rejected");
    }

    let message = match err {
        PaymentError::WebhookSignature(_) => "Invalid signature".into(),
        PaymentError::WebhookParse(_) => "Invalid event".into(),
        other => other.user_message(),
    };
    reject(status, code, message)
}

fn payments(state: &AppState) -> Result<&Payments, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let auth = state.auth.as_ref().ok_or_else(|| {
        reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "AUTH_DISABLED",
            "Authentication not configured",
        )
    })?;

    let token = bearer_token(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .map_err(|e| payment_error(&e))?;

    auth.authenticate(token).await.map_err(|e| payment_error(&e))
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub supabase_configured: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments.is_some(),
        supabase_configured: state.auth.is_some(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PlansQuery {
    #[serde(default)]
    pub billing_cycle: BillingCycle,
}

/// Plan catalog priced for the requested billing cycle
pub async fn list_plans(Query(query): Query<PlansQuery>) -> Json<Vec<PlanDescriptor>> {
    Json(catalog(query.billing_cycle))
}

/// The caller's active subscription, created on first load
pub async fn get_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Subscription>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    load_or_create(state.store.as_ref(), &user.id, Utc::now())
        .await
        .map(Json)
        .map_err(|e| payment_error(&e))
}

/// Create a Stripe checkout session for the selected tier
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let payments = payments(&state)?;
    let user = authenticate(&state, &headers).await?;

    let payload: CheckoutPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Unreadable checkout body");
        reject(StatusCode::BAD_REQUEST, "INVALID_PARAMETER", "Invalid request body")
    })?;

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| state.default_origin.clone(), str::to_string);

    let request = CheckoutRequest {
        user,
        payload,
        origin,
    };

    let session = create_checkout_session(payments.provider.as_ref(), &request)
        .await
        .map_err(|e| payment_error(&e))?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
    }))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let payments = payments(&state)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            reject(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing Stripe signature",
            )
        })?;

    let event = WebhookHandler::parse_event(&body, signature, &payments.webhook_secret)
        .map_err(|e| payment_error(&e))?;

    let handler = WebhookHandler::new(state.store.clone(), payments.provider.clone());
    handler.handle(event).await.map_err(|e| payment_error(&e))?;

    Ok(Json(WebhookAck { received: true }))
}
