//! Route tests: drive the router in-process with fake auth and provider

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Months, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use tokentier_core::{BillingCycle, PlanType, Subscription};
use tokentier_payments::{
    AuthUser, Authenticator, CheckoutProvider, CheckoutSession, MemorySubscriptionStore,
    PaymentError, Result, SessionParams, SubscriptionStore, signature,
};
use tokentier_server::{AppState, Payments, router};

const SECRET: &str = "whsec_route_tests";
const TOKEN: &str = "token_1";

struct FakeAuth;

#[async_trait]
impl Authenticator for FakeAuth {
    async fn authenticate(&self, access_token: &str) -> Result<AuthUser> {
        if access_token == TOKEN {
            Ok(AuthUser {
                id: "user_1".into(),
                email: Some("dev@example.com".into()),
            })
        } else {
            Err(PaymentError::Unauthenticated)
        }
    }
}

#[derive(Default)]
struct FakeProvider {
    fail: bool,
    sessions: Mutex<Vec<SessionParams>>,
}

#[async_trait]
impl CheckoutProvider for FakeProvider {
    async fn create_session(&self, params: &SessionParams) -> Result<CheckoutSession> {
        if self.fail {
            return Err(PaymentError::Stripe("card_declined".into()));
        }
        self.sessions.lock().unwrap().push(params.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".into(),
            checkout_url: "https://checkout.stripe.com/c/pay/cs_test_1".into(),
        })
    }

    async fn subscription_metadata(
        &self,
        _subscription_id: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        Ok(None)
    }
}

struct BrokenStore;

#[async_trait]
impl SubscriptionStore for BrokenStore {
    async fn upsert(&self, _subscription: &Subscription) -> Result<Subscription> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    async fn find_active(&self, _user_id: &str) -> Result<Option<Subscription>> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    async fn grant_tokens(&self, _user_id: &str, _tokens: u64, _now: DateTime<Utc>) -> Result<bool> {
        Err(PaymentError::Storage("connection refused".into()))
    }
}

struct Harness {
    app: Router,
    store: Arc<MemorySubscriptionStore>,
    provider: Arc<FakeProvider>,
}

fn harness_with(provider: FakeProvider) -> Harness {
    let store = Arc::new(MemorySubscriptionStore::new());
    let provider = Arc::new(provider);
    let app = router(AppState {
        auth: Some(Arc::new(FakeAuth)),
        store: store.clone(),
        payments: Some(Payments {
            provider: provider.clone(),
            webhook_secret: SECRET.into(),
        }),
        default_origin: "http://localhost:5173".into(),
    });
    Harness {
        app,
        store,
        provider,
    }
}

fn harness() -> Harness {
    harness_with(FakeProvider::default())
}

fn unconfigured() -> Router {
    router(AppState {
        auth: None,
        store: Arc::new(MemorySubscriptionStore::new()),
        payments: None,
        default_origin: "http://localhost:5173".into(),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn checkout(body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/checkout")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://app.example.com");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn webhook(event: &Value, signature_header: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhook/stripe");
    if let Some(sig) = signature_header {
        builder = builder.header("stripe-signature", sig);
    }
    builder.body(Body::from(event.to_string())).unwrap()
}

fn signed_webhook(event: &Value) -> Request<Body> {
    let sig = signature::sign(event.to_string().as_bytes(), SECRET, Utc::now().timestamp()).unwrap();
    webhook(event, Some(sig))
}

fn completed_event(billing_cycle: &str) -> Value {
    let price = if billing_cycle == "annual" { 31.5 } else { 35.0 };
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "object": "checkout.session",
            "metadata": {
                "user_id": "user_1",
                "plan_type": "enterprise",
                "token_tier": json!({ "tokens": 10000, "price": price }).to_string(),
                "billing_cycle": billing_cycle
            }
        }}
    })
}

#[tokio::test]
async fn health_reports_configuration() {
    let (status, body) = send(&harness().app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["stripe_configured"], true);
    assert_eq!(body["supabase_configured"], true);

    let (_, body) = send(&unconfigured(), get("/health", None)).await;
    assert_eq!(body["stripe_configured"], false);
    assert_eq!(body["supabase_configured"], false);
}

#[tokio::test]
async fn plans_are_priced_per_cycle() {
    let app = harness().app;

    let (status, monthly) = send(&app, get("/api/plans", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(monthly.as_array().unwrap().len(), 3);
    assert_eq!(monthly[1]["tokenTiers"][0]["price"], json!(1.0));

    let (_, annual) = send(&app, get("/api/plans?billing_cycle=annual", None)).await;
    assert_eq!(annual[1]["tokenTiers"][0]["price"], json!(0.9));
    assert_eq!(annual[2]["tokenTiers"][2]["price"], json!(31.5));

    let (status, _) = send(&app, get("/api/plans?billing_cycle=weekly", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscription_is_created_on_first_load() {
    let h = harness();

    let (status, body) = send(&h.app, get("/api/subscription", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "user_1");
    assert_eq!(body["plan_type"], "free");
    assert_eq!(body["remaining_tokens"], 500);
    assert_eq!(body["token_tier"], Value::Null);

    let stored = h.store.get("user_1").await.unwrap();
    assert_eq!(body["id"], json!(stored.id));

    let (_, again) = send(&h.app, get("/api/subscription", Some(TOKEN))).await;
    assert_eq!(again["id"], body["id"]);
}

#[tokio::test]
async fn subscription_requires_auth() {
    let app = harness().app;
    let (status, body) = send(&app, get("/api/subscription", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = send(&app, get("/api/subscription", Some("expired"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&unconfigured(), get("/api/subscription", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn checkout_creates_session_from_catalog_price() {
    let h = harness();
    let body = json!({
        "planType": "developer",
        "tokenTier": { "tokens": 5000, "price": 0.01 },
        "billingCycle": "annual"
    });

    let (status, reply) = send(&h.app, checkout(&body, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["url"], "https://checkout.stripe.com/c/pay/cs_test_1");

    let sessions = h.provider.sessions.lock().unwrap();
    let params = &sessions[0];
    assert_eq!(params.unit_amount, 360);
    assert_eq!(params.interval, BillingCycle::Annual);
    assert_eq!(params.product_name, "Developer SaaS - 5,000 tokens");
    assert_eq!(params.description, "Annual subscription");
    assert_eq!(params.customer_email.as_deref(), Some("dev@example.com"));
    assert_eq!(
        params.success_url,
        "https://app.example.com/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(params.cancel_url, "https://app.example.com/");
    assert_eq!(params.metadata["user_id"], "user_1");
    assert_eq!(params.metadata["billing_cycle"], "annual");
}

#[tokio::test]
async fn checkout_rejects_bad_requests() {
    let h = harness();
    let full = json!({
        "planType": "developer",
        "tokenTier": { "tokens": 5000, "price": 4 },
        "billingCycle": "monthly"
    });

    let (status, _) = send(&h.app, checkout(&full, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let missing = json!({ "planType": "developer", "billingCycle": "monthly" });
    let (status, body) = send(&h.app, checkout(&missing, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_PARAMETER");

    let free = json!({
        "planType": "free",
        "tokenTier": { "tokens": 500, "price": 0 },
        "billingCycle": "monthly"
    });
    let (status, _) = send(&h.app, checkout(&free, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({
        "planType": "developer",
        "tokenTier": { "tokens": 7000, "price": 5 },
        "billingCycle": "monthly"
    });
    let (status, body) = send(&h.app, checkout(&unknown, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");

    assert!(h.provider.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_provider_failure_is_bad_gateway() {
    let h = harness_with(FakeProvider {
        fail: true,
        ..Default::default()
    });
    let body = json!({
        "planType": "enterprise",
        "tokenTier": { "tokens": 1000, "price": 5 },
        "billingCycle": "monthly"
    });

    let (status, reply) = send(&h.app, checkout(&body, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(reply["code"], "CHECKOUT_ERROR");
}

#[tokio::test]
async fn checkout_without_stripe_is_unavailable() {
    let body = json!({});
    let (status, reply) = send(&unconfigured(), checkout(&body, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply["code"], "PAYMENTS_DISABLED");
}

#[tokio::test]
async fn webhook_activates_subscription() {
    let h = harness();
    let before = Utc::now();

    let (status, body) = send(&h.app, signed_webhook(&completed_event("annual"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let sub = h.store.get("user_1").await.unwrap();
    assert_eq!(sub.plan_type, PlanType::Enterprise);
    assert_eq!(sub.billing_cycle, BillingCycle::Annual);
    assert_eq!(sub.remaining_tokens, 10_000);
    assert_eq!(sub.total_tokens_purchased, 10_000);

    let next = sub.next_billing_date.unwrap();
    assert!(next >= before.checked_add_months(Months::new(12)).unwrap());
    assert!(next <= Utc::now().checked_add_months(Months::new(12)).unwrap());
}

#[tokio::test]
async fn webhook_rejects_unsigned_and_tampered() {
    let h = harness();
    let event = completed_event("monthly");

    let (status, body) = send(&h.app, webhook(&event, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_SIGNATURE");

    let sig = signature::sign(b"{}", SECRET, Utc::now().timestamp()).unwrap();
    let (status, body) = send(&h.app, webhook(&event, Some(sig))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let stale = signature::sign(
        event.to_string().as_bytes(),
        SECRET,
        Utc::now().timestamp() - 600,
    )
    .unwrap();
    let (status, _) = send(&h.app, webhook(&event, Some(stale))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.store.get("user_1").await.is_none());
}

#[tokio::test]
async fn webhook_rejects_bad_metadata() {
    let h = harness();
    let event = json!({
        "id": "evt_2",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_test_2", "metadata": { "plan_type": "developer" } } }
    });

    let (status, body) = send(&h.app, signed_webhook(&event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_EVENT");
}

#[tokio::test]
async fn webhook_acknowledges_other_events() {
    let h = harness();
    let event = json!({
        "id": "evt_3",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    });

    let (status, body) = send(&h.app, signed_webhook(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn webhook_storage_failure_is_server_error() {
    let app = router(AppState {
        auth: Some(Arc::new(FakeAuth)),
        store: Arc::new(BrokenStore),
        payments: Some(Payments {
            provider: Arc::new(FakeProvider::default()),
            webhook_secret: SECRET.into(),
        }),
        default_origin: "http://localhost:5173".into(),
    });

    let (status, _) = send(&app, signed_webhook(&completed_event("monthly"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
