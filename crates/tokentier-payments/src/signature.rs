//! Stripe Webhook Signatures
//!
//! `Stripe-Signature: t=<unix seconds>,v1=<hex hmac>[,v1=...]` where the HMAC
//! is SHA-256 over `"<t>.<raw body>"` keyed with the endpoint secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

/// Maximum age of a signed event, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify the signature header against the raw payload at time `now`.
///
/// Any one matching `v1` signature is accepted. The comparison is constant
/// time via `Mac::verify_slice`.
pub fn verify(payload: &[u8], header: &str, secret: &str, now: DateTime<Utc>) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::WebhookSignature("invalid timestamp".into()))?;
    let within_tolerance = now
        .timestamp()
        .checked_sub(ts)
        .is_some_and(|age| age.unsigned_abs() <= DEFAULT_TOLERANCE_SECS.unsigned_abs());
    if !within_tolerance {
        return Err(PaymentError::WebhookSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::WebhookSignature("signature mismatch".into()))
    }
}

/// Build a signature header the way Stripe does
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
