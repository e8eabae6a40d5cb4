/// Billing provider webhook
///
/// `POST /webhook` receives signed events from the billing provider. The
/// body must be verified against the `Stripe-Signature` header before any
/// JSON parsing: the signature scheme is HMAC-SHA256 over `"{t}.{raw_body}"`
/// with the webhook secret, where `t` is the timestamp from the header.
///
/// # Handled events
///
/// - `checkout.session.completed`: mints a single-use registration code,
///   upserts the customer's user row with active subscription fields, and
///   responds with the frontend redirect URL carrying the code.
/// - `customer.subscription.created` / `customer.subscription.updated`:
///   updates the user's subscription id and status.
/// - Everything else is acknowledged and logged.
///
/// All events are acknowledged with 200 unless the signature fails (400).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;
use tempo_shared::models::user::{SubscriptionStatus, User};

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age of a signed payload, in seconds
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Billing event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,

    pub data: WebhookData,
}

/// Billing event payload wrapper
#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

/// Verifies a `Stripe-Signature` style header against the raw payload
///
/// The header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`. The payload is
/// accepted if any `v1` entry is a valid HMAC-SHA256 of `"{t}.{payload}"`
/// and the timestamp is within [`SIGNATURE_TOLERANCE_SECS`] of `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => {
                candidates.push(hex::decode(value).map_err(|_| SignatureError::Malformed)?);
            }
            // Unknown schemes (v0 etc.) are ignored
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in candidates {
        // verify_slice is constant-time
        if mac.clone().verify_slice(&candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Mints a single-use registration code (32 hex characters)
pub fn generate_registration_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Billing webhook handler
///
/// # Errors
///
/// - `400 Bad Request`: missing or invalid signature, unparseable payload
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature header".to_string()))?;

    verify_signature(
        &body,
        signature,
        &state.config.billing.webhook_secret,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        ApiError::BadRequest(format!("Webhook Error: {}", e))
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Webhook Error: {}", e)))?;

    tracing::info!(event_type = %event.kind, "Billing event received");

    match event.kind.as_str() {
        "checkout.session.completed" => {
            handle_checkout_completed(&state, &event.data.object).await
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_change(&state, &event.data.object).await?;
            Ok(Json(serde_json::json!({ "received": true })))
        }
        "payment_intent.succeeded" | "customer.created" | "customer.updated" => {
            tracing::debug!(event_type = %event.kind, "Billing event acknowledged");
            Ok(Json(serde_json::json!({ "received": true })))
        }
        other => {
            tracing::debug!(event_type = %other, "Unhandled billing event type");
            Ok(Json(serde_json::json!({ "received": true })))
        }
    }
}

/// Completed checkout: mint a registration code and activate the subscription
async fn handle_checkout_completed(
    state: &AppState,
    session: &serde_json::Value,
) -> ApiResult<Json<serde_json::Value>> {
    let email = session
        .pointer("/customer_details/email")
        .or_else(|| session.get("customer_email"))
        .and_then(|v| v.as_str());

    let Some(email) = email else {
        tracing::warn!("Checkout session without a customer email, skipping");
        return Ok(Json(serde_json::json!({ "received": true })));
    };

    let subscription_id = session.get("subscription").and_then(|v| v.as_str());
    let code = generate_registration_code();

    let user = User::upsert_subscription(
        &state.db,
        email,
        subscription_id,
        SubscriptionStatus::Active,
        Some(&code),
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %email, "Checkout completed, registration code minted");

    let redirect_url = format!(
        "{}/register?code={}",
        state.config.api.frontend_url, code
    );

    Ok(Json(serde_json::json!({ "redirectUrl": redirect_url })))
}

/// Subscription lifecycle change: update id and status for the customer
async fn handle_subscription_change(
    state: &AppState,
    subscription: &serde_json::Value,
) -> ApiResult<()> {
    let Some(email) = subscription.get("customer_email").and_then(|v| v.as_str()) else {
        tracing::warn!("Subscription event without a customer email, skipping");
        return Ok(());
    };

    let subscription_id = subscription.get("id").and_then(|v| v.as_str());
    let status = subscription
        .get("status")
        .and_then(|v| v.as_str())
        .map(SubscriptionStatus::parse)
        .unwrap_or(SubscriptionStatus::Inactive);

    let user =
        User::upsert_subscription(&state.db, email, subscription_id, status, None).await?;

    tracing::info!(
        user_id = %user.id,
        email = %email,
        status = status.as_str(),
        "Subscription updated"
    );

    Ok(())
}
