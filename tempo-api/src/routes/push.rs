/// Browser push-subscription endpoints
///
/// Pass-through store operations only: the subscription object the browser
/// push API produced is persisted or removed, nothing more. Actual push
/// delivery happens client-side via the service worker.
///
/// # Endpoints
///
/// - `POST   /api/push-subscriptions` - Store a subscription (201)
/// - `DELETE /api/push-subscriptions` - Remove a subscription by endpoint

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tempo_shared::models::push_subscription::{CreatePushSubscription, PushSubscription};

/// Delete request carrying the subscription endpoint
#[derive(Debug, Deserialize)]
pub struct DeleteSubscriptionRequest {
    pub endpoint: String,
}

/// Stores a push subscription
///
/// Re-subscribing with a known endpoint refreshes the stored keys.
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(data): Json<CreatePushSubscription>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if data.endpoint.is_empty() {
        return Err(ApiError::BadRequest(
            "Subscription endpoint is required".to_string(),
        ));
    }

    let subscription = PushSubscription::upsert(&state.db, data).await?;

    tracing::info!(subscription_id = %subscription.id, "Push subscription stored");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Subscription added successfully" })),
    ))
}

/// Removes a push subscription by endpoint
pub async fn delete_subscription(
    State(state): State<AppState>,
    Json(req): Json<DeleteSubscriptionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = PushSubscription::delete_by_endpoint(&state.db, &req.endpoint).await?;
    if !removed {
        return Err(ApiError::NotFound("Subscription not found".to_string()));
    }

    Ok(Json(
        serde_json::json!({ "message": "Subscription removed" }),
    ))
}
