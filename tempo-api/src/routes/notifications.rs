/// Notification endpoints: SSE stream and persisted records
///
/// # Stream
///
/// `GET /api/notifications/stream` opens a long-lived server-sent-events
/// connection. On open the client immediately receives a connected-handshake
/// event, then every subsequent broadcast event verbatim as JSON
/// (`data: <json>\n\n` framing). There is no backlog: events broadcast
/// before the connection opened are never replayed.
///
/// # Records
///
/// The persisted notification records are an independent CRUD subsystem; a
/// record created through the API is additionally announced to connected
/// viewers, but the scheduler never writes records.
///
/// # Example
///
/// ```bash
/// curl -N "http://localhost:5000/api/notifications/stream"
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tempo_shared::events::NotificationEvent;
use tempo_shared::models::notification::{
    CreateNotification, Notification, UpdateNotification,
};
use uuid::Uuid;

/// Opens the notification event stream
///
/// Registers a viewer with the broadcast channel and returns an SSE response.
/// Dropping the connection deregisters the viewer.
pub async fn stream_notifications(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer = state.broadcaster.register();

    tracing::info!(viewer_id = %viewer.id(), "Notification stream opened");

    let handshake = stream::once(async { encode_event(&NotificationEvent::connected()) });
    let live = viewer.map(|event| encode_event(&event));

    Sse::new(handshake.chain(live))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(25)))
}

/// Encodes a notification event as an SSE data frame
///
/// Encoding is best-effort: a failure is logged and replaced with a comment
/// frame so the stream itself never errors.
fn encode_event(event: &NotificationEvent) -> Result<Event, Infallible> {
    Ok(Event::default().json_data(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode notification event");
        Event::default().comment("encode error")
    }))
}

/// Creates a notification record and announces it to connected viewers
pub async fn create_notification(
    State(state): State<AppState>,
    Json(data): Json<CreateNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let notification = Notification::create(&state.db, data).await?;

    state
        .broadcaster
        .broadcast(&NotificationEvent::announcement(&notification.message));

    Ok((StatusCode::CREATED, Json(notification)))
}

/// Lists all notification records, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = Notification::list_all(&state.db).await?;
    Ok(Json(notifications))
}

/// Returns a single notification record
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

/// Updates a notification record (e.g. mark as read)
pub async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateNotification>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::update(&state.db, id, data)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

/// Deletes a notification record
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = Notification::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Notification deleted" })))
}
