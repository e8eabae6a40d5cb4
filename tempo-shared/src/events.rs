/// Notification events broadcast to connected clients
///
/// These are the transient messages fanned out over the SSE stream. They are
/// never persisted; a viewer that connects after an event was broadcast will
/// not see it.
///
/// # Wire format
///
/// Events are serialized as JSON and written in SSE framing
/// (`data: <json>\n\n`):
///
/// ```json
/// {"type":"TASK_NOTIFICATION","task":{"id":7,"title":"Pay rent","start":"2026-08-06T12:00:00Z"}}
/// ```

use crate::models::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind tag carried by every broadcast event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A task reminder fired
    #[serde(rename = "TASK_NOTIFICATION")]
    TaskNotification,

    /// Handshake sent once when a viewer connects
    #[serde(rename = "CONNECTED")]
    Connected,
}

/// Minimal task projection embedded in reminder events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: i64,
    pub title: String,

    #[serde(rename = "start")]
    pub start_at: DateTime<Utc>,
}

impl From<&Task> for TaskRef {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            start_at: task.start_at,
        }
    }
}

/// A notification event fanned out to every connected viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NotificationEvent {
    /// Builds the reminder event for a task
    pub fn for_task(task: &Task) -> Self {
        Self {
            kind: NotificationKind::TaskNotification,
            task: Some(TaskRef::from(task)),
            message: None,
        }
    }

    /// Builds the handshake event emitted when a viewer connects
    pub fn connected() -> Self {
        Self {
            kind: NotificationKind::Connected,
            task: None,
            message: Some("Connected to notification stream".to_string()),
        }
    }

    /// Builds a free-form announcement, e.g. for an API-created notification
    pub fn announcement(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::TaskNotification,
            task: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: 7,
            title: "Pay rent".to_string(),
            start_at: "2026-08-06T12:00:00Z".parse().unwrap(),
            end_at: None,
            priority: "high".to_string(),
            notify_lead_minutes: 5,
            color: None,
            text_color: None,
            agenda_avatar: None,
            editable: true,
            deletable: true,
            draggable: true,
            all_day: false,
            disabled: false,
            checked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_event_serialization() {
        let event = NotificationEvent::for_task(&sample_task());
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"TASK_NOTIFICATION\""));
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("Pay rent"));
        assert!(json.contains("\"start\""));
        // The reminder event carries only the task projection
        assert!(!json.contains("\"message\""));
    }

    #[test]
    fn test_connected_event_serialization() {
        let event = NotificationEvent::connected();
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"CONNECTED\""));
        assert!(json.contains("Connected to notification stream"));
        assert!(!json.contains("\"task\""));
    }

    #[test]
    fn test_event_round_trip() {
        let event = NotificationEvent::for_task(&sample_task());
        let json = serde_json::to_string(&event).unwrap();
        let back: NotificationEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(back, event);
    }
}
