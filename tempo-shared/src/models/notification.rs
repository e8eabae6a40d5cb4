/// Persisted notification records
///
/// This is the CRUD-only notification subsystem: records created through the
/// API, listed newest-first, marked read, and deleted. It is independent of
/// the reminder scheduler, which broadcasts transient events and never
/// writes here.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title TEXT NOT NULL,
///     message TEXT NOT NULL,
///     kind TEXT NOT NULL DEFAULT 'TASK_NOTIFICATION',
///     read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A stored notification record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    /// Unique notification ID
    pub id: Uuid,

    /// Short headline
    pub title: String,

    /// Body text
    pub message: String,

    /// Notification kind tag
    pub kind: String,

    /// Whether the notification has been read
    pub read: bool,

    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub title: String,
    pub message: String,

    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "TASK_NOTIFICATION".to_string()
}

/// Input for updating a notification record (e.g. mark as read)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNotification {
    pub title: Option<String>,
    pub message: Option<String>,
    pub read: Option<bool>,
}

const NOTIFICATION_COLUMNS: &str = "id, title, message, kind, read, created_at";

impl Notification {
    /// Creates a notification record
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (title, message, kind)
            VALUES ($1, $2, $3)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.message)
        .bind(data.kind)
        .fetch_one(pool)
        .await?;

        Ok(notification)
    }

    /// Finds a notification by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(notification)
    }

    /// Lists all notifications, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    /// Updates a notification record
    ///
    /// Only non-None fields are written. Returns None if the record does not
    /// exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateNotification,
    ) -> Result<Option<Self>, sqlx::Error> {
        if data.title.is_none() && data.message.is_none() && data.read.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut query = String::from("UPDATE notifications SET id = id");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.message.is_some() {
            bind_count += 1;
            query.push_str(&format!(", message = ${}", bind_count));
        }
        if data.read.is_some() {
            bind_count += 1;
            query.push_str(&format!(", read = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Notification>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(message) = data.message {
            q = q.bind(message);
        }
        if let Some(read) = data.read {
            q = q.bind(read);
        }

        let notification = q.fetch_optional(pool).await?;

        Ok(notification)
    }

    /// Deletes a notification record
    ///
    /// Returns true if a record was deleted, false if none existed.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
