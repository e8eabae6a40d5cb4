/// Task model and database operations
///
/// This module provides the Task model representing user-created calendar
/// tasks, plus the counter row that mints their sequential identifiers.
///
/// # Identifiers
///
/// Task ids are NOT database-generated serials. They are minted from the
/// `counters` table in a single atomic upsert-increment, so ids are unique
/// and strictly increasing across the lifetime of the store, and a task is
/// assigned its id exactly once, at creation.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE counters (
///     name TEXT PRIMARY KEY,
///     seq BIGINT NOT NULL DEFAULT 0
/// );
///
/// CREATE TABLE tasks (
///     id BIGINT PRIMARY KEY,
///     title TEXT NOT NULL,
///     start_at TIMESTAMPTZ NOT NULL,
///     end_at TIMESTAMPTZ,
///     priority TEXT NOT NULL DEFAULT 'medium',
///     notify_lead_minutes INTEGER NOT NULL DEFAULT 0,
///     color TEXT,
///     text_color TEXT,
///     agenda_avatar TEXT,
///     editable BOOLEAN NOT NULL DEFAULT TRUE,
///     deletable BOOLEAN NOT NULL DEFAULT TRUE,
///     draggable BOOLEAN NOT NULL DEFAULT TRUE,
///     all_day BOOLEAN NOT NULL DEFAULT FALSE,
///     disabled BOOLEAN NOT NULL DEFAULT FALSE,
///     checked BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tempo_shared::models::task::{Task, CreateTask, TaskPriority};
/// use tempo_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::{Duration, Utc};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     title: "Call dentist".to_string(),
///     start_at: Utc::now() + Duration::minutes(60),
///     notify_lead_minutes: 10,
///     priority: TaskPriority::High.as_str().to_string(),
///     ..Default::default()
/// }).await?;
///
/// println!("Created task #{}, reminder fires at {}", task.id, task.fire_at());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Counter row name used to mint task identifiers
const TASK_ID_COUNTER: &str = "task_id";

/// Task priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Converts priority to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    /// Parses a stored string back into a priority
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(TaskPriority::High),
            "medium" => Some(TaskPriority::Medium),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

/// Task model representing a user-scheduled calendar item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Sequential identifier minted from the counter row
    pub id: i64,

    /// Display title
    pub title: String,

    /// When the task starts
    pub start_at: DateTime<Utc>,

    /// When the task ends (open-ended if None)
    pub end_at: Option<DateTime<Utc>>,

    /// Priority level ("high", "medium", "low")
    pub priority: String,

    /// Minutes before `start_at` at which to deliver the reminder
    pub notify_lead_minutes: i32,

    /// Calendar display color
    pub color: Option<String>,

    /// Calendar display text color
    pub text_color: Option<String>,

    /// Avatar shown in the agenda view
    pub agenda_avatar: Option<String>,

    /// Whether the task can be edited in the calendar UI
    pub editable: bool,

    /// Whether the task can be deleted in the calendar UI
    pub deletable: bool,

    /// Whether the task can be dragged in the calendar UI
    pub draggable: bool,

    /// Whether the task spans the whole day
    pub all_day: bool,

    /// Whether the task is disabled
    pub disabled: bool,

    /// Whether the task has been checked off as complete
    pub checked: bool,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The instant the reminder for this task should be delivered
    ///
    /// Computed as `start_at - notify_lead_minutes`.
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.start_at - Duration::minutes(i64::from(self.notify_lead_minutes))
    }
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Display title
    pub title: String,

    /// When the task starts
    #[serde(default = "Utc::now")]
    pub start_at: DateTime<Utc>,

    /// When the task ends
    pub end_at: Option<DateTime<Utc>>,

    /// Priority level (default "medium")
    #[serde(default = "default_priority")]
    pub priority: String,

    /// Minutes before start at which to notify (default 0)
    #[serde(default)]
    pub notify_lead_minutes: i32,

    /// Calendar display color
    pub color: Option<String>,

    /// Calendar display text color
    pub text_color: Option<String>,

    /// Avatar shown in the agenda view
    pub agenda_avatar: Option<String>,

    #[serde(default = "default_true")]
    pub editable: bool,

    #[serde(default = "default_true")]
    pub deletable: bool,

    #[serde(default = "default_true")]
    pub draggable: bool,

    #[serde(default)]
    pub all_day: bool,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub checked: bool,
}

impl Default for CreateTask {
    fn default() -> Self {
        Self {
            title: String::new(),
            start_at: Utc::now(),
            end_at: None,
            priority: default_priority(),
            notify_lead_minutes: 0,
            color: None,
            text_color: None,
            agenda_avatar: None,
            editable: true,
            deletable: true,
            draggable: true,
            all_day: false,
            disabled: false,
            checked: false,
        }
    }
}

fn default_priority() -> String {
    TaskPriority::Medium.as_str().to_string()
}

fn default_true() -> bool {
    true
}

/// Input for updating a task
///
/// Only non-None fields are written. The `updated_at` timestamp is always
/// refreshed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub priority: Option<String>,
    pub notify_lead_minutes: Option<i32>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub agenda_avatar: Option<String>,
    pub editable: Option<bool>,
    pub deletable: Option<bool>,
    pub draggable: Option<bool>,
    pub all_day: Option<bool>,
    pub disabled: Option<bool>,
    pub checked: Option<bool>,
}

const TASK_COLUMNS: &str = "id, title, start_at, end_at, priority, notify_lead_minutes, \
     color, text_color, agenda_avatar, editable, deletable, draggable, \
     all_day, disabled, checked, created_at, updated_at";

impl Task {
    /// Mints the next task identifier from the counter row
    ///
    /// The increment and read happen in one statement, so concurrent creates
    /// never observe the same value.
    pub async fn next_id(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO counters (name, seq)
            VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET seq = counters.seq + 1
            RETURNING seq
            "#,
        )
        .bind(TASK_ID_COUNTER)
        .fetch_one(pool)
        .await?;

        Ok(seq)
    }

    /// Creates a new task, minting its identifier first
    ///
    /// # Errors
    ///
    /// Returns an error if the counter increment or the insert fails.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let id = Self::next_id(pool).await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (id, title, start_at, end_at, priority, notify_lead_minutes,
                               color, text_color, agenda_avatar, editable, deletable,
                               draggable, all_day, disabled, checked)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.title)
        .bind(data.start_at)
        .bind(data.end_at)
        .bind(data.priority)
        .bind(data.notify_lead_minutes)
        .bind(data.color)
        .bind(data.text_color)
        .bind(data.agenda_avatar)
        .bind(data.editable)
        .bind(data.deletable)
        .bind(data.draggable)
        .bind(data.all_day)
        .bind(data.disabled)
        .bind(data.checked)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by its sequential identifier
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists every task, oldest id first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Updates an existing task
    ///
    /// Only non-None fields in `data` are written. Returns the updated task
    /// if it exists, None otherwise.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build the update dynamically from the fields that are present
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 1;

        let columns: [(&str, bool); 14] = [
            ("title", data.title.is_some()),
            ("start_at", data.start_at.is_some()),
            ("end_at", data.end_at.is_some()),
            ("priority", data.priority.is_some()),
            ("notify_lead_minutes", data.notify_lead_minutes.is_some()),
            ("color", data.color.is_some()),
            ("text_color", data.text_color.is_some()),
            ("agenda_avatar", data.agenda_avatar.is_some()),
            ("editable", data.editable.is_some()),
            ("deletable", data.deletable.is_some()),
            ("draggable", data.draggable.is_some()),
            ("all_day", data.all_day.is_some()),
            ("disabled", data.disabled.is_some()),
            ("checked", data.checked.is_some()),
        ];

        for (column, present) in columns {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {TASK_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(start_at) = data.start_at {
            q = q.bind(start_at);
        }
        if let Some(end_at) = data.end_at {
            q = q.bind(end_at);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(lead) = data.notify_lead_minutes {
            q = q.bind(lead);
        }
        if let Some(color) = data.color {
            q = q.bind(color);
        }
        if let Some(text_color) = data.text_color {
            q = q.bind(text_color);
        }
        if let Some(avatar) = data.agenda_avatar {
            q = q.bind(avatar);
        }
        if let Some(editable) = data.editable {
            q = q.bind(editable);
        }
        if let Some(deletable) = data.deletable {
            q = q.bind(deletable);
        }
        if let Some(draggable) = data.draggable {
            q = q.bind(draggable);
        }
        if let Some(all_day) = data.all_day {
            q = q.bind(all_day);
        }
        if let Some(disabled) = data.disabled {
            q = q.bind(disabled);
        }
        if let Some(checked) = data.checked {
            q = q.bind(checked);
        }

        let task = q.fetch_optional(pool).await?;

        Ok(task)
    }

    /// Deletes a task by identifier
    ///
    /// Returns true if a task was deleted, false if none existed.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_as_str() {
        assert_eq!(TaskPriority::High.as_str(), "high");
        assert_eq!(TaskPriority::Medium.as_str(), "medium");
        assert_eq!(TaskPriority::Low.as_str(), "low");
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(TaskPriority::parse("high"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::parse("medium"), Some(TaskPriority::Medium));
        assert_eq!(TaskPriority::parse("low"), Some(TaskPriority::Low));
        assert_eq!(TaskPriority::parse("urgent"), None);
    }

    #[test]
    fn test_create_task_defaults() {
        let data = CreateTask {
            title: "Pay rent".to_string(),
            ..Default::default()
        };

        assert_eq!(data.priority, "medium");
        assert_eq!(data.notify_lead_minutes, 0);
        assert!(data.editable);
        assert!(data.deletable);
        assert!(data.draggable);
        assert!(!data.all_day);
        assert!(!data.disabled);
        assert!(!data.checked);
    }

    #[test]
    fn test_create_task_deserializes_with_defaults() {
        let data: CreateTask =
            serde_json::from_str(r#"{"title":"Standup","start_at":"2026-08-06T09:00:00Z"}"#)
                .unwrap();

        assert_eq!(data.title, "Standup");
        assert_eq!(data.priority, "medium");
        assert!(data.editable);
    }

    #[test]
    fn test_fire_at_subtracts_lead() {
        let start = Utc::now();
        let task = sample_task(start, 15);
        assert_eq!(task.fire_at(), start - Duration::minutes(15));
    }

    #[test]
    fn test_fire_at_zero_lead_is_start() {
        let start = Utc::now();
        let task = sample_task(start, 0);
        assert_eq!(task.fire_at(), start);
    }

    fn sample_task(start_at: DateTime<Utc>, lead: i32) -> Task {
        Task {
            id: 1,
            title: "sample".to_string(),
            start_at,
            end_at: None,
            priority: "medium".to_string(),
            notify_lead_minutes: lead,
            color: None,
            text_color: None,
            agenda_avatar: None,
            editable: true,
            deletable: true,
            draggable: true,
            all_day: false,
            disabled: false,
            checked: false,
            created_at: start_at,
            updated_at: start_at,
        }
    }
}
