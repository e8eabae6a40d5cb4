/// Database schema setup
///
/// This module creates the Tempo schema at startup. Every statement is
/// idempotent (`CREATE TABLE IF NOT EXISTS`), so running it on every boot
/// is safe and keeps a fresh database usable without a separate migration
/// step.
///
/// # Tables
///
/// - `counters`: named sequence rows; the `task_id` row mints Task identifiers
/// - `tasks`: calendar tasks keyed by the counter-minted sequential id
/// - `users`: authentication principals with subscription state
/// - `notifications`: persisted notification records (CRUD-only subsystem)
/// - `push_subscriptions`: stored browser push-subscription objects
///
/// # Example
///
/// ```no_run
/// use tempo_shared::db::pool::{create_pool, DatabaseConfig};
/// use tempo_shared::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        name TEXT PRIMARY KEY,
        seq BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id BIGINT PRIMARY KEY,
        title TEXT NOT NULL,
        start_at TIMESTAMPTZ NOT NULL,
        end_at TIMESTAMPTZ,
        priority TEXT NOT NULL DEFAULT 'medium',
        notify_lead_minutes INTEGER NOT NULL DEFAULT 0,
        color TEXT,
        text_color TEXT,
        agenda_avatar TEXT,
        editable BOOLEAN NOT NULL DEFAULT TRUE,
        deletable BOOLEAN NOT NULL DEFAULT TRUE,
        draggable BOOLEAN NOT NULL DEFAULT TRUE,
        all_day BOOLEAN NOT NULL DEFAULT FALSE,
        disabled BOOLEAN NOT NULL DEFAULT FALSE,
        checked BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        subscription_id TEXT,
        subscription_status TEXT NOT NULL DEFAULT 'inactive',
        registration_code TEXT,
        schedule_preferences JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'TASK_NOTIFICATION',
        read BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS push_subscriptions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        endpoint TEXT NOT NULL UNIQUE,
        keys JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Runs the idempotent schema statements
///
/// # Errors
///
/// Returns an error if any statement fails to execute or the connection
/// is lost mid-setup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running database schema setup");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    debug!(statements = SCHEMA.len(), "Schema statements applied");
    info!("Database schema setup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_are_idempotent() {
        for statement in SCHEMA {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "non-idempotent schema statement: {}",
                statement
            );
        }
    }

    #[test]
    fn test_schema_covers_all_tables() {
        let joined = SCHEMA.join("\n");
        for table in ["counters", "tasks", "users", "notifications", "push_subscriptions"] {
            assert!(joined.contains(table), "missing table: {}", table);
        }
    }
}
