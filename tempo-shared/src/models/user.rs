/// User model and database operations
///
/// This module provides the User model and CRUD operations for managing
/// accounts. Passwords are stored as Argon2id hashes, never in plaintext.
///
/// # Subscription state
///
/// Billing-webhook events drive `subscription_id` / `subscription_status`
/// and mint single-use registration codes. A row created by the webhook
/// before the account is registered carries an empty password hash; such a
/// row cannot log in until registration completes and sets a real hash.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username TEXT NOT NULL UNIQUE,
///     email TEXT NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     subscription_id TEXT,
///     subscription_status TEXT NOT NULL DEFAULT 'inactive',
///     registration_code TEXT,
///     schedule_preferences JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tempo_shared::models::user::{User, CreateUser};
/// use tempo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "sam".to_string(),
///     email: "sam@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "sam@example.com").await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Billing subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Canceled,
    PastDue,
}

impl SubscriptionStatus {
    /// Converts status to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }

    /// Parses a billing-provider status string
    ///
    /// Unknown provider statuses collapse to `Inactive`.
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => SubscriptionStatus::Active,
            "canceled" => SubscriptionStatus::Canceled,
            "past_due" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Inactive,
        }
    }
}

/// Per-user schedule preferences stored as JSONB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreferences {
    pub lunch_time: Option<DateTime<Utc>>,
    pub dinner_time: Option<DateTime<Utc>>,
    pub sleep_time: Option<DateTime<Utc>>,
    pub wake_up_time: Option<DateTime<Utc>>,
}

/// User model representing an authentication principal
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display/login name, unique
    pub username: String,

    /// Email address, unique
    pub email: String,

    /// Argon2id password hash
    ///
    /// Empty string for rows the billing webhook created ahead of
    /// registration; login is refused until a real hash is set.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Billing provider subscription identifier
    pub subscription_id: Option<String>,

    /// Billing subscription status ("active", "inactive", "canceled", "past_due")
    pub subscription_status: String,

    /// Single-use registration code minted by the billing webhook
    ///
    /// Cleared when consumed during registration.
    #[serde(skip_serializing)]
    pub registration_code: Option<String>,

    /// Meal/sleep/wake preferences
    pub schedule_preferences: Json<SchedulePreferences>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user currently holds an active subscription
    pub fn has_active_subscription(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active.as_str()
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub schedule_preferences: Option<SchedulePreferences>,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, subscription_id, \
     subscription_status, registration_code, schedule_preferences, created_at, updated_at";

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the email or username already exists (unique
    /// constraint violation) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds the user holding an unconsumed registration code
    pub async fn find_by_registration_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE registration_code = $1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Completes a code-gated registration in one atomic step
    ///
    /// Sets the account credentials on the row holding `code` and clears the
    /// code, so a second attempt with the same code matches no row. Returns
    /// the finished user, or None if the code was absent or already consumed.
    pub async fn consume_registration_code(
        pool: &PgPool,
        code: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2,
                password_hash = $3,
                registration_code = NULL,
                updated_at = NOW()
            WHERE registration_code = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(code)
        .bind(username)
        .bind(password_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. The `updated_at`
    /// timestamp is always refreshed.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.username.is_some() {
            bind_count += 1;
            query.push_str(&format!(", username = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.schedule_preferences.is_some() {
            bind_count += 1;
            query.push_str(&format!(", schedule_preferences = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(username) = data.username {
            q = q.bind(username);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(prefs) = data.schedule_preferences {
            q = q.bind(Json(prefs));
        }

        let user = q.fetch_optional(pool).await?;

        Ok(user)
    }

    /// Applies a billing event to the row for `email`, creating it if absent
    ///
    /// Webhook rows created here have no credentials yet; registration fills
    /// them in via [`User::consume_registration_code`]. Passing a
    /// registration code replaces any previous unconsumed code for the row;
    /// passing None leaves an existing code in place.
    pub async fn upsert_subscription(
        pool: &PgPool,
        email: &str,
        subscription_id: Option<&str>,
        status: SubscriptionStatus,
        registration_code: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, subscription_id,
                               subscription_status, registration_code)
            VALUES ($1, $1, '', $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET subscription_id = EXCLUDED.subscription_id,
                subscription_status = EXCLUDED.subscription_status,
                registration_code = COALESCE(EXCLUDED.registration_code, users.registration_code),
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(subscription_id)
        .bind(status.as_str())
        .bind(registration_code)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_status_as_str() {
        assert_eq!(SubscriptionStatus::Active.as_str(), "active");
        assert_eq!(SubscriptionStatus::Inactive.as_str(), "inactive");
        assert_eq!(SubscriptionStatus::Canceled.as_str(), "canceled");
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
    }

    #[test]
    fn test_subscription_status_parse_unknown_is_inactive() {
        assert_eq!(SubscriptionStatus::parse("trialing"), SubscriptionStatus::Inactive);
        assert_eq!(SubscriptionStatus::parse("active"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::parse("past_due"), SubscriptionStatus::PastDue);
    }

    #[test]
    fn test_schedule_preferences_round_trip() {
        let prefs = SchedulePreferences {
            lunch_time: Some("2026-08-06T12:30:00Z".parse().unwrap()),
            ..Default::default()
        };

        let json = serde_json::to_string(&prefs).unwrap();
        assert!(json.contains("lunchTime"));

        let back: SchedulePreferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefs);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            subscription_id: None,
            subscription_status: "inactive".to_string(),
            registration_code: Some("code".to_string()),
            schedule_preferences: Json(SchedulePreferences::default()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("registration_code"));
    }

    #[test]
    fn test_has_active_subscription() {
        let mut user = User {
            id: Uuid::new_v4(),
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password_hash: String::new(),
            subscription_id: None,
            subscription_status: "inactive".to_string(),
            registration_code: None,
            schedule_preferences: Json(SchedulePreferences::default()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(!user.has_active_subscription());
        user.subscription_status = "active".to_string();
        assert!(user.has_active_subscription());
    }
}
