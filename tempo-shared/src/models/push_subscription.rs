/// Browser push-subscription storage
///
/// Pass-through store for the subscription objects the browser push API
/// hands to the client. The endpoint URL identifies a subscription; the
/// `keys` object (p256dh/auth) is kept opaque.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE push_subscriptions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     endpoint TEXT NOT NULL UNIQUE,
///     keys JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// A stored browser push subscription
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushSubscription {
    /// Unique subscription ID
    pub id: Uuid,

    /// Push service endpoint URL, unique per browser registration
    pub endpoint: String,

    /// Opaque key material from the browser (p256dh/auth)
    pub keys: JsonValue,

    /// When the subscription was stored
    pub created_at: DateTime<Utc>,
}

/// Input matching the browser's PushSubscription JSON shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePushSubscription {
    pub endpoint: String,

    #[serde(default)]
    pub keys: JsonValue,
}

impl PushSubscription {
    /// Stores a subscription, replacing the keys if the endpoint is already known
    pub async fn upsert(
        pool: &PgPool,
        data: CreatePushSubscription,
    ) -> Result<Self, sqlx::Error> {
        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (endpoint, keys)
            VALUES ($1, $2)
            ON CONFLICT (endpoint) DO UPDATE SET keys = EXCLUDED.keys
            RETURNING id, endpoint, keys, created_at
            "#,
        )
        .bind(data.endpoint)
        .bind(data.keys)
        .fetch_one(pool)
        .await?;

        Ok(subscription)
    }

    /// Removes a subscription by endpoint
    ///
    /// Returns true if a subscription was removed.
    pub async fn delete_by_endpoint(pool: &PgPool, endpoint: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_push_subscription_deserializes_browser_shape() {
        let data: CreatePushSubscription = serde_json::from_str(
            r#"{
                "endpoint": "https://push.example.com/sub/abc",
                "keys": {"p256dh": "BPub", "auth": "secret"}
            }"#,
        )
        .unwrap();

        assert_eq!(data.endpoint, "https://push.example.com/sub/abc");
        assert_eq!(data.keys["p256dh"], "BPub");
    }
}
