//! Browser push subscriptions collected from the public site.
//!
//! Endpoints are unique; re-subscribing refreshes the keys and reactivates
//! the row. Delivery failures are counted so the fan-out can stop bothering
//! endpoints that keep failing without an explicit 404/410.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Consecutive failures after which a subscription is deactivated.
pub const FAILURE_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub active: bool,
    pub failure_count: i64,
    pub last_delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Subscription payload as produced by `PushManager.subscribe()`.
#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, endpoint, p256dh, auth, active, failure_count, last_delivered_at, created_at";

impl PushSubscription {
    pub async fn upsert(
        pool: &SqlitePool,
        data: &CreateSubscription,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO push_subscriptions (id, endpoint, p256dh, auth) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(endpoint) DO UPDATE SET \
                 p256dh = excluded.p256dh, \
                 auth = excluded.auth, \
                 active = 1, \
                 failure_count = 0 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        sqlx::query_as::<_, PushSubscription>(&sql)
            .bind(Uuid::new_v4())
            .bind(&data.endpoint)
            .bind(&data.keys.p256dh)
            .bind(&data.keys.auth)
            .fetch_one(pool)
            .await
    }

    pub async fn deactivate_by_endpoint(
        pool: &SqlitePool,
        endpoint: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET active = 0 WHERE endpoint = ? AND active = 1",
        )
        .bind(endpoint)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions \
             WHERE active = 1 ORDER BY created_at"
        );
        sqlx::query_as::<_, PushSubscription>(&sql)
            .fetch_all(pool)
            .await
    }

    pub async fn record_success(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE push_subscriptions \
             SET failure_count = 0, last_delivered_at = datetime('now', 'subsec') \
             WHERE id = ?",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Bump the failure counter, deactivating past the threshold.
    pub async fn record_failure(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE push_subscriptions \
             SET failure_count = failure_count + 1, \
                 active = CASE WHEN failure_count + 1 >= ? THEN 0 ELSE active END \
             WHERE id = ?",
        )
        .bind(FAILURE_THRESHOLD)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Gone endpoints (404/410 from the push service) are dropped outright.
    pub async fn deactivate(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE push_subscriptions SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
