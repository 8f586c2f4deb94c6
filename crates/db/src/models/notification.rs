//! In-app notifications, targeted at a specific member or a whole role.
//!
//! Role-targeted notifications are stored once with `recipient_role` set
//! and fanned out at read time: a member's feed is the union of rows
//! addressed to their id and rows addressed to their role.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::member::MemberRole;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub recipient_role: Option<MemberRole>,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, recipient_role, title, body, is_read, created_at";

impl Notification {
    pub async fn create_for_member(
        pool: &SqlitePool,
        recipient_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO notifications (id, recipient_id, title, body) \
             VALUES (?, ?, ?, ?) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(Uuid::new_v4())
            .bind(recipient_id)
            .bind(title)
            .bind(body)
            .fetch_one(pool)
            .await
    }

    pub async fn create_for_role(
        pool: &SqlitePool,
        role: MemberRole,
        title: &str,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO notifications (id, recipient_role, title, body) \
             VALUES (?, ?, ?, ?) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(Uuid::new_v4())
            .bind(role)
            .bind(title)
            .bind(body)
            .fetch_one(pool)
            .await
    }

    /// Feed for one member: direct + role-targeted rows, newest first.
    pub async fn list_for(
        pool: &SqlitePool,
        member_id: Uuid,
        role: MemberRole,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = ? OR recipient_role = ? \
             ORDER BY created_at DESC LIMIT ?"
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(member_id)
            .bind(role)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark read, scoped to rows the member can actually see.
    ///
    /// Role-targeted notifications are single shared rows, so marking one
    /// read marks it read for every member of that role.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        member_id: Uuid,
        role: MemberRole,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 \
             WHERE id = ? AND (recipient_id = ? OR recipient_role = ?)",
        )
        .bind(id)
        .bind(member_id)
        .bind(role)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete, with the same recipient scoping as `mark_read`.
    pub async fn delete(
        pool: &SqlitePool,
        id: Uuid,
        member_id: Uuid,
        role: MemberRole,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE id = ? AND (recipient_id = ? OR recipient_role = ?)",
        )
        .bind(id)
        .bind(member_id)
        .bind(role)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
