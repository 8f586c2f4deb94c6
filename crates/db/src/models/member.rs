//! Member model: journalist and admin accounts.
//!
//! Members are soft-deleted (the `deleted_at` column) so bylines on old
//! articles keep resolving. The `published_count`/`excluded_count` columns
//! cache per-author publication counts and are recomputed after every write
//! that can change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Journalist,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub role: MemberRole,
    pub bio: Option<String>,
    pub avatar_path: Option<String>,
    pub is_team_member: bool,
    pub published_count: i64,
    pub excluded_count: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMember {
    pub name: String,
    pub email: String,
    /// Pre-hashed digest; hashing happens in the session service.
    pub password_digest: String,
    pub role: Option<MemberRole>,
    pub bio: Option<String>,
    pub is_team_member: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub role: Option<MemberRole>,
    pub is_team_member: Option<bool>,
    /// New plaintext password, hashed in the session service before storage.
    pub password: Option<String>,
}

const MEMBER_COLUMNS: &str = "id, name, email, password_digest, role, bio, avatar_path, \
     is_team_member, published_count, excluded_count, deleted_at, created_at, updated_at";

impl Member {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateMember,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO members (id, name, email, password_digest, role, bio, is_team_member) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {MEMBER_COLUMNS}"
        );
        sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.password_digest)
            .bind(data.role.unwrap_or_default())
            .bind(&data.bio)
            .bind(data.is_team_member.unwrap_or(true))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?");
        sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up an active member by email. Soft-deleted accounts cannot log in.
    pub async fn find_active_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql =
            format!("SELECT {MEMBER_COLUMNS} FROM members WHERE email = ? AND deleted_at IS NULL");
        sqlx::query_as::<_, Member>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        include_deleted: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members \
             WHERE (deleted_at IS NULL OR ?) \
             ORDER BY name COLLATE NOCASE"
        );
        sqlx::query_as::<_, Member>(&sql)
            .bind(include_deleted)
            .fetch_all(pool)
            .await
    }

    /// Active team members shown on the public journalists page.
    pub async fn list_public_team(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members \
             WHERE deleted_at IS NULL AND is_team_member = 1 \
             ORDER BY name COLLATE NOCASE"
        );
        sqlx::query_as::<_, Member>(&sql).fetch_all(pool).await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        name: String,
        email: String,
        bio: Option<String>,
        role: MemberRole,
        is_team_member: bool,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE members \
             SET name = ?, email = ?, bio = ?, role = ?, is_team_member = ?, \
                 updated_at = datetime('now', 'subsec') \
             WHERE id = ? \
             RETURNING {MEMBER_COLUMNS}"
        );
        sqlx::query_as::<_, Member>(&sql)
            .bind(name)
            .bind(email)
            .bind(bio)
            .bind(role)
            .bind(is_team_member)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_avatar_path(
        pool: &SqlitePool,
        id: Uuid,
        avatar_path: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE members SET avatar_path = ?, updated_at = datetime('now', 'subsec') \
             WHERE id = ?",
        )
        .bind(avatar_path)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_password_digest(
        pool: &SqlitePool,
        id: Uuid,
        password_digest: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE members SET password_digest = ?, updated_at = datetime('now', 'subsec') \
             WHERE id = ?",
        )
        .bind(password_digest)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn soft_delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE members SET deleted_at = datetime('now', 'subsec'), \
                 updated_at = datetime('now', 'subsec') \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn restore(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE members SET deleted_at = NULL, updated_at = datetime('now', 'subsec') \
             WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Recompute the cached publication counters from the publications table.
    ///
    /// Called after every publication write that changes status or authorship.
    pub async fn recount_publications(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        crate::with_retry(&crate::RetryConfig::default(), "recount_publications", || async {
            sqlx::query(
                "UPDATE members SET \
                     published_count = (SELECT COUNT(*) FROM publications \
                                        WHERE author_id = ?1 AND status = 'published'), \
                     excluded_count  = (SELECT COUNT(*) FROM publications \
                                        WHERE author_id = ?1 AND status = 'excluded'), \
                     updated_at = datetime('now', 'subsec') \
                 WHERE id = ?1",
            )
            .bind(id)
            .execute(pool)
            .await
            .map(|_| ())
        })
        .await
    }

    /// Recompute counters for every member. Run at startup to repair drift.
    pub async fn recount_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE members SET \
                 published_count = (SELECT COUNT(*) FROM publications \
                                    WHERE author_id = members.id AND status = 'published'), \
                 excluded_count  = (SELECT COUNT(*) FROM publications \
                                    WHERE author_id = members.id AND status = 'excluded')",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}
