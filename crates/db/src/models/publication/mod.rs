//! Publication model: articles and their editorial lifecycle.
//!
//! A publication moves through `draft -> review -> published -> excluded`
//! (see `lifecycle`). Categories are slash-delimited `main/sub` strings.
//! Slugs are assigned on approval and never reused.

mod lifecycle;
pub(crate) mod queries;

pub use lifecycle::TransitionError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
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
pub enum PublicationStatus {
    #[default]
    Draft,
    Review,
    Published,
    Excluded,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Publication {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub published_at: Option<DateTime<Utc>>,
    /// Slash-delimited `main/sub` category.
    pub category: String,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub image_credit: Option<String>,
    pub content: String,
    pub status: PublicationStatus,
    pub views: i64,
    pub unique_views: i64,
    pub is_highlighted: bool,
    pub slug: Option<String>,
    pub deletion_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    /// Main category segment (everything before the first slash).
    pub fn main_category(&self) -> &str {
        self.category
            .split_once('/')
            .map(|(main, _)| main)
            .unwrap_or(&self.category)
    }
}

/// Publication joined with its author's display name, for listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublicationWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub publication: Publication,
    pub author_name: String,
}

impl std::ops::Deref for PublicationWithAuthor {
    type Target = Publication;
    fn deref(&self) -> &Self::Target {
        &self.publication
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePublication {
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub image_credit: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePublication {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_credit: Option<String>,
    pub content: Option<String>,
}

/// Filters for dashboard listings.
#[derive(Debug, Default, Deserialize)]
pub struct PublicationFilter {
    pub status: Option<PublicationStatus>,
    pub author_id: Option<Uuid>,
    /// Matches the main category segment or the full `main/sub` string.
    pub category: Option<String>,
    /// Case-insensitive substring match on title and description.
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Derive a URL slug from an article title.
///
/// Lowercases, strips diacritics-free non-alphanumerics to dashes and
/// collapses runs. Uniqueness is handled at approval time by suffixing the
/// publication id when the plain slug is taken.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true; // suppress leading dash

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}
