use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ArticleStatus::Draft),
            "published" => Some(ArticleStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub source_url: Option<String>,
    pub source_content: Option<String>,
    pub summary: Option<String>,
    pub social_post: Option<String>,
    pub main_points: Option<String>,
    pub rights_analysis: Option<String>,
    pub content: Option<String>,
    pub review: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Fields accepted when creating an article. Only `title` is required.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub source_url: Option<String>,
    pub source_content: Option<String>,
    pub summary: Option<String>,
    pub social_post: Option<String>,
    pub main_points: Option<String>,
    pub rights_analysis: Option<String>,
    pub content: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<ArticleStatus>,
    pub category_ids: Vec<i64>,
}

/// Partial update: `None` leaves a column untouched. A supplied title also
/// regenerates the slug. `category_ids: Some(..)` replaces the association
/// set wholesale (an empty list clears it).
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub source_content: Option<String>,
    pub summary: Option<String>,
    pub social_post: Option<String>,
    pub main_points: Option<String>,
    pub rights_analysis: Option<String>,
    pub content: Option<String>,
    pub review: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<ArticleStatus>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsletterStatus {
    Sent,
    Skipped,
    Error,
}

impl NewsletterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsletterStatus::Sent => "sent",
            NewsletterStatus::Skipped => "skipped",
            NewsletterStatus::Error => "error",
        }
    }
}

/// One row of the append-only newsletter audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct NewsletterLog {
    pub id: i64,
    pub campaign_id: Option<String>,
    pub article_count: i64,
    pub status: String,
    pub sent_at: DateTime<Utc>,
}

/// Editable static page (home page and the like).
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NewsdeskError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("contract error: {message}")]
    Contract {
        message: String,
        /// The offending provider output, kept verbatim for diagnosis.
        raw: Option<String>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl NewsdeskError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        NewsdeskError::NotFound { kind, key: key.into() }
    }

    pub fn contract(message: impl Into<String>, raw: Option<String>) -> Self {
        NewsdeskError::Contract { message: message.into(), raw }
    }
}

pub type Result<T> = std::result::Result<T, NewsdeskError>;
