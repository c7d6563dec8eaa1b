use crate::types::{NewsletterLog, NewsletterStatus, Page, Result};
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// The eight human-rights domains the store is seeded with.
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    (
        "Droits civils et politiques",
        "droits-civils-politiques",
        "Libertés fondamentales, droit de vote, liberté d'expression...",
    ),
    (
        "Droits économiques et sociaux",
        "droits-economiques-sociaux",
        "Droit au travail, à la santé, à l'éducation...",
    ),
    (
        "Droits culturels",
        "droits-culturels",
        "Droit à la culture, aux pratiques culturelles...",
    ),
    (
        "Droit international humanitaire",
        "droit-humanitaire",
        "Conventions de Genève, protection des civils...",
    ),
    (
        "Droits des réfugiés",
        "droits-refugies",
        "Convention de 1951, protection internationale...",
    ),
    (
        "Droits des enfants",
        "droits-enfants",
        "Convention des droits de l'enfant...",
    ),
    (
        "Droits des femmes",
        "droits-femmes",
        "CEDAW, égalité des genres...",
    ),
    (
        "Non-discrimination",
        "non-discrimination",
        "Égalité, lutte contre les discriminations...",
    ),
];

const DEFAULT_HOME_CONTENT: &str = "<p>Ce site est dédié à la veille et à l'analyse \
d'informations sous l'angle des droits humains.</p>\n\n\
<p>Chaque article publié ici est analysé pour identifier les points d'attention concernant \
les droits civils et politiques, les droits économiques, sociaux et culturels, \
et le droit international humanitaire.</p>";

/// Open the database. The pool is capped at one connection: the store is a
/// single shared resource and callers must not assume any thread-safety
/// beyond what SQLite gives a single connection.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and seed reference data. Safe to run on every startup.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            source_url TEXT,
            source_content TEXT,
            summary TEXT,
            social_post TEXT,
            main_points TEXT,
            rights_analysis TEXT,
            content TEXT,
            review TEXT,
            thumbnail_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_categories (
            article_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (article_id, category_id),
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'editor',
            created_at TEXT NOT NULL,
            last_login TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            content TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS newsletter_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id TEXT,
            article_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'sent',
            sent_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    seed_reference_data(pool).await?;

    debug!("schema ready");
    Ok(())
}

async fn seed_reference_data(pool: &SqlitePool) -> Result<()> {
    for (name, slug, description) in DEFAULT_CATEGORIES {
        sqlx::query("INSERT OR IGNORE INTO categories (name, slug, description) VALUES (?, ?, ?)")
            .bind(name)
            .bind(slug)
            .bind(description)
            .execute(pool)
            .await?;
    }

    let home_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE slug = 'home'")
        .fetch_one(pool)
        .await?;

    if home_count == 0 {
        sqlx::query("INSERT INTO pages (slug, title, content, updated_at) VALUES (?, ?, ?, ?)")
            .bind("home")
            .bind("Bienvenue")
            .bind(DEFAULT_HOME_CONTENT)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        info!("seeded default home page");
    }

    Ok(())
}

/// Append-only audit trail of newsletter dispatches.
#[derive(Clone)]
pub struct NewsletterLogStore {
    pool: SqlitePool,
}

impl NewsletterLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        status: NewsletterStatus,
        article_count: i64,
        campaign_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO newsletter_logs (campaign_id, article_count, status, sent_at) VALUES (?, ?, ?, ?)",
        )
        .bind(campaign_id)
        .bind(article_count)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(status = status.as_str(), article_count, "recorded newsletter log entry");
        Ok(())
    }

    /// Caller-side idempotency guard: has a newsletter gone out in the
    /// last `days` days?
    pub async fn sent_within_days(&self, days: i64) -> Result<bool> {
        let cutoff = Utc::now() - Duration::days(days);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM newsletter_logs WHERE status = 'sent' AND sent_at > ?",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<NewsletterLog>> {
        let rows = sqlx::query(
            "SELECT id, campaign_id, article_count, status, sent_at FROM newsletter_logs ORDER BY sent_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            logs.push(NewsletterLog {
                id: row.try_get("id")?,
                campaign_id: row.try_get("campaign_id")?,
                article_count: row.try_get("article_count")?,
                status: row.try_get("status")?,
                sent_at: row.try_get("sent_at")?,
            });
        }

        Ok(logs)
    }
}

/// Editable static pages (the home page is the only seeded one).
#[derive(Clone)]
pub struct PageStore {
    pool: SqlitePool,
}

impl PageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Page> {
        let row = sqlx::query("SELECT id, slug, title, content, updated_at FROM pages WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Page {
                id: row.try_get("id")?,
                slug: row.try_get("slug")?,
                title: row.try_get("title")?,
                content: row.try_get("content")?,
                updated_at: row.try_get("updated_at")?,
            }),
            None => Err(crate::types::NewsdeskError::not_found("page", slug)),
        }
    }

    pub async fn update(&self, slug: &str, title: &str, content: &str) -> Result<()> {
        sqlx::query("UPDATE pages SET title = ?, content = ?, updated_at = ? WHERE slug = ?")
            .bind(title)
            .bind(content)
            .bind(Utc::now())
            .bind(slug)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
