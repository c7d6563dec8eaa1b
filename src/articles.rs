use crate::types::{
    Article, ArticleStatus, ArticleUpdate, Category, NewArticle, NewsdeskError, Result,
};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Repository owning the articles table and the article-category join.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: SqlitePool,
}

impl ArticleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new article and return its id. The slug is derived from the
    /// title; a category-id list, when supplied, becomes the association set.
    pub async fn create(&self, draft: NewArticle) -> Result<i64> {
        if draft.title.trim().is_empty() {
            return Err(NewsdeskError::Validation("title is required".to_string()));
        }

        let slug = self.generate_slug(&draft.title, None).await?;
        let status = draft.status.unwrap_or(ArticleStatus::Draft);
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (title, slug, source_url, source_content, summary, social_post,
                 main_points, rights_analysis, content, thumbnail_url, status,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.title)
        .bind(&slug)
        .bind(&draft.source_url)
        .bind(&draft.source_content)
        .bind(&draft.summary)
        .bind(&draft.social_post)
        .bind(&draft.main_points)
        .bind(&draft.rights_analysis)
        .bind(&draft.content)
        .bind(&draft.thumbnail_url)
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();

        if !draft.category_ids.is_empty() {
            self.replace_categories(id, &draft.category_ids).await?;
        }

        info!(id, %slug, "created article");
        Ok(id)
    }

    /// Update only the supplied fields. A supplied title regenerates the
    /// slug, excluding this row from the uniqueness check. Missing ids are a
    /// silent no-op; callers check existence with `get_by_id` first.
    pub async fn update(&self, id: i64, patch: ArticleUpdate) -> Result<()> {
        let slug = match patch.title.as_deref() {
            Some(title) => Some(self.generate_slug(title, Some(id)).await?),
            None => None,
        };

        let mut fields: Vec<(&str, String)> = Vec::new();
        if let Some(v) = patch.title {
            fields.push(("title", v));
        }
        if let Some(v) = slug {
            fields.push(("slug", v));
        }
        if let Some(v) = patch.source_url {
            fields.push(("source_url", v));
        }
        if let Some(v) = patch.source_content {
            fields.push(("source_content", v));
        }
        if let Some(v) = patch.summary {
            fields.push(("summary", v));
        }
        if let Some(v) = patch.social_post {
            fields.push(("social_post", v));
        }
        if let Some(v) = patch.main_points {
            fields.push(("main_points", v));
        }
        if let Some(v) = patch.rights_analysis {
            fields.push(("rights_analysis", v));
        }
        if let Some(v) = patch.content {
            fields.push(("content", v));
        }
        if let Some(v) = patch.review {
            fields.push(("review", v));
        }
        if let Some(v) = patch.thumbnail_url {
            fields.push(("thumbnail_url", v));
        }
        if let Some(v) = patch.status {
            fields.push(("status", v.as_str().to_string()));
        }

        let mut sql = String::from("UPDATE articles SET updated_at = ?");
        for (column, _) in &fields {
            sql.push_str(", ");
            sql.push_str(column);
            sql.push_str(" = ?");
        }
        sql.push_str(" WHERE id = ?");

        let mut query = sqlx::query(&sql).bind(Utc::now());
        for (_, value) in fields {
            query = query.bind(value);
        }
        query.bind(id).execute(&self.pool).await?;

        if let Some(category_ids) = patch.category_ids {
            self.replace_categories(id, &category_ids).await?;
        }

        debug!(id, "updated article");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(id, "deleted article");
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut article = article_from_row(&row)?;
                article.categories = self.categories_for(article.id).await?;
                Ok(article)
            }
            None => Err(NewsdeskError::not_found("article", id.to_string())),
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut article = article_from_row(&row)?;
                article.categories = self.categories_for(article.id).await?;
                Ok(article)
            }
            None => Err(NewsdeskError::not_found("article", slug)),
        }
    }

    /// Newest-first page of articles, optionally filtered by status, with
    /// categories attached.
    pub async fn get_all(
        &self,
        status: Option<ArticleStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Article>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM articles WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM articles ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            let mut article = article_from_row(&row)?;
            article.categories = self.categories_for(article.id).await?;
            articles.push(article);
        }

        Ok(articles)
    }

    /// Published articles created within the last `days` days, newest-first,
    /// with categories attached. This is the newsletter window query.
    pub async fn published_since(&self, days: i64) -> Result<Vec<Article>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = sqlx::query(
            "SELECT * FROM articles WHERE status = 'published' AND created_at >= ? ORDER BY created_at DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            let mut article = article_from_row(&row)?;
            article.categories = self.categories_for(article.id).await?;
            articles.push(article);
        }

        Ok(articles)
    }

    /// Case-insensitive substring search across title, summary and content.
    /// Unbounded and without category resolution, matching the original
    /// search surface.
    pub async fn search(&self, query: &str) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE title LIKE ? OR summary LIKE ? OR content LIKE ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(article_from_row).collect()
    }

    /// Replace the association set wholesale. Runs in one transaction so a
    /// failure mid-replace cannot strand the article with no categories.
    async fn replace_categories(&self, article_id: i64, category_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM article_categories WHERE article_id = ?")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        for category_id in category_ids {
            sqlx::query("INSERT INTO article_categories (article_id, category_id) VALUES (?, ?)")
                .bind(article_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn categories_for(&self, article_id: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.slug, c.description
            FROM categories c
            JOIN article_categories ac ON c.id = ac.category_id
            WHERE ac.article_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            categories.push(Category {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                slug: row.try_get("slug")?,
                description: row.try_get("description")?,
            });
        }

        Ok(categories)
    }

    /// Derive a unique slug from a title. On update, `exclude_id` keeps the
    /// row's own slug out of the collision check so a no-op rename is stable.
    async fn generate_slug(&self, title: &str, exclude_id: Option<i64>) -> Result<String> {
        let base = slugify(title);
        let mut slug = base.clone();
        let mut counter = 1;

        while self.slug_exists(&slug, exclude_id).await? {
            slug = format!("{}-{}", base, counter);
            counter += 1;
        }

        Ok(slug)
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE slug = ? AND id != ?")
                    .bind(slug)
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE slug = ?")
                    .bind(slug)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count > 0)
    }
}

/// Lowercase the title, collapse every run of non-alphanumeric characters to
/// a single hyphen, trim edge hyphens. Titles with nothing alphanumeric fall
/// back to `article` so the slug is never empty.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        return "article".to_string();
    }

    slug
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let status_raw: String = row.try_get("status")?;
    let status = ArticleStatus::parse(&status_raw).unwrap_or(ArticleStatus::Draft);

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        source_url: row.try_get("source_url")?,
        source_content: row.try_get("source_content")?,
        summary: row.try_get("summary")?,
        social_post: row.try_get("social_post")?,
        main_points: row.try_get("main_points")?,
        rights_analysis: row.try_get("rights_analysis")?,
        content: row.try_get("content")?,
        review: row.try_get("review")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        categories: Vec::new(),
    })
}
