use crate::types::{Article, ArticleStatus, Category, NewsdeskError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const DEFAULT_ARTICLE_PAGE: i64 = 50;

/// Read-side repository over the seeded category reference data.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, slug, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(category_from_row).collect()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category> {
        let row = sqlx::query("SELECT id, name, slug, description FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => category_from_row(&row),
            None => Err(NewsdeskError::not_found("category", id.to_string())),
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category> {
        let row = sqlx::query("SELECT id, name, slug, description FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => category_from_row(&row),
            None => Err(NewsdeskError::not_found("category", slug)),
        }
    }

    /// Resolve a list of slugs (typically AI-suggested) to categories.
    /// Unknown slugs are dropped silently rather than treated as errors.
    pub async fn get_by_slugs(&self, slugs: &[String]) -> Result<Vec<Category>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; slugs.len()].join(", ");
        let sql = format!(
            "SELECT id, name, slug, description FROM categories WHERE slug IN ({}) ORDER BY name",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for slug in slugs {
            query = query.bind(slug);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(category_from_row).collect()
    }

    /// Published articles belonging to a category, newest-first, capped at
    /// the default page size.
    pub async fn published_articles(&self, category_id: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM articles a
            JOIN article_categories ac ON a.id = ac.article_id
            WHERE ac.category_id = ? AND a.status = 'published'
            ORDER BY a.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(category_id)
        .bind(DEFAULT_ARTICLE_PAGE)
        .fetch_all(&self.pool)
        .await?;

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            articles.push(article_summary_from_row(&row)?);
        }

        Ok(articles)
    }
}

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
    })
}

fn article_summary_from_row(row: &SqliteRow) -> Result<Article> {
    let status_raw: String = row.try_get("status")?;

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
        status: ArticleStatus::parse(&status_raw).unwrap_or(ArticleStatus::Draft),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        categories: Vec::new(),
    })
}
