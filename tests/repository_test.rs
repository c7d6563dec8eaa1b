use newsdesk::analyzer;
use newsdesk::store::{self, NewsletterLogStore, PageStore};
use newsdesk::types::{ArticleStatus, ArticleUpdate, NewArticle, NewsdeskError, NewsletterStatus};
use newsdesk::{ArticleRepository, CategoryRepository};
use sqlx::SqlitePool;

async fn test_pool() -> SqlitePool {
    let pool = store::connect("sqlite::memory:")
        .await
        .expect("in-memory database should open");
    store::init_schema(&pool).await.expect("schema should apply");
    pool
}

fn draft(title: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn slug_collisions_get_numeric_suffixes() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    let first = articles.create(draft("Refugee Crisis in Region X")).await.unwrap();
    let second = articles.create(draft("Refugee Crisis in Region X")).await.unwrap();
    let third = articles.create(draft("Refugee Crisis in Region X")).await.unwrap();

    assert_eq!(
        articles.get_by_id(first).await.unwrap().slug,
        "refugee-crisis-in-region-x"
    );
    assert_eq!(
        articles.get_by_id(second).await.unwrap().slug,
        "refugee-crisis-in-region-x-1"
    );
    assert_eq!(
        articles.get_by_id(third).await.unwrap().slug,
        "refugee-crisis-in-region-x-2"
    );
}

#[tokio::test]
async fn empty_title_is_rejected_before_any_insert() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    let result = articles.create(draft("   ")).await;
    assert!(matches!(result, Err(NewsdeskError::Validation(_))));

    let all = articles.get_all(None, 50, 0).await.unwrap();
    assert!(all.is_empty(), "nothing should have been persisted");
}

#[tokio::test]
async fn symbol_only_titles_still_get_a_nonempty_slug() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    let first = articles.create(draft("!!!")).await.unwrap();
    let second = articles.create(draft("???")).await.unwrap();

    let first_slug = articles.get_by_id(first).await.unwrap().slug;
    let second_slug = articles.get_by_id(second).await.unwrap().slug;

    assert!(!first_slug.is_empty());
    assert!(!second_slug.is_empty());
    assert_ne!(first_slug, second_slug);
}

#[tokio::test]
async fn renaming_to_the_same_title_keeps_the_slug() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    let id = articles.create(draft("Un titre stable")).await.unwrap();
    let before = articles.get_by_id(id).await.unwrap().slug;

    articles
        .update(
            id,
            ArticleUpdate {
                title: Some("Un titre stable".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = articles.get_by_id(id).await.unwrap().slug;
    assert_eq!(before, after, "a no-op rename must not collide with itself");
}

#[tokio::test]
async fn title_change_regenerates_slug_with_collision_suffix() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    articles.create(draft("First Title")).await.unwrap();
    let other = articles.create(draft("Something Else")).await.unwrap();

    articles
        .update(
            other,
            ArticleUpdate {
                title: Some("First Title".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let renamed = articles.get_by_id(other).await.unwrap();
    assert_eq!(renamed.title, "First Title");
    assert_eq!(renamed.slug, "first-title-1");
}

#[tokio::test]
async fn category_update_is_a_full_overwrite() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool);

    let x = categories.get_by_slug("droits-refugies").await.unwrap();
    let y = categories.get_by_slug("droits-femmes").await.unwrap();
    let z = categories.get_by_slug("non-discrimination").await.unwrap();

    let id = articles
        .create(NewArticle {
            title: "Associations".to_string(),
            category_ids: vec![x.id, y.id],
            ..Default::default()
        })
        .await
        .unwrap();

    articles
        .update(
            id,
            ArticleUpdate {
                category_ids: Some(vec![z.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let article = articles.get_by_id(id).await.unwrap();
    let slugs: Vec<&str> = article.categories.iter().map(|c| c.slug.as_str()).collect();
    assert_eq!(slugs, vec!["non-discrimination"]);

    // An explicit empty list clears the set entirely.
    articles
        .update(
            id,
            ArticleUpdate {
                category_ids: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(articles.get_by_id(id).await.unwrap().categories.is_empty());
}

#[tokio::test]
async fn create_then_get_round_trips_every_field() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool);

    let cat = categories.get_by_slug("droit-humanitaire").await.unwrap();

    let id = articles
        .create(NewArticle {
            title: "Protection des civils".to_string(),
            source_url: Some("https://example.org/rapport".to_string()),
            source_content: Some("Texte source brut".to_string()),
            summary: Some("<p>Résumé</p>".to_string()),
            social_post: Some("Un regard sur la protection des civils".to_string()),
            main_points: Some("<ul><li>Point</li></ul>".to_string()),
            rights_analysis: Some("<div>Analyse</div>".to_string()),
            content: Some("Corps de l'article".to_string()),
            thumbnail_url: Some("https://example.org/img.jpg".to_string()),
            status: Some(ArticleStatus::Published),
            category_ids: vec![cat.id],
        })
        .await
        .unwrap();

    let article = articles.get_by_id(id).await.unwrap();
    assert_eq!(article.title, "Protection des civils");
    assert_eq!(article.slug, "protection-des-civils");
    assert_eq!(article.source_url.as_deref(), Some("https://example.org/rapport"));
    assert_eq!(article.source_content.as_deref(), Some("Texte source brut"));
    assert_eq!(article.summary.as_deref(), Some("<p>Résumé</p>"));
    assert_eq!(
        article.social_post.as_deref(),
        Some("Un regard sur la protection des civils")
    );
    assert_eq!(article.main_points.as_deref(), Some("<ul><li>Point</li></ul>"));
    assert_eq!(article.rights_analysis.as_deref(), Some("<div>Analyse</div>"));
    assert_eq!(article.content.as_deref(), Some("Corps de l'article"));
    assert_eq!(article.thumbnail_url.as_deref(), Some("https://example.org/img.jpg"));
    assert_eq!(article.status, ArticleStatus::Published);
    assert_eq!(article.categories.len(), 1);
    assert_eq!(article.categories[0].id, cat.id);
    assert_eq!(article.categories[0].slug, "droit-humanitaire");

    // Slug lookup resolves to the same record.
    let by_slug = articles.get_by_slug("protection-des-civils").await.unwrap();
    assert_eq!(by_slug.id, id);
}

#[tokio::test]
async fn search_is_case_insensitive_substring_match() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    articles.create(draft("Crise Climatique")).await.unwrap();
    articles
        .create(NewArticle {
            title: "Autre sujet".to_string(),
            summary: Some("Les effets du CLIMAT sur les migrations".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    articles.create(draft("Hors sujet")).await.unwrap();

    let hits = articles.search("climat").await.unwrap();
    assert_eq!(hits.len(), 2);

    let none = articles.search("introuvable").await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn get_all_filters_by_status_and_orders_newest_first() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());

    let a = articles.create(draft("Ancien publié")).await.unwrap();
    let b = articles.create(draft("Brouillon")).await.unwrap();
    let c = articles.create(draft("Récent publié")).await.unwrap();

    for (id, status) in [(a, "published"), (c, "published")] {
        articles
            .update(
                id,
                ArticleUpdate {
                    status: ArticleStatus::parse(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    // Pin distinct creation times so the ordering assertion is deterministic.
    sqlx::query("UPDATE articles SET created_at = ? WHERE id = ?")
        .bind("2026-01-01 10:00:00.000+00:00")
        .bind(a)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE articles SET created_at = ? WHERE id = ?")
        .bind("2026-02-01 10:00:00.000+00:00")
        .bind(c)
        .execute(&pool)
        .await
        .unwrap();

    let published = articles
        .get_all(Some(ArticleStatus::Published), 50, 0)
        .await
        .unwrap();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].id, c, "newest first");
    assert_eq!(published[1].id, a);

    let everything = articles.get_all(None, 50, 0).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert!(everything.iter().any(|article| article.id == b));
}

#[tokio::test]
async fn delete_removes_article_and_cascades_associations() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool.clone());

    let cat = categories.get_by_slug("droits-enfants").await.unwrap();
    let id = articles
        .create(NewArticle {
            title: "À supprimer".to_string(),
            category_ids: vec![cat.id],
            ..Default::default()
        })
        .await
        .unwrap();

    articles.delete(id).await.unwrap();

    assert!(matches!(
        articles.get_by_id(id).await,
        Err(NewsdeskError::NotFound { .. })
    ));

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM article_categories WHERE article_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(orphans, 0, "association rows must cascade");
}

#[tokio::test]
async fn published_since_only_returns_the_recent_window() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());

    let recent = articles
        .create(NewArticle {
            title: "Publication récente".to_string(),
            status: Some(ArticleStatus::Published),
            ..Default::default()
        })
        .await
        .unwrap();
    let old = articles
        .create(NewArticle {
            title: "Publication ancienne".to_string(),
            status: Some(ArticleStatus::Published),
            ..Default::default()
        })
        .await
        .unwrap();
    articles.create(draft("Brouillon récent")).await.unwrap();

    sqlx::query("UPDATE articles SET created_at = ? WHERE id = ?")
        .bind("2020-01-01 10:00:00.000+00:00")
        .bind(old)
        .execute(&pool)
        .await
        .unwrap();

    let window = articles.published_since(7).await.unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].id, recent);
}

#[tokio::test]
async fn unknown_suggested_category_slugs_are_dropped_silently() {
    let pool = test_pool().await;
    let categories = CategoryRepository::new(pool);

    let resolved = categories
        .get_by_slugs(&[
            "droits-femmes".to_string(),
            "saucisson".to_string(),
            "non-discrimination".to_string(),
        ])
        .await
        .unwrap();

    let slugs: Vec<&str> = resolved.iter().map(|c| c.slug.as_str()).collect();
    assert_eq!(slugs, vec!["droits-femmes", "non-discrimination"]);
}

#[tokio::test]
async fn category_listing_is_alphabetical_and_seeded() {
    let pool = test_pool().await;
    let categories = CategoryRepository::new(pool);

    let all = categories.get_all().await.unwrap();
    assert_eq!(all.len(), 8, "eight seeded human-rights domains");

    let names: Vec<String> = all.iter().map(|c| c.name.clone()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted, "listing must come back alphabetical");
}

#[tokio::test]
async fn published_articles_per_category_exclude_drafts() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool);

    let cat = categories.get_by_slug("droits-civils-politiques").await.unwrap();

    let published = articles
        .create(NewArticle {
            title: "Publié dans la catégorie".to_string(),
            status: Some(ArticleStatus::Published),
            category_ids: vec![cat.id],
            ..Default::default()
        })
        .await
        .unwrap();
    articles
        .create(NewArticle {
            title: "Brouillon dans la catégorie".to_string(),
            category_ids: vec![cat.id],
            ..Default::default()
        })
        .await
        .unwrap();

    let listed = categories.published_articles(cat.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, published);
}

#[tokio::test]
async fn newsletter_log_guard_counts_only_sent_entries() {
    let pool = test_pool().await;
    let logs = NewsletterLogStore::new(pool);

    assert!(!logs.sent_within_days(7).await.unwrap());

    logs.record(NewsletterStatus::Skipped, 0, None).await.unwrap();
    assert!(!logs.sent_within_days(7).await.unwrap(), "skipped runs do not block");

    logs.record(NewsletterStatus::Sent, 3, Some("abc123")).await.unwrap();
    assert!(logs.sent_within_days(7).await.unwrap());

    let recent = logs.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    let sent = recent.iter().find(|log| log.status == "sent").unwrap();
    assert_eq!(sent.article_count, 3);
    assert_eq!(sent.campaign_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn home_page_is_seeded_and_editable() {
    let pool = test_pool().await;
    let pages = PageStore::new(pool);

    let home = pages.get_by_slug("home").await.unwrap();
    assert_eq!(home.title, "Bienvenue");
    assert!(home.content.unwrap_or_default().contains("droits humains"));

    pages.update("home", "Accueil", "<p>Nouveau</p>").await.unwrap();
    let edited = pages.get_by_slug("home").await.unwrap();
    assert_eq!(edited.title, "Accueil");
    assert_eq!(edited.content.as_deref(), Some("<p>Nouveau</p>"));
}

#[tokio::test]
async fn analysis_outcome_flows_into_a_draft_article() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool);

    // The model's JSON reply, as the analyzer would parse it.
    let reply = r#"{
        "title": "Déplacements forcés dans la région X",
        "summary": "Premier paragraphe.\n\nSecond paragraphe.",
        "social_post": "Des milliers de personnes déplacées: ce que dit le rapport.",
        "main_points": ["Des déplacements massifs", "Un accès humanitaire entravé"],
        "rights_analysis": {
            "civil_political_rights": {"relevant": false, "points": [], "concerns": []},
            "economic_social_cultural_rights": {"relevant": true, "points": ["Accès aux soins"], "concerns": []},
            "international_humanitarian_law": {"relevant": true, "points": ["Protection des civils"], "concerns": ["Attaques indiscriminées"]},
            "overall_assessment": "Situation préoccupante.",
            "recommendations": ["Garantir l'accès humanitaire"]
        },
        "suggested_categories": ["droits-refugies", "droit-humanitaire", "categorie-inconnue"]
    }"#;

    let outcome = analyzer::parse_analysis(reply).unwrap();
    assert!(!outcome.title.is_empty());
    assert!(!outcome.summary.is_empty());
    assert!(!outcome.main_points.is_empty());

    let resolved = categories.get_by_slugs(&outcome.suggested_categories).await.unwrap();
    assert_eq!(resolved.len(), 2, "the unknown slug is dropped");

    let id = articles
        .create(NewArticle {
            title: outcome.title.clone(),
            summary: Some(outcome.summary.clone()),
            social_post: outcome.social_post.clone(),
            main_points: Some(outcome.main_points_html.clone()),
            rights_analysis: Some(outcome.rights_analysis_html.clone()),
            source_content: Some("Raw report text...".to_string()),
            category_ids: resolved.iter().map(|c| c.id).collect(),
            ..Default::default()
        })
        .await
        .unwrap();

    let article = articles.get_by_id(id).await.unwrap();
    assert_eq!(article.status, ArticleStatus::Draft);
    assert!(!article.categories.is_empty());
}

#[tokio::test]
async fn update_on_missing_id_is_a_silent_noop() {
    let pool = test_pool().await;
    let articles = ArticleRepository::new(pool);

    let result = articles
        .update(
            9999,
            ArticleUpdate {
                title: Some("Fantôme".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(result.is_ok(), "missing ids are the caller's problem to detect");
}
