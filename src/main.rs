use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use newsdesk::types::{ArticleStatus, ArticleUpdate, NewArticle, NewsletterStatus};
use newsdesk::{
    store, ArticleRepository, BlueskyPublisher, CampaignService, CategoryRepository, Config,
    ContentAnalyzer, NewsletterLogStore,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "newsdesk", about = "Article publishing and integration toolbox")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send the weekly digest of recently published articles.
    Newsletter {
        /// Build the HTML and write a preview file instead of sending.
        #[arg(long)]
        dry_run: bool,
        /// Number of days the digest covers.
        #[arg(long, default_value_t = 7)]
        days: i64,
        /// Send even if a newsletter already went out this week.
        #[arg(long)]
        force: bool,
    },
    /// Analyze raw text and optionally create a draft article from it.
    Analyze {
        /// File containing the text to analyze.
        #[arg(long)]
        file: PathBuf,
        /// Where the text came from.
        #[arg(long)]
        source_url: Option<String>,
        /// Persist the result as a draft article.
        #[arg(long)]
        create: bool,
    },
    /// Generate an editorial review of an existing article and store it.
    Review {
        /// Article id.
        #[arg(long)]
        id: i64,
    },
    /// Publish an article to Bluesky as a link-card post.
    Share {
        /// Article id.
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let pool = store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    store::init_schema(&pool).await?;

    match cli.command {
        Command::Newsletter { dry_run, days, force } => {
            run_newsletter(&config, pool, dry_run, days, force).await
        }
        Command::Analyze { file, source_url, create } => {
            run_analyze(&config, pool, file, source_url, create).await
        }
        Command::Review { id } => run_review(&config, pool, id).await,
        Command::Share { id } => run_share(&config, pool, id).await,
    }
}

async fn run_newsletter(
    config: &Config,
    pool: sqlx::SqlitePool,
    dry_run: bool,
    days: i64,
    force: bool,
) -> anyhow::Result<()> {
    let campaign = CampaignService::new(config, pool.clone());
    if !campaign.is_configured() {
        bail!("Mailchimp is not configured; set MAILCHIMP_API_KEY and MAILCHIMP_LIST_ID");
    }

    let logs = NewsletterLogStore::new(pool.clone());
    if !force && logs.sent_within_days(7).await? {
        info!("a newsletter already went out this week; use --force to send anyway");
        return Ok(());
    }

    let articles = ArticleRepository::new(pool).published_since(days).await?;
    info!(count = articles.len(), days, "collected published articles");

    if articles.is_empty() {
        logs.record(NewsletterStatus::Skipped, 0, None).await?;
        info!("no articles in the window; nothing to send");
        return Ok(());
    }

    for article in &articles {
        info!("  [{}] {}", article.created_at.format("%d/%m/%Y"), article.title);
    }

    if dry_run {
        let html = campaign.build_newsletter_html(&articles);
        let preview = PathBuf::from("newsletter-preview.html");
        std::fs::write(&preview, html)?;
        info!(path = %preview.display(), "dry run: preview written");
        return Ok(());
    }

    let campaign_id = campaign.send_weekly_newsletter(&articles).await?;
    info!(%campaign_id, "newsletter sent");
    Ok(())
}

async fn run_analyze(
    config: &Config,
    pool: sqlx::SqlitePool,
    file: PathBuf,
    source_url: Option<String>,
    create: bool,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    if let Some(raw) = source_url.as_deref() {
        let parsed = url::Url::parse(raw).with_context(|| format!("invalid source URL {}", raw))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("source URL must be http(s), got {}", parsed.scheme());
        }
    }

    let analyzer = ContentAnalyzer::new(config);
    let outcome = analyzer
        .analyze(&content, source_url.as_deref().unwrap_or(""))
        .await?;

    info!(title = %outcome.title, "analysis complete");
    println!("{}", serde_json::to_string_pretty(&outcome.main_points)?);

    if !create {
        return Ok(());
    }

    let categories = CategoryRepository::new(pool.clone());
    let resolved = categories.get_by_slugs(&outcome.suggested_categories).await?;
    if resolved.len() < outcome.suggested_categories.len() {
        warn!(
            suggested = outcome.suggested_categories.len(),
            resolved = resolved.len(),
            "some suggested categories are unknown and were dropped"
        );
    }

    let articles = ArticleRepository::new(pool);
    let id = articles
        .create(NewArticle {
            title: outcome.title.clone(),
            source_url,
            source_content: Some(content),
            summary: Some(outcome.summary.clone()),
            social_post: outcome.social_post.clone(),
            main_points: Some(outcome.main_points_html.clone()),
            rights_analysis: Some(outcome.rights_analysis_html.clone()),
            status: Some(ArticleStatus::Draft),
            category_ids: resolved.iter().map(|category| category.id).collect(),
            ..Default::default()
        })
        .await?;

    info!(id, "draft article created");
    Ok(())
}

async fn run_review(config: &Config, pool: sqlx::SqlitePool, id: i64) -> anyhow::Result<()> {
    let articles = ArticleRepository::new(pool);
    let article = articles.get_by_id(id).await?;

    let analyzer = ContentAnalyzer::new(config);
    let review = analyzer.generate_review(&article).await?;

    articles
        .update(
            id,
            ArticleUpdate {
                review: Some(serde_json::to_string(&review.payload)?),
                ..Default::default()
            },
        )
        .await?;

    info!(id, chars = review.payload.char_count, "review generated and stored");
    println!("{}", review.plain_text);
    Ok(())
}

async fn run_share(config: &Config, pool: sqlx::SqlitePool, id: i64) -> anyhow::Result<()> {
    let publisher = BlueskyPublisher::new(config);
    if !publisher.is_configured() {
        bail!("Bluesky is not configured; set BLUESKY_IDENTIFIER and BLUESKY_APP_PASSWORD");
    }

    let article = ArticleRepository::new(pool).get_by_id(id).await?;
    let article_url = format!("{}/article/{}", config.site_url, article.slug);

    let post_url = publisher.share_article(&article, &article_url).await?;
    info!(%post_url, "article shared");
    println!("{}", post_url);
    Ok(())
}
