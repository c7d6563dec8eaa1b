pub mod analyzer;
pub mod articles;
pub mod campaign;
pub mod categories;
pub mod config;
pub mod social;
pub mod store;
pub mod types;
pub mod utils;

pub use analyzer::{AnalysisOutcome, ContentAnalyzer, ReviewOutcome};
pub use articles::ArticleRepository;
pub use campaign::CampaignService;
pub use categories::CategoryRepository;
pub use config::Config;
pub use social::BlueskyPublisher;
pub use store::{NewsletterLogStore, PageStore};
pub use types::*;
