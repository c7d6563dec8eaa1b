use std::env;

/// Runtime configuration, read once from the environment at startup and
/// passed explicitly to every service. Provider credentials are optional;
/// services report `NotConfigured` when a call needs a missing credential.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub site_name: String,
    pub site_url: String,

    pub analysis_api_url: String,
    pub analysis_api_key: String,
    pub analysis_model: String,

    pub bluesky_api_url: String,
    pub bluesky_identifier: String,
    pub bluesky_app_password: String,

    pub mailchimp_api_key: String,
    pub mailchimp_list_id: String,
    pub mailchimp_from_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        // .env is optional; system-wide environment variables work too.
        let _ = dotenvy::dotenv();

        let site_name = env_or("SITE_NAME", "Veille Droits Humains");
        let from_name = env::var("MAILCHIMP_FROM_NAME").unwrap_or_else(|_| site_name.clone());

        Self {
            database_url: env_or("DATABASE_URL", "sqlite:newsdesk.db"),
            site_url: env_or("SITE_URL", "http://localhost:8080"),
            site_name,

            analysis_api_url: env_or("ANALYSIS_API_URL", "https://api.anthropic.com/v1/messages"),
            analysis_api_key: env_or("ANALYSIS_API_KEY", ""),
            analysis_model: env_or("ANALYSIS_MODEL", "claude-sonnet-4-20250514"),

            bluesky_api_url: env_or("BLUESKY_API_URL", "https://bsky.social/xrpc"),
            bluesky_identifier: env_or("BLUESKY_IDENTIFIER", ""),
            bluesky_app_password: env_or("BLUESKY_APP_PASSWORD", ""),

            mailchimp_api_key: env_or("MAILCHIMP_API_KEY", ""),
            mailchimp_list_id: env_or("MAILCHIMP_LIST_ID", ""),
            mailchimp_from_name: from_name,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
