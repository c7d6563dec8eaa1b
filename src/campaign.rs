use crate::config::Config;
use crate::store::NewsletterLogStore;
use crate::types::{Article, NewsdeskError, NewsletterStatus, Result};
use crate::utils::{escape_html, strip_html, truncate_chars};
use chrono::{Duration as ChronoDuration, Utc};
use md5::{Digest, Md5};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{error, info};

const API_TIMEOUT_SECS: u64 = 30;
const SUMMARY_CHARS: usize = 250;
const FALLBACK_REPLY_TO: &str = "noreply@example.com";

/// Mailing-list membership and weekly digest dispatch through the campaign
/// provider's REST API.
pub struct CampaignService {
    client: Client,
    api_url: String,
    api_key: String,
    list_id: String,
    from_name: String,
    site_name: String,
    site_url: String,
    logs: NewsletterLogStore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListStats {
    pub name: String,
    pub member_count: i64,
    pub unsubscribe_count: i64,
    pub open_rate: f64,
    pub click_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub email_address: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct MemberPage {
    pub members: Vec<Member>,
    pub total_items: i64,
}

impl CampaignService {
    pub fn new(config: &Config, pool: SqlitePool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_url: api_url_for_key(&config.mailchimp_api_key),
            api_key: config.mailchimp_api_key.clone(),
            list_id: config.mailchimp_list_id.clone(),
            from_name: config.mailchimp_from_name.clone(),
            site_name: config.site_name.clone(),
            site_url: config.site_url.clone(),
            logs: NewsletterLogStore::new(pool),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.list_id.is_empty()
    }

    /// Upsert a member as `pending` (double opt-in). Returns the resulting
    /// membership status reported by the provider.
    pub async fn subscribe(
        &self,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<String> {
        self.ensure_configured()?;

        let mut merge_fields = serde_json::Map::new();
        if let Some(first_name) = first_name.filter(|name| !name.is_empty()) {
            merge_fields.insert("FNAME".to_string(), json!(first_name));
        }
        if let Some(last_name) = last_name.filter(|name| !name.is_empty()) {
            merge_fields.insert("LNAME".to_string(), json!(last_name));
        }

        let body = json!({
            "email_address": email,
            "status": "pending",
            "merge_fields": merge_fields,
        });

        let path = format!("lists/{}/members/{}", self.list_id, member_hash(email));
        let response = self.request(Method::PUT, &path, Some(&body)).await?;

        let status = response
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NewsdeskError::contract("member upsert response missing status", Some(response.to_string()))
            })?;

        info!(email, status, "subscribed member");
        Ok(status.to_string())
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<()> {
        self.ensure_configured()?;

        let body = json!({ "status": "unsubscribed" });
        let path = format!("lists/{}/members/{}", self.list_id, member_hash(email));
        let response = self.request(Method::PATCH, &path, Some(&body)).await?;

        match response.get("status").and_then(Value::as_str) {
            Some("unsubscribed") => {
                info!(email, "unsubscribed member");
                Ok(())
            }
            other => Err(NewsdeskError::contract(
                format!("unexpected member status after unsubscribe: {:?}", other),
                Some(response.to_string()),
            )),
        }
    }

    pub async fn list_stats(&self) -> Result<ListStats> {
        self.ensure_configured()?;

        let response = self
            .request(Method::GET, &format!("lists/{}", self.list_id), None)
            .await?;

        let stats = response.get("stats").cloned().unwrap_or(Value::Null);

        Ok(ListStats {
            name: response
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            member_count: stats.get("member_count").and_then(Value::as_i64).unwrap_or(0),
            unsubscribe_count: stats
                .get("unsubscribe_count")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            open_rate: stats.get("open_rate").and_then(Value::as_f64).unwrap_or(0.0),
            click_rate: stats.get("click_rate").and_then(Value::as_f64).unwrap_or(0.0),
        })
    }

    /// Page of currently subscribed members.
    pub async fn members(&self, count: i64, offset: i64) -> Result<MemberPage> {
        self.ensure_configured()?;

        let path = format!(
            "lists/{}/members?count={}&offset={}&status=subscribed",
            self.list_id, count, offset
        );
        let response = self.request(Method::GET, &path, None).await?;

        let members: Vec<Member> = response
            .get("members")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| NewsdeskError::contract(format!("members payload: {}", e), None))?
            .ok_or_else(|| {
                NewsdeskError::contract("members response missing members", Some(response.to_string()))
            })?;

        Ok(MemberPage {
            members,
            total_items: response.get("total_items").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Create, fill and send the weekly digest campaign over the given
    /// (caller-filtered) articles. The three provider calls run in strict
    /// sequence and short-circuit on the first failure. Every attempt is
    /// recorded to the newsletter log.
    pub async fn send_weekly_newsletter(&self, articles: &[Article]) -> Result<String> {
        self.ensure_configured()?;

        if articles.is_empty() {
            return Err(NewsdeskError::Validation("no articles to send".to_string()));
        }

        let count = articles.len() as i64;
        let result = self.run_campaign_steps(articles).await;

        match &result {
            Ok(campaign_id) => {
                self.logs
                    .record(NewsletterStatus::Sent, count, Some(campaign_id.as_str()))
                    .await?;
                info!(%campaign_id, articles = count, "newsletter sent");
            }
            Err(e) => {
                self.logs.record(NewsletterStatus::Error, count, None).await?;
                error!(articles = count, "newsletter failed: {}", e);
            }
        }

        result
    }

    async fn run_campaign_steps(&self, articles: &[Article]) -> Result<String> {
        let campaign_id = self.create_campaign(articles.len()).await?;
        let html = self.build_newsletter_html(articles);
        self.set_campaign_content(&campaign_id, &html).await?;
        self.send_campaign(&campaign_id).await?;
        Ok(campaign_id)
    }

    async fn create_campaign(&self, article_count: usize) -> Result<String> {
        let now = Utc::now();
        let week_start = (now - ChronoDuration::days(7)).format("%d/%m");
        let week_end = now.format("%d/%m/%Y");

        let subject = format!(
            "{} - {} article(s) cette semaine ({} - {})",
            self.site_name, article_count, week_start, week_end
        );

        let body = json!({
            "type": "regular",
            "recipients": { "list_id": self.list_id },
            "settings": {
                "subject_line": subject,
                "from_name": self.from_name,
                "reply_to": self.list_reply_to().await,
                "title": format!("Newsletter hebdomadaire - {}", now.format("%d/%m/%Y")),
            },
        });

        let response = self.request(Method::POST, "campaigns", Some(&body)).await?;

        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                NewsdeskError::contract("campaign create response missing id", Some(response.to_string()))
            })
    }

    async fn set_campaign_content(&self, campaign_id: &str, html: &str) -> Result<()> {
        let body = json!({ "html": html });
        let path = format!("campaigns/{}/content", campaign_id);
        let response = self.request(Method::PUT, &path, Some(&body)).await?;

        if response.get("html").is_some() {
            Ok(())
        } else {
            Err(NewsdeskError::contract(
                "content response did not echo html",
                Some(response.to_string()),
            ))
        }
    }

    async fn send_campaign(&self, campaign_id: &str) -> Result<()> {
        let path = format!("campaigns/{}/actions/send", campaign_id);
        // Success is 204 No Content; the helper maps that to Null.
        self.request(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn list_reply_to(&self) -> String {
        match self
            .request(Method::GET, &format!("lists/{}", self.list_id), None)
            .await
        {
            Ok(response) => response
                .get("campaign_defaults")
                .and_then(|defaults| defaults.get("from_email"))
                .and_then(Value::as_str)
                .unwrap_or(FALLBACK_REPLY_TO)
                .to_string(),
            Err(_) => FALLBACK_REPLY_TO.to_string(),
        }
    }

    /// Self-contained inline-styled digest email.
    pub fn build_newsletter_html(&self, articles: &[Article]) -> String {
        let now = Utc::now();
        let week_start = (now - ChronoDuration::days(7)).format("%d/%m");
        let week_end = now.format("%d/%m/%Y");

        let mut articles_html = String::new();
        for article in articles {
            let title = escape_html(&article.title);
            let article_url = format!("{}/article/{}", self.site_url, article.slug);

            let summary = match article.summary.as_deref() {
                Some(raw) => {
                    let clean = strip_html(raw);
                    escape_html(&truncate_chars(&clean, SUMMARY_CHARS))
                }
                None => String::new(),
            };

            let categories = article
                .categories
                .iter()
                .map(|category| escape_html(&category.name))
                .collect::<Vec<_>>()
                .join(" | ");

            let date = article.created_at.format("%d/%m/%Y");

            articles_html.push_str(&format!(
                r#"<tr>
    <td style="padding: 20px 0; border-bottom: 1px solid #e0e0e0;">
        <h3 style="margin: 0 0 8px 0; font-size: 18px;">
            <a href="{article_url}" style="color: #3366cc; text-decoration: none;">{title}</a>
        </h3>
        <p style="margin: 0 0 8px 0; color: #555; font-size: 14px; line-height: 1.5;">{summary}</p>
        <p style="margin: 0; font-size: 12px; color: #888;">{date} {categories}</p>
    </td>
</tr>
"#
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{site_name} - Newsletter</title>
</head>
<body style="margin: 0; padding: 0; background-color: #f6f6f6; font-family: Georgia, 'Times New Roman', serif;">
    <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color: #f6f6f6;">
        <tr>
            <td align="center" style="padding: 20px 10px;">
                <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border: 1px solid #e0e0e0; border-radius: 4px;">
                    <tr>
                        <td style="background-color: #3366cc; padding: 25px 30px; border-radius: 4px 4px 0 0;">
                            <h1 style="margin: 0; color: #ffffff; font-size: 22px; font-weight: normal;">{site_name}</h1>
                            <p style="margin: 5px 0 0 0; color: rgba(255,255,255,0.85); font-size: 13px;">Veille et analyse sous l'angle des droits humains</p>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 25px 30px 15px 30px;">
                            <p style="margin: 0; font-size: 15px; color: #333; line-height: 1.6;">Voici les <strong>{article_count} article(s)</strong> publiés entre le {week_start} et le {week_end}.</p>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 0 30px;">
                            <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
{articles_html}
                            </table>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 25px 30px;" align="center">
                            <a href="{site_url}" style="display: inline-block; background-color: #3366cc; color: #ffffff; padding: 12px 30px; text-decoration: none; border-radius: 4px; font-size: 14px;">Voir tous les articles</a>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f9fa; padding: 20px 30px; border-top: 1px solid #e0e0e0; border-radius: 0 0 4px 4px;">
                            <p style="margin: 0; font-size: 12px; color: #888; text-align: center;">{site_name} - Les analyses sont g&eacute;n&eacute;r&eacute;es avec l'aide de l'IA et doivent &ecirc;tre v&eacute;rifi&eacute;es.</p>
                            <p style="margin: 8px 0 0 0; font-size: 11px; color: #aaa; text-align: center;"><a href="*|UNSUB|*" style="color: #888;">Se d&eacute;sabonner</a></p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>
"#,
            site_name = self.site_name,
            site_url = self.site_url,
            article_count = articles.len(),
            week_start = week_start,
            week_end = week_end,
            articles_html = articles_html,
        )
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(NewsdeskError::NotConfigured("Mailchimp credentials"))
        }
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/{}", self.api_url, path);

        let mut request = self
            .client
            .request(method, url)
            .basic_auth("anystring", Some(&self.api_key));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // 204 No Content is a success with an empty body (campaign send).
        if status.as_u16() == 204 {
            return Ok(Value::Null);
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = value
                .get("detail")
                .and_then(Value::as_str)
                .or_else(|| value.get("title").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

            return Err(NewsdeskError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Ok(value)
    }
}

/// The provider addresses members by the MD5 of the lowercased email.
pub fn member_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    format!("{:x}", Md5::digest(normalized.as_bytes()))
}

/// The datacenter suffix of the API key selects the API host.
fn api_url_for_key(api_key: &str) -> String {
    let datacenter = api_key.rsplit('-').next().filter(|dc| !dc.is_empty() && *dc != api_key);
    match datacenter {
        Some(dc) => format!("https://{}.api.mailchimp.com/3.0", dc),
        None => "https://api.mailchimp.com/3.0".to_string(),
    }
}
