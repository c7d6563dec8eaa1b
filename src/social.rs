use crate::config::Config;
use crate::types::{Article, NewsdeskError, Result};
use crate::utils::{strip_html, truncate_chars};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const API_TIMEOUT_SECS: u64 = 30;
const MAX_THUMBNAIL_BYTES: usize = 1024 * 1024;
const POST_LANG: &str = "fr";
const POST_HASHTAGS: &str = "#DroitsHumains #Veille";
const SUMMARY_FALLBACK_CHARS: usize = 200;
const CARD_DESCRIPTION_CHARS: usize = 150;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// Publishes link-card posts to the AT-protocol network. The session token
/// is cached for the process lifetime; there is no expiry or refresh logic.
pub struct BlueskyPublisher {
    client: Client,
    api_url: String,
    identifier: String,
    app_password: String,
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Clone)]
struct Session {
    access_jwt: String,
    did: String,
}

/// A rich-text annotation over the post. The protocol addresses spans in
/// UTF-8 bytes, not characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSpan,
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteSpan {
    #[serde(rename = "byteStart")]
    pub byte_start: usize,
    #[serde(rename = "byteEnd")]
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

impl BlueskyPublisher {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_url: config.bluesky_api_url.clone(),
            identifier: config.bluesky_identifier.clone(),
            app_password: config.bluesky_app_password.clone(),
            session: RwLock::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.identifier.is_empty() && !self.app_password.is_empty()
    }

    /// Publish a post and return its public URL. When `url` is given the
    /// post carries an external link card; a thumbnail URL additionally
    /// uploads the image as a blob for the card. A failed thumbnail fetch
    /// degrades to a card without an image rather than aborting the post.
    pub async fn create_post(
        &self,
        text: &str,
        url: Option<&str>,
        title: Option<&str>,
        description: Option<&str>,
        thumbnail_url: Option<&str>,
    ) -> Result<String> {
        let session = self.ensure_session().await?;

        let mut record = json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "langs": [POST_LANG],
        });

        let facets = parse_facets(text);
        if !facets.is_empty() {
            record["facets"] = serde_json::to_value(&facets).unwrap_or_default();
        }

        if let Some(url) = url {
            let mut external = json!({
                "uri": url,
                "title": title.unwrap_or(url),
                "description": description.unwrap_or(""),
            });

            if let Some(thumb_url) = thumbnail_url {
                match self.upload_thumbnail(&session, thumb_url).await {
                    Ok(blob) => {
                        external["thumb"] = blob;
                    }
                    Err(e) => warn!(thumb_url, "thumbnail upload failed: {}", e),
                }
            }

            record["embed"] = json!({
                "$type": "app.bsky.embed.external",
                "external": external,
            });
        }

        let body = json!({
            "repo": session.did,
            "collection": "app.bsky.feed.post",
            "record": record,
        });

        let response = self
            .post_json("com.atproto.repo.createRecord", &body, Some(&session.access_jwt))
            .await?;

        let uri = response
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NewsdeskError::contract("createRecord response missing uri", Some(response.to_string()))
            })?;

        // The record key is the last path segment of the AT URI.
        let rkey = uri.rsplit('/').next().unwrap_or(uri);
        let post_url = format!("https://bsky.app/profile/{}/post/{}", self.identifier, rkey);

        info!(%post_url, "published post");
        Ok(post_url)
    }

    /// Build the post text for an article: the stored promotional blurb when
    /// present, otherwise title plus truncated plain-text summary. The two
    /// fixed hashtags are always appended.
    pub fn format_article_post(article: &Article) -> String {
        let blurb = article
            .social_post
            .as_deref()
            .filter(|blurb| !blurb.trim().is_empty());

        let mut text = match blurb {
            Some(blurb) => blurb.to_string(),
            None => {
                let mut fallback = format!("📰 {}", article.title);
                let summary = article.summary.as_deref().map(strip_html).unwrap_or_default();
                if !summary.is_empty() {
                    fallback.push_str("\n\n");
                    fallback.push_str(&truncate_chars(&summary, SUMMARY_FALLBACK_CHARS));
                }
                fallback
            }
        };

        text.push_str("\n\n");
        text.push_str(POST_HASHTAGS);
        text
    }

    /// Share an article as a link-card post.
    pub async fn share_article(&self, article: &Article, article_url: &str) -> Result<String> {
        let text = Self::format_article_post(article);
        let description = article.summary.as_deref().map(strip_html).unwrap_or_default();
        let description = truncate_chars(&description, CARD_DESCRIPTION_CHARS);

        self.create_post(
            &text,
            Some(article_url),
            Some(&article.title),
            Some(&description),
            article.thumbnail_url.as_deref(),
        )
        .await
    }

    async fn ensure_session(&self) -> Result<Session> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }

        if !self.is_configured() {
            return Err(NewsdeskError::NotConfigured("Bluesky credentials"));
        }

        debug!("creating session");
        let body = json!({
            "identifier": self.identifier,
            "password": self.app_password,
        });

        let response = self
            .post_json("com.atproto.server.createSession", &body, None)
            .await?;

        let access_jwt = response
            .get("accessJwt")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NewsdeskError::contract("createSession response missing accessJwt", None)
            })?;
        let did = response
            .get("did")
            .and_then(Value::as_str)
            .ok_or_else(|| NewsdeskError::contract("createSession response missing did", None))?;

        let session = Session {
            access_jwt: access_jwt.to_string(),
            did: did.to_string(),
        };

        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Download the card image (bounded at 1 MB), normalize its MIME type
    /// and upload it as a blob, returning the provider-side reference.
    async fn upload_thumbnail(&self, session: &Session, thumb_url: &str) -> Result<Value> {
        let response = self.client.get(thumb_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsdeskError::Provider {
                status: status.as_u16(),
                message: format!("thumbnail fetch failed for {}", thumb_url),
            });
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_THUMBNAIL_BYTES {
                return Err(NewsdeskError::Validation(format!(
                    "thumbnail exceeds {} bytes",
                    MAX_THUMBNAIL_BYTES
                )));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_THUMBNAIL_BYTES {
            return Err(NewsdeskError::Validation(format!(
                "thumbnail exceeds {} bytes",
                MAX_THUMBNAIL_BYTES
            )));
        }

        let mime = normalize_image_type(&content_type);
        debug!(bytes = bytes.len(), mime, "uploading blob");

        let response = self
            .client
            .post(format!("{}/com.atproto.repo.uploadBlob", self.api_url))
            .header(AUTHORIZATION, format!("Bearer {}", session.access_jwt))
            .header(CONTENT_TYPE, mime)
            .body(bytes.to_vec())
            .send()
            .await?;

        let value = read_provider_response(response).await?;

        value
            .get("blob")
            .cloned()
            .ok_or_else(|| NewsdeskError::contract("uploadBlob response missing blob", Some(value.to_string())))
    }

    async fn post_json(&self, endpoint: &str, body: &Value, token: Option<&str>) -> Result<Value> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.api_url, endpoint))
            .json(body);

        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        read_provider_response(response).await
    }
}

async fn read_provider_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;
    let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    if !status.is_success() {
        // The provider envelope carries `message` and/or an `error` code.
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        return Err(NewsdeskError::Provider {
            status: status.as_u16(),
            message,
        });
    }

    Ok(value)
}

/// Scan post text for URL and hashtag spans. Offsets index into the UTF-8
/// encoding of the text, which is what the protocol consumes.
pub fn parse_facets(text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();
    scan_links(text, &mut facets);
    scan_hashtags(text, &mut facets);
    facets
}

fn scan_links(text: &str, facets: &mut Vec<Facet>) {
    let mut search_from = 0;

    while let Some(found) = text[search_from..].find("http") {
        let start = search_from + found;
        let rest = &text[start..];

        let scheme_len = if rest.starts_with("https://") {
            8
        } else if rest.starts_with("http://") {
            7
        } else {
            search_from = start + 4;
            continue;
        };

        let mut end = text.len();
        for (offset, c) in text[start + scheme_len..].char_indices() {
            if c.is_whitespace() || matches!(c, '<' | '>' | '[' | ']') {
                end = start + scheme_len + offset;
                break;
            }
        }

        if end == start + scheme_len {
            // Bare scheme with nothing after it; not a link.
            search_from = end;
            continue;
        }

        facets.push(Facet {
            index: ByteSpan {
                byte_start: start,
                byte_end: end,
            },
            features: vec![FacetFeature::Link {
                uri: text[start..end].to_string(),
            }],
        });

        search_from = end;
    }
}

fn scan_hashtags(text: &str, facets: &mut Vec<Facet>) {
    let mut i = 0;

    while i < text.len() {
        let c = match text[i..].chars().next() {
            Some(c) => c,
            None => break,
        };

        if c == '#' {
            let mut j = i + 1;
            while j < text.len() {
                let ch = match text[j..].chars().next() {
                    Some(ch) => ch,
                    None => break,
                };
                if is_tag_char(ch) {
                    j += ch.len_utf8();
                } else {
                    break;
                }
            }

            if j > i + 1 {
                facets.push(Facet {
                    index: ByteSpan {
                        byte_start: i,
                        byte_end: j,
                    },
                    features: vec![FacetFeature::Tag {
                        tag: text[i + 1..j].to_string(),
                    }],
                });
                i = j;
                continue;
            }
        }

        i += c.len_utf8();
    }
}

/// ASCII alphanumerics, underscore, and the Latin accented ranges.
fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('\u{00C0}'..='\u{024F}').contains(&c)
}

/// Normalize a Content-Type header against the image allow-list, falling
/// back to JPEG for anything unrecognized.
pub fn normalize_image_type(content_type: &str) -> &'static str {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|allowed| **allowed == media_type)
        .copied()
        .unwrap_or(DEFAULT_IMAGE_TYPE)
}
