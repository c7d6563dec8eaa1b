use crate::config::Config;
use crate::types::{Article, NewsdeskError, Result};
use crate::utils::{escape_html, strip_html};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Generation is slow; leave the model plenty of room.
const ANALYSIS_TIMEOUT_SECS: u64 = 120;
const MAX_TOKENS: u32 = 4096;
const PROTOCOL_VERSION: &str = "2023-06-01";

const CATEGORY_SLUGS: &str = "droits-civils-politiques, droits-economiques-sociaux, \
droits-culturels, droit-humanitaire, droits-refugies, droits-enfants, droits-femmes, \
non-discrimination";

/// Client for the external text-analysis endpoint. Stateless per call.
pub struct ContentAnalyzer {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Strict shape of the JSON object the analysis prompt demands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub social_post: Option<String>,
    pub main_points: Vec<String>,
    pub rights_analysis: RightsAnalysis,
    #[serde(default)]
    pub suggested_categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RightsAnalysis {
    #[serde(default)]
    pub civil_political_rights: RightsSection,
    #[serde(default)]
    pub economic_social_cultural_rights: RightsSection,
    #[serde(default)]
    pub international_humanitarian_law: RightsSection,
    #[serde(default)]
    pub overall_assessment: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RightsSection {
    #[serde(default)]
    pub relevant: bool,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Parsed analysis plus the two derived HTML fragments.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub title: String,
    pub summary: String,
    pub social_post: Option<String>,
    pub main_points: Vec<String>,
    pub main_points_html: String,
    pub rights_analysis: RightsAnalysis,
    pub rights_analysis_html: String,
    pub suggested_categories: Vec<String>,
}

/// Strict shape of the editorial-review JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub title: String,
    pub lead: String,
    pub sections: Vec<ReviewSection>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub char_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSection {
    pub heading: String,
    pub body: String,
}

/// Parsed review plus its rendered views.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub payload: ReviewPayload,
    pub html: String,
    /// Flat text concatenation for clipboard export.
    pub plain_text: String,
}

impl ContentAnalyzer {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(ANALYSIS_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_url: config.analysis_api_url.clone(),
            api_key: config.analysis_api_key.clone(),
            model: config.analysis_model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Analyze raw text (plus an optional source URL) into structured
    /// article fields.
    pub async fn analyze(&self, content: &str, source_url: &str) -> Result<AnalysisOutcome> {
        if content.trim().is_empty() {
            return Err(NewsdeskError::Validation("content is required".to_string()));
        }

        let prompt = build_analysis_prompt(content, source_url);
        let text = self.call_api(prompt).await?;

        debug!(chars = text.len(), "received analysis response");
        parse_analysis(&text)
    }

    /// Rewrite an existing article as a long-form editorial review.
    pub async fn generate_review(&self, article: &Article) -> Result<ReviewOutcome> {
        let prompt = build_review_prompt(article);
        let text = self.call_api(prompt).await?;

        debug!(chars = text.len(), "received review response");
        parse_review(&text)
    }

    async fn call_api(&self, prompt: String) -> Result<String> {
        if !self.is_configured() {
            return Err(NewsdeskError::NotConfigured("analysis API key"));
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        info!(model = %self.model, "calling analysis endpoint");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", PROTOCOL_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .map(|detail| detail.message)
                .unwrap_or(body);

            return Err(NewsdeskError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| NewsdeskError::contract(format!("invalid response body: {}", e), None))?;

        match parsed.content.into_iter().next() {
            Some(block) => Ok(block.text),
            None => Err(NewsdeskError::contract("response has no content block", None)),
        }
    }
}

/// Parse the raw model output of an analysis call. Fences are tolerated,
/// everything else about the shape is strict.
pub fn parse_analysis(text: &str) -> Result<AnalysisOutcome> {
    let cleaned = strip_code_fences(text);

    let payload: AnalysisPayload = serde_json::from_str(cleaned).map_err(|e| {
        NewsdeskError::contract(format!("analysis JSON: {}", e), Some(text.to_string()))
    })?;

    let main_points_html = render_main_points(&payload.main_points);
    let rights_analysis_html = render_rights_analysis(&payload.rights_analysis);

    Ok(AnalysisOutcome {
        title: payload.title,
        summary: payload.summary,
        social_post: payload.social_post,
        main_points: payload.main_points,
        main_points_html,
        rights_analysis: payload.rights_analysis,
        rights_analysis_html,
        suggested_categories: payload.suggested_categories,
    })
}

/// Parse the raw model output of a review call.
pub fn parse_review(text: &str) -> Result<ReviewOutcome> {
    let cleaned = strip_code_fences(text);

    let payload: ReviewPayload = serde_json::from_str(cleaned).map_err(|e| {
        NewsdeskError::contract(format!("review JSON: {}", e), Some(text.to_string()))
    })?;

    let html = render_review_html(&payload);
    let plain_text = render_review_plain(&payload);

    Ok(ReviewOutcome {
        payload,
        html,
        plain_text,
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

pub fn render_main_points(points: &[String]) -> String {
    let mut html = String::from("<ul>");
    for point in points {
        html.push_str("<li>");
        html.push_str(&escape_html(point));
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    html
}

/// Section-by-section rendering of the rights analysis. Only sub-domains
/// flagged relevant are rendered; the overall assessment and the
/// recommendations are appended when present.
pub fn render_rights_analysis(analysis: &RightsAnalysis) -> String {
    let mut html = String::from(r#"<div class="rights-analysis">"#);

    let sections = [
        ("Droits civils et politiques", &analysis.civil_political_rights),
        (
            "Droits économiques, sociaux et culturels",
            &analysis.economic_social_cultural_rights,
        ),
        (
            "Droit international humanitaire",
            &analysis.international_humanitarian_law,
        ),
    ];

    for (heading, section) in sections {
        if !section.relevant {
            continue;
        }
        html.push_str(r#"<div class="analysis-section">"#);
        html.push_str("<h4>");
        html.push_str(heading);
        html.push_str("</h4>");
        html.push_str(&render_section_lists(section));
        html.push_str("</div>");
    }

    if let Some(assessment) = &analysis.overall_assessment {
        if !assessment.is_empty() {
            html.push_str(r#"<div class="analysis-section overall"><h4>Évaluation globale</h4><p>"#);
            html.push_str(&escape_html(assessment));
            html.push_str("</p></div>");
        }
    }

    if !analysis.recommendations.is_empty() {
        html.push_str(r#"<div class="analysis-section recommendations"><h4>Recommandations</h4><ul>"#);
        for recommendation in &analysis.recommendations {
            html.push_str("<li>");
            html.push_str(&escape_html(recommendation));
            html.push_str("</li>");
        }
        html.push_str("</ul></div>");
    }

    html.push_str("</div>");
    html
}

fn render_section_lists(section: &RightsSection) -> String {
    let mut html = String::new();

    if !section.points.is_empty() {
        html.push_str(r#"<div class="points"><strong>Points d'attention:</strong><ul>"#);
        for point in &section.points {
            html.push_str("<li>");
            html.push_str(&escape_html(point));
            html.push_str("</li>");
        }
        html.push_str("</ul></div>");
    }

    if !section.concerns.is_empty() {
        html.push_str(r#"<div class="concerns"><strong>Préoccupations:</strong><ul>"#);
        for concern in &section.concerns {
            html.push_str(r#"<li class="concern">"#);
            html.push_str(&escape_html(concern));
            html.push_str("</li>");
        }
        html.push_str("</ul></div>");
    }

    html
}

fn render_review_html(review: &ReviewPayload) -> String {
    let mut html = String::from(r#"<article class="review">"#);
    html.push_str("<h2>");
    html.push_str(&escape_html(&review.title));
    html.push_str("</h2>");
    html.push_str(r#"<p class="lead">"#);
    html.push_str(&escape_html(&review.lead));
    html.push_str("</p>");

    for section in &review.sections {
        html.push_str("<h3>");
        html.push_str(&escape_html(&section.heading));
        html.push_str("</h3><p>");
        html.push_str(&escape_html(&section.body));
        html.push_str("</p>");
    }

    if !review.hashtags.is_empty() {
        html.push_str(r#"<p class="hashtags">"#);
        html.push_str(&escape_html(&review.hashtags.join(" ")));
        html.push_str("</p>");
    }

    html.push_str("</article>");
    html
}

fn render_review_plain(review: &ReviewPayload) -> String {
    let mut text = String::new();
    text.push_str(&review.title);
    text.push_str("\n\n");
    text.push_str(&review.lead);

    for section in &review.sections {
        text.push_str("\n\n");
        text.push_str(&section.heading);
        text.push_str("\n\n");
        text.push_str(&section.body);
    }

    if !review.hashtags.is_empty() {
        text.push_str("\n\n");
        text.push_str(&review.hashtags.join(" "));
    }

    text
}

fn build_analysis_prompt(content: &str, source_url: &str) -> String {
    format!(
        r#"Tu es un expert en droits humains, droits civils et politiques, droits économiques, sociaux et culturels, ainsi qu'en droit international humanitaire. Analyse le contenu suivant et fournis une réponse structurée en JSON.

SOURCE: {source_url}

CONTENU À ANALYSER:
{content}

---

Réponds UNIQUEMENT avec un objet JSON valide (sans markdown, sans ```json) contenant exactement cette structure:

{{
    "title": "Titre proposé pour l'article (concis et informatif)",
    "summary": "Résumé du contenu en 2-3 paragraphes",
    "social_post": "Texte court et accrocheur pour les réseaux sociaux (250 caractères maximum)",
    "main_points": [
        "Point principal 1",
        "Point principal 2",
        "Point principal 3"
    ],
    "rights_analysis": {{
        "civil_political_rights": {{
            "relevant": true,
            "points": ["Point d'attention 1", "Point d'attention 2"],
            "concerns": ["Préoccupation éventuelle"]
        }},
        "economic_social_cultural_rights": {{
            "relevant": false,
            "points": [],
            "concerns": []
        }},
        "international_humanitarian_law": {{
            "relevant": false,
            "points": [],
            "concerns": []
        }},
        "overall_assessment": "Évaluation globale sous l'angle des droits humains (2-3 phrases)",
        "recommendations": ["Recommandation 1", "Recommandation 2"]
    }},
    "suggested_categories": ["droits-civils-politiques", "non-discrimination"]
}}

Les champs "relevant" sont des booléens reflétant la pertinence réelle de chaque domaine. Les catégories disponibles sont: {categories}

Assure-toi que le JSON est valide et complet."#,
        source_url = source_url,
        content = content,
        categories = CATEGORY_SLUGS,
    )
}

fn build_review_prompt(article: &Article) -> String {
    let summary = article.summary.as_deref().map(strip_html).unwrap_or_default();
    let main_points = article.main_points.as_deref().map(strip_html).unwrap_or_default();
    let body = article.content.as_deref().map(strip_html).unwrap_or_default();

    format!(
        r##"Tu es rédacteur en chef d'une publication spécialisée en droits humains. À partir des éléments ci-dessous, rédige une recension éditoriale complète d'environ 4000 caractères (hors espaces): un regard structuré, informé et critique sur le sujet, destiné à la publication.

TITRE ORIGINAL: {title}

RÉSUMÉ:
{summary}

POINTS PRINCIPAUX:
{main_points}

CONTENU:
{body}

---

Réponds UNIQUEMENT avec un objet JSON valide (sans markdown, sans ```json) contenant exactement cette structure:

{{
    "title": "Titre de la recension",
    "lead": "Chapeau introductif en un paragraphe",
    "sections": [
        {{"heading": "Intertitre 1", "body": "Texte de la section"}},
        {{"heading": "Intertitre 2", "body": "Texte de la section"}}
    ],
    "hashtags": ["#DroitsHumains", "#Hashtag2"],
    "char_count": 4000
}}

"char_count" est le nombre de caractères hors espaces de l'ensemble rédigé. Vise 4000 caractères, répartis sur 3 à 5 sections. Assure-toi que le JSON est valide et complet."##,
        title = article.title,
        summary = summary,
        main_points = main_points,
        body = body,
    )
}
