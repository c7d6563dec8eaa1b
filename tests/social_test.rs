use chrono::Utc;
use newsdesk::social::{normalize_image_type, parse_facets, BlueskyPublisher, FacetFeature};
use newsdesk::types::{Article, ArticleStatus};

fn article(title: &str, social_post: Option<&str>, summary: Option<&str>) -> Article {
    Article {
        id: 1,
        title: title.to_string(),
        slug: "slug".to_string(),
        source_url: None,
        source_content: None,
        summary: summary.map(str::to_string),
        social_post: social_post.map(str::to_string),
        main_points: None,
        rights_analysis: None,
        content: None,
        review: None,
        thumbnail_url: None,
        status: ArticleStatus::Published,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        categories: Vec::new(),
    }
}

/// Every facet span, re-sliced from the UTF-8 encoding, must bound exactly
/// the substring it annotates.
fn assert_span_is(text: &str, facet: &newsdesk::social::Facet, expected: &str) {
    let bytes = text.as_bytes();
    let sliced = &bytes[facet.index.byte_start..facet.index.byte_end];
    assert_eq!(sliced, expected.as_bytes());
}

#[test]
fn facets_bound_url_and_hashtag_substrings() {
    let text = "Voir https://ex.am/p #Droits";
    let facets = parse_facets(text);
    assert_eq!(facets.len(), 2);

    assert_span_is(text, &facets[0], "https://ex.am/p");
    assert!(matches!(
        &facets[0].features[0],
        FacetFeature::Link { uri } if uri == "https://ex.am/p"
    ));

    assert_span_is(text, &facets[1], "#Droits");
    assert!(matches!(
        &facets[1].features[0],
        FacetFeature::Tag { tag } if tag == "Droits"
    ));
}

#[test]
fn facet_offsets_are_bytes_not_characters() {
    // The sun glyph is three bytes but one character: a character-based
    // offset would be 2, the byte offset must be 4.
    let text = "☀ https://ex.am";
    let facets = parse_facets(text);

    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0].index.byte_start, 4);
    assert_span_is(text, &facets[0], "https://ex.am");
}

#[test]
fn facets_survive_multibyte_text_before_both_spans() {
    let text = "Déjà vu — été https://ex.am/p, voir #Résistance.";
    let facets = parse_facets(text);

    // Commas are legal URL bytes; the scanner stops at whitespace and
    // brackets only, so the trailing comma stays inside the span.
    assert_span_is(text, &facets[0], "https://ex.am/p,");
    assert_span_is(text, &facets[1], "#Résistance");
    assert!(matches!(
        &facets[1].features[0],
        FacetFeature::Tag { tag } if tag == "Résistance"
    ));
}

#[test]
fn url_scanning_stops_at_whitespace_and_brackets() {
    let text = "liens [https://a.example/un] et <https://b.example/deux> fin";
    let facets = parse_facets(text);

    let urls: Vec<String> = facets
        .iter()
        .filter_map(|facet| match &facet.features[0] {
            FacetFeature::Link { uri } => Some(uri.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(urls, vec!["https://a.example/un", "https://b.example/deux"]);
}

#[test]
fn bare_scheme_and_empty_hash_are_not_facets() {
    assert!(parse_facets("le protocole https:// seul").is_empty());
    assert!(parse_facets("un # isolé").is_empty());
}

#[test]
fn hashtag_stops_at_punctuation() {
    let text = "fin de phrase #Droits.";
    let facets = parse_facets(text);
    assert_eq!(facets.len(), 1);
    assert_span_is(text, &facets[0], "#Droits");
}

#[test]
fn post_text_prefers_the_stored_blurb() {
    let article = article(
        "Titre",
        Some("Un texte accrocheur prêt à publier"),
        Some("<p>Résumé ignoré</p>"),
    );

    let text = BlueskyPublisher::format_article_post(&article);
    assert!(text.starts_with("Un texte accrocheur prêt à publier"));
    assert!(text.ends_with("#DroitsHumains #Veille"));
    assert!(!text.contains("Résumé ignoré"));
}

#[test]
fn post_text_falls_back_to_title_and_clean_truncated_summary() {
    let long_summary = format!("<p>D&eacute;but {}</p>", "x".repeat(400));
    let article = article("Un titre", None, Some(&long_summary));

    let text = BlueskyPublisher::format_article_post(&article);
    assert!(text.starts_with("📰 Un titre"));
    assert!(text.contains("Début"), "entities decode before counting");
    assert!(!text.contains("<p>"), "markup is stripped");
    assert!(text.ends_with("#DroitsHumains #Veille"));

    // Body between title and hashtags is capped at 200 visible characters.
    let body = text
        .strip_prefix("📰 Un titre\n\n")
        .and_then(|rest| rest.strip_suffix("\n\n#DroitsHumains #Veille"))
        .unwrap();
    assert!(body.chars().count() <= 200);
    assert!(body.ends_with("..."));
}

#[test]
fn post_text_without_summary_is_title_plus_hashtags() {
    let article = article("Juste un titre", None, None);
    let text = BlueskyPublisher::format_article_post(&article);
    assert_eq!(text, "📰 Juste un titre\n\n#DroitsHumains #Veille");
}

#[test]
fn image_types_normalize_against_the_allow_list() {
    assert_eq!(normalize_image_type("image/png"), "image/png");
    assert_eq!(normalize_image_type("image/webp"), "image/webp");
    assert_eq!(normalize_image_type("IMAGE/GIF"), "image/gif");
    assert_eq!(normalize_image_type("image/jpeg; charset=binary"), "image/jpeg");
    assert_eq!(normalize_image_type("text/html"), "image/jpeg");
    assert_eq!(normalize_image_type(""), "image/jpeg");
}
