use scraper::Html;

/// Strip markup from a rich-text field and decode HTML entities, returning
/// plain text suitable for visible-length arithmetic.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    // Parsing preserves source whitespace; collapse it so lengths are stable.
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` visible characters, appending `...` when cut. Operates
/// on characters, never bytes, so multi-byte text cannot be split mid-glyph.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Minimal HTML escaping for text interpolated into rendered fragments.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags_and_decodes_entities() {
        let text = strip_html("<p>L&eacute;galit&eacute; &amp; <strong>justice</strong></p>");
        assert_eq!(text, "Légalité & justice");
    }

    #[test]
    fn truncate_is_character_aware() {
        // 10 two-byte characters; a byte-based cut at 8 would panic or split.
        let text = "éééééééééé";
        let cut = truncate_chars(text, 8);
        assert_eq!(cut.chars().count(), 8);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_chars("court", 200), "court");
    }

    #[test]
    fn escape_html_covers_special_characters() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
