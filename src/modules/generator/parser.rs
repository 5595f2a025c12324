//! Splits marker-formatted generator output into post fields.
//!
//! Markers are matched literally and only their first occurrence counts,
//! so a body that itself contains `CODE:` or `EXCERPT:` can misparse.

use serde::Serialize;

const TITLE_MARKER: &str = "TITLE:";
const EXCERPT_MARKER: &str = "EXCERPT:";
const CODE_MARKER: &str = "CODE:";

/// A generated draft. Fields are empty when their marker is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedPost {
    pub title: String,
    pub excerpt: String,
    #[serde(rename = "generated_code")]
    pub html_body: String,
}

pub fn parse_generation(raw: &str) -> GeneratedPost {
    GeneratedPost {
        title: section(raw, TITLE_MARKER, EXCERPT_MARKER),
        excerpt: section(raw, EXCERPT_MARKER, CODE_MARKER),
        html_body: raw
            .split_once(CODE_MARKER)
            .map(|(_, code)| strip_fences(code).trim().to_string())
            .unwrap_or_default(),
    }
}

/// Text after the first `marker`, up to `until` or the end, trimmed.
fn section(raw: &str, marker: &str, until: &str) -> String {
    raw.split_once(marker)
        .map(|(_, rest)| rest.split_once(until).map_or(rest, |(head, _)| head))
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn strip_fences(code: &str) -> String {
    code.replace("```html", "").replace("```", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_markers_in_order() {
        let post = parse_generation("TITLE: Foo\nEXCERPT: Bar\nCODE: ```html\n<div>Hi</div>\n```");
        assert_eq!(
            post,
            GeneratedPost {
                title: "Foo".into(),
                excerpt: "Bar".into(),
                html_body: "<div>Hi</div>".into(),
            }
        );
    }

    #[test]
    fn unfenced_code_is_kept_whole() {
        let raw = "TITLE:  The Quiet Orbit \nEXCERPT: Why small satellites matter.\n\nCODE:\n<!DOCTYPE html>\n<html><body><h1>Orbit</h1></body></html>\n";
        let post = parse_generation(raw);
        assert_eq!(post.title, "The Quiet Orbit");
        assert_eq!(post.excerpt, "Why small satellites matter.");
        assert_eq!(
            post.html_body,
            "<!DOCTYPE html>\n<html><body><h1>Orbit</h1></body></html>"
        );
    }

    #[test]
    fn missing_title_marker_gives_empty_title() {
        let post = parse_generation("EXCERPT: Bar\nCODE: <p>x</p>");
        assert_eq!(post.title, "");
        assert_eq!(post.excerpt, "Bar");
        assert_eq!(post.html_body, "<p>x</p>");
    }

    #[test]
    fn no_markers_gives_empty_fields() {
        assert_eq!(parse_generation("just some prose"), GeneratedPost::default());
        assert_eq!(parse_generation(""), GeneratedPost::default());
    }

    #[test]
    fn title_runs_to_the_end_without_excerpt() {
        let post = parse_generation("TITLE: Lonely title\n");
        assert_eq!(post.title, "Lonely title");
        assert_eq!(post.excerpt, "");
        assert_eq!(post.html_body, "");
    }

    #[test]
    fn excerpt_stops_at_code_marker() {
        let post = parse_generation("EXCERPT: short summary CODE: <main></main>");
        assert_eq!(post.excerpt, "short summary");
        assert_eq!(post.html_body, "<main></main>");
    }

    #[test]
    fn only_first_marker_occurrence_counts() {
        let post = parse_generation("TITLE: A\nEXCERPT: B\nCODE: <p>TITLE: not a title</p>");
        assert_eq!(post.title, "A");
        assert_eq!(post.html_body, "<p>TITLE: not a title</p>");
    }

    #[test]
    fn serializes_body_as_generated_code() {
        let value = serde_json::to_value(parse_generation("CODE: <p/>")).unwrap();
        assert_eq!(value["generated_code"], "<p/>");
        assert_eq!(value["title"], "");
        assert!(value.get("html_body").is_none());
    }
}
