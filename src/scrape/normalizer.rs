use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::models::NewArticle;

use super::Candidate;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// Turns raw candidates into canonical records: text is trimmed with inner
/// whitespace runs collapsed, and relative links resolve against the source.
pub struct Normalizer {
    base: Url,
}

impl Normalizer {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn normalize(&self, candidate: Candidate) -> NewArticle {
        NewArticle {
            title: clean_text(&candidate.title),
            link: candidate
                .link
                .as_deref()
                .and_then(|href| self.resolve_url(href))
                .unwrap_or_default(),
            summary: candidate
                .summary
                .as_deref()
                .map(clean_text)
                .filter(|s| !s.is_empty()),
            image: candidate
                .image
                .as_deref()
                .and_then(|src| self.resolve_url(src)),
        }
    }

    /// Resolve a potentially relative URL against the source URL
    fn resolve_url(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        match self.base.join(href) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                tracing::debug!(%href, error = %e, "Keeping unresolvable link as-is");
                Some(href.to_string())
            }
        }
    }
}

fn clean_text(text: &str) -> String {
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    whitespace.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(Url::parse("https://www.mlb.com/news").unwrap())
    }

    #[test]
    fn trims_and_collapses_text() {
        let article = normalizer().normalize(Candidate {
            title: "\n   Rookie   hits\twalk-off  ".to_string(),
            link: Some(" https://www.mlb.com/news/rookie ".to_string()),
            summary: Some("  Extra\n innings. ".to_string()),
            image: None,
        });

        assert_eq!(article.title, "Rookie hits walk-off");
        assert_eq!(article.link, "https://www.mlb.com/news/rookie");
        assert_eq!(article.summary.as_deref(), Some("Extra innings."));
    }

    #[test]
    fn resolves_relative_links_against_source() {
        let article = normalizer().normalize(Candidate {
            title: "Deadline".to_string(),
            link: Some("/news/deadline-recap".to_string()),
            summary: None,
            image: Some("//img.mlbstatic.com/thumb.jpg".to_string()),
        });

        assert_eq!(article.link, "https://www.mlb.com/news/deadline-recap");
        assert_eq!(
            article.image.as_deref(),
            Some("https://img.mlbstatic.com/thumb.jpg")
        );
    }

    #[test]
    fn absent_fields_stay_empty() {
        let article = normalizer().normalize(Candidate {
            title: String::new(),
            link: None,
            summary: Some("   ".to_string()),
            image: None,
        });

        assert_eq!(article.title, "");
        assert_eq!(article.link, "");
        assert_eq!(article.summary, None);
        assert_eq!(article.image, None);
    }
}
