use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::error::{AppError, Result};

/// An unvalidated record pulled out of one container element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
}

/// Selector-driven extraction. A selector that matches nothing yields
/// empty fields, or no candidates at all, never an error.
pub struct Extractor {
    container: Selector,
    title: Selector,
    link: Selector,
    summary: Option<Selector>,
    image: Option<Selector>,
    link_attr: String,
    image_attr: String,
}

impl Extractor {
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            container: parse_selector(&config.container)?,
            title: parse_selector(&config.title)?,
            link: parse_selector(&config.link)?,
            summary: config.summary.as_deref().map(parse_selector).transpose()?,
            image: config.image.as_deref().map(parse_selector).transpose()?,
            link_attr: config.link_attr.clone(),
            image_attr: config.image_attr.clone(),
        })
    }

    pub fn parse(markup: &str) -> Html {
        Html::parse_document(markup)
    }

    /// Lazily walk the container matches of `document`, one candidate each.
    pub fn candidates<'a>(&'a self, document: &'a Html) -> Candidates<'a> {
        Candidates {
            containers: document.select(&self.container),
            extractor: self,
        }
    }

    fn candidate(&self, container: ElementRef<'_>) -> Candidate {
        let title = container
            .select(&self.title)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let link = container
            .select(&self.link)
            .find_map(|el| el.value().attr(&self.link_attr))
            .map(str::to_string);

        let summary = self.summary.as_ref().and_then(|selector| {
            container.select(selector).next().map(element_text)
        });

        let image = self.image.as_ref().and_then(|selector| {
            container
                .select(selector)
                .find_map(|el| el.value().attr(&self.image_attr))
                .map(str::to_string)
        });

        Candidate {
            title,
            link,
            summary,
            image,
        }
    }
}

pub struct Candidates<'a> {
    containers: Select<'a, 'a>,
    extractor: &'a Extractor,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        let container = self.containers.next()?;
        Some(self.extractor.candidate(container))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Selector(format!("{:?}: {}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorPreset;

    const THREE_ARTICLES: &str = r#"
        <html><body>
          <article>
            <h1> Rookie hits walk-off homer </h1>
            <a href="/news/rookie-walk-off">Read</a>
            <div class="article-item__preview">Extra innings thriller.</div>
          </article>
          <article>
            <h2>Not a headline selector match</h2>
            <a href="/news/untitled">Read</a>
          </article>
          <article>
            <h1>Trade deadline recap</h1>
            <a href="https://www.mlb.com/news/deadline">Read</a>
          </article>
        </body></html>
    "#;

    #[test]
    fn one_candidate_per_container_even_without_title() {
        let extractor = Extractor::new(&SelectorPreset::Article.selectors()).unwrap();
        let document = Extractor::parse(THREE_ARTICLES);
        let candidates: Vec<Candidate> = extractor.candidates(&document).collect();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].title, " Rookie hits walk-off homer ");
        assert_eq!(candidates[0].link.as_deref(), Some("/news/rookie-walk-off"));
        assert_eq!(
            candidates[0].summary.as_deref(),
            Some("Extra innings thriller.")
        );
        assert_eq!(candidates[1].title, "");
        assert_eq!(candidates[1].summary, None);
        assert_eq!(
            candidates[2].link.as_deref(),
            Some("https://www.mlb.com/news/deadline")
        );
    }

    #[test]
    fn unmatched_container_selector_yields_nothing() {
        let extractor = Extractor::new(&SelectorPreset::Card.selectors()).unwrap();
        let document = Extractor::parse(THREE_ARTICLES);

        assert_eq!(extractor.candidates(&document).count(), 0);
    }

    #[test]
    fn card_layout_extracts_images() {
        let markup = r#"
            <div class="article-item">
              <img src="/img/thumb.jpg">
              <span class="article-item__headline">Ace signs extension</span>
              <a class="p-link">no href here</a>
              <a href="/news/ace-extension">Story</a>
            </div>
        "#;
        let extractor = Extractor::new(&SelectorPreset::Card.selectors()).unwrap();
        let document = Extractor::parse(markup);
        let candidate = extractor.candidates(&document).next().unwrap();

        assert_eq!(candidate.title, "Ace signs extension");
        assert_eq!(candidate.link.as_deref(), Some("/news/ace-extension"));
        assert_eq!(candidate.image.as_deref(), Some("/img/thumb.jpg"));
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let mut selectors = SelectorPreset::Article.selectors();
        selectors.container = "article[".to_string();

        let err = Extractor::new(&selectors).err().unwrap();
        assert!(matches!(err, AppError::Selector(_)));
    }
}
