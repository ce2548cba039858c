use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::db::{DuplicateKey, InsertOutcome, Repository};
use crate::error::{AppError, Result};
use crate::models::NewArticle;

/// Anything that can insert an article with atomic insert-if-absent semantics.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome>;
}

#[async_trait]
impl ArticleSink for Repository {
    async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
        Repository::insert_article(self, article).await
    }
}

/// Fate of one record handed to the gateway.
#[derive(Debug)]
pub enum PersistOutcome {
    Inserted(i64),
    Duplicate(DuplicateKey),
    Failed(AppError),
    /// Not attempted because the run was cancelled first.
    Skipped,
}

pub struct PersistGateway<S> {
    sink: Arc<S>,
    concurrency: usize,
}

impl<S: ArticleSink> PersistGateway<S> {
    pub fn new(sink: Arc<S>, concurrency: usize) -> Self {
        Self {
            sink,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn persist(&self, article: NewArticle) -> PersistOutcome {
        match self.sink.insert_article(article).await {
            Ok(InsertOutcome::Inserted(id)) => PersistOutcome::Inserted(id),
            Ok(InsertOutcome::Duplicate(key)) => PersistOutcome::Duplicate(key),
            Err(e) => PersistOutcome::Failed(e),
        }
    }

    /// Persist every record independently, with at most `concurrency` inserts
    /// in flight. Results come back in input order, paired with the record.
    ///
    /// `cancel` is checked before each insert starts. Inserts already in flight
    /// finish; records not yet started come back as `Skipped`.
    pub async fn persist_all(
        &self,
        articles: Vec<NewArticle>,
        cancel: &watch::Receiver<bool>,
    ) -> Vec<(NewArticle, PersistOutcome)> {
        let mut results: Vec<(usize, NewArticle, PersistOutcome)> =
            stream::iter(articles.into_iter().enumerate())
                .map(|(index, article)| {
                    let cancel = cancel.clone();
                    async move {
                        let cancelled = *cancel.borrow();
                        if cancelled {
                            return (index, article, PersistOutcome::Skipped);
                        }
                        let outcome = self.persist(article.clone()).await;
                        match &outcome {
                            PersistOutcome::Inserted(id) => {
                                tracing::debug!(index, id, title = %article.title, "Inserted article");
                            }
                            PersistOutcome::Duplicate(key) => {
                                tracing::debug!(index, ?key, title = %article.title, "Skipped duplicate article");
                            }
                            PersistOutcome::Failed(e) => {
                                tracing::warn!(index, error = %e, link = %article.link, "Failed to persist article");
                            }
                            PersistOutcome::Skipped => {}
                        }
                        (index, article, outcome)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, article, outcome)| (article, outcome))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    /// In-memory sink enforcing the same uniqueness rules as the store, with
    /// the option to fail any record whose title contains a marker.
    #[derive(Default)]
    pub(crate) struct MemorySink {
        titles: Mutex<HashSet<String>>,
        links: Mutex<HashSet<String>>,
        fail_marker: Option<String>,
    }

    impl MemorySink {
        pub(crate) fn failing_on(marker: &str) -> Self {
            Self {
                fail_marker: Some(marker.to_string()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ArticleSink for MemorySink {
        async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
            if let Some(marker) = &self.fail_marker {
                if article.title.contains(marker.as_str()) {
                    return Err(AppError::persist("insert_article")(
                        tokio_rusqlite::Error::ConnectionClosed,
                    ));
                }
            }

            let mut titles = self.titles.lock().await;
            let mut links = self.links.lock().await;
            if titles.contains(&article.title) {
                return Ok(InsertOutcome::Duplicate(DuplicateKey::Title));
            }
            if links.contains(&article.link) {
                return Ok(InsertOutcome::Duplicate(DuplicateKey::Link));
            }
            titles.insert(article.title);
            links.insert(article.link);
            Ok(InsertOutcome::Inserted(titles.len() as i64))
        }
    }

    pub(crate) fn not_cancelled() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    fn record(title: &str, link: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            link: link.to_string(),
            summary: None,
            image: None,
        }
    }

    #[test]
    fn sink_errors_become_failed_outcomes() {
        let gateway = PersistGateway::new(Arc::new(MemorySink::failing_on("x")), 1);

        let outcome = tokio_test::block_on(gateway.persist(record("x marks", "https://example.com/x")));

        assert!(matches!(
            outcome,
            PersistOutcome::Failed(AppError::Persist {
                stage: "insert_article",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn failures_do_not_stop_remaining_records() {
        let gateway = PersistGateway::new(Arc::new(MemorySink::failing_on("BROKEN")), 2);

        let results = gateway
            .persist_all(
                vec![
                    record("first", "https://example.com/1"),
                    record("BROKEN second", "https://example.com/2"),
                    record("third", "https://example.com/3"),
                ],
                &not_cancelled(),
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].1, PersistOutcome::Inserted(_)));
        assert!(matches!(results[1].1, PersistOutcome::Failed(_)));
        assert!(matches!(results[2].1, PersistOutcome::Inserted(_)));
        assert_eq!(results[2].0.title, "third");
    }

    #[tokio::test]
    async fn same_link_different_title_is_one_insert() {
        let gateway = PersistGateway::new(Arc::new(MemorySink::default()), 1);

        let results = gateway
            .persist_all(
                vec![
                    record("first", "https://example.com/same"),
                    record("second", "https://example.com/same"),
                ],
                &not_cancelled(),
            )
            .await;

        assert!(matches!(results[0].1, PersistOutcome::Inserted(_)));
        assert!(matches!(
            results[1].1,
            PersistOutcome::Duplicate(DuplicateKey::Link)
        ));
    }

    #[tokio::test]
    async fn repository_sink_classifies_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.db");
        let repo = Arc::new(Repository::open(path.to_str().unwrap()).await.unwrap());
        let gateway = PersistGateway::new(repo, 4);

        let results = gateway
            .persist_all(
                vec![
                    record("same title", "https://example.com/1"),
                    record("same title", "https://example.com/2"),
                    record("other", "https://example.com/3"),
                ],
                &not_cancelled(),
            )
            .await;

        let inserted = results
            .iter()
            .filter(|(_, o)| matches!(o, PersistOutcome::Inserted(_)))
            .count();
        let duplicates = results
            .iter()
            .filter(|(_, o)| matches!(o, PersistOutcome::Duplicate(DuplicateKey::Title)))
            .count();
        assert_eq!(inserted, 2);
        assert_eq!(duplicates, 1);
    }

    /// Inserts slowly and flips the cancel signal once the first insert lands.
    struct CancellingSink {
        inner: MemorySink,
        cancel: watch::Sender<bool>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl ArticleSink for CancellingSink {
        async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
            tokio::time::sleep(self.delay).await;
            let outcome = self.inner.insert_article(article).await?;
            self.cancel.send(true).ok();
            Ok(outcome)
        }
    }

    #[tokio::test]
    async fn records_after_cancellation_are_skipped() {
        let (tx, rx) = watch::channel(false);
        let sink = CancellingSink {
            inner: MemorySink::default(),
            cancel: tx,
            delay: std::time::Duration::from_millis(20),
        };
        let gateway = PersistGateway::new(Arc::new(sink), 1);

        let results = gateway
            .persist_all(
                vec![
                    record("first", "https://example.com/1"),
                    record("second", "https://example.com/2"),
                    record("third", "https://example.com/3"),
                ],
                &rx,
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].1, PersistOutcome::Inserted(_)));
        assert!(matches!(results[1].1, PersistOutcome::Skipped));
        assert!(matches!(results[2].1, PersistOutcome::Skipped));
    }
}
