use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::NewArticle;
use crate::scrape::{Extractor, Normalizer, PageFetcher};

use super::gateway::{ArticleSink, PersistGateway, PersistOutcome};

/// Per-run summary. `inserted + duplicates + failed + skipped == candidates`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub source: String,
    pub candidates: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Records never attempted because the run was cancelled mid-persist.
    pub skipped: usize,
    /// The page was fetched but no container matched.
    pub extraction_empty: bool,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub index: usize,
    pub title: String,
    pub link: String,
    pub error: String,
}

impl RunReport {
    fn from_outcomes(source: String, outcomes: Vec<(NewArticle, PersistOutcome)>) -> Self {
        let mut report = RunReport {
            source,
            candidates: outcomes.len(),
            extraction_empty: outcomes.is_empty(),
            ..Default::default()
        };

        for (index, (article, outcome)) in outcomes.into_iter().enumerate() {
            match outcome {
                PersistOutcome::Inserted(_) => report.inserted += 1,
                PersistOutcome::Duplicate(_) => report.duplicates += 1,
                PersistOutcome::Skipped => report.skipped += 1,
                PersistOutcome::Failed(e) => {
                    report.failed += 1;
                    report.failures.push(RecordFailure {
                        index,
                        title: article.title,
                        link: article.link,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

/// Fetch, extract, normalize, then persist one source page.
pub struct Pipeline<S> {
    source: Url,
    fetcher: PageFetcher,
    extractor: Extractor,
    normalizer: Normalizer,
    gateway: PersistGateway<S>,
}

impl<S: ArticleSink> Pipeline<S> {
    pub fn new(config: &Config, sink: Arc<S>) -> Result<Self> {
        let source = Url::parse(&config.source.url)?;
        Ok(Self {
            fetcher: PageFetcher::new(&config.fetch)?,
            extractor: Extractor::new(&config.source.selectors())?,
            normalizer: Normalizer::new(source.clone()),
            gateway: PersistGateway::new(sink, config.persist_concurrency),
            source,
        })
    }

    /// Run one ingestion pass. Flipping `cancel` to `true` aborts an in-flight
    /// fetch or extraction with `AppError::Cancelled`. Once persisting has
    /// started, cancellation instead yields a report whose unstarted records
    /// are counted as `skipped`.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> Result<RunReport> {
        tracing::info!(source = %self.source, "Starting ingestion run");

        let markup = tokio::select! {
            biased;
            _ = cancelled(cancel.clone()) => return Err(AppError::Cancelled),
            page = self.fetcher.fetch(&self.source) => page?,
        };

        self.ingest(&markup, cancel).await
    }

    /// Extract and persist records from markup that has already been fetched.
    pub async fn ingest(&self, markup: &str, cancel: watch::Receiver<bool>) -> Result<RunReport> {
        let records = self.extract(markup, &cancel)?;
        tracing::info!(candidates = records.len(), "Extracted candidates");
        if records.is_empty() {
            tracing::warn!(source = %self.source, "No containers matched; check the selector configuration");
        }

        let cancelled = *cancel.borrow();
        if cancelled {
            return Err(AppError::Cancelled);
        }

        let outcomes = self.gateway.persist_all(records, &cancel).await;

        let report = RunReport::from_outcomes(self.source.to_string(), outcomes);
        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "Run cancelled; remaining records skipped");
        }
        tracing::info!(
            candidates = report.candidates,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            skipped = report.skipped,
            "Ingestion run complete"
        );
        Ok(report)
    }

    // The parsed document is not Send, so extraction stays synchronous and
    // hands the gateway owned records.
    fn extract(&self, markup: &str, cancel: &watch::Receiver<bool>) -> Result<Vec<NewArticle>> {
        let document = Extractor::parse(markup);
        let mut records = Vec::new();
        for candidate in self.extractor.candidates(&document) {
            let cancelled = *cancel.borrow();
            if cancelled {
                return Err(AppError::Cancelled);
            }
            records.push(self.normalizer.normalize(candidate));
        }
        Ok(records)
    }
}

async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone without cancelling: this run can no longer be cancelled.
            std::future::pending::<()>().await;
        }
    }
}
