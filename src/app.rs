use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;

use crate::cli::Command;
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::ingest::{Pipeline, RunReport};
use crate::models::NewNote;

pub struct App {
    repository: Arc<Repository>,
    pipeline: Pipeline<Repository>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Arc::new(Repository::open(&config.db_path).await?);
        let pipeline = Pipeline::new(config, Arc::clone(&repository))?;

        Ok(Self {
            repository,
            pipeline,
        })
    }

    /// Run one command and return its JSON response body.
    pub async fn handle_command(
        &self,
        command: Command,
        cancel: watch::Receiver<bool>,
    ) -> Result<Value> {
        let response = match command {
            Command::Scrape => {
                let report = self.scrape(cancel).await?;
                serde_json::to_value(report)?
            }

            Command::List { saved } => {
                let articles = if saved {
                    self.repository.list_saved().await?
                } else {
                    self.repository.list_all().await?
                };
                serde_json::to_value(articles)?
            }

            Command::Show { id } => serde_json::to_value(self.repository.get_article(id).await?)?,

            Command::Save { id } => {
                let article = self.repository.mark_saved(id).await?;
                tracing::info!(id, "Saved article");
                serde_json::to_value(article)?
            }

            Command::Note { id, title, body } => {
                let article = self
                    .repository
                    .attach_note(id, NewNote { title, body })
                    .await?;
                tracing::info!(id, note_id = ?article.note.as_ref().map(|n| n.id), "Attached note");
                serde_json::to_value(article)?
            }

            Command::Unsave { id } => {
                let article = self.repository.unsave(id).await?;
                tracing::info!(id, saved = article.saved, "Unsaved article");
                serde_json::to_value(article)?
            }

            Command::ShowNote { id } => serde_json::to_value(self.repository.get_note(id).await?)?,

            Command::Clear => {
                let report = self.repository.clear_all().await?;
                tracing::info!(
                    articles = report.articles_removed,
                    notes = report.notes_removed,
                    "articles & notes removed"
                );
                json!({
                    "message": "articles & notes removed!",
                    "articles_removed": report.articles_removed,
                    "notes_removed": report.notes_removed,
                })
            }
        };

        Ok(response)
    }

    pub async fn scrape(&self, cancel: watch::Receiver<bool>) -> Result<RunReport> {
        self.pipeline.run(cancel).await
    }

    /// Close the store. The pipeline holds the other handle, so it goes first.
    pub async fn shutdown(self) -> Result<()> {
        let App {
            repository,
            pipeline,
        } = self;
        drop(pipeline);

        match Arc::try_unwrap(repository) {
            Ok(repository) => repository.close().await,
            Err(_) => {
                tracing::warn!("Store still shared at shutdown; leaving it to drop");
                Ok(())
            }
        }
    }
}
