use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod db;
mod error;
mod ingest;
mod models;
mod scrape;

use app::App;
use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr so stdout carries only the JSON response
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok(),
            args.verbose,
        ))
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    tracing::debug!(db_path = %config.db_path, source = %config.source.url, "Loaded configuration");

    let app = App::new(&config)
        .await
        .context("failed to initialize article store")?;

    // Ctrl-C cancels an in-flight scrape
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            cancel_tx.send(true).ok();
        }
    });

    let result = app.handle_command(args.command.clone(), cancel_rx).await;
    app.shutdown().await.context("failed to close article store")?;

    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = ?args.command, error = %e, "Command failed");
            Err(e.into())
        }
    }
}

/// `RUST_LOG` wins when it parses; otherwise `-v` picks debug over info.
fn log_filter(rust_log: Option<String>, verbose: bool) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn rust_log_overrides_the_default_level() {
        let filter = log_filter(Some("debug".to_string()), false);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn verbose_flag_applies_without_rust_log() {
        assert_eq!(log_filter(None, true).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(None, false).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn unparseable_rust_log_falls_back() {
        let filter = log_filter(Some("headline_keeper=loud".to_string()), false);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
