use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const DB_ENV_VAR: &str = "HEADLINE_KEEPER_DB";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    /// Maximum number of insert attempts in flight during one run.
    #[serde(default = "default_persist_concurrency")]
    pub persist_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,

    #[serde(default)]
    pub preset: SelectorPreset,

    /// Per-field overrides applied on top of the preset.
    #[serde(default)]
    pub selectors: SelectorOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorPreset {
    /// `<article>` containers with an `<h1>` headline.
    #[default]
    Article,
    /// Div-based card layout carrying a thumbnail image.
    Card,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorOverrides {
    pub container: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub link_attr: Option<String>,
    pub image_attr: Option<String>,
}

/// Fully resolved selectors handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    pub container: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub link_attr: String,
    pub image_attr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("headline-keeper");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_source_url() -> String {
    "https://www.mlb.com/news".to_string()
}

fn default_persist_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("headline-keeper/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source: SourceConfig::default(),
            fetch: FetchConfig::default(),
            persist_concurrency: default_persist_concurrency(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            preset: SelectorPreset::default(),
            selectors: SelectorOverrides::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl SelectorPreset {
    pub fn selectors(self) -> SelectorConfig {
        match self {
            SelectorPreset::Article => SelectorConfig {
                container: "article".to_string(),
                title: "h1".to_string(),
                link: "a".to_string(),
                summary: Some("div.article-item__preview".to_string()),
                image: None,
                link_attr: "href".to_string(),
                image_attr: "src".to_string(),
            },
            SelectorPreset::Card => SelectorConfig {
                container: "div.article-item".to_string(),
                title: ".article-item__headline".to_string(),
                link: "a".to_string(),
                summary: Some(".article-item__preview".to_string()),
                image: Some("img".to_string()),
                link_attr: "href".to_string(),
                image_attr: "src".to_string(),
            },
        }
    }
}

impl SourceConfig {
    pub fn selectors(&self) -> SelectorConfig {
        let mut resolved = self.preset.selectors();
        let overrides = &self.selectors;

        if let Some(container) = &overrides.container {
            resolved.container = container.clone();
        }
        if let Some(title) = &overrides.title {
            resolved.title = title.clone();
        }
        if let Some(link) = &overrides.link {
            resolved.link = link.clone();
        }
        if overrides.summary.is_some() {
            resolved.summary = overrides.summary.clone();
        }
        if overrides.image.is_some() {
            resolved.image = overrides.image.clone();
        }
        if let Some(attr) = &overrides.link_attr {
            resolved.link_attr = attr.clone();
        }
        if let Some(attr) = &overrides.image_attr {
            resolved.image_attr = attr.clone();
        }

        resolved
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads the config at `path`, writing the defaults there first if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        if let Ok(db_path) = std::env::var(DB_ENV_VAR) {
            if !db_path.is_empty() {
                config.db_path = db_path;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("headline-keeper")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.url)
            .map_err(|e| AppError::Config(format!("source.url {:?}: {}", self.source.url, e)))?;
        if self.persist_concurrency == 0 {
            return Err(AppError::Config(
                "persist_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
