use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("storage error during {stage}: {source}")]
    Persist {
        stage: &'static str,
        #[source]
        source: tokio_rusqlite::Error,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl AppError {
    /// Builds a mapper that tags a storage error with the operation it came from.
    pub fn persist(stage: &'static str) -> impl FnOnce(tokio_rusqlite::Error) -> AppError {
        move |source| AppError::Persist { stage, source }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
