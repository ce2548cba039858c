use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Note;

/// A stored article. `title` and `link` are each unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub saved: bool,
    /// Populated from the notes table when the article references one.
    pub note: Option<Note>,
    pub created_at: DateTime<Utc>,
}

/// A normalized record ready to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub image: Option<String>,
}
