use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, NewArticle, NewNote, Note};

use super::schema::SCHEMA;

const ARTICLE_SELECT: &str = r#"SELECT a.id, a.title, a.link, a.summary, a.image, a.saved, a.created_at,
                                      n.id, n.title, n.body, n.created_at
                               FROM articles a
                               LEFT JOIN notes n ON n.id = a.note_id"#;

/// Which natural key an insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKey {
    Title,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate(DuplicateKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub articles_removed: usize,
    pub notes_removed: usize,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .await
            .map_err(AppError::persist("open"))?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(AppError::persist("migrate"))?;

        tracing::debug!(%db_path, "Opened article store");
        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(AppError::persist("close"))
    }

    // Ingestion

    /// Insert a new article. A collision on `title` or `link` is reported as
    /// a duplicate and leaves the existing row untouched.
    pub async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
        let outcome = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO articles (title, link, summary, image) VALUES (?1, ?2, ?3, ?4)",
                    params![article.title, article.link, article.summary, article.image],
                );
                match inserted {
                    Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
                    Err(err) => match duplicate_key(&err) {
                        Some(key) => Ok(InsertOutcome::Duplicate(key)),
                        None => Err(err.into()),
                    },
                }
            })
            .await
            .map_err(AppError::persist("insert_article"))?;
        Ok(outcome)
    }

    // Queries

    pub async fn list_all(&self) -> Result<Vec<Article>> {
        self.list_where("1 = 1", "list_all").await
    }

    pub async fn list_saved(&self) -> Result<Vec<Article>> {
        self.list_where("a.saved = 1", "list_saved").await
    }

    async fn list_where(&self, filter: &'static str, stage: &'static str) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{} WHERE {} ORDER BY a.id DESC", ARTICLE_SELECT, filter))?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await
            .map_err(AppError::persist(stage))?;
        Ok(articles)
    }

    pub async fn get_article(&self, id: i64) -> Result<Article> {
        self.conn
            .call(move |conn| Ok(select_article(conn, id)?))
            .await
            .map_err(AppError::persist("get_article"))?
            .ok_or_else(|| AppError::not_found("article", id))
    }

    pub async fn get_note(&self, id: i64) -> Result<Note> {
        self.conn
            .call(move |conn| {
                let note = conn
                    .query_row(
                        "SELECT id, title, body, created_at FROM notes WHERE id = ?1",
                        params![id],
                        note_from_row,
                    )
                    .optional()?;
                Ok(note)
            })
            .await
            .map_err(AppError::persist("get_note"))?
            .ok_or_else(|| AppError::not_found("note", id))
    }

    #[cfg(test)]
    pub async fn count_notes(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(AppError::persist("count_notes"))?;
        Ok(count as usize)
    }

    // Curation

    pub async fn mark_saved(&self, id: i64) -> Result<Article> {
        self.conn
            .call(move |conn| {
                let changed =
                    conn.execute("UPDATE articles SET saved = 1 WHERE id = ?1", params![id])?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_article(conn, id)?)
            })
            .await
            .map_err(AppError::persist("mark_saved"))?
            .ok_or_else(|| AppError::not_found("article", id))
    }

    /// Create a note and point the article at it, in one transaction. The
    /// article is marked saved as well. A note previously attached to the
    /// article is left in place, unreferenced.
    pub async fn attach_note(&self, id: i64, note: NewNote) -> Result<Article> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO notes (title, body) VALUES (?1, ?2)",
                    params![note.title, note.body],
                )?;
                let note_id = tx.last_insert_rowid();
                let changed = tx.execute(
                    "UPDATE articles SET note_id = ?1, saved = 1 WHERE id = ?2",
                    params![note_id, id],
                )?;
                if changed == 0 {
                    // Dropping the transaction rolls back the note insert.
                    return Ok(None);
                }
                let article = select_article(&tx, id)?;
                tx.commit()?;
                Ok(article)
            })
            .await
            .map_err(AppError::persist("attach_note"))?
            .ok_or_else(|| AppError::not_found("article", id))
    }

    /// Clear both `saved` and the note reference. The note row itself survives.
    pub async fn unsave(&self, id: i64) -> Result<Article> {
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET saved = 0, note_id = NULL WHERE id = ?1",
                    params![id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(select_article(conn, id)?)
            })
            .await
            .map_err(AppError::persist("unsave"))?
            .ok_or_else(|| AppError::not_found("article", id))
    }

    /// Delete every article, then every note. Empty tables are not an error.
    pub async fn clear_all(&self) -> Result<ClearReport> {
        let report = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let articles_removed = tx.execute("DELETE FROM articles", [])?;
                let notes_removed = tx.execute("DELETE FROM notes", [])?;
                tx.commit()?;
                Ok(ClearReport {
                    articles_removed,
                    notes_removed,
                })
            })
            .await
            .map_err(AppError::persist("clear_all"))?;
        Ok(report)
    }
}

fn duplicate_key(err: &rusqlite::Error) -> Option<DuplicateKey> {
    match err {
        rusqlite::Error::SqliteFailure(e, message)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            let message = message.as_deref().unwrap_or_default();
            if message.contains("articles.title") {
                Some(DuplicateKey::Title)
            } else {
                Some(DuplicateKey::Link)
            }
        }
        _ => None,
    }
}

fn select_article(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Article>> {
    conn.query_row(
        &format!("{} WHERE a.id = ?1", ARTICLE_SELECT),
        params![id],
        article_from_row,
    )
    .optional()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format, e.g. "2026-01-11 12:34:56"
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(raw: String) -> DateTime<Utc> {
    parse_datetime(&raw).unwrap_or_else(Utc::now)
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    let note = match row.get::<_, Option<i64>>(7)? {
        Some(note_id) => Some(Note {
            id: note_id,
            title: row.get(8)?,
            body: row.get(9)?,
            created_at: timestamp(row.get(10)?),
        }),
        None => None,
    };

    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        summary: row.get(3)?,
        image: row.get(4)?,
        saved: row.get::<_, i64>(5)? != 0,
        note,
        created_at: timestamp(row.get(6)?),
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        created_at: timestamp(row.get(3)?),
    })
}
