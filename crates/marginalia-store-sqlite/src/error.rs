//! Error type for `marginalia-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored note has a timestamp but no author.
  #[error("comment {0}: note without author")]
  MissingAuthor(String),

  /// Attempted to update a comment that was never inserted.
  #[error("comment not found: {0}")]
  CommentNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
