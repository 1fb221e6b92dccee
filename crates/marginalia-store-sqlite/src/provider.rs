//! [`SqliteProvider`] — the SQLite implementation of [`CommentProvider`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use marginalia_core::{
  comment::{Comment, CommentId},
  error::BackendError,
  provider::CommentProvider,
};

use crate::{
  encode::{decode_uuid, encode_dt, encode_notes, encode_path, encode_uuid, RawComment},
  schema::SCHEMA,
  Error, Result,
};

// ─── Provider ────────────────────────────────────────────────────────────────

/// Review comments kept in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteProvider {
  conn: tokio_rusqlite::Connection,
  name: String,
  user: String,
}

impl SqliteProvider {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    name: impl Into<String>,
    user: impl Into<String>,
  ) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let provider = Self { conn, name: name.into(), user: user.into() };
    provider.init_schema().await?;
    tracing::debug!(path = %path.display(), provider = %provider.name, "opened comment store");
    Ok(provider)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(name: impl Into<String>, user: impl Into<String>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let provider = Self { conn, name: name.into(), user: user.into() };
    provider.init_schema().await?;
    Ok(provider)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every comment on `file`, in insertion order.
  pub async fn load(&self, file: &Path) -> Result<Vec<Comment>> {
    let path_str = encode_path(file);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT comment_id, file_path, line, line_count, revision, resolved, notes_json
           FROM comments
           WHERE file_path = ?1
           ORDER BY seq",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![path_str], |row| {
            Ok(RawComment {
              comment_id: row.get(0)?,
              file_path:  row.get(1)?,
              line:       row.get(2)?,
              line_count: row.get(3)?,
              revision:   row.get(4)?,
              resolved:   row.get(5)?,
              notes_json: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    let provider = self.provider_ref();
    raws.into_iter().map(|raw| raw.into_comment(&provider)).collect()
  }

  /// Files that have at least one comment, sorted by path.
  pub async fn files(&self) -> Result<Vec<PathBuf>> {
    let paths: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT file_path FROM comments ORDER BY file_path")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(paths.into_iter().map(PathBuf::from).collect())
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert a comment without id under a fresh UUID, or update the notes,
  /// resolution and extent of an existing one.
  pub async fn save(&self, comment: Comment) -> Result<Comment> {
    let comment = match comment.provider() {
      Some(_) => comment,
      None => comment.with_provider(self.provider_ref()),
    };
    match comment.id() {
      None => self.insert(comment).await,
      Some(id) => {
        let id = encode_uuid(decode_uuid(id.as_str())?);
        self.update(&id, &comment).await?;
        Ok(comment)
      }
    }
  }

  async fn insert(&self, comment: Comment) -> Result<Comment> {
    let id           = encode_uuid(Uuid::new_v4());
    let anchor       = comment.anchor();
    let path_str     = encode_path(&anchor.file);
    let line         = anchor.line;
    let line_count   = comment.line_count();
    let revision     = anchor.revision.clone();
    let resolved     = comment.is_resolved();
    let notes_str    = encode_notes(comment.notes())?;
    let now_str      = encode_dt(Utc::now());
    let comment_id   = id.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO comments (
             comment_id, file_path, line, line_count, revision,
             resolved, notes_json, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            comment_id, path_str, line, line_count, revision, resolved, notes_str, now_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%id, provider = %self.name, "inserted review comment");
    Ok(comment.with_id(CommentId::new(id)))
  }

  async fn update(&self, id: &str, comment: &Comment) -> Result<()> {
    let id_str     = id.to_owned();
    let line_count = comment.line_count();
    let resolved   = comment.is_resolved();
    let notes_str  = encode_notes(comment.notes())?;
    let now_str    = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE comments
           SET notes_json = ?2, resolved = ?3, line_count = ?4, updated_at = ?5
           WHERE comment_id = ?1",
          rusqlite::params![id_str, notes_str, resolved, line_count, now_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::CommentNotFound(id.to_owned()));
    }
    Ok(())
  }
}

// ─── CommentProvider impl ────────────────────────────────────────────────────

#[async_trait]
impl CommentProvider for SqliteProvider {
  fn name(&self) -> &str { &self.name }

  fn current_user(&self) -> String { self.user.clone() }

  async fn fetch(&self, file: &Path) -> Result<Vec<Comment>, BackendError> {
    self.load(file).await.map_err(|e| BackendError::fetch(&self.name, e))
  }

  async fn submit(&self, comment: Comment) -> Result<Comment, BackendError> {
    self.save(comment).await.map_err(|e| BackendError::submit(&self.name, e))
  }
}
