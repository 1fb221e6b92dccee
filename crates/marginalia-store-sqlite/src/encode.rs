//! Encoding and decoding helpers between core types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Notes are a compact JSON array. Comment
//! ids are hyphenated lowercase UUIDs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use marginalia_core::{
  comment::{Anchor, Comment, CommentId},
  note::Note,
  provider::ProviderRef,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Paths ───────────────────────────────────────────────────────────────────

pub fn encode_path(path: &Path) -> String { path.to_string_lossy().into_owned() }

// ─── Notes ───────────────────────────────────────────────────────────────────

/// One element of the `notes_json` array.
#[derive(Serialize, Deserialize)]
struct RawNote {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  at:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  author: Option<String>,
  text:   String,
}

pub fn encode_notes(notes: &[Note]) -> Result<String> {
  let raw: Vec<RawNote> = notes
    .iter()
    .map(|n| RawNote {
      at:     n.timestamp().map(encode_dt),
      author: n.author().map(str::to_owned),
      text:   n.text().to_owned(),
    })
    .collect();
  Ok(serde_json::to_string(&raw)?)
}

pub fn decode_notes(comment_id: &str, s: &str) -> Result<Vec<Note>> {
  let raw: Vec<RawNote> = serde_json::from_str(s)?;
  raw
    .into_iter()
    .map(|n| {
      let timestamp = n.at.as_deref().map(decode_dt).transpose()?;
      if timestamp.is_some() && n.author.is_none() {
        return Err(Error::MissingAuthor(comment_id.to_owned()));
      }
      Ok(Note::from_parts(timestamp, n.author, n.text))
    })
    .collect()
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Raw values read directly from a `comments` row.
pub struct RawComment {
  pub comment_id: String,
  pub file_path:  String,
  pub line:       u32,
  pub line_count: u32,
  pub revision:   String,
  pub resolved:   bool,
  pub notes_json: String,
}

impl RawComment {
  pub fn into_comment(self, provider: &ProviderRef) -> Result<Comment> {
    let id = encode_uuid(decode_uuid(&self.comment_id)?);
    let notes = decode_notes(&id, &self.notes_json)?;
    let anchor = Anchor::new(PathBuf::from(self.file_path), self.line, self.revision);

    Ok(
      Comment::persisted(CommentId::new(id), provider.clone(), anchor, notes)
        .with_line_count(self.line_count)
        .with_resolved(self.resolved),
    )
  }
}
