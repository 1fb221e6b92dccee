//! Note — a single timestamped remark inside a review comment.
//!
//! Notes are values. Editing a note produces a new note; the comment that
//! holds it is rebuilt with [`Comment::to_updated`](crate::comment::Comment::to_updated).

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An immutable remark by an author.
///
/// A note without a timestamp is a draft: it has not been submitted to any
/// provider yet. A draft may already name its prospective author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  timestamp: Option<DateTime<Utc>>,
  author:    Option<String>,
  text:      String,
}

impl Note {
  /// A persisted note.
  pub fn new(
    timestamp: DateTime<Utc>,
    author: impl Into<String>,
    text: impl Into<String>,
  ) -> Self {
    Self {
      timestamp: Some(timestamp),
      author:    Some(author.into()),
      text:      text.into(),
    }
  }

  /// An empty draft with no author. Used as the "new note" sentinel.
  pub fn draft() -> Self {
    Self { timestamp: None, author: None, text: String::new() }
  }

  /// An empty draft that will be authored by `author` once submitted.
  pub fn draft_by(author: impl Into<String>) -> Self {
    Self { timestamp: None, author: Some(author.into()), text: String::new() }
  }

  /// Rebuild a note from stored parts.
  ///
  /// # Panics
  ///
  /// If `timestamp` is present without an `author`.
  pub fn from_parts(
    timestamp: Option<DateTime<Utc>>,
    author: Option<String>,
    text: impl Into<String>,
  ) -> Self {
    assert!(
      timestamp.is_none() || author.is_some(),
      "a note with a timestamp must have an author"
    );
    Self { timestamp, author, text: text.into() }
  }

  pub fn timestamp(&self) -> Option<DateTime<Utc>> { self.timestamp }

  pub fn author(&self) -> Option<&str> { self.author.as_deref() }

  pub fn text(&self) -> &str { &self.text }

  /// True while the note is an unsubmitted draft.
  pub fn is_new(&self) -> bool { self.timestamp.is_none() }

  /// `yyyy-MM-dd HH:mm:ss` in local time, or `"now"` for drafts.
  pub fn formatted_timestamp(&self) -> String {
    match self.timestamp {
      Some(ts) => ts.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
      None => "now".to_owned(),
    }
  }

  /// Copy of this note with different text.
  pub fn with_text(&self, text: impl Into<String>) -> Self {
    Self { text: text.into(), ..self.clone() }
  }
}
