//! Comment — a versioned aggregate of notes anchored to a file line.
//!
//! Comments are immutable. Every change (a new note, an edited note, a
//! provider assignment, resolution) returns an updated copy. Operations that
//! would break the aggregate's invariants are programming errors and panic.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{note::Note, provider::ProviderRef};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Backend-assigned identity of a persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CommentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Anchor ──────────────────────────────────────────────────────────────────

/// Where a comment applies: a zero-based line of `file` as it was at
/// `revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
  pub file:     PathBuf,
  pub line:     u32,
  pub revision: String,
}

impl Anchor {
  pub fn new(file: impl Into<PathBuf>, line: u32, revision: impl Into<String>) -> Self {
    Self { file: file.into(), line, revision: revision.into() }
  }
}

// ─── Comment ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  id:         Option<CommentId>,
  provider:   Option<ProviderRef>,
  anchor:     Anchor,
  /// Number of lines covered, starting at `anchor.line`.
  line_count: u32,
  notes:      Vec<Note>,
  resolved:   bool,
}

impl Comment {
  /// A client-side draft: no identity, no provider, no notes.
  pub fn draft(anchor: Anchor) -> Self {
    Self {
      id: None,
      provider: None,
      anchor,
      line_count: 1,
      notes: Vec::new(),
      resolved: false,
    }
  }

  /// A comment as stored by a provider.
  pub fn persisted(
    id: CommentId,
    provider: ProviderRef,
    anchor: Anchor,
    notes: Vec<Note>,
  ) -> Self {
    Self {
      id: Some(id),
      provider: Some(provider),
      anchor,
      line_count: 1,
      notes,
      resolved: false,
    }
  }

  // ── Accessors ─────────────────────────────────────────────────────────

  pub fn id(&self) -> Option<&CommentId> { self.id.as_ref() }

  pub fn provider(&self) -> Option<&ProviderRef> { self.provider.as_ref() }

  pub fn anchor(&self) -> &Anchor { &self.anchor }

  pub fn line(&self) -> u32 { self.anchor.line }

  pub fn line_count(&self) -> u32 { self.line_count }

  /// Last anchor line the comment spans.
  pub fn last_line(&self) -> u32 { self.anchor.line.saturating_add(self.line_count - 1) }

  /// Whether anchor `line` falls inside `line..line + line_count`.
  pub fn covers(&self, line: u32) -> bool { (self.anchor.line..=self.last_line()).contains(&line) }

  pub fn notes(&self) -> &[Note] { &self.notes }

  pub fn note_count(&self) -> usize { self.notes.len() }

  pub fn last_note(&self) -> Option<&Note> { self.notes.last() }

  pub fn is_resolved(&self) -> bool { self.resolved }

  // ── Copies ────────────────────────────────────────────────────────────

  /// Copy spanning `line_count` lines (at least one).
  pub fn with_line_count(&self, line_count: u32) -> Self {
    Self { line_count: line_count.max(1), ..self.clone() }
  }

  /// Copy carrying the identity assigned by a backend.
  pub fn with_id(&self, id: CommentId) -> Self {
    Self { id: Some(id), ..self.clone() }
  }

  /// Copy with `resolved` restored from storage.
  pub fn with_resolved(&self, resolved: bool) -> Self {
    Self { resolved, ..self.clone() }
  }

  /// Copy with `provider` assigned.
  ///
  /// # Panics
  ///
  /// If a provider is already set, or the comment is resolved.
  pub fn with_provider(&self, provider: ProviderRef) -> Self {
    self.check_not_resolved();
    assert!(
      self.provider.is_none(),
      "comment already belongs to provider {:?}",
      self.provider
    );
    Self { provider: Some(provider), ..self.clone() }
  }

  /// Copy with `old` replaced by `new` in place, or with `new` appended
  /// when `old` is a draft sentinel that is not part of this comment.
  ///
  /// # Panics
  ///
  /// If the comment is resolved, or `old` is a persisted note that does not
  /// belong to this comment.
  pub fn to_updated(&self, old: &Note, new: Note) -> Self {
    self.check_not_resolved();

    let mut notes = self.notes.clone();
    match notes.iter().position(|n| n == old) {
      Some(index) => notes[index] = new,
      None => {
        assert!(old.is_new(), "note {old:?} does not belong to this comment");
        notes.push(new);
      }
    }

    Self { notes, ..self.clone() }
  }

  /// Copy marked as resolved.
  ///
  /// # Panics
  ///
  /// If the comment is already resolved.
  pub fn to_resolved(&self) -> Self {
    self.check_not_resolved();
    Self { resolved: true, ..self.clone() }
  }

  fn check_not_resolved(&self) {
    assert!(!self.resolved, "comment at line {} is already resolved", self.anchor.line);
  }
}
