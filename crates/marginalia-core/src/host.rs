//! Contracts the host editor implements for the annotation engine.
//!
//! The engine never paints anything. It hands the host a renderer and a line
//! mapping, and the host asks them for per-line text while it draws.

use std::sync::Arc;

use crate::{
  comment::Comment,
  error::BackendError,
  note::Note,
};

// ─── Line mapping ────────────────────────────────────────────────────────────

/// Translates between lines of the live document and lines of the revision
/// the annotations were loaded for. Tracks document edits on its own, so
/// anchors stay put while the user types.
pub trait LineMapping: Send + Sync {
  /// Line at the annotated revision for the current document `line`, or
  /// `None` when the line was inserted or modified since.
  fn to_original(&self, line: u32) -> Option<u32>;

  /// Current document line for an anchor `line`, or `None` when it was
  /// deleted.
  fn to_current(&self, line: u32) -> Option<u32>;

  /// Whether any line in `start..=end` differs from the annotated revision.
  fn is_range_changed(&self, start: u32, end: u32) -> bool {
    (start..=end).any(|line| self.to_original(line).is_none())
  }
}

/// Mapping for an unmodified document.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityLineMapping;

impl LineMapping for IdentityLineMapping {
  fn to_original(&self, line: u32) -> Option<u32> { Some(line) }

  fn to_current(&self, line: u32) -> Option<u32> { Some(line) }

  fn is_range_changed(&self, _start: u32, _end: u32) -> bool { false }
}

// ─── Gutter ──────────────────────────────────────────────────────────────────

/// What a gutter popup entry does when picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
  /// Start a new note on `line`, in the existing comment there if any.
  LeaveComment { line: u32 },
  /// Open a specific note for viewing or editing.
  OpenNote { comment: Comment, note: Note },
  Resolve { comment: Comment },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterAction {
  pub label: String,
  pub kind:  ActionKind,
}

/// Per-line content of an annotation column.
pub trait GutterRenderer: Send + Sync {
  /// Text to paint for `line`, or `None` to leave it blank.
  fn line_text(&self, line: u32) -> Option<String>;

  fn tooltip(&self, line: u32) -> Option<String>;

  /// Whether `line` gets the "commented" background.
  fn is_highlighted(&self, line: u32) -> bool;

  /// Popup menu entries for `line`.
  fn actions(&self, line: u32) -> Vec<GutterAction>;
}

/// Opaque token the host returns for a registered annotation column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GutterRegistration(pub u64);

/// The gutter of one open editor.
pub trait GutterHost: Send {
  fn register_text_annotation(
    &mut self,
    mapping: Arc<dyn LineMapping>,
    renderer: Arc<dyn GutterRenderer>,
  ) -> GutterRegistration;

  /// Remove every annotation column this gutter shows.
  fn deregister_all(&mut self);
}

// ─── Problems ────────────────────────────────────────────────────────────────

/// Shows failures to the user, e.g. as an error list or balloon.
pub trait ProblemReporter: Send + Sync {
  fn show_errors(&self, title: &str, errors: &[BackendError]);
}

/// Reports problems to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProblemReporter for TracingReporter {
  fn show_errors(&self, title: &str, errors: &[BackendError]) {
    for error in errors {
      tracing::error!(%title, %error, "review comment backend failed");
    }
  }
}
