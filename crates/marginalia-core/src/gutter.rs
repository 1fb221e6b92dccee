//! Gutter renderers over the repository cache.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use crate::{
  comment::Comment,
  host::{ActionKind, GutterAction, GutterRenderer, LineMapping},
  repository::CommentsRepository,
};

pub const LEAVE_COMMENT: &str = "leave a review comment";
pub const RESOLVE_COMMENT: &str = "resolve comment";

/// Beyond this many notes the tooltip only shows a count.
const TOOLTIP_NOTE_LIMIT: usize = 5;
const TOOLTIP_RULE: &str = "----------";

// ─── CommentGutter ───────────────────────────────────────────────────────────

/// Renders the unresolved comments of one file, reading the repository cache
/// on every call so saved comments show up without re-registering.
pub struct CommentGutter {
  repository: Arc<CommentsRepository>,
  file:       PathBuf,
}

impl CommentGutter {
  pub fn new(repository: Arc<CommentsRepository>, file: impl Into<PathBuf>) -> Self {
    Self { repository, file: file.into() }
  }

  pub fn file(&self) -> &Path { &self.file }

  fn comments(&self, line: u32) -> Vec<Comment> {
    self.repository.comments_at_line(&self.file, line)
  }
}

fn note_count(comments: &[Comment]) -> usize { comments.iter().map(Comment::note_count).sum() }

impl GutterRenderer for CommentGutter {
  fn line_text(&self, line: u32) -> Option<String> {
    let text = match note_count(&self.comments(line)) {
      0 => "     ",
      1 => " !!  ",
      _ => " !!! ",
    };
    Some(text.to_owned())
  }

  fn tooltip(&self, line: u32) -> Option<String> {
    let comments = self.comments(line);
    let count = note_count(&comments);
    if count == 0 {
      return Some(LEAVE_COMMENT.to_owned());
    }
    if count >= TOOLTIP_NOTE_LIMIT {
      return Some(format!("{count} review comments"));
    }

    let entries: Vec<String> = comments
      .iter()
      .flat_map(Comment::notes)
      .map(|note| {
        format!(
          "{}:{}\n{TOOLTIP_RULE}\n{}",
          note.author().unwrap_or_default(),
          note.formatted_timestamp(),
          note.text()
        )
      })
      .collect();
    Some(entries.join("\n\n"))
  }

  fn is_highlighted(&self, line: u32) -> bool {
    !self.repository.comments_covering(&self.file, line).is_empty()
  }

  fn actions(&self, line: u32) -> Vec<GutterAction> {
    let mut actions = vec![GutterAction {
      label: LEAVE_COMMENT.to_owned(),
      kind:  ActionKind::LeaveComment { line },
    }];

    for comment in self.comments(line) {
      for note in comment.notes() {
        actions.push(GutterAction {
          label: format!(
            "{}: {}",
            note.formatted_timestamp(),
            note.author().unwrap_or_default()
          ),
          kind:  ActionKind::OpenNote { comment: comment.clone(), note: note.clone() },
        });
      }
      actions.push(GutterAction {
        label: RESOLVE_COMMENT.to_owned(),
        kind:  ActionKind::Resolve { comment },
      });
    }

    actions
  }
}

// ─── LineConvertingRenderer ──────────────────────────────────────────────────

/// Translates current document lines to anchor lines before asking `inner`.
/// Lines changed since the annotated revision render as blank.
pub struct LineConvertingRenderer {
  mapping: Arc<dyn LineMapping>,
  inner:   Arc<dyn GutterRenderer>,
}

impl LineConvertingRenderer {
  pub fn new(mapping: Arc<dyn LineMapping>, inner: Arc<dyn GutterRenderer>) -> Self {
    Self { mapping, inner }
  }
}

impl GutterRenderer for LineConvertingRenderer {
  fn line_text(&self, line: u32) -> Option<String> {
    self.mapping.to_original(line).and_then(|l| self.inner.line_text(l))
  }

  fn tooltip(&self, line: u32) -> Option<String> {
    self.mapping.to_original(line).and_then(|l| self.inner.tooltip(l))
  }

  fn is_highlighted(&self, line: u32) -> bool {
    self
      .mapping
      .to_original(line)
      .is_some_and(|l| self.inner.is_highlighted(l))
  }

  fn actions(&self, line: u32) -> Vec<GutterAction> {
    self
      .mapping
      .to_original(line)
      .map(|l| self.inner.actions(l))
      .unwrap_or_default()
  }
}
