//! Observers told about every comment saved through the repository.

use std::path::Path;

use crate::comment::Comment;

pub trait CommentListener: Send + Sync {
  fn comment_saved(&self, file: &Path, comment: &Comment);
}

/// Logs saved comments through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl CommentListener for TracingListener {
  fn comment_saved(&self, file: &Path, comment: &Comment) {
    tracing::info!(
      file = %file.display(),
      line = comment.line(),
      id = comment.id().map(|id| id.as_str()).unwrap_or("-"),
      notes = comment.note_count(),
      resolved = comment.is_resolved(),
      "review comment saved"
    );
  }
}
