//! [`InMemoryProvider`] — a provider that keeps comments in process memory.
//!
//! Nothing survives a restart. Useful as a scratch backend and in tests.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
  comment::{Comment, CommentId},
  error::BackendError,
  provider::CommentProvider,
};

pub struct InMemoryProvider {
  name:     String,
  user:     String,
  comments: Mutex<HashMap<PathBuf, Vec<Comment>>>,
}

impl InMemoryProvider {
  pub fn new(name: impl Into<String>, user: impl Into<String>) -> Self {
    Self {
      name:     name.into(),
      user:     user.into(),
      comments: Mutex::new(HashMap::new()),
    }
  }
}

impl Default for InMemoryProvider {
  fn default() -> Self { Self::new("In memory storage", "user") }
}

#[async_trait]
impl CommentProvider for InMemoryProvider {
  fn name(&self) -> &str { &self.name }

  fn current_user(&self) -> String { self.user.clone() }

  async fn fetch(&self, file: &Path) -> Result<Vec<Comment>, BackendError> {
    let comments = self.comments.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(comments.get(file).cloned().unwrap_or_default())
  }

  async fn submit(&self, comment: Comment) -> Result<Comment, BackendError> {
    let mut stored = match comment.id() {
      Some(_) => comment,
      None => comment.with_id(CommentId::new(Uuid::new_v4().to_string())),
    };
    if stored.provider().is_none() {
      stored = stored.with_provider(self.provider_ref());
    }

    let mut comments = self.comments.lock().unwrap_or_else(PoisonError::into_inner);
    let list = comments.entry(stored.anchor().file.clone()).or_default();
    match list.iter().position(|c| c.id() == stored.id()) {
      Some(index) => list[index] = stored.clone(),
      None => list.push(stored.clone()),
    }
    Ok(stored)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{comment::Anchor, note::Note};

  #[tokio::test]
  async fn submit_assigns_identity_and_provider() {
    let provider = InMemoryProvider::new("mem", "me");
    let draft = Comment::draft(Anchor::new("a.rs", 3, "rev"))
      .to_updated(&Note::draft(), Note::new(Utc::now(), "me", "hi"));

    let stored = provider.submit(draft).await.unwrap();
    assert!(stored.id().is_some());
    assert_eq!(stored.provider().map(|p| p.name()), Some("mem"));

    let fetched = provider.fetch(Path::new("a.rs")).await.unwrap();
    assert_eq!(fetched, vec![stored]);
  }

  #[tokio::test]
  async fn submit_with_id_updates_in_place() {
    let provider = InMemoryProvider::new("mem", "me");
    let first = provider
      .submit(Comment::draft(Anchor::new("a.rs", 1, "rev")))
      .await
      .unwrap();
    let second = provider
      .submit(Comment::draft(Anchor::new("a.rs", 2, "rev")))
      .await
      .unwrap();

    let resolved = provider.submit(first.to_resolved()).await.unwrap();

    let fetched = provider.fetch(Path::new("a.rs")).await.unwrap();
    assert_eq!(fetched, vec![resolved, second]);
  }

  #[tokio::test]
  async fn unknown_file_is_empty() {
    let provider = InMemoryProvider::default();
    assert!(provider.fetch(Path::new("nope.rs")).await.unwrap().is_empty());
    assert_eq!(provider.current_user(), "user");
  }
}
