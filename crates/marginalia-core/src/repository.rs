//! [`CommentsRepository`] — merges every registered provider's comments for a
//! file and caches the last successful load per file.
//!
//! Loading is split in two phases. [`CommentsRepository::fetch`] only reads
//! from the providers and may run on any thread. [`CommentsRepository::store`]
//! commits a result to the cache and runs on the interaction thread. A load
//! that is abandoned between the two never touches the cache.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Arc, OnceLock, PoisonError, RwLock},
};

use crate::{
  comment::Comment,
  error::BackendError,
  listener::CommentListener,
  provider::{CommentProvider, ProviderRef},
};

pub struct CommentsRepository {
  providers:    Vec<Arc<dyn CommentProvider>>,
  listeners:    Vec<Arc<dyn CommentListener>>,
  cache:        RwLock<HashMap<PathBuf, Vec<Comment>>>,
  current_user: OnceLock<Option<String>>,
}

impl CommentsRepository {
  /// Repository over a fixed, ordered set of providers.
  pub fn new(providers: Vec<Arc<dyn CommentProvider>>) -> Self {
    Self {
      providers,
      listeners: Vec::new(),
      cache: RwLock::new(HashMap::new()),
      current_user: OnceLock::new(),
    }
  }

  pub fn with_listener(mut self, listener: Arc<dyn CommentListener>) -> Self {
    self.listeners.push(listener);
    self
  }

  // ── Providers ─────────────────────────────────────────────────────────

  /// Registered providers, in registration order.
  pub fn providers(&self) -> &[Arc<dyn CommentProvider>] { &self.providers }

  pub fn provider(&self, reference: &ProviderRef) -> Option<&Arc<dyn CommentProvider>> {
    self.providers.iter().find(|p| reference.is(p.as_ref()))
  }

  /// The session user: the first registered provider's current user, read
  /// once and then fixed. `None` when no provider is registered.
  pub fn current_user(&self) -> Option<&str> {
    self
      .current_user
      .get_or_init(|| self.providers.first().map(|p| p.current_user()))
      .as_deref()
  }

  // ── Loading ───────────────────────────────────────────────────────────

  /// Query every provider for `file` and concatenate the results in
  /// registration order. Fails as a whole on the first provider error.
  pub async fn fetch(&self, file: &Path) -> Result<Vec<Comment>, BackendError> {
    let mut all = Vec::new();
    for provider in &self.providers {
      let comments = provider.fetch(file).await?;
      if comments.iter().any(|c| c.provider().is_none()) {
        return Err(BackendError::Untagged { provider: provider.name().to_owned() });
      }
      tracing::debug!(
        provider = provider.name(),
        file = %file.display(),
        count = comments.len(),
        "fetched review comments"
      );
      all.extend(comments);
    }
    Ok(all)
  }

  /// Replace the cached comments of `file`.
  pub fn store(&self, file: &Path, comments: Vec<Comment>) {
    self.write_cache().insert(file.to_path_buf(), comments);
  }

  /// Fetch and commit in one step. On error the cache is left as it was.
  pub async fn refresh(&self, file: &Path) -> Result<(), BackendError> {
    let comments = self.fetch(file).await?;
    self.store(file, comments);
    Ok(())
  }

  /// Drop the cached comments of `file`.
  pub fn invalidate(&self, file: &Path) { self.write_cache().remove(file); }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Comments from the last successful load of `file`; empty if none.
  pub fn comments_for(&self, file: &Path) -> Vec<Comment> {
    self.read_cache().get(file).cloned().unwrap_or_default()
  }

  /// Comments worth showing: unresolved and holding at least one note.
  pub fn unresolved_comments(&self, file: &Path) -> Vec<Comment> {
    self
      .read_cache()
      .get(file)
      .map(|comments| {
        comments
          .iter()
          .filter(|c| !c.is_resolved() && c.note_count() > 0)
          .cloned()
          .collect()
      })
      .unwrap_or_default()
  }

  /// Unresolved comments anchored at `line` of `file`.
  pub fn comments_at_line(&self, file: &Path, line: u32) -> Vec<Comment> {
    self
      .unresolved_comments(file)
      .into_iter()
      .filter(|c| c.line() == line)
      .collect()
  }

  /// Unresolved comments whose span includes `line` of `file`.
  pub fn comments_covering(&self, file: &Path, line: u32) -> Vec<Comment> {
    self
      .unresolved_comments(file)
      .into_iter()
      .filter(|c| c.covers(line))
      .collect()
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist `comment` through the provider it belongs to.
  ///
  /// # Panics
  ///
  /// If the comment has no provider; drafts must be assigned one first.
  pub async fn submit(&self, comment: Comment) -> Result<Comment, BackendError> {
    let Some(reference) = comment.provider().cloned() else {
      panic!("only comments with a provider can be submitted");
    };
    let provider = self
      .provider(&reference)
      .ok_or_else(|| BackendError::UnknownProvider(reference.name().to_owned()))?;

    let stored = provider.submit(comment).await?;
    if stored.provider().is_none() {
      return Err(BackendError::Untagged { provider: provider.name().to_owned() });
    }
    Ok(stored)
  }

  /// Put a persisted comment into the cache in place of `previous`, then
  /// notify listeners. Files without a cache entry are left uncached.
  pub fn apply_update(&self, file: &Path, previous: &Comment, persisted: Comment) {
    {
      let mut cache = self.write_cache();
      if let Some(comments) = cache.get_mut(file) {
        let index = comments.iter().position(|c| match (previous.id(), c.id()) {
          (Some(prev), Some(id)) => prev == id,
          _ => c == previous,
        });
        match index {
          Some(index) => comments[index] = persisted.clone(),
          None => comments.push(persisted.clone()),
        }
      }
    }

    for listener in &self.listeners {
      listener.comment_saved(file, &persisted);
    }
  }

  fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Vec<Comment>>> {
    self.cache.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Vec<Comment>>> {
    self.cache.write().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use chrono::Utc;

  use super::*;
  use crate::{
    comment::{Anchor, CommentId},
    memory::InMemoryProvider,
    note::Note,
  };

  /// Serves a fixed list or fails every call.
  struct FixedProvider {
    name:     &'static str,
    user:     &'static str,
    comments: Vec<Comment>,
    fail:     bool,
  }

  impl FixedProvider {
    fn new(name: &'static str, lines: &[u32]) -> Self {
      let comments = lines
        .iter()
        .map(|&line| {
          Comment::persisted(
            CommentId::new(format!("{name}-{line}")),
            ProviderRef::new(name),
            Anchor::new("F.rs", line, "rev"),
            vec![Note::new(Utc::now(), "someone", format!("note at {line}"))],
          )
        })
        .collect();
      Self { name, user: "me", comments, fail: false }
    }

    fn failing(name: &'static str) -> Self {
      Self { fail: true, ..Self::new(name, &[]) }
    }
  }

  #[async_trait]
  impl CommentProvider for FixedProvider {
    fn name(&self) -> &str { self.name }

    fn current_user(&self) -> String { self.user.to_owned() }

    async fn fetch(&self, _file: &Path) -> Result<Vec<Comment>, BackendError> {
      if self.fail {
        return Err(BackendError::fetch(self.name, "connection refused"));
      }
      Ok(self.comments.clone())
    }

    async fn submit(&self, comment: Comment) -> Result<Comment, BackendError> { Ok(comment) }
  }

  #[derive(Default)]
  struct Recorder(Mutex<Vec<(PathBuf, Comment)>>);

  impl CommentListener for Recorder {
    fn comment_saved(&self, file: &Path, comment: &Comment) {
      self.0.lock().unwrap().push((file.to_path_buf(), comment.clone()));
    }
  }

  fn file() -> &'static Path { Path::new("F.rs") }

  #[test]
  fn never_refreshed_is_empty() {
    let repo = CommentsRepository::new(vec![Arc::new(FixedProvider::new("a", &[1]))]);
    assert!(repo.comments_for(file()).is_empty());
  }

  #[tokio::test]
  async fn refresh_concatenates_in_registration_order() {
    let a = FixedProvider::new("a", &[42, 10]);
    let b = FixedProvider::new("b", &[7]);
    let expected: Vec<Comment> =
      a.comments.iter().chain(b.comments.iter()).cloned().collect();

    let repo = CommentsRepository::new(vec![Arc::new(a), Arc::new(b)]);
    repo.refresh(file()).await.unwrap();

    assert_eq!(repo.comments_for(file()), expected);
  }

  #[tokio::test]
  async fn failing_provider_fails_whole_refresh() {
    let repo = CommentsRepository::new(vec![
      Arc::new(FixedProvider::new("a", &[1])),
      Arc::new(FixedProvider::failing("b")),
    ]);

    let previous = FixedProvider::new("a", &[9]).comments;
    repo.store(file(), previous.clone());
    let err = repo.refresh(file()).await.unwrap_err();
    assert!(matches!(err, BackendError::Fetch { ref provider, .. } if provider == "b"));
    assert_eq!(repo.comments_for(file()), previous);
  }

  #[tokio::test]
  async fn untagged_comments_are_rejected() {
    struct Sloppy;

    #[async_trait]
    impl CommentProvider for Sloppy {
      fn name(&self) -> &str { "sloppy" }

      fn current_user(&self) -> String { "me".into() }

      async fn fetch(&self, _file: &Path) -> Result<Vec<Comment>, BackendError> {
        Ok(vec![Comment::draft(Anchor::new("F.rs", 1, "rev"))])
      }

      async fn submit(&self, comment: Comment) -> Result<Comment, BackendError> { Ok(comment) }
    }

    let repo = CommentsRepository::new(vec![Arc::new(Sloppy)]);
    let err = repo.refresh(file()).await.unwrap_err();
    assert!(matches!(err, BackendError::Untagged { .. }));
  }

  #[tokio::test]
  async fn refresh_leaves_other_files_alone() {
    let repo = CommentsRepository::new(vec![Arc::new(FixedProvider::new("a", &[1]))]);
    let other = Path::new("other.rs");
    repo.store(other, vec![Comment::draft(Anchor::new(other, 9, "rev"))]);

    repo.refresh(file()).await.unwrap();
    repo.invalidate(file());

    assert!(repo.comments_for(file()).is_empty());
    assert_eq!(repo.comments_for(other).len(), 1);
  }

  #[test]
  fn current_user_uses_first_provider() {
    let mut second = FixedProvider::new("b", &[]);
    second.user = "somebody-else";
    let repo = CommentsRepository::new(vec![
      Arc::new(FixedProvider::new("a", &[])),
      Arc::new(second),
    ]);
    assert_eq!(repo.current_user(), Some("me"));
    assert_eq!(repo.current_user(), Some("me"));

    assert_eq!(CommentsRepository::new(Vec::new()).current_user(), None);
  }

  #[tokio::test]
  async fn unresolved_filters_resolved_and_empty() {
    let repo = CommentsRepository::new(vec![Arc::new(FixedProvider::new("a", &[1, 2]))]);
    repo.refresh(file()).await.unwrap();
    let mut comments = repo.comments_for(file());
    comments[0] = comments[0].to_resolved();
    comments.push(Comment::draft(Anchor::new("F.rs", 3, "rev")));
    repo.store(file(), comments);

    let shown = repo.unresolved_comments(file());
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].line(), 2);
    assert_eq!(repo.comments_at_line(file(), 2).len(), 1);
    assert!(repo.comments_at_line(file(), 1).is_empty());
  }

  #[test]
  fn covering_includes_every_spanned_line() {
    let repo = CommentsRepository::new(Vec::new());
    let spanning = FixedProvider::new("a", &[10]).comments[0].with_line_count(3);
    repo.store(file(), vec![spanning.clone()]);

    let covered: Vec<u32> =
      (8..15).filter(|&line| !repo.comments_covering(file(), line).is_empty()).collect();
    assert_eq!(covered, vec![10, 11, 12]);
    assert!(repo.comments_at_line(file(), 11).is_empty());
  }

  #[tokio::test]
  async fn submit_and_apply_update_replace_cached_comment() {
    let recorder = Arc::new(Recorder::default());
    let provider = Arc::new(InMemoryProvider::new("mem", "me"));
    let providers: Vec<Arc<dyn CommentProvider>> = vec![provider.clone()];
    let repo = CommentsRepository::new(providers).with_listener(recorder.clone());
    repo.refresh(file()).await.unwrap();

    let draft = Comment::draft(Anchor::new("F.rs", 4, "rev"))
      .with_provider(ProviderRef::new("mem"))
      .to_updated(&Note::draft(), Note::new(Utc::now(), "me", "first"));
    let stored = repo.submit(draft.clone()).await.unwrap();
    repo.apply_update(file(), &draft, stored.clone());
    assert_eq!(repo.comments_for(file()), vec![stored.clone()]);

    let old = stored.last_note().unwrap().clone();
    let edited = stored.to_updated(&old, old.with_text("second"));
    let stored_again = repo.submit(edited).await.unwrap();
    repo.apply_update(file(), &stored, stored_again.clone());
    assert_eq!(repo.comments_for(file()), vec![stored_again]);

    assert_eq!(recorder.0.lock().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn submit_to_unknown_provider_fails() {
    let repo = CommentsRepository::new(vec![Arc::new(InMemoryProvider::new("mem", "me"))]);
    let draft = Comment::draft(Anchor::new("F.rs", 1, "rev")).with_provider(ProviderRef::new("gone"));
    let err = repo.submit(draft).await.unwrap_err();
    assert!(matches!(err, BackendError::UnknownProvider(name) if name == "gone"));
  }
}
