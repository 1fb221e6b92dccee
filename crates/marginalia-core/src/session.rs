//! [`EditCommentSession`] — the state behind an "add / edit review comment"
//! dialog.
//!
//! A session holds the text being edited and the chosen provider. Nothing is
//! built until the user confirms; the result is handed to a one-shot
//! callback, which is never called on cancel.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{comment::Comment, note::Note, provider::CommentProvider};

pub type ConfirmCallback = Box<dyn FnOnce(Comment) + Send>;

/// Why the confirm button is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfirmBlocked {
  #[error("no review comment provider is available")]
  NoProviderAvailable,

  #[error("select a provider for the new comment")]
  ProviderNotSelected,

  #[error("the note belongs to another user")]
  ReadOnly,

  #[error("the session is already finished")]
  Finished,
}

pub struct EditCommentSession {
  comment:   Comment,
  note:      Note,
  providers: Vec<Arc<dyn CommentProvider>>,
  selected:  Option<usize>,
  text:      String,
  callback:  Option<ConfirmCallback>,
}

impl EditCommentSession {
  /// Open a session on `note` of `comment`. Pass a draft note to add a new
  /// note; an existing one to view or edit it.
  pub fn new(
    comment: Comment,
    note: Note,
    providers: Vec<Arc<dyn CommentProvider>>,
    on_confirm: impl FnOnce(Comment) + Send + 'static,
  ) -> Self {
    let selected = comment
      .provider()
      .and_then(|r| providers.iter().position(|p| r.is(p.as_ref())));
    let text = note.text().to_owned();
    Self {
      comment,
      note,
      providers,
      selected,
      text,
      callback: Some(Box::new(on_confirm)),
    }
  }

  // ── Presentation ──────────────────────────────────────────────────────

  pub fn title(&self) -> &'static str {
    if self.note.is_new() { "Add a review comment" } else { "Edit a review comment" }
  }

  pub fn comment(&self) -> &Comment { &self.comment }

  pub fn note(&self) -> &Note { &self.note }

  pub fn text(&self) -> &str { &self.text }

  /// Replace the edited text. Ignored while read-only.
  pub fn set_text(&mut self, text: impl Into<String>) {
    if !self.is_read_only() {
      self.text = text.into();
    }
  }

  /// `"<author>:"`, naming who wrote (or will write) the note.
  pub fn author_label(&self) -> String {
    let author = self
      .note
      .author()
      .map(str::to_owned)
      .or_else(|| self.current_user())
      .unwrap_or_default();
    format!("{author}:")
  }

  pub fn timestamp_label(&self) -> String { self.note.formatted_timestamp() }

  // ── Provider selection ────────────────────────────────────────────────

  /// True when the comment is new and the user must pick a provider.
  pub fn needs_provider(&self) -> bool { self.comment.provider().is_none() }

  pub fn provider_names(&self) -> Vec<&str> { self.providers.iter().map(|p| p.name()).collect() }

  /// Pick the provider at `index` of [`provider_names`](Self::provider_names).
  ///
  /// # Panics
  ///
  /// If `index` is out of range, or the comment already has a provider.
  pub fn select_provider(&mut self, index: usize) {
    assert!(self.needs_provider(), "comment already belongs to a provider");
    assert!(index < self.providers.len(), "provider index {index} out of range");
    self.selected = Some(index);
  }

  pub fn selected_provider(&self) -> Option<&Arc<dyn CommentProvider>> {
    self.selected.map(|i| &self.providers[i])
  }

  /// The user of the resolved provider.
  pub fn current_user(&self) -> Option<String> {
    self.selected_provider().map(|p| p.current_user())
  }

  /// Drafts are always editable. An existing note is editable only by the
  /// user it was written by.
  pub fn is_read_only(&self) -> bool {
    if self.note.is_new() {
      return false;
    }
    match (self.note.author(), self.current_user()) {
      (Some(author), Some(user)) => author != user,
      (None, _) => false,
      (Some(_), None) => true,
    }
  }

  // ── Confirm / cancel ──────────────────────────────────────────────────

  pub fn confirm_state(&self) -> Result<(), ConfirmBlocked> {
    if self.callback.is_none() {
      return Err(ConfirmBlocked::Finished);
    }
    if self.providers.is_empty() {
      return Err(ConfirmBlocked::NoProviderAvailable);
    }
    if self.selected.is_none() {
      return Err(if self.needs_provider() {
        ConfirmBlocked::ProviderNotSelected
      } else {
        ConfirmBlocked::NoProviderAvailable
      });
    }
    if self.is_read_only() {
      return Err(ConfirmBlocked::ReadOnly);
    }
    Ok(())
  }

  pub fn can_confirm(&self) -> bool { self.confirm_state().is_ok() }

  pub fn confirm(&mut self) -> Result<Comment, ConfirmBlocked> { self.confirm_at(Utc::now()) }

  /// Build the updated comment, timestamping new notes with `now`, and hand
  /// it to the callback.
  pub fn confirm_at(&mut self, now: DateTime<Utc>) -> Result<Comment, ConfirmBlocked> {
    self.confirm_state()?;
    let Some(provider) = self.selected_provider().cloned() else {
      return Err(ConfirmBlocked::ProviderNotSelected);
    };
    let Some(callback) = self.callback.take() else {
      return Err(ConfirmBlocked::Finished);
    };

    let timestamp = self.note.timestamp().unwrap_or(now);
    let note = Note::new(timestamp, provider.current_user(), self.text.clone());

    let target = if self.needs_provider() {
      self.comment.with_provider(provider.provider_ref())
    } else {
      self.comment.clone()
    };
    let updated = target.to_updated(&self.note, note);

    callback(updated.clone());
    Ok(updated)
  }

  /// Close the session without saving.
  pub fn cancel(self) {}
}

impl fmt::Debug for EditCommentSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EditCommentSession")
      .field("comment", &self.comment)
      .field("note", &self.note)
      .field("providers", &self.provider_names())
      .field("selected", &self.selected)
      .field("text", &self.text)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::TimeZone;

  use super::*;
  use crate::{
    comment::{Anchor, CommentId},
    memory::InMemoryProvider,
    provider::ProviderRef,
  };

  fn providers() -> Vec<Arc<dyn CommentProvider>> {
    vec![
      Arc::new(InMemoryProvider::new("local", "me")),
      Arc::new(InMemoryProvider::new("remote", "me@remote")),
    ]
  }

  fn ts() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap() }

  fn persisted(author: &str) -> (Comment, Note) {
    let note = Note::new(ts(), author, "original");
    let comment = Comment::persisted(
      CommentId::new("c1"),
      ProviderRef::new("local"),
      Anchor::new("F.rs", 4, "rev"),
      vec![note.clone()],
    );
    (comment, note)
  }

  /// Callback that records every comment it receives.
  fn recorder() -> (Arc<Mutex<Vec<Comment>>>, impl FnOnce(Comment) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |c| sink.lock().unwrap().push(c))
  }

  #[test]
  fn new_comment_requires_a_provider() {
    let (seen, cb) = recorder();
    let mut session = EditCommentSession::new(
      Comment::draft(Anchor::new("F.rs", 1, "rev")),
      Note::draft(),
      providers(),
      cb,
    );
    assert_eq!(session.title(), "Add a review comment");
    assert!(session.needs_provider());
    assert_eq!(session.confirm_state(), Err(ConfirmBlocked::ProviderNotSelected));

    session.select_provider(1);
    session.set_text("looks off");
    let now = ts();
    let saved = session.confirm_at(now).unwrap();

    assert_eq!(saved.provider().map(ProviderRef::name), Some("remote"));
    let note = saved.last_note().unwrap();
    assert_eq!(note.author(), Some("me@remote"));
    assert_eq!(note.timestamp(), Some(now));
    assert_eq!(note.text(), "looks off");
    assert_eq!(*seen.lock().unwrap(), vec![saved]);
  }

  #[test]
  fn zero_providers_disable_confirm() {
    let (seen, cb) = recorder();
    let mut session =
      EditCommentSession::new(Comment::draft(Anchor::new("F.rs", 1, "rev")), Note::draft(), Vec::new(), cb);
    assert_eq!(session.confirm(), Err(ConfirmBlocked::NoProviderAvailable));
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn editing_own_note_keeps_timestamp() {
    let (comment, note) = persisted("me");
    let (seen, cb) = recorder();
    let mut session = EditCommentSession::new(comment, note, providers(), cb);

    assert_eq!(session.title(), "Edit a review comment");
    assert!(!session.needs_provider());
    assert!(!session.is_read_only());
    assert_eq!(session.text(), "original");

    session.set_text("edited");
    let saved = session.confirm().unwrap();
    assert_eq!(saved.note_count(), 1);
    assert_eq!(saved.notes()[0].text(), "edited");
    assert_eq!(saved.notes()[0].timestamp(), Some(ts()));
    assert_eq!(seen.lock().unwrap().len(), 1);
  }

  #[test]
  fn foreign_note_is_read_only() {
    let (comment, note) = persisted("bob");
    let (seen, cb) = recorder();
    let mut session = EditCommentSession::new(comment, note, providers(), cb);

    assert!(session.is_read_only());
    assert_eq!(session.author_label(), "bob:");
    session.set_text("hijacked");
    assert_eq!(session.text(), "original");
    assert_eq!(session.confirm(), Err(ConfirmBlocked::ReadOnly));
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn callback_runs_once() {
    let (comment, note) = persisted("me");
    let (seen, cb) = recorder();
    let mut session = EditCommentSession::new(comment, note, providers(), cb);

    session.confirm().unwrap();
    assert_eq!(session.confirm(), Err(ConfirmBlocked::Finished));
    assert_eq!(seen.lock().unwrap().len(), 1);
  }

  #[test]
  fn cancel_never_calls_back() {
    let (comment, note) = persisted("me");
    let (seen, cb) = recorder();
    let mut session = EditCommentSession::new(comment, note, providers(), cb);
    session.set_text("discarded");
    session.cancel();
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn reply_appends_to_existing_comment() {
    let (comment, _) = persisted("bob");
    let (_, cb) = recorder();
    let mut session = EditCommentSession::new(comment, Note::draft(), providers(), cb);
    assert!(!session.is_read_only());
    assert_eq!(session.author_label(), "me:");

    session.set_text("agreed");
    let saved = session.confirm().unwrap();
    assert_eq!(saved.note_count(), 2);
    assert_eq!(saved.notes()[1].author(), Some("me"));
  }
}
