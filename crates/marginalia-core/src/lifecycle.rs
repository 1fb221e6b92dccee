//! Per-file annotation lifecycle: `Off → Loading → Annotated → Off`.
//!
//! [`AnnotationLifecycle`] is owned by the interaction thread. Provider I/O
//! runs as tokio tasks; their completions come back over a channel and are
//! applied by [`pump`](AnnotationLifecycle::pump) or
//! [`next_event`](AnnotationLifecycle::next_event), so every gutter and cache
//! mutation happens on the owning thread.
//!
//! Each load carries a ticket. A completion whose ticket no longer matches
//! the file's `Loading` state is dropped.

use std::{
  collections::HashMap,
  fmt,
  ops::RangeInclusive,
  path::{Path, PathBuf},
  sync::Arc,
};

use tokio::{
  runtime::Handle,
  sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
  task::JoinHandle,
};

use crate::{
  comment::{Anchor, Comment},
  error::{BackendError, Error, Result},
  gutter::{CommentGutter, LineConvertingRenderer},
  host::{ActionKind, GutterAction, GutterHost, GutterRegistration, LineMapping, ProblemReporter},
  note::Note,
  repository::CommentsRepository,
  session::EditCommentSession,
};

const ANNOTATE_TITLE: &str = "Annotate";
const SAVE_TITLE: &str = "Save review comment";

// ─── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationState {
  Off,
  Loading,
  Annotated,
}

/// Everything needed to annotate one open file.
pub struct AnnotationTarget {
  pub file:     PathBuf,
  /// Revision the comments are anchored to.
  pub revision: String,
  pub mapping:  Arc<dyn LineMapping>,
  pub gutter:   Box<dyn GutterHost>,
}

/// Live annotation of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationHandle {
  pub file:         PathBuf,
  pub revision:     String,
  pub registration: GutterRegistration,
}

/// Outcome of a background completion, applied on the interaction thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
  Annotated { file: PathBuf },
  LoadFailed { file: PathBuf },
  /// A completion for a load that was cancelled or superseded.
  Stale { file: PathBuf },
  CommentSaved { file: PathBuf, comment: Comment },
  SaveFailed { file: PathBuf },
}

// ─── Internal state ──────────────────────────────────────────────────────────

enum Slot {
  Loading {
    ticket:   u64,
    revision: String,
    mapping:  Arc<dyn LineMapping>,
    gutter:   Box<dyn GutterHost>,
    task:     JoinHandle<()>,
  },
  Annotated {
    handle:  AnnotationHandle,
    mapping: Arc<dyn LineMapping>,
    gutter:  Box<dyn GutterHost>,
  },
}

impl Slot {
  fn state(&self) -> AnnotationState {
    match self {
      Self::Loading { .. } => AnnotationState::Loading,
      Self::Annotated { .. } => AnnotationState::Annotated,
    }
  }
}

enum Message {
  Refreshed {
    file:   PathBuf,
    ticket: u64,
    result: Result<Vec<Comment>, BackendError>,
  },
  Edited {
    file:     PathBuf,
    previous: Comment,
    updated:  Comment,
  },
  Submitted {
    file:     PathBuf,
    previous: Comment,
    result:   Result<Comment, BackendError>,
  },
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

pub struct AnnotationLifecycle {
  repository:  Arc<CommentsRepository>,
  runtime:     Handle,
  reporter:    Arc<dyn ProblemReporter>,
  slots:       HashMap<PathBuf, Slot>,
  next_ticket: u64,
  /// Submits spawned but not yet applied.
  saving:      usize,
  tx:          UnboundedSender<Message>,
  rx:          UnboundedReceiver<Message>,
}

impl AnnotationLifecycle {
  pub fn new(
    repository: Arc<CommentsRepository>,
    runtime: Handle,
    reporter: Arc<dyn ProblemReporter>,
  ) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      repository,
      runtime,
      reporter,
      slots: HashMap::new(),
      next_ticket: 0,
      saving: 0,
      tx,
      rx,
    }
  }

  pub fn repository(&self) -> &Arc<CommentsRepository> { &self.repository }

  pub fn state(&self, file: &Path) -> AnnotationState {
    self.slots.get(file).map_or(AnnotationState::Off, Slot::state)
  }

  /// Whether the host's toggle action shows as checked for `file`.
  pub fn is_selected(&self, file: &Path) -> bool { self.slots.contains_key(file) }

  /// Mirror of the host toggle action.
  pub fn set_selected(&mut self, target: AnnotationTarget, selected: bool) {
    if selected {
      self.toggle_on(target);
    } else {
      self.toggle_off(&target.file);
    }
  }

  pub fn annotation(&self, file: &Path) -> Option<&AnnotationHandle> {
    match self.slots.get(file) {
      Some(Slot::Annotated { handle, .. }) => Some(handle),
      _ => None,
    }
  }

  /// Current document lines to paint as commented, one range per unresolved
  /// comment. Comments whose first or last line was deleted are skipped.
  pub fn highlighted_lines(&self, file: &Path) -> Vec<RangeInclusive<u32>> {
    let Some(Slot::Annotated { mapping, .. }) = self.slots.get(file) else {
      return Vec::new();
    };
    self
      .repository
      .unresolved_comments(file)
      .iter()
      .filter_map(|c| {
        let start = mapping.to_current(c.line())?;
        let end = mapping.to_current(c.last_line())?;
        Some(start..=end)
      })
      .collect()
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// Start loading comments for `target.file`. Returns `false` without
  /// doing anything if the file is already loading or annotated.
  pub fn toggle_on(&mut self, target: AnnotationTarget) -> bool {
    let AnnotationTarget { file, revision, mapping, gutter } = target;
    if self.slots.contains_key(&file) {
      tracing::debug!(file = %file.display(), "annotation already active");
      return false;
    }

    self.next_ticket += 1;
    let ticket = self.next_ticket;

    let repository = self.repository.clone();
    let tx = self.tx.clone();
    let task_file = file.clone();
    let task = self.runtime.spawn(async move {
      let result = repository.fetch(&task_file).await;
      let _ = tx.send(Message::Refreshed { file: task_file, ticket, result });
    });

    tracing::debug!(file = %file.display(), %revision, ticket, "loading review comments");
    self.slots.insert(file, Slot::Loading { ticket, revision, mapping, gutter, task });
    true
  }

  /// Cancel a pending load, or remove the annotation and drop the cached
  /// comments. Returns `false` if the file was already off.
  pub fn toggle_off(&mut self, file: &Path) -> bool {
    match self.slots.remove(file) {
      None => false,
      Some(Slot::Loading { ticket, task, .. }) => {
        task.abort();
        tracing::debug!(file = %file.display(), ticket, "cancelled loading review comments");
        true
      }
      Some(Slot::Annotated { handle, mut gutter, .. }) => {
        gutter.deregister_all();
        self.repository.invalidate(file);
        tracing::debug!(
          file = %file.display(),
          registration = handle.registration.0,
          "removed review annotation"
        );
        true
      }
    }
  }

  /// The host closed the annotation column through another path.
  pub fn gutter_closed(&mut self, file: &Path) { self.toggle_off(file); }

  // ── Editing ───────────────────────────────────────────────────────────

  /// A gutter line was activated: open the last note on the anchor line
  /// behind `line`, or a new comment there. `None` for lines that changed
  /// since the annotated revision.
  pub fn activate_line(&self, file: &Path, line: u32) -> Result<Option<EditCommentSession>> {
    let (handle, mapping) = self.annotated(file)?;
    let Some(original) = mapping.to_original(line) else {
      return Ok(None);
    };

    let existing = self
      .repository
      .comments_at_line(file, original)
      .into_iter()
      .rev()
      .find_map(|c| c.last_note().cloned().map(|note| (c, note)));

    let (comment, note) = match existing {
      Some(found) => found,
      None => (
        Comment::draft(Anchor::new(file, original, handle.revision.clone())),
        Note::draft(),
      ),
    };
    Ok(Some(self.open_session(file, comment, note)))
  }

  /// Start a new comment spanning the current lines `start..=end`. `None`
  /// when any of them changed since the annotated revision.
  ///
  /// # Panics
  ///
  /// If `start > end`.
  pub fn add_range(&self, file: &Path, start: u32, end: u32) -> Result<Option<EditCommentSession>> {
    assert!(start <= end, "range {start}..={end} is reversed");
    let (handle, mapping) = self.annotated(file)?;
    if mapping.is_range_changed(start, end) {
      tracing::debug!(file = %file.display(), start, end, "range changed since annotated revision");
      return Ok(None);
    }
    let (Some(first), Some(last)) = (mapping.to_original(start), mapping.to_original(end)) else {
      return Ok(None);
    };

    let comment = Comment::draft(Anchor::new(file, first, handle.revision.clone()))
      .with_line_count(last.saturating_sub(first) + 1);
    Ok(Some(self.open_session(file, comment, Note::draft())))
  }

  /// Run a popup action produced by the file's gutter renderer. Resolving
  /// saves right away and opens nothing.
  pub fn perform(&self, file: &Path, action: GutterAction) -> Result<Option<EditCommentSession>> {
    let (handle, _) = self.annotated(file)?;

    let session = match action.kind {
      ActionKind::LeaveComment { line } => {
        let comment = self
          .repository
          .comments_at_line(file, line)
          .into_iter()
          .next()
          .unwrap_or_else(|| Comment::draft(Anchor::new(file, line, handle.revision.clone())));
        Some(self.open_session(file, comment, Note::draft()))
      }
      ActionKind::OpenNote { comment, note } => Some(self.open_session(file, comment, note)),
      ActionKind::Resolve { comment } => {
        let updated = comment.to_resolved();
        let _ = self.tx.send(Message::Edited { file: file.to_path_buf(), previous: comment, updated });
        None
      }
    };
    Ok(session)
  }

  fn annotated(&self, file: &Path) -> Result<(&AnnotationHandle, &Arc<dyn LineMapping>)> {
    match self.slots.get(file) {
      Some(Slot::Annotated { handle, mapping, .. }) => Ok((handle, mapping)),
      _ => Err(Error::NotAnnotated(file.to_path_buf())),
    }
  }

  fn open_session(&self, file: &Path, comment: Comment, note: Note) -> EditCommentSession {
    let tx = self.tx.clone();
    let file = file.to_path_buf();
    let previous = comment.clone();
    EditCommentSession::new(comment, note, self.repository.providers().to_vec(), move |updated| {
      let _ = tx.send(Message::Edited { file, previous, updated });
    })
  }

  // ── Completions ───────────────────────────────────────────────────────

  /// Apply every completion that has already arrived, without waiting.
  pub fn pump(&mut self) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(message) = self.rx.try_recv() {
      events.extend(self.handle(message));
    }
    events
  }

  /// Wait for the next completion that produces an event and apply it.
  ///
  /// Returns `None` once nothing is queued, loading or saving. Sessions
  /// confirmed later are picked up by the next call.
  pub async fn next_event(&mut self) -> Option<LifecycleEvent> {
    loop {
      let message = match self.rx.try_recv() {
        Ok(message) => message,
        Err(_) if self.is_idle() => return None,
        Err(_) => self.rx.recv().await?,
      };
      if let Some(event) = self.handle(message) {
        return Some(event);
      }
    }
  }

  fn is_idle(&self) -> bool {
    self.saving == 0 && !self.slots.values().any(|slot| matches!(slot, Slot::Loading { .. }))
  }

  fn handle(&mut self, message: Message) -> Option<LifecycleEvent> {
    match message {
      Message::Refreshed { file, ticket, result } => Some(self.loaded(file, ticket, result)),
      Message::Edited { file, previous, updated } => {
        let repository = self.repository.clone();
        let tx = self.tx.clone();
        tracing::debug!(file = %file.display(), line = updated.line(), "submitting review comment");
        self.saving += 1;
        self.runtime.spawn(async move {
          let result = repository.submit(updated).await;
          let _ = tx.send(Message::Submitted { file, previous, result });
        });
        None
      }
      Message::Submitted { file, previous, result } => {
        self.saving = self.saving.saturating_sub(1);
        Some(self.saved(file, previous, result))
      }
    }
  }

  fn loaded(
    &mut self,
    file: PathBuf,
    ticket: u64,
    result: Result<Vec<Comment>, BackendError>,
  ) -> LifecycleEvent {
    let current = matches!(
      self.slots.get(&file),
      Some(Slot::Loading { ticket: t, .. }) if *t == ticket
    );
    if !current {
      tracing::debug!(file = %file.display(), ticket, "ignoring stale review comment load");
      return LifecycleEvent::Stale { file };
    }
    let Some(Slot::Loading { revision, mapping, mut gutter, .. }) = self.slots.remove(&file)
    else {
      return LifecycleEvent::Stale { file };
    };

    match result {
      Ok(comments) => {
        self.repository.store(&file, comments);
        let inner = Arc::new(CommentGutter::new(self.repository.clone(), &file));
        let renderer = Arc::new(LineConvertingRenderer::new(mapping.clone(), inner));
        let registration = gutter.register_text_annotation(mapping.clone(), renderer);

        tracing::debug!(file = %file.display(), registration = registration.0, "annotated");
        let handle = AnnotationHandle { file: file.clone(), revision, registration };
        self.slots.insert(file.clone(), Slot::Annotated { handle, mapping, gutter });
        LifecycleEvent::Annotated { file }
      }
      Err(err) => {
        tracing::warn!(file = %file.display(), error = %err, "failed to load review comments");
        self.reporter.show_errors(ANNOTATE_TITLE, &[err]);
        LifecycleEvent::LoadFailed { file }
      }
    }
  }

  fn saved(
    &mut self,
    file: PathBuf,
    previous: Comment,
    result: Result<Comment, BackendError>,
  ) -> LifecycleEvent {
    match result {
      Ok(comment) => {
        if self.state(&file) == AnnotationState::Annotated {
          self.repository.apply_update(&file, &previous, comment.clone());
        } else {
          tracing::debug!(file = %file.display(), "saved comment for a file that is no longer annotated");
        }
        LifecycleEvent::CommentSaved { file, comment }
      }
      Err(err) => {
        tracing::warn!(file = %file.display(), error = %err, "failed to save review comment");
        self.reporter.show_errors(SAVE_TITLE, &[err]);
        LifecycleEvent::SaveFailed { file }
      }
    }
  }
}

impl Drop for AnnotationLifecycle {
  fn drop(&mut self) {
    for slot in self.slots.values() {
      if let Slot::Loading { task, .. } = slot {
        task.abort();
      }
    }
  }
}

impl fmt::Debug for AnnotationLifecycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let states: HashMap<&Path, AnnotationState> =
      self.slots.iter().map(|(file, slot)| (file.as_path(), slot.state())).collect();
    f.debug_struct("AnnotationLifecycle")
      .field("states", &states)
      .field("next_ticket", &self.next_ticket)
      .field("saving", &self.saving)
      .finish_non_exhaustive()
  }
}
