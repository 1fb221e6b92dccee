//! `marginalia` — review comments on source lines, from the terminal.
//!
//! # Usage
//!
//! ```
//! marginalia add src/lib.rs --line 12 "this allocates on every call"
//! marginalia show src/lib.rs
//! marginalia --config ~/.config/marginalia.toml list src/lib.rs
//! ```
//!
//! Line numbers are 1-based here.

mod settings;
mod terminal;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use marginalia_core::{
  comment::{Anchor, Comment},
  host::{IdentityLineMapping, TracingReporter},
  lifecycle::{AnnotationLifecycle, AnnotationTarget, LifecycleEvent},
  listener::TracingListener,
  note::Note,
  provider::CommentProvider,
  repository::CommentsRepository,
  session::EditCommentSession,
};
use marginalia_store_sqlite::SqliteProvider;
use tokio::{runtime::Handle, sync::oneshot};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{settings::CliConfig, terminal::TerminalGutter};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Review comments anchored to source lines")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "marginalia.toml")]
  config: PathBuf,

  /// SQLite comment store (overrides `store_path`).
  #[arg(long, value_name = "PATH")]
  store: Option<PathBuf>,

  /// Author name for new notes (overrides `user`).
  #[arg(long)]
  user: Option<String>,

  /// Revision new comments are anchored to (overrides `revision`).
  #[arg(long)]
  revision: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print every comment on a file.
  List { file: PathBuf },

  /// Start a new comment thread.
  Add {
    file:  PathBuf,
    #[arg(long)]
    line:  u32,
    /// Number of lines the comment covers.
    #[arg(long, default_value_t = 1)]
    lines: u32,
    text:  String,
  },

  /// Add a note to the last open comment on a line.
  Reply {
    file: PathBuf,
    #[arg(long)]
    line: u32,
    text: String,
  },

  /// Resolve the last open comment on a line.
  Resolve {
    file: PathBuf,
    #[arg(long)]
    line: u32,
  },

  /// Print a file with its annotation gutter.
  Show { file: PathBuf },

  /// List files that have comments.
  Files,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut cfg = CliConfig::load(&cli.config)?;
  if let Some(store) = cli.store {
    cfg.store_path = settings::expand_tilde(&store);
  }
  if let Some(user) = cli.user {
    cfg.user = user;
  }
  if let Some(revision) = cli.revision {
    cfg.revision = revision;
  }

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let provider = SqliteProvider::open(&cfg.store_path, cfg.provider_name.clone(), cfg.user.clone())
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let providers: Vec<Arc<dyn CommentProvider>> = vec![Arc::new(provider.clone())];
  let repository =
    Arc::new(CommentsRepository::new(providers).with_listener(Arc::new(TracingListener)));

  match cli.command {
    Command::List { file } => list(&repository, &file).await,
    Command::Add { file, line, lines, text } => {
      let anchor = Anchor::new(&file, to_index(line)?, cfg.revision.clone());
      let comment = Comment::draft(anchor).with_line_count(lines);
      let saved = edit(&repository, comment, Note::draft(), text).await?;
      println!("added comment {}", saved.id().map(|id| id.as_str()).unwrap_or("-"));
      Ok(())
    }
    Command::Reply { file, line, text } => {
      let comment = last_comment_at(&repository, &file, line).await?;
      edit(&repository, comment, Note::draft(), text).await?;
      println!("replied at {}:{line}", file.display());
      Ok(())
    }
    Command::Resolve { file, line } => {
      let comment = last_comment_at(&repository, &file, line).await?;
      let resolved = repository
        .submit(comment.to_resolved())
        .await
        .context("failed to resolve comment")?;
      repository.apply_update(&file, &comment, resolved);
      println!("resolved comment at {}:{line}", file.display());
      Ok(())
    }
    Command::Show { file } => show(repository, file, cfg.revision).await,
    Command::Files => {
      for path in provider.files().await.context("failed to list files")? {
        println!("{}", path.display());
      }
      Ok(())
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn list(repository: &CommentsRepository, file: &Path) -> anyhow::Result<()> {
  repository
    .refresh(file)
    .await
    .with_context(|| format!("failed to load comments for {}", file.display()))?;

  for comment in repository.comments_for(file) {
    let status = if comment.is_resolved() { " (resolved)" } else { "" };
    println!(
      "{}:{} [{}]{status}",
      file.display(),
      comment.line() + 1,
      comment.id().map(|id| id.as_str()).unwrap_or("-"),
    );
    for note in comment.notes() {
      println!(
        "  {} {}: {}",
        note.formatted_timestamp(),
        note.author().unwrap_or_default(),
        note.text()
      );
    }
  }
  Ok(())
}

/// Run an edit session non-interactively and persist the result.
async fn edit(
  repository: &CommentsRepository,
  comment: Comment,
  note: Note,
  text: String,
) -> anyhow::Result<Comment> {
  let (tx, rx) = oneshot::channel();
  let mut session =
    EditCommentSession::new(comment.clone(), note, repository.providers().to_vec(), move |c| {
      let _ = tx.send(c);
    });
  if session.needs_provider() {
    session.select_provider(0);
  }
  session.set_text(text);
  session.confirm().context("cannot save comment")?;

  let updated = rx.await.context("edit session ended without a comment")?;
  let saved = repository.submit(updated).await.context("failed to save comment")?;
  repository.apply_update(&comment.anchor().file, &comment, saved.clone());
  Ok(saved)
}

async fn last_comment_at(
  repository: &CommentsRepository,
  file: &Path,
  line: u32,
) -> anyhow::Result<Comment> {
  repository
    .refresh(file)
    .await
    .with_context(|| format!("failed to load comments for {}", file.display()))?;

  match repository.comments_at_line(file, to_index(line)?).pop() {
    Some(comment) => Ok(comment),
    None => bail!("no open comment at {}:{line}", file.display()),
  }
}

async fn show(
  repository: Arc<CommentsRepository>,
  file: PathBuf,
  revision: String,
) -> anyhow::Result<()> {
  let source = std::fs::read_to_string(&file)
    .with_context(|| format!("failed to read {}", file.display()))?;

  let gutter = TerminalGutter::default();
  let mut lifecycle =
    AnnotationLifecycle::new(repository, Handle::current(), Arc::new(TracingReporter));
  lifecycle.toggle_on(AnnotationTarget {
    file:     file.clone(),
    revision,
    mapping:  Arc::new(IdentityLineMapping),
    gutter:   Box::new(gutter.clone()),
  });

  match lifecycle.next_event().await {
    Some(LifecycleEvent::Annotated { .. }) => print!("{}", gutter.render(&source)),
    Some(LifecycleEvent::LoadFailed { .. }) => {
      bail!("failed to load comments for {}", file.display())
    }
    other => bail!("unexpected annotation event: {other:?}"),
  }

  lifecycle.toggle_off(&file);
  Ok(())
}

/// Convert a 1-based command-line line number to a 0-based anchor line.
fn to_index(line: u32) -> anyhow::Result<u32> {
  match line.checked_sub(1) {
    Some(index) => Ok(index),
    None => bail!("line numbers start at 1"),
  }
}
