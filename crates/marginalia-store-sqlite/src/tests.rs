//! Integration tests for `SqliteProvider` against an in-memory database.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use marginalia_core::{
  comment::{Anchor, Comment, CommentId},
  error::BackendError,
  note::Note,
  provider::{CommentProvider, ProviderRef},
};

use crate::{Error, SqliteProvider};

async fn provider() -> SqliteProvider {
  SqliteProvider::open_in_memory("local", "alice")
    .await
    .expect("in-memory store")
}

fn draft(file: &str, line: u32, texts: &[&str]) -> Comment {
  let ts = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
  texts.iter().fold(Comment::draft(Anchor::new(file, line, "abc123")), |c, text| {
    c.to_updated(&Note::draft(), Note::new(ts, "alice", *text))
  })
}

// ─── Submit ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_assigns_uuid_and_tags_provider() {
  let p = provider().await;
  let stored = p.submit(draft("src/lib.rs", 3, &["hello"])).await.unwrap();

  let id = stored.id().expect("id assigned");
  assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
  assert_eq!(stored.provider().map(ProviderRef::name), Some("local"));
}

#[tokio::test]
async fn fetch_round_trips_notes_and_anchor() {
  let p = provider().await;
  let stored = p
    .submit(draft("src/lib.rs", 7, &["first", "second"]).with_line_count(3))
    .await
    .unwrap();

  let fetched = p.fetch(Path::new("src/lib.rs")).await.unwrap();
  assert_eq!(fetched, vec![stored]);

  let comment = &fetched[0];
  assert_eq!(comment.line(), 7);
  assert_eq!(comment.line_count(), 3);
  assert_eq!(comment.anchor().revision, "abc123");
  assert_eq!(comment.notes()[0].text(), "first");
  assert_eq!(comment.notes()[1].author(), Some("alice"));
}

#[tokio::test]
async fn fetch_keeps_insertion_order_per_file() {
  let p = provider().await;
  let a = p.submit(draft("a.rs", 9, &["a"])).await.unwrap();
  p.submit(draft("b.rs", 1, &["b"])).await.unwrap();
  let c = p.submit(draft("a.rs", 2, &["c"])).await.unwrap();

  let fetched = p.fetch(Path::new("a.rs")).await.unwrap();
  assert_eq!(fetched, vec![a, c]);
  assert!(p.fetch(Path::new("none.rs")).await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_with_id_updates_row() {
  let p = provider().await;
  let stored = p.submit(draft("a.rs", 1, &["one"])).await.unwrap();

  let reply = stored.to_updated(&Note::draft(), Note::new(Utc::now(), "bob", "two"));
  p.submit(reply.clone()).await.unwrap();
  let resolved = p.submit(reply.to_resolved()).await.unwrap();

  let fetched = p.fetch(Path::new("a.rs")).await.unwrap();
  assert_eq!(fetched.len(), 1);
  assert_eq!(fetched[0], resolved);
  assert!(fetched[0].is_resolved());
  assert_eq!(fetched[0].note_count(), 2);
}

#[tokio::test]
async fn updating_unknown_id_fails() {
  let p = provider().await;
  let ghost = Comment::persisted(
    CommentId::new(uuid::Uuid::new_v4().to_string()),
    ProviderRef::new("local"),
    Anchor::new("a.rs", 1, "rev"),
    Vec::new(),
  );

  let err = p.save(ghost.clone()).await.unwrap_err();
  assert!(matches!(err, Error::CommentNotFound(_)));

  let err = p.submit(ghost).await.unwrap_err();
  assert!(matches!(err, BackendError::Submit { ref provider, .. } if provider == "local"));
}

#[tokio::test]
async fn malformed_id_is_rejected() {
  let p = provider().await;
  let bogus = Comment::persisted(
    CommentId::new("not-a-uuid"),
    ProviderRef::new("local"),
    Anchor::new("a.rs", 1, "rev"),
    Vec::new(),
  );
  assert!(matches!(p.save(bogus).await, Err(Error::Uuid(_))));
}

// ─── Files ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn files_lists_distinct_paths() {
  let p = provider().await;
  p.submit(draft("z.rs", 1, &["x"])).await.unwrap();
  p.submit(draft("a.rs", 1, &["x"])).await.unwrap();
  p.submit(draft("z.rs", 5, &["y"])).await.unwrap();

  let files = p.files().await.unwrap();
  assert_eq!(files, vec![PathBuf::from("a.rs"), PathBuf::from("z.rs")]);
}

// ─── Files on disk ───────────────────────────────────────────────────────────

#[tokio::test]
async fn reopened_file_keeps_comments() {
  let dir = std::env::temp_dir().join(format!("marginalia-test-{}", uuid::Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("comments.db");

  let stored = {
    let p = SqliteProvider::open(&path, "local", "alice").await.unwrap();
    p.submit(draft("a.rs", 4, &["persist me"])).await.unwrap()
  };

  let p = SqliteProvider::open(&path, "local", "alice").await.unwrap();
  assert_eq!(p.fetch(Path::new("a.rs")).await.unwrap(), vec![stored]);
  assert_eq!(p.current_user(), "alice");

  drop(p);
  let _ = std::fs::remove_dir_all(&dir);
}
