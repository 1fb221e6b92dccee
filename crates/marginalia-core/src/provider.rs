//! The `CommentProvider` trait — the contract every review backend fulfils.
//!
//! Higher layers (the repository, the edit session, the CLI) depend on this
//! abstraction, never on a concrete backend. Several providers may be
//! registered at once; they are handed to the repository as trait objects, so
//! the trait stays object-safe through `async_trait`.

use std::{fmt, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{comment::Comment, error::BackendError};

// ─── ProviderRef ─────────────────────────────────────────────────────────────

/// Names the provider a comment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRef(String);

impl ProviderRef {
  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

  pub fn name(&self) -> &str { &self.0 }

  /// Whether this reference names `provider`.
  pub fn is(&self, provider: &dyn CommentProvider) -> bool { self.0 == provider.name() }
}

impl fmt::Display for ProviderRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A pluggable source of review comments.
///
/// `fetch` and `submit` may perform network or disk I/O and are always called
/// off the interaction thread. A hung call is the provider's to bound.
#[async_trait]
pub trait CommentProvider: Send + Sync {
  /// Display name; also the identity stored in [`ProviderRef`].
  fn name(&self) -> &str;

  /// The user this provider acts as. Used to decide who may edit a note.
  fn current_user(&self) -> String;

  /// All comments this provider holds for `file`, in the provider's order.
  /// Every returned comment must carry this provider's [`ProviderRef`].
  async fn fetch(&self, file: &Path) -> Result<Vec<Comment>, BackendError>;

  /// Persist `comment` (insert when it has no id, update otherwise) and
  /// return the stored version, with id and provider tag assigned.
  async fn submit(&self, comment: Comment) -> Result<Comment, BackendError>;

  /// Reference to this provider, for tagging comments.
  fn provider_ref(&self) -> ProviderRef { ProviderRef::new(self.name()) }
}
