//! Error types for `marginalia-core`.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error produced inside a backend (network, database, decoding).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A review-comment backend failed.
///
/// Recovered at the annotation lifecycle boundary: the load is abandoned and
/// the error is shown to the user. Never cached as a partial result.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("{provider}: failed to fetch comments: {source}")]
  Fetch {
    provider: String,
    #[source]
    source:   BoxError,
  },

  #[error("{provider}: failed to submit comment: {source}")]
  Submit {
    provider: String,
    #[source]
    source:   BoxError,
  },

  /// A provider returned a comment that does not carry its provider tag.
  #[error("{provider}: returned a comment without a provider tag")]
  Untagged { provider: String },

  #[error("no registered provider named {0:?}")]
  UnknownProvider(String),

  /// The backend is reachable but refuses work (e.g. not configured).
  #[error("{provider}: {message}")]
  Unavailable { provider: String, message: String },
}

impl BackendError {
  /// Wrap a fetch failure raised by `provider`.
  pub fn fetch(
    provider: impl Into<String>,
    err: impl Into<BoxError>,
  ) -> Self {
    Self::Fetch { provider: provider.into(), source: err.into() }
  }

  /// Wrap a submit failure raised by `provider`.
  pub fn submit(
    provider: impl Into<String>,
    err: impl Into<BoxError>,
  ) -> Self {
    Self::Submit { provider: provider.into(), source: err.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error("file is not annotated: {0}")]
  NotAnnotated(PathBuf),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
