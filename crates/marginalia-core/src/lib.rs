//! Core types and engine for Marginalia review-comment annotations.
//!
//! This crate is free of database and terminal dependencies. Backends
//! implement [`provider::CommentProvider`]; hosts implement the traits in
//! [`host`] and drive an [`lifecycle::AnnotationLifecycle`].

pub mod comment;
pub mod error;
pub mod gutter;
pub mod host;
pub mod lifecycle;
pub mod listener;
pub mod memory;
pub mod note;
pub mod provider;
pub mod repository;
pub mod session;

pub use error::{Error, Result};
