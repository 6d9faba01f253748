//! Error taxonomy for the storage engine.
//!
//! Format and I/O failures are fatal to one file or operation and propagate
//! to the caller. Page-fill failures are handled inside the cache and never
//! reach this type's callers. Invariant violations mark corrupted arrays or
//! out-of-range access.

use std::io;

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  Format,
  Io,
  InvariantViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Bad chunk signature, unsupported version or malformed header.
  #[error("format error: {0}")]
  Format(String),

  /// Open, seek, read or write failure with the operation that caused it.
  #[error("i/o error while {context}: {source}")]
  Io {
    context: String,
    #[source]
    source: io::Error,
  },

  /// Index out of range or corrupted node array.
  #[error("invariant violation: {0}")]
  InvariantViolation(String),
}

impl StoreError {
  pub fn format(message: impl Into<String>) -> Self {
    Self::Format(message.into())
  }

  pub fn io(context: impl Into<String>, source: io::Error) -> Self {
    Self::Io {
      context: context.into(),
      source,
    }
  }

  pub fn invariant(message: impl Into<String>) -> Self {
    Self::InvariantViolation(message.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Format(_) => ErrorKind::Format,
      Self::Io { .. } => ErrorKind::Io,
      Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
    }
  }
}

impl From<io::Error> for StoreError {
  fn from(source: io::Error) -> Self {
    // A truncated file shows up as UnexpectedEof; report it as a format error.
    if source.kind() == io::ErrorKind::UnexpectedEof {
      return Self::Format(format!("unexpected end of file: {source}"));
    }
    Self::io("accessing file", source)
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;
