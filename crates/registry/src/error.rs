//! # Registry Errors
//!
//! [`RegistryError`] is the single error type surfaced by the registry. Every variant
//! carries a stable [`ErrorKind`] so the boundary layer can map failures onto status
//! codes without inspecting messages.

use std::borrow::Cow;
use std::time::Duration;

/// Machine-checkable failure category of a [`RegistryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed path, namespace, email or package fields.
    Validation,
    /// Overlapping path or duplicate registration.
    Conflict,
    /// Unknown path, token or email.
    NotFound,
    /// The credential does not own the namespace.
    Unauthorized,
    /// A reset was requested before the previous cooldown elapsed.
    RateLimited,
    /// The durable flush (or load) failed.
    Persistence,
}

impl ErrorKind {
    /// HTTP status code the boundary layer answers with.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::Persistence => 500,
        }
    }
}

/// Errors produced by registry operations and persistence backends.
#[vain_derive::vain_error(kind = ErrorKind)]
pub enum RegistryError {
    #[kind(Validation)]
    #[error("Validation failed{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(Conflict)]
    #[error("Conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(NotFound)]
    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(Unauthorized)]
    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(RateLimited)]
    #[error(
        "Rate limit hit{}: {message}; try again in {:.2} mins",
        format_context(.context),
        minutes(.retry_after)
    )]
    RateLimited {
        message: Cow<'static, str>,
        retry_after: Duration,
        context: Option<Cow<'static, str>>,
    },

    #[kind(Persistence)]
    #[error("Storage I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[kind(Persistence)]
    #[error("Snapshot serialization failure{}: {source}", format_context(.context))]
    Serialization { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[cfg(feature = "redb")]
    #[kind(Persistence)]
    #[error("Embedded database failure{}: {source}", format_context(.context))]
    Database { source: redb::Error, context: Option<Cow<'static, str>> },

    #[kind(Persistence)]
    #[error("Corrupted snapshot{}: {message}", format_context(.context))]
    Corrupted { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Convenience alias used across the crate.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

impl RegistryError {
    /// Remaining cooldown carried by a [`RegistryError::RateLimited`].
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }

    pub(crate) fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Conflict { message: message.into(), context: None }
    }

    pub(crate) fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: message.into(), context: None }
    }

    pub(crate) fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unauthorized { message: message.into(), context: None }
    }

    pub(crate) fn corrupted(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupted { message: message.into(), context: None }
    }
}

fn minutes(wait: &Duration) -> f64 {
    wait.as_secs_f64() / 60.0
}
