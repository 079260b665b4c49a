//! Error types for the interaction synchronization core.
//!
//! This module defines the boundary error [`SyncError`] that every coordinator
//! converts its failures into before they reach a screen, plus the narrower
//! [`ApiError`] produced by transports and [`InvalidInput`] produced by the
//! validator. All errors are implemented with `thiserror`.
//!
//! A superseded search response is deliberately absent from this taxonomy: it
//! is dropped inside the coordinator and never surfaces as a value.

use crate::domain::entity::EntityId;
use crate::domain::subject::{ActionKind, FieldKind};
use std::time::Duration;
use thiserror::Error;

/// Why a piece of user text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// Nothing left after sanitizing and trimming.
    Empty,

    /// Longer than the field allows, counted in characters.
    TooLong {
        /// Configured maximum for the field.
        max: usize,
        /// Length of the normalized text.
        actual: usize,
    },
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::TooLong { max, actual } => write!(f, "too long ({actual} > {max})"),
        }
    }
}

/// Rejection produced by [`InputValidator::validate`](crate::app::InputValidator::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct InvalidInput {
    /// Field the text was entered into.
    pub field: FieldKind,
    /// Rule that rejected it.
    pub reason: ReasonCode,
}

/// Failure reported by an [`ApiClient`](crate::transport::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned {code}: {message}")]
    Status {
        /// HTTP-style status code.
        code: u16,
        /// Server supplied message, possibly empty.
        message: String,
    },

    /// No response within the configured request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the expected entity shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// The main error type surfaced by the synchronization core.
///
/// Validation and rate-limit failures are raised before any optimistic state
/// exists. Transport failures are raised after the optimistic state has been
/// rolled back. Configuration variants only occur while loading [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum SyncError {
    /// User text failed the validator; no network call was made.
    #[error("validation failed: {0}")]
    Validation(#[from] InvalidInput),

    /// The acting subject exceeded the allowed rate for this action.
    #[error("rate limit exceeded for {action}, retry after {retry_after:?}")]
    RateLimited {
        /// Action that was denied.
        action: ActionKind,
        /// Time until the oldest recorded action leaves the window.
        retry_after: Duration,
    },

    /// The underlying request failed; optimistic state has been reverted.
    #[error("transport error: {0}")]
    Transport(#[from] ApiError),

    /// A reply targeted a parent that is missing or not yet confirmed.
    #[error("invalid target: {0}")]
    InvalidTarget(EntityId),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns the message a screen should show for this error.
    ///
    /// Transport failures collapse to one generic retryable message so that
    /// server details never leak into the interface.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(InvalidInput { field, reason: ReasonCode::Empty }) => {
                format!("{} cannot be empty.", field.label())
            }
            Self::Validation(InvalidInput { field, reason: ReasonCode::TooLong { max, .. } }) => {
                format!("{} must be at most {max} characters.", field.label())
            }
            Self::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_millis().div_ceil(1000).max(1);
                format!("You're doing that too often. Try again in {secs}s.")
            }
            Self::Transport(_) => "Something went wrong. Please try again.".to_string(),
            Self::InvalidTarget(_) => "That item is no longer available.".to_string(),
            Self::Config(_) | Self::Toml(_) | Self::Io(_) => self.to_string(),
        }
    }

    /// Whether retrying the same call later can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }
}

/// A specialized `Result` type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
