//! feedsync: client-side interaction synchronization for feed, shop and chat screens.
//!
//! The crate sits between screen code and a remote API and owns the small amount
//! of state-machine logic those screens share:
//! - Debounced search with cancellation and stale-response suppression
//! - Optimistic creates (comments, replies, chat messages) with in-place
//!   reconciliation and exact rollback
//! - Optimistic toggles (likes, stars) with counter rollback
//! - Per-user sliding-window rate limiting of write actions
//! - Input sanitation and validation before anything is stored or sent
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Screen code (external)                             │  ← Renders store
//! └─────────────────────────────────────────────────────┘
//!                        │ Events / query changes
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │
//! │  - InputValidator → RateLimiter                     │
//! │  - OptimisticMutationEngine → InteractionStore      │
//! │  - SearchCoordinator → SearchState                  │
//! └─────────────────────────────────────────────────────┘
//!                        │ ApiRequest
//! ┌─────────────────────────────────────────────────────┐
//! │  Transport boundary (transport/)                    │  ← ApiClient trait
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (domain/) · Observability (observability/)  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Coordinators, validator, rate limiter and the interaction store
//! - [`domain`]: Entities, identities and the error taxonomy
//! - [`transport`]: The `ApiClient` seam and request types
//! - [`observability`]: Tracing subscriber setup with optional span export
//!
//! # Configuration
//!
//! Every tuning constant lives in [`Config`], which can be loaded from TOML:
//!
//! ```toml
//! request_timeout_ms = 10000
//! trace_level = "debug"
//!
//! [search]
//! debounce_ms = 500
//! cancel_in_flight = true
//!
//! [rate_limits.post_comment]
//! max_actions = 5
//! window_ms = 60000
//!
//! [input]
//! comment_max = 1000
//! ```
//!
//! # Execution model
//!
//! Everything runs on tokio. Shared state sits behind short, synchronous
//! critical sections that are never held across an `.await`, so ordering
//! hazards only come from interleaved completions, which the coordinators
//! handle explicitly with sequence numbers and temporary ids.

pub mod app;
pub mod domain;
pub mod observability;
pub mod transport;

pub use app::{
    handle_event, Event, InputValidator, InteractionStore, MutationOutcome,
    OptimisticMutationEngine, RateDecision, RateLimiter, SearchCoordinator, SearchEvent,
    SearchState,
};
pub use domain::{ActionKind, Comment, EntityId, FieldKind, Result, SubjectId, SyncError};
pub use transport::{ApiClient, ApiRequest, ContentType, Endpoint, SearchFilters};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Search coordinator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a request is dispatched.
    pub debounce_ms: u64,

    /// Abort superseded in-flight requests instead of only discarding their
    /// results on arrival.
    pub cancel_in_flight: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            cancel_in_flight: true,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Sliding-window limit for one action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRule {
    /// Maximum allowed actions inside any window.
    pub max_actions: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateRule {
    #[must_use]
    pub const fn new(max_actions: u32, window_ms: u64) -> Self {
        Self { max_actions, window_ms }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Per action kind rate rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub post_comment: RateRule,
    pub post_reply: RateRule,
    pub send_message: RateRule,
    pub toggle_like: RateRule,
    pub toggle_star: RateRule,

    /// Upper bound on tracked `(subject, action)` windows before the least
    /// recently active one is evicted.
    pub max_tracked_subjects: usize,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            post_comment: RateRule::new(5, 60_000),
            post_reply: RateRule::new(5, 60_000),
            send_message: RateRule::new(20, 60_000),
            toggle_like: RateRule::new(30, 60_000),
            toggle_star: RateRule::new(30, 60_000),
            max_tracked_subjects: 10_000,
        }
    }
}

impl RateLimits {
    #[must_use]
    pub const fn rule(&self, action: ActionKind) -> RateRule {
        match action {
            ActionKind::PostComment => self.post_comment,
            ActionKind::PostReply => self.post_reply,
            ActionKind::SendMessage => self.send_message,
            ActionKind::ToggleLike => self.toggle_like,
            ActionKind::ToggleStar => self.toggle_star,
        }
    }

    /// Mutable access, used to tune a single rule in place.
    pub fn rule_mut(&mut self, action: ActionKind) -> &mut RateRule {
        match action {
            ActionKind::PostComment => &mut self.post_comment,
            ActionKind::PostReply => &mut self.post_reply,
            ActionKind::SendMessage => &mut self.send_message,
            ActionKind::ToggleLike => &mut self.toggle_like,
            ActionKind::ToggleStar => &mut self.toggle_star,
        }
    }
}

/// Maximum normalized length, in characters, per input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLimits {
    pub comment_max: usize,
    pub reply_max: usize,
    pub caption_max: usize,
    pub message_max: usize,
    pub search_query_max: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            comment_max: 1000,
            reply_max: 1000,
            caption_max: 2200,
            message_max: 2000,
            search_query_max: 200,
        }
    }
}

impl InputLimits {
    #[must_use]
    pub const fn max_len(&self, field: FieldKind) -> usize {
        match field {
            FieldKind::Comment => self.comment_max,
            FieldKind::Reply => self.reply_max,
            FieldKind::Caption => self.caption_max,
            FieldKind::Message => self.message_max,
            FieldKind::SearchQuery => self.search_query_max,
        }
    }
}

/// Tuning for every coordinator in the crate.
///
/// All sections default to the values observed in the client, so an empty
/// TOML document yields a working configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search debounce and cancellation.
    pub search: SearchConfig,

    /// Per-action rate limits.
    pub rate_limits: RateLimits,

    /// Per-field maximum lengths.
    pub input: InputLimits,

    /// Deadline applied to every `ApiClient` call.
    ///
    /// `None` (the default) relies on the transport's own timeout.
    pub request_timeout_ms: Option<u64>,

    /// Tracing filter directive. Options: `trace`, `debug`, `info`, `warn`,
    /// `error`, or any `EnvFilter` directive. Default: `"info"`
    pub trace_level: Option<String>,

    /// When set, finished spans are exported as JSON lines to this file.
    pub trace_file: Option<PathBuf>,
}

impl Config {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Toml`] for malformed documents and
    /// [`SyncError::Config`] for values that fail [`Config::validate`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use feedsync::Config;
    ///
    /// let config = Config::from_toml_str("[search]\ndebounce_ms = 250\n")?;
    /// assert_eq!(config.search.debounce_ms, 250);
    /// assert_eq!(config.rate_limits.post_comment.max_actions, 5);
    /// # Ok::<(), feedsync::SyncError>(())
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be read, otherwise the
    /// errors of [`Config::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "loading configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects limits that would make every action impossible.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        for action in [
            ActionKind::PostComment,
            ActionKind::PostReply,
            ActionKind::SendMessage,
            ActionKind::ToggleLike,
            ActionKind::ToggleStar,
        ] {
            let rule = self.rate_limits.rule(action);
            if rule.max_actions == 0 {
                return Err(SyncError::Config(format!("rate_limits.{action}.max_actions must be > 0")));
            }
            if rule.window_ms == 0 {
                return Err(SyncError::Config(format!("rate_limits.{action}.window_ms must be > 0")));
            }
        }

        if self.rate_limits.max_tracked_subjects == 0 {
            return Err(SyncError::Config("rate_limits.max_tracked_subjects must be > 0".to_string()));
        }

        for field in [FieldKind::Comment, FieldKind::Reply, FieldKind::Caption, FieldKind::Message, FieldKind::SearchQuery] {
            if self.input.max_len(field) == 0 {
                return Err(SyncError::Config(format!("input max length for {field} must be > 0")));
            }
        }

        if self.request_timeout_ms == Some(0) {
            return Err(SyncError::Config("request_timeout_ms must be > 0 when set".to_string()));
        }

        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
