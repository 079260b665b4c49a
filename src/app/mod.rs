//! Coordinators that sit between screens and the remote API.
//!
//! ```text
//! Screen input ─▶ handle_event ─▶ OptimisticMutationEngine ─▶ ApiClient
//!      ▲                              │   │   │
//!      │                 InputValidator   │   RateLimiter
//!      │                                  ▼
//!      └──────── render ◀──────── InteractionStore
//!
//! Search box ─▶ SearchCoordinator ─▶ ApiClient
//!      ▲               │
//!      └── SearchState ◀── SearchEvent channel
//! ```
//!
//! # Modules
//!
//! - [`handler`]: screen events routed to the mutation engine
//! - [`modes`]: search coordinator phases
//! - [`mutation`]: optimistic create and toggle pipeline
//! - [`rate_limit`]: per-subject sliding windows
//! - [`search`]: debounced, sequence-checked search
//! - [`state`]: the screen-owned store and search view state
//! - [`validation`]: sanitation and per-field rules

pub mod handler;
pub mod modes;
pub mod mutation;
pub mod rate_limit;
pub mod search;
pub mod state;
pub mod validation;

pub use handler::{handle_event, Event};
pub use modes::SearchPhase;
pub use mutation::{MutationOutcome, OptimisticMutationEngine};
pub use rate_limit::{RateDecision, RateLimiter};
pub use search::{SearchCoordinator, SearchEvent};
pub use state::{InteractionStore, SearchState};
pub use validation::{sanitize_input, InputValidator};
