//! Search coordinator phases.
//!
//! ```text
//! Idle ──on_query_change──▶ Scheduled ──timer fires──▶ InFlight ──latest response──▶ Idle
//!   ▲                          │  ▲                        │
//!   └────────cancel────────────┘  └────on_query_change─────┘
//! ```
//!
//! A query change while `InFlight` schedules a new request; the in-flight one
//! is aborted (or its response later discarded) and never moves the phase.

/// Phase of a [`SearchCoordinator`](super::SearchCoordinator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchPhase {
    /// Nothing scheduled and no accepted request outstanding.
    #[default]
    Idle,

    /// A debounce timer is running for the latest query.
    Scheduled,

    /// The latest issued request has been dispatched and not yet answered.
    InFlight,
}
