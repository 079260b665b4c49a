//! Screen event dispatch.
//!
//! A post-detail or conversation screen forwards its user input as [`Event`]s
//! to [`handle_event`], which edits the draft locally or routes the event to
//! the [`OptimisticMutationEngine`]. The screen re-renders from its
//! [`InteractionStore`] clone after each call.
//!
//! # Example
//!
//! ```rust,no_run
//! use feedsync::app::{handle_event, Event, InteractionStore, OptimisticMutationEngine};
//! use feedsync::domain::SubjectId;
//!
//! # async fn run(engine: &OptimisticMutationEngine, store: &InteractionStore) -> feedsync::Result<()> {
//! let me = SubjectId::new("u1");
//! handle_event(engine, store, &me, &Event::DraftChanged("first!".into())).await?;
//! handle_event(engine, store, &me, &Event::Submit).await?;
//! # Ok(())
//! # }
//! ```

use super::mutation::{MutationOutcome, OptimisticMutationEngine};
use super::state::InteractionStore;
use crate::domain::entity::{EntityId, Placement, ToggleTarget};
use crate::domain::error::Result;
use crate::domain::subject::SubjectId;

/// User input on an interaction screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The input box changed.
    DraftChanged(String),

    /// Sends the draft as a top-level comment, or as a message in a
    /// conversation.
    Submit,

    /// Sends the draft as a reply to a confirmed top-level comment.
    Reply {
        parent: EntityId,
    },

    /// Likes or unlikes a post or comment.
    ToggleLike {
        entity: String,
    },

    /// Stars or unstars a post.
    ToggleStar {
        entity: String,
    },

    /// Hides the last error banner.
    DismissError,
}

impl Event {
    /// Variant name for logs; never includes user text.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DraftChanged(_) => "draft_changed",
            Self::Submit => "submit",
            Self::Reply { .. } => "reply",
            Self::ToggleLike { .. } => "toggle_like",
            Self::ToggleStar { .. } => "toggle_star",
            Self::DismissError => "dismiss_error",
        }
    }
}

/// Applies `event` on behalf of `subject`.
///
/// Local-only events resolve to [`MutationOutcome::Ignored`].
///
/// # Errors
///
/// Propagates the [`SyncError`](crate::SyncError) of the submission; the
/// store has already been brought back to a consistent state and carries the
/// user-facing message in `last_error`.
pub async fn handle_event(
    engine: &OptimisticMutationEngine,
    store: &InteractionStore,
    subject: &SubjectId,
    event: &Event,
) -> Result<MutationOutcome> {
    tracing::debug!(event_type = event.name(), "handle_event");

    match event {
        Event::DraftChanged(text) => {
            store.set_draft(text.as_str());
            Ok(MutationOutcome::Ignored)
        }
        Event::Submit => {
            let draft = store.draft();
            engine.submit_create(store, subject, Placement::Root, &draft).await
        }
        Event::Reply { parent } => {
            let draft = store.draft();
            let placement = Placement::Reply { parent: parent.clone() };
            engine.submit_create(store, subject, placement, &draft).await
        }
        Event::ToggleLike { entity } => engine.submit_toggle(store, subject, ToggleTarget::like(entity.as_str())).await,
        Event::ToggleStar { entity } => engine.submit_toggle(store, subject, ToggleTarget::star(entity.as_str())).await,
        Event::DismissError => {
            store.clear_error();
            Ok(MutationOutcome::Ignored)
        }
    }
}
