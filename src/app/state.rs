//! Screen-owned interaction state.
//!
//! [`InteractionStore`] holds what a post-detail or conversation screen renders:
//! the comment list with one level of replies, toggle flags and counters, the
//! draft input text and the last user-visible error. It is a cheap-to-clone
//! handle; the screen keeps one clone for rendering and passes another to the
//! mutation engine.
//!
//! [`SearchState`] is the equivalent for search screens. It folds the events
//! published by a [`SearchCoordinator`](super::SearchCoordinator).
//!
//! # Consistency
//!
//! Every mutation takes the lock once and releases it before returning, so a
//! reader never observes a half-applied optimistic insert or rollback.

use super::search::SearchEvent;
use crate::domain::entity::{Comment, EntityId, LocalId, MutationStatus, Placement, ToggleState, ToggleTarget};
use crate::domain::error::{Result, SyncError};
use crate::transport::ThreadRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct StoreState {
    thread: ThreadRef,
    comments: Vec<Comment>,
    draft: String,
    toggles: HashMap<ToggleTarget, ToggleState>,
    last_error: Option<String>,
}

/// Shared handle to one thread's comments, toggles and draft.
#[derive(Debug, Clone)]
pub struct InteractionStore {
    inner: Arc<Mutex<StoreState>>,
}

impl InteractionStore {
    /// Creates an empty store for `thread`.
    #[must_use]
    pub fn new(thread: ThreadRef) -> Self {
        Self::with_comments(thread, Vec::new())
    }

    /// Creates a store pre-populated with comments loaded by the screen.
    #[must_use]
    pub fn with_comments(thread: ThreadRef, comments: Vec<Comment>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState {
                thread,
                comments,
                draft: String::new(),
                toggles: HashMap::new(),
                last_error: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn thread(&self) -> ThreadRef {
        self.state().thread.clone()
    }

    /// Snapshot of the top-level list, replies included.
    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.state().comments.clone()
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().comments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a top-level entry or a reply by id.
    #[must_use]
    pub fn find(&self, id: &EntityId) -> Option<Comment> {
        let state = self.state();
        state
            .comments
            .iter()
            .find_map(|c| if &c.id == id { Some(c) } else { c.replies.iter().find(|r| &r.id == id) })
            .cloned()
    }

    /// Whether `id` is a confirmed top-level entry that can take replies.
    #[must_use]
    pub fn has_root(&self, id: &EntityId) -> bool {
        !id.is_temporary() && self.state().comments.iter().any(|c| &c.id == id)
    }

    /// Replaces the whole list, e.g. after a pull-to-refresh.
    pub fn replace_comments(&self, comments: Vec<Comment>) {
        self.state().comments = comments;
    }

    #[must_use]
    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.state().draft = text.into();
    }

    /// Current flag and counter; unknown targets read as inactive with zero count.
    #[must_use]
    pub fn toggle_state(&self, target: &ToggleTarget) -> ToggleState {
        self.state().toggles.get(target).copied().unwrap_or_default()
    }

    /// Seeds a toggle with the server's view, e.g. when a post is loaded.
    pub fn set_toggle_state(&self, target: ToggleTarget, toggle: ToggleState) {
        self.state().toggles.insert(target, toggle);
    }

    /// Last error surfaced by a failed mutation.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state().last_error = None;
    }

    pub(crate) fn set_error(&self, message: String) {
        self.state().last_error = Some(message);
    }

    /// Inserts a pending entity at `placement` and clears the draft.
    ///
    /// Both happen under one lock so a renderer sees either neither or both.
    pub(crate) fn insert_optimistic(&self, placement: &Placement, comment: Comment) -> Result<()> {
        let mut state = self.state();

        match placement {
            Placement::Root => state.comments.push(comment),
            Placement::Reply { parent } => {
                if parent.is_temporary() {
                    return Err(SyncError::InvalidTarget(parent.clone()));
                }
                let Some(parent_comment) = state.comments.iter_mut().find(|c| &c.id == parent) else {
                    return Err(SyncError::InvalidTarget(parent.clone()));
                };
                parent_comment.replies.push(comment);
            }
        }

        state.draft.clear();
        Ok(())
    }

    /// Replaces the temporary entity `local` with `confirmed`, keeping its index.
    ///
    /// Returns `false` if the placeholder is gone (its parent was removed).
    pub(crate) fn reconcile(&self, local: LocalId, confirmed: Comment) -> bool {
        let temp_id = EntityId::Temporary(local);
        let mut state = self.state();

        if let Some(slot) = state.comments.iter_mut().find(|c| c.id == temp_id) {
            *slot = confirmed;
            return true;
        }

        for parent in &mut state.comments {
            if let Some(slot) = parent.replies.iter_mut().find(|r| r.id == temp_id) {
                *slot = confirmed;
                return true;
            }
        }

        false
    }

    /// Removes the temporary entity `local`, restores `draft` and records `error`.
    ///
    /// Returns the detached placeholder marked `Failed`.
    ///
    /// Only the placeholder itself is removed; entries inserted around it by
    /// other operations keep their relative order.
    pub(crate) fn roll_back_create(&self, local: LocalId, draft: &str, error: String) -> Option<Comment> {
        let temp_id = EntityId::Temporary(local);
        let mut state = self.state();

        let removed = if let Some(index) = state.comments.iter().position(|c| c.id == temp_id) {
            Some(state.comments.remove(index))
        } else {
            state.comments.iter_mut().find_map(|parent| {
                let index = parent.replies.iter().position(|r| r.id == temp_id)?;
                Some(parent.replies.remove(index))
            })
        };

        state.draft = draft.to_string();
        state.last_error = Some(error);
        removed.map(|mut comment| {
            comment.status = MutationStatus::Failed;
            comment
        })
    }

    /// Flips the toggle and returns the counter delta applied.
    pub(crate) fn flip_toggle(&self, target: &ToggleTarget) -> i64 {
        let mut state = self.state();
        let current = state.toggles.get(target).copied().unwrap_or_default();
        let (next, delta) = current.flipped();
        state.toggles.insert(target.clone(), next);
        delta
    }

    /// Reverses a flip that applied `delta` and records `error`.
    pub(crate) fn revert_toggle(&self, target: &ToggleTarget, delta: i64, error: String) {
        let mut state = self.state();
        let current = state.toggles.get(target).copied().unwrap_or_default();
        state.toggles.insert(target.clone(), current.reverted(delta));
        state.last_error = Some(error);
    }
}

/// Search screen state folded from [`SearchEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T> SearchState<T> {
    /// Applies one event. Results clear any previous error; errors keep the
    /// last results on screen.
    pub fn apply(&mut self, event: SearchEvent<T>) {
        match event {
            SearchEvent::Results(items) => {
                self.items = items;
                self.error = None;
            }
            SearchEvent::Error(message) => self.error = Some(message),
            SearchEvent::Loading(loading) => self.loading = loading,
        }
    }
}
