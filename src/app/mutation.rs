//! Optimistic writes: comments, replies, messages and toggles.
//!
//! Every submission runs the same pipeline:
//!
//! ```text
//! validate ─▶ in-flight guard ─▶ rate limit ─▶ optimistic apply ─▶ request
//!                                                                    │
//!                                 reconcile in place ◀── success ────┤
//!                                 roll back exactly  ◀── failure ────┘
//! ```
//!
//! Reply parents are checked before the rate limiter, so a reply that could
//! never be placed uses no quota. Nothing touches the store before validation
//! and rate limiting pass, so a rejected submission leaves no trace besides
//! `last_error`. Once the
//! optimistic change is applied, exactly one of reconcile or rollback follows.
//!
//! Drive submissions to completion (spawn them if the caller may go away);
//! dropping the future mid-request leaves the placeholder pending.

use super::rate_limit::{RateDecision, RateLimiter};
use super::state::InteractionStore;
use super::validation::InputValidator;
use crate::domain::entity::{Comment, LocalId, Placement, ToggleState, ToggleTarget};
use crate::domain::error::{ApiError, Result, SyncError};
use crate::domain::subject::{ActionKind, FieldKind, SubjectId};
use crate::transport::client::with_timeout;
use crate::transport::{ApiClient, ApiRequest, CommentRecord, ThreadRef};
use crate::Config;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

/// How a submission ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server confirmed the entity; it now sits where the placeholder was.
    Created(Comment),

    /// The server accepted the toggle; carries the resulting state.
    Toggled(ToggleState),

    /// No request was made: the same mutation was already in flight, or the
    /// event only touched local state.
    Ignored,
}

/// Identity of a mutation for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MutationKey {
    Create {
        subject: SubjectId,
        thread: ThreadRef,
        placement: Placement,
    },
    Toggle {
        subject: SubjectId,
        target: ToggleTarget,
    },
}

/// Holds a key in the in-flight set until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<MutationKey>>,
    key: MutationKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

/// Applies writes locally first and reconciles them with the server.
pub struct OptimisticMutationEngine {
    client: Arc<dyn ApiClient>,
    limiter: Arc<RateLimiter>,
    validator: InputValidator,
    timeout: Option<Duration>,
    in_flight: Mutex<HashSet<MutationKey>>,
    next_local: AtomicU64,
}

impl std::fmt::Debug for OptimisticMutationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMutationEngine")
            .field("limiter", &self.limiter)
            .field("validator", &self.validator)
            .field("timeout", &self.timeout)
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl OptimisticMutationEngine {
    /// Creates an engine sharing `limiter` with any other engine of the session.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>, limiter: Arc<RateLimiter>, config: &Config) -> Self {
        Self {
            client,
            limiter,
            validator: InputValidator::from_config(config),
            timeout: config.request_timeout(),
            in_flight: Mutex::new(HashSet::new()),
            next_local: AtomicU64::new(1),
        }
    }

    /// Number of mutations currently awaiting a server answer.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Creates a comment, reply or message in `store`'s thread.
    ///
    /// The kind follows from the thread and placement: a root entry under a
    /// post is a comment, a reply placement under a post is a reply, and any
    /// entry in a conversation is a message.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if the text is empty or too long
    /// - [`SyncError::InvalidTarget`] if the reply parent is unconfirmed,
    ///   missing, or the thread is a conversation
    /// - [`SyncError::RateLimited`] if the subject exceeded the window
    /// - [`SyncError::Transport`] if the request failed; the placeholder has
    ///   been removed and the draft restored
    pub async fn submit_create(
        &self,
        store: &InteractionStore,
        subject: &SubjectId,
        placement: Placement,
        raw_text: &str,
    ) -> Result<MutationOutcome> {
        let thread = store.thread();
        let (action, field) = match create_kind(&thread, &placement) {
            Ok(kind) => kind,
            Err(err) => return Err(surface(store, err)),
        };

        let span = tracing::debug_span!("submit_create", subject = %subject, action = %action);
        async move {
            let text = self
                .validator
                .validate(field, raw_text)
                .map_err(|err| surface(store, err.into()))?;

            if let Placement::Reply { parent } = &placement {
                if !store.has_root(parent) {
                    return Err(surface(store, SyncError::InvalidTarget(parent.clone())));
                }
            }

            let key = MutationKey::Create {
                subject: subject.clone(),
                thread: thread.clone(),
                placement: placement.clone(),
            };
            let Some(_guard) = self.begin(key) else {
                tracing::debug!("duplicate submission ignored");
                return Ok(MutationOutcome::Ignored);
            };

            self.check_rate(subject, action).map_err(|err| surface(store, err))?;

            let local = LocalId::new(self.next_local.fetch_add(1, Ordering::Relaxed));
            store
                .insert_optimistic(&placement, Comment::optimistic(local, subject.clone(), text.clone()))
                .map_err(|err| surface(store, err))?;
            tracing::debug!(local = %local, "optimistic entity inserted");

            let request = create_request(&thread, &placement, text);
            let response = with_timeout(self.client.create(request), self.timeout)
                .await
                .and_then(|body| CommentRecord::from_value(body).map_err(ApiError::from));

            match response {
                Ok(record) => {
                    let confirmed = match placement {
                        Placement::Root => record.into_comment(),
                        Placement::Reply { .. } => record.into_reply(),
                    };
                    if store.reconcile(local, confirmed.clone()) {
                        tracing::debug!(local = %local, id = %confirmed.id, "optimistic entity confirmed");
                    } else {
                        tracing::debug!(local = %local, "placeholder gone before confirmation");
                    }
                    Ok(MutationOutcome::Created(confirmed))
                }
                Err(api_err) => {
                    tracing::warn!(local = %local, error = %api_err, "create failed, rolling back");
                    let err = SyncError::Transport(api_err);
                    store.roll_back_create(local, raw_text, err.user_message());
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Flips a like or star and syncs it.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RateLimited`] if the subject exceeded the window
    /// - [`SyncError::Transport`] if the request failed; flag and counter have
    ///   been restored
    pub async fn submit_toggle(
        &self,
        store: &InteractionStore,
        subject: &SubjectId,
        target: ToggleTarget,
    ) -> Result<MutationOutcome> {
        let action = target.kind.action();
        let span = tracing::debug_span!("submit_toggle", subject = %subject, action = %action, entity = %target.entity);

        async move {
            let key = MutationKey::Toggle {
                subject: subject.clone(),
                target: target.clone(),
            };
            let Some(_guard) = self.begin(key) else {
                tracing::debug!("toggle already in flight, ignored");
                return Ok(MutationOutcome::Ignored);
            };

            self.check_rate(subject, action).map_err(|err| surface(store, err))?;

            let delta = store.flip_toggle(&target);
            let request = ApiRequest::toggle(target.kind, target.entity.clone());

            match with_timeout(self.client.toggle(request), self.timeout).await {
                Ok(()) => Ok(MutationOutcome::Toggled(store.toggle_state(&target))),
                Err(api_err) => {
                    tracing::warn!(error = %api_err, "toggle failed, reverting");
                    let err = SyncError::Transport(api_err);
                    store.revert_toggle(&target, delta, err.user_message());
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<MutationKey>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, key: MutationKey) -> Option<InFlightGuard<'_>> {
        if !self.lock_in_flight().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard { set: &self.in_flight, key })
    }

    fn check_rate(&self, subject: &SubjectId, action: ActionKind) -> Result<()> {
        match self.limiter.check_at(subject, action, Instant::now()) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Denied { retry_after } => {
                tracing::info!(retry_after_ms = retry_after.as_millis() as u64, "rate limited");
                Err(SyncError::RateLimited { action, retry_after })
            }
        }
    }
}

/// Records `err` as the store's visible error and hands it back.
fn surface(store: &InteractionStore, err: SyncError) -> SyncError {
    store.set_error(err.user_message());
    err
}

fn create_kind(thread: &ThreadRef, placement: &Placement) -> Result<(ActionKind, FieldKind)> {
    match (thread, placement) {
        (ThreadRef::Post(_), Placement::Root) => Ok((ActionKind::PostComment, FieldKind::Comment)),
        (ThreadRef::Post(_), Placement::Reply { parent }) if parent.is_temporary() => {
            Err(SyncError::InvalidTarget(parent.clone()))
        }
        (ThreadRef::Post(_), Placement::Reply { .. }) => Ok((ActionKind::PostReply, FieldKind::Reply)),
        (ThreadRef::Conversation(_), Placement::Root) => Ok((ActionKind::SendMessage, FieldKind::Message)),
        (ThreadRef::Conversation(_), Placement::Reply { parent }) => Err(SyncError::InvalidTarget(parent.clone())),
    }
}

fn create_request(thread: &ThreadRef, placement: &Placement, text: String) -> ApiRequest {
    match (thread, placement) {
        (ThreadRef::Post(post_id), Placement::Reply { parent }) => {
            let parent_id = parent.server_id().map(str::to_string).unwrap_or_else(|| parent.to_string());
            ApiRequest::create_reply(post_id.clone(), parent_id, text)
        }
        (ThreadRef::Post(post_id), Placement::Root) => ApiRequest::create_comment(post_id.clone(), text),
        (ThreadRef::Conversation(conversation_id), _) => ApiRequest::send_message(conversation_id.clone(), text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityId;

    #[test]
    fn create_kind_follows_thread_and_placement() {
        let post = ThreadRef::Post("p1".into());
        let chat = ThreadRef::Conversation("c1".into());
        let reply = Placement::Reply { parent: EntityId::persisted("c9") };

        assert_eq!(create_kind(&post, &Placement::Root).ok(), Some((ActionKind::PostComment, FieldKind::Comment)));
        assert_eq!(create_kind(&post, &reply).ok(), Some((ActionKind::PostReply, FieldKind::Reply)));
        assert_eq!(create_kind(&chat, &Placement::Root).ok(), Some((ActionKind::SendMessage, FieldKind::Message)));
        assert!(matches!(create_kind(&chat, &reply), Err(SyncError::InvalidTarget(_))));

        let pending_parent = Placement::Reply { parent: EntityId::Temporary(LocalId::new(3)) };
        assert!(matches!(create_kind(&post, &pending_parent), Err(SyncError::InvalidTarget(_))));
    }

    #[test]
    fn create_request_targets_the_right_endpoint() {
        let post = ThreadRef::Post("p1".into());
        let reply = Placement::Reply { parent: EntityId::persisted("c9") };

        let request = create_request(&post, &reply, "hi".into());
        assert_eq!(request.param_str("postId"), Some("p1"));
        assert_eq!(request.param_str("parentId"), Some("c9"));

        let request = create_request(&ThreadRef::Conversation("c1".into()), &Placement::Root, "yo".into());
        assert_eq!(request.param_str("conversationId"), Some("c1"));
        assert_eq!(request.param_str("text"), Some("yo"));
    }

    #[test]
    fn guard_releases_key_on_drop() {
        let set = Mutex::new(HashSet::new());
        let key = MutationKey::Toggle { subject: SubjectId::new("u1"), target: ToggleTarget::like("p1") };
        set.lock().expect("lock").insert(key.clone());
        {
            let _guard = InFlightGuard { set: &set, key: key.clone() };
        }
        assert!(!set.lock().expect("lock").contains(&key));
    }
}
