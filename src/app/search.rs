//! Debounced search with stale-response suppression.
//!
//! [`SearchCoordinator`] turns a stream of query edits into at most one
//! accepted request at a time:
//!
//! 1. **Debounce**: every [`on_query_change`](SearchCoordinator::on_query_change)
//!    restarts a timer; only the last edit in a quiet period is dispatched.
//! 2. **Sequence**: each dispatch takes the next sequence number and becomes
//!    the latest issued request.
//! 3. **Acceptance**: a response is published only if its sequence number is
//!    still the latest issued. Anything older is dropped without an event.
//! 4. **Cancellation**: when enabled, dispatching a request aborts the one it
//!    supersedes. Correctness does not depend on it; step 3 alone guarantees
//!    that an older response is never delivered after a newer request.
//!
//! Events are delivered on the unbounded channel returned by
//! [`SearchCoordinator::new`], in the order the state transitions happened.

use super::modes::SearchPhase;
use super::validation::InputValidator;
use crate::domain::error::{ApiError, InvalidInput, ReasonCode, SyncError};
use crate::domain::subject::FieldKind;
use crate::transport::client::with_timeout;
use crate::transport::{ApiClient, ApiRequest, ApiResult, ContentType, SearchFilters};
use crate::Config;
use futures_util::future::{AbortHandle, AbortRegistration, Abortable};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Notifications published to the search screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent<T> {
    /// Results of the latest issued request.
    Results(Vec<T>),
    /// User-visible failure of the latest issued request.
    Error(String),
    /// Whether the latest issued request is outstanding.
    Loading(bool),
}

#[derive(Debug, Default)]
struct SearchInner {
    phase: SearchPhase,
    query: String,
    filters: SearchFilters,
    content_type: ContentType,

    /// Bumped on every schedule or reset; a timer only dispatches if its
    /// token is still current.
    schedule_token: u64,
    timer: Option<JoinHandle<()>>,

    latest_issued: u64,
    in_flight: Option<AbortHandle>,
}

struct Shared<T> {
    client: Arc<dyn ApiClient>,
    debounce: Duration,
    cancel_in_flight: bool,
    timeout: Option<Duration>,
    validator: InputValidator,
    events: mpsc::UnboundedSender<SearchEvent<T>>,
    inner: Mutex<SearchInner>,
}

/// A request that has been assigned a sequence number and is ready to run.
struct Dispatch {
    sequence: u64,
    request: ApiRequest,
    registration: AbortRegistration,
}

/// Debouncing, cancelling search front-end for one screen.
///
/// `T` is the result item type, decoded from the response with serde.
pub struct SearchCoordinator<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for SearchCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCoordinator")
            .field("debounce", &self.shared.debounce)
            .field("cancel_in_flight", &self.shared.cancel_in_flight)
            .field("inner", &*self.shared.lock())
            .finish_non_exhaustive()
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, SearchInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SearchEvent<T>) {
        // A dropped receiver just means the screen is gone.
        let _ = self.events.send(event);
    }
}

impl<T> SearchCoordinator<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Creates an idle coordinator searching `content_type`.
    ///
    /// Must be called within a tokio runtime context for later scheduling.
    #[must_use]
    pub fn new(
        client: Arc<dyn ApiClient>,
        config: &Config,
        content_type: ContentType,
    ) -> (Self, mpsc::UnboundedReceiver<SearchEvent<T>>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Shared {
            client,
            debounce: config.search.debounce(),
            cancel_in_flight: config.search.cancel_in_flight,
            timeout: config.request_timeout(),
            validator: InputValidator::from_config(config),
            events,
            inner: Mutex::new(SearchInner {
                content_type,
                ..SearchInner::default()
            }),
        };
        (Self { shared: Arc::new(shared) }, receiver)
    }

    /// Records a query edit and (re)starts the debounce timer.
    ///
    /// Any timer scheduled by an earlier edit is cancelled, so only the most
    /// recent edit inside a quiet period is dispatched. The query is sanitized
    /// and trimmed before it is stored; an empty query is a valid search. A
    /// query over the configured length emits [`SearchEvent::Error`] and
    /// schedules nothing.
    pub fn on_query_change(&self, query: impl Into<String>, filters: SearchFilters) {
        let raw: String = query.into();
        let query = match self.shared.validator.validate(FieldKind::SearchQuery, &raw) {
            Ok(query) => query,
            Err(InvalidInput { reason: ReasonCode::Empty, .. }) => String::new(),
            Err(invalid) => {
                self.reject(invalid);
                return;
            }
        };

        let mut inner = self.shared.lock();
        inner.query = query;
        inner.filters = filters;

        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.schedule_token += 1;
        inner.phase = SearchPhase::Scheduled;

        let token = inner.schedule_token;
        let shared = Arc::clone(&self.shared);
        let deadline = tokio::time::Instant::now() + self.shared.debounce;
        tracing::trace!(query = %inner.query, token, "search scheduled");

        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(dispatch) = Self::begin_dispatch(&shared, Some(token)) {
                Self::execute(shared, dispatch).await;
            }
        }));
    }

    /// Switches to another collection.
    ///
    /// Query and filters reset to defaults, every pending or in-flight request
    /// for the previous collection is invalidated, the result list is cleared
    /// and an empty-query fetch for `content_type` starts immediately.
    pub fn switch_content_type(&self, content_type: ContentType) {
        {
            let mut inner = self.shared.lock();
            Self::invalidate(&mut inner);
            inner.content_type = content_type;
            inner.query.clear();
            inner.filters = SearchFilters::default();
            tracing::debug!(content_type = %content_type, "search content type switched");
            self.shared.emit(SearchEvent::Results(Vec::new()));
        }

        if let Some(dispatch) = Self::begin_dispatch(&self.shared, None) {
            tokio::spawn(Self::execute(Arc::clone(&self.shared), dispatch));
        }
    }

    /// Drops all scheduled and in-flight work and returns to `Idle`.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        let was_in_flight = inner.in_flight.is_some();
        Self::invalidate(&mut inner);
        inner.latest_issued += 1;
        inner.phase = SearchPhase::Idle;
        if was_in_flight {
            self.shared.emit(SearchEvent::Loading(false));
        }
    }

    #[must_use]
    pub fn phase(&self) -> SearchPhase {
        self.shared.lock().phase
    }

    #[must_use]
    pub fn query(&self) -> String {
        self.shared.lock().query.clone()
    }

    #[must_use]
    pub fn filters(&self) -> SearchFilters {
        self.shared.lock().filters.clone()
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.shared.lock().content_type
    }

    /// Sequence number of the most recently issued request (0 before any).
    #[must_use]
    pub fn latest_issued(&self) -> u64 {
        self.shared.lock().latest_issued
    }

    /// Drops the pending timer and reports `invalid` without dispatching.
    fn reject(&self, invalid: InvalidInput) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.schedule_token += 1;
        if inner.in_flight.is_none() {
            inner.phase = SearchPhase::Idle;
        }
        tracing::debug!(reason = %invalid.reason, "search query rejected");
        self.shared.emit(SearchEvent::Error(SyncError::Validation(invalid).user_message()));
    }

    fn invalidate(inner: &mut SearchInner) {
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.schedule_token += 1;
        if let Some(handle) = inner.in_flight.take() {
            handle.abort();
        }
    }

    /// Assigns the next sequence number and builds the request.
    ///
    /// `token` is the schedule token of the timer firing, or `None` for an
    /// immediate dispatch. A stale token means the timer was superseded after
    /// it woke up, and nothing is dispatched.
    fn begin_dispatch(shared: &Shared<T>, token: Option<u64>) -> Option<Dispatch> {
        let mut inner = shared.lock();
        if let Some(token) = token {
            if token != inner.schedule_token {
                return None;
            }
            inner.timer = None;
        }

        inner.latest_issued += 1;
        let sequence = inner.latest_issued;

        if let Some(previous) = inner.in_flight.take() {
            if shared.cancel_in_flight {
                tracing::trace!(sequence, "aborting superseded search request");
                previous.abort();
            }
        }

        let (handle, registration) = AbortHandle::new_pair();
        inner.in_flight = Some(handle);
        inner.phase = SearchPhase::InFlight;

        let request = ApiRequest::search(inner.content_type, &inner.query, &inner.filters);
        tracing::debug!(sequence, query = %inner.query, content_type = %inner.content_type, "search dispatched");
        shared.emit(SearchEvent::Loading(true));

        Some(Dispatch { sequence, request, registration })
    }

    async fn execute(shared: Arc<Shared<T>>, dispatch: Dispatch) {
        let Dispatch { sequence, request, registration } = dispatch;
        let span = tracing::debug_span!("search_request", sequence, endpoint = %request.endpoint);

        async move {
            let call = with_timeout(shared.client.request(request), shared.timeout);
            match Abortable::new(call, registration).await {
                Ok(result) => Self::complete(&shared, sequence, result),
                Err(_aborted) => tracing::trace!(sequence, "search request aborted"),
            }
        }
        .instrument(span)
        .await;
    }

    fn complete(shared: &Shared<T>, sequence: u64, result: ApiResult<serde_json::Value>) {
        let mut inner = shared.lock();
        if sequence != inner.latest_issued {
            tracing::trace!(sequence, latest = inner.latest_issued, "stale search response discarded");
            return;
        }

        inner.in_flight = None;
        inner.phase = if inner.timer.is_some() {
            SearchPhase::Scheduled
        } else {
            SearchPhase::Idle
        };

        match result.and_then(decode_items::<T>) {
            Ok(items) => {
                tracing::debug!(sequence, count = items.len(), "search results accepted");
                shared.emit(SearchEvent::Results(items));
            }
            Err(err) => {
                tracing::warn!(sequence, error = %err, "search request failed");
                shared.emit(SearchEvent::Error(SyncError::Transport(err).user_message()));
            }
        }
        shared.emit(SearchEvent::Loading(false));
    }
}

impl<T> Drop for SearchCoordinator<T> {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if let Some(handle) = inner.in_flight.take() {
            handle.abort();
        }
    }
}

/// Extracts the result list from a search response body.
///
/// Accepts a bare array or an object wrapping it under `results`, `items` or
/// `data`.
fn decode_items<T: DeserializeOwned>(body: serde_json::Value) -> ApiResult<Vec<T>> {
    let list = match body {
        serde_json::Value::Array(_) => body,
        serde_json::Value::Object(mut map) => ["results", "items", "data"]
            .iter()
            .find_map(|key| map.remove(*key))
            .ok_or_else(|| ApiError::Decode("response has no result list".to_string()))?,
        other => return Err(ApiError::Decode(format!("unexpected response body: {other}"))),
    };
    Ok(serde_json::from_value(list)?)
}
