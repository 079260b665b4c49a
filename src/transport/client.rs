//! The `ApiClient` seam.
//!
//! Implementations live outside this crate (an HTTP client in the app, scripted
//! doubles in tests). Futures are boxed and `'static` so coordinators can move
//! them into spawned tasks and wrap them in `Abortable`. Dropping a returned
//! future is how a request is cancelled.

use crate::domain::error::ApiError;
use crate::transport::messages::ApiRequest;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result of a single transport call.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Request/response transport to the remote API.
pub trait ApiClient: Send + Sync {
    /// Generic read request, used for searches. Returns the raw JSON body.
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<serde_json::Value>>;

    /// Creates an entity and returns the server's JSON representation of it.
    fn create(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<serde_json::Value>>;

    /// Flips a boolean interaction on the server.
    fn toggle(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<()>>;
}

impl<C: ApiClient + ?Sized> ApiClient for Arc<C> {
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<serde_json::Value>> {
        (**self).request(request)
    }

    fn create(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<serde_json::Value>> {
        (**self).create(request)
    }

    fn toggle(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<()>> {
        (**self).toggle(request)
    }
}

/// Awaits `call`, failing with [`ApiError::Timeout`] once `timeout` elapses.
///
/// `None` defers entirely to the transport's own deadline.
pub(crate) async fn with_timeout<T, F>(call: F, timeout: Option<Duration>) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ApiError::Timeout(limit))),
        None => call.await,
    }
}
