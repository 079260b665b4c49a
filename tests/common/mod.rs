//! Scripted `ApiClient` double shared by the integration tests.

#![allow(dead_code)]

use feedsync::domain::ApiError;
use feedsync::transport::ApiResult;
use feedsync::{ApiClient, ApiRequest};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;

type Responder = Box<dyn Fn(&ApiRequest) -> ApiResult<Value> + Send + Sync>;

/// A request waiting for the test to answer it.
pub struct Pending {
    pub request: ApiRequest,
    pub at: Instant,
    reply: oneshot::Sender<ApiResult<Value>>,
}

impl Pending {
    pub fn respond(self, result: ApiResult<Value>) {
        let _ = self.reply.send(result);
    }

    /// The caller dropped the request future (aborted or timed out).
    pub fn is_cancelled(&self) -> bool {
        self.reply.is_closed()
    }
}

/// Records every request and answers either immediately (auto) or when the
/// test calls [`Pending::respond`] (manual).
pub struct ScriptedClient {
    auto: Option<Responder>,
    log: Mutex<Vec<(ApiRequest, Instant)>>,
    pending: Mutex<VecDeque<Pending>>,
}

impl ScriptedClient {
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            auto: None,
            log: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub fn auto(responder: impl Fn(&ApiRequest) -> ApiResult<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            auto: Some(Box::new(responder)),
            log: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    /// Auto client that confirms creates with ids `srv-1`, `srv-2`, ...
    /// echoing the submitted text, and accepts every toggle and search.
    pub fn echo() -> Arc<Self> {
        let next = AtomicU64::new(1);
        Self::auto(move |request| {
            let n = next.fetch_add(1, Ordering::Relaxed);
            Ok(serde_json::json!({
                "id": format!("srv-{n}"),
                "authorId": "u1",
                "text": request.param_str("text").unwrap_or_default(),
            }))
        })
    }

    pub fn failing(error: ApiError) -> Arc<Self> {
        Self::auto(move |_| Err(error.clone()))
    }

    pub fn requests(&self) -> Vec<(ApiRequest, Instant)> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn take_pending(&self) -> Vec<Pending> {
        self.pending.lock().expect("pending lock").drain(..).collect()
    }

    /// Yields to the runtime until a manual request arrives.
    pub async fn next_pending(&self) -> Pending {
        for _ in 0..10_000 {
            if let Some(pending) = self.pending.lock().expect("pending lock").pop_front() {
                return pending;
            }
            tokio::task::yield_now().await;
        }
        panic!("no request arrived");
    }

    fn call(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<Value>> {
        let at = Instant::now();
        self.log.lock().expect("log lock").push((request.clone(), at));

        if let Some(responder) = &self.auto {
            let result = responder(&request);
            return Box::pin(std::future::ready(result));
        }

        let (reply, receiver) = oneshot::channel();
        self.pending.lock().expect("pending lock").push_back(Pending { request, at, reply });
        Box::pin(async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("responder dropped".to_string())))
        })
    }
}

impl ApiClient for ScriptedClient {
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<Value>> {
        self.call(request)
    }

    fn create(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<Value>> {
        self.call(request)
    }

    fn toggle(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult<()>> {
        let call = self.call(request);
        Box::pin(async move { call.await.map(|_| ()) })
    }
}
