//! Request types handed to an [`ApiClient`](super::ApiClient).
//!
//! An [`ApiRequest`] is an endpoint identifier plus a flat JSON parameter map.
//! Every constructor captures the active trace context so spans started in a
//! screen handler can be linked to the server-side work.

use crate::domain::entity::ToggleKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter map sent with a request. Keys follow the API's camelCase names.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Distributed tracing context captured when a request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// OpenTelemetry trace ID as a 32 character hex string.
    pub trace_id: String,

    /// Span that issued the request, as a 16 character hex string.
    pub parent_span_id: String,
}

impl TraceContext {
    /// Captures the trace and span ids of the current `tracing` span.
    ///
    /// Returns `None` when no OpenTelemetry layer is installed or the span is
    /// not sampled, which is the normal case in tests.
    pub fn from_current() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let otel_context = tracing::Span::current().context();
        let span_ref = otel_context.span();
        let span_context = span_ref.span_context();

        if !span_context.is_valid() {
            return None;
        }

        let context = Self {
            trace_id: format!("{:032x}", span_context.trace_id()),
            parent_span_id: format!("{:016x}", span_context.span_id()),
        };
        tracing::trace!(trace_id = %context.trace_id, "captured trace context");
        Some(context)
    }
}

/// Searchable collections on the admin and shop screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Users,
    Posts,
    Products,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Products => "products",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock filter for product searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    PreOrder,
}

/// Inclusive price bounds in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

/// Active search filters. The default value means "no filtering".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub categories: Vec<String>,
    pub price_range: Option<PriceRange>,
    /// Minimum star rating, 1 to 5.
    pub rating: Option<u8>,
    pub availability: Option<Availability>,
}

impl SearchFilters {
    /// Writes the set filters into `params`; unset filters are omitted.
    pub fn write_params(&self, params: &mut Params) {
        if !self.categories.is_empty() {
            params.insert("categories".to_string(), serde_json::json!(self.categories));
        }
        if let Some(range) = self.price_range {
            params.insert("priceRange".to_string(), serde_json::json!([range.min, range.max]));
        }
        if let Some(rating) = self.rating {
            params.insert("rating".to_string(), serde_json::json!(rating));
        }
        if let Some(availability) = self.availability {
            params.insert("availability".to_string(), serde_json::json!(availability));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The conversation a screen's interaction store belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    /// Comment thread under a post.
    Post(String),
    /// Direct message conversation.
    Conversation(String),
}

/// Endpoint identifiers understood by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Search(ContentType),
    CreateComment,
    CreateReply,
    SendMessage,
    ToggleLike,
    ToggleStar,
}

impl Endpoint {
    /// Stable identifier a transport can map onto a route.
    #[must_use]
    pub fn path(self) -> String {
        match self {
            Self::Search(content_type) => format!("search/{content_type}"),
            Self::CreateComment => "comments/create".to_string(),
            Self::CreateReply => "comments/reply".to_string(),
            Self::SendMessage => "messages/send".to_string(),
            Self::ToggleLike => "likes/toggle".to_string(),
            Self::ToggleStar => "stars/toggle".to_string(),
        }
    }

    #[must_use]
    pub const fn toggle(kind: ToggleKind) -> Self {
        match kind {
            ToggleKind::Like => Self::ToggleLike,
            ToggleKind::Star => Self::ToggleStar,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// One call to the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub params: Params,

    /// Trace context of the span that built the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(endpoint: Endpoint, params: Params) -> Self {
        Self {
            endpoint,
            params,
            trace_context: TraceContext::from_current(),
        }
    }

    /// Builds a search request for `content_type` with the given query and filters.
    #[must_use]
    pub fn search(content_type: ContentType, query: &str, filters: &SearchFilters) -> Self {
        let mut params = Params::new();
        params.insert("query".to_string(), serde_json::json!(query));
        params.insert("contentType".to_string(), serde_json::json!(content_type.as_str()));
        filters.write_params(&mut params);
        Self::new(Endpoint::Search(content_type), params)
    }

    /// String parameter lookup, mostly useful to transports and test doubles.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Generates `ApiRequest` constructors whose arguments map one-to-one onto
/// named parameters.
macro_rules! request_builders {
    (
        $(
            $builder:ident($endpoint:expr; { $($arg:ident: $ty:ty => $key:literal),* $(,)? })
        ),* $(,)?
    ) => {
        impl ApiRequest {
            $(
                #[doc = concat!("Builds a `", stringify!($builder), "` request with the current trace context")]
                #[must_use]
                pub fn $builder($($arg: $ty),*) -> Self {
                    let mut params = Params::new();
                    $( params.insert($key.to_string(), serde_json::Value::from($arg)); )*
                    Self::new($endpoint, params)
                }
            )*
        }
    };
}

request_builders! {
    create_comment(Endpoint::CreateComment; { post_id: String => "postId", text: String => "text" }),
    create_reply(Endpoint::CreateReply; {
        post_id: String => "postId",
        parent_id: String => "parentId",
        text: String => "text",
    }),
    send_message(Endpoint::SendMessage; { conversation_id: String => "conversationId", text: String => "text" }),
}

impl ApiRequest {
    /// Builds the like or star toggle for entity `id`.
    #[must_use]
    pub fn toggle(kind: ToggleKind, id: String) -> Self {
        let mut params = Params::new();
        params.insert("id".to_string(), serde_json::Value::from(id));
        Self::new(Endpoint::toggle(kind), params)
    }
}
