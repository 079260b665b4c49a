//! Transport boundary between the coordinators and the remote API.
//!
//! The core never builds HTTP requests. It hands [`ApiRequest`] values (an
//! endpoint identifier plus a parameter map) to an injected [`ApiClient`] and
//! decodes the JSON it gets back. Requests carry the caller's trace context so
//! a transport can propagate it across the network hop.
//!
//! # Architecture
//!
//! - `client`: The `ApiClient` trait and timeout handling
//! - `messages`: Endpoint identifiers, request/parameter types, trace context
//! - `models`: Wire records decoded from server responses

pub mod client;
pub mod messages;
pub mod models;

pub use client::{ApiClient, ApiResult};
pub use messages::{
    ApiRequest, Availability, ContentType, Endpoint, Params, PriceRange, SearchFilters, ThreadRef,
    TraceContext,
};
pub use models::CommentRecord;
