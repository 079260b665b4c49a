//! Acting identities and the kinds of actions and fields they touch.

use serde::{Deserialize, Serialize};

/// The acting user, used as the rate-limiter key.
///
/// Supplied by the caller's session layer; the core never creates or
/// authenticates subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Write actions subject to rate limiting and the in-flight guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Top-level comment on a post.
    PostComment,
    /// Reply nested under an existing comment.
    PostReply,
    /// Chat message appended to a conversation.
    SendMessage,
    /// Like on a post or comment.
    ToggleLike,
    /// Star on a product.
    ToggleStar,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostComment => "post_comment",
            Self::PostReply => "post_reply",
            Self::SendMessage => "send_message",
            Self::ToggleLike => "toggle_like",
            Self::ToggleStar => "toggle_star",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input fields with their own validation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Comment,
    Reply,
    Caption,
    Message,
    SearchQuery,
}

impl FieldKind {
    /// Human label used in user-facing messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Comment => "Comment",
            Self::Reply => "Reply",
            Self::Caption => "Caption",
            Self::Message => "Message",
            Self::SearchQuery => "Search query",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
