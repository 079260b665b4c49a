//! Wire records decoded from server responses.
//!
//! These types mirror the API's JSON shape and are kept separate from the
//! domain [`Comment`] so schema drift stays contained in one conversion.

use crate::domain::entity::{Comment, EntityId, MutationStatus};
use crate::domain::subject::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment, reply or message as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    /// Server id. Some endpoints send it as `_id`.
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(alias = "userId", alias = "senderId")]
    pub author_id: String,

    #[serde(alias = "content", alias = "body")]
    pub text: String,

    /// Missing timestamps are filled with the decode time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub replies: Vec<CommentRecord>,
}

impl CommentRecord {
    /// Decodes a server response body.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when required fields are missing or
    /// have the wrong type.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Converts into a confirmed top-level comment with its replies.
    #[must_use]
    pub fn into_comment(mut self) -> Comment {
        let replies = std::mem::take(&mut self.replies).into_iter().map(Self::into_reply).collect();
        Comment { replies, ..self.into_reply() }
    }

    /// Converts into a confirmed reply. Replies nest one level only, so any
    /// `replies` the server sent along are dropped.
    #[must_use]
    pub fn into_reply(self) -> Comment {
        Comment {
            id: EntityId::Persisted(self.id),
            author: SubjectId::new(self.author_id),
            text: self.text,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            status: MutationStatus::Confirmed,
            replies: Vec::new(),
        }
    }
}
