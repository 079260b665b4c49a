//! Domain layer for the interaction synchronization core.
//!
//! This module contains the entity, identity and error types shared by every
//! coordinator. Nothing here performs I/O or touches the async runtime, so the
//! types can be constructed freely in screens and tests.
//!
//! # Organization
//!
//! - [`entity`]: Comments, tagged entity ids and toggle state
//! - [`error`]: Error taxonomy and result alias
//! - [`subject`]: Acting user identity, action kinds and field kinds
//!
//! # Examples
//!
//! ```
//! use feedsync::domain::{EntityId, LocalId};
//!
//! let temp = EntityId::Temporary(LocalId::new(1));
//! let server = EntityId::persisted("c-42");
//! assert!(temp.is_temporary());
//! assert!(!server.is_temporary());
//! ```

pub mod entity;
pub mod error;
pub mod subject;

pub use entity::{Comment, EntityId, LocalId, MutationStatus, Placement, ToggleKind, ToggleState, ToggleTarget};
pub use error::{ApiError, InvalidInput, ReasonCode, Result, SyncError};
pub use subject::{ActionKind, FieldKind, SubjectId};
