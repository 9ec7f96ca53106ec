//! Entity id aliases.
//!
//! Persistence uses plain UUIDs (the models bind them directly); the
//! aliases document which entity an id belongs to at function signatures.

use uuid::Uuid;

/// Id of a user account.
pub type UserId = Uuid;

/// Id of a saved bookmark (`saved_content` row).
pub type ContentId = Uuid;

/// Id of a project.
pub type ProjectId = Uuid;

/// Id of a task within a project.
pub type TaskId = Uuid;

/// Id of a feedback event.
pub type FeedbackId = Uuid;

/// Id of a long-running job (bulk import, re-analysis).
pub type JobId = Uuid;
