//! Error types for the auto-restart manager
//!
//! Public operations return [`ManagerError`]. Store and control-plane failures
//! keep their own enums so callers can tell a missing row from a dead `pvesh`.

use thiserror::Error;

/// Main error type returned across the library boundary
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Resource absent from the live inventory
    #[error("Resource {resource_id} not found on node {node}")]
    ResourceNotFound { resource_id: i64, node: String },

    /// Another action holds the advisory lock for this resource
    #[error("Resource {resource_id} on {node} is busy with '{operation}'")]
    ResourceBusy {
        resource_id: i64,
        node: String,
        operation: String,
    },

    /// Malformed input rejected before touching the store or control plane
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// The control plane ran a provisioning step and reported failure
    #[error("{step} failed for resource {resource_id}: {reason}")]
    StepFailed {
        step: String,
        resource_id: i64,
        reason: String,
    },

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl ManagerError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        ManagerError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Database error variants
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// UNIQUE(resource_id, node) violated on the whitelist
    #[error("Resource {resource_id} on node {node} is already whitelisted")]
    Duplicate { resource_id: i64, node: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Schema check failed: {0}")]
    Schema(String),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Control plane error variants
///
/// These are transport/availability failures. A lifecycle action that the
/// control plane ran and rejected is not an error here; it comes back as an
/// [`ActionOutput`](crate::control_plane::ActionOutput) with a failure set.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Failed to run '{command}': {reason}")]
    Transport { command: String, reason: String },

    #[error("Invalid response from '{command}': {reason}")]
    InvalidResponse { command: String, reason: String },

    #[error("Unsupported resource type: {0}")]
    UnsupportedKind(String),

    #[error("Action '{0}' is not a power action")]
    UnsupportedAction(String),
}
