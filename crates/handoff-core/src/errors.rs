use handoff_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoffError {
    /// Session or token is absent or its TTL elapsed
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Launcher session already exists for this challenge")]
    SessionExists,

    #[error("Identity provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Unable to load identity profile: {0}")]
    ProfileFetchFailed(String),

    #[error("Account already linked to social identity")]
    AlreadyLinked,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Authorization server error: {0}")]
    AuthorizationServer(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Unable to add auth log: {0}")]
    AuditLog(String),

    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Invalid forward state: {0}")]
    InvalidForwardState(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, HandoffError>;
