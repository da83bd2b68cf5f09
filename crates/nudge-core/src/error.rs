//! Error types shared by every Nudge crate.

use thiserror::Error;

/// The primary error type for Nudge.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Invalid or incomplete configuration. Fatal at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider identifier not present in the registry.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Provider requires an API key but none was configured.
    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    /// Connection-level HTTP failure (DNS, TLS, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The generation service answered with an error or an unexpected shape.
    #[error("provider error: {0}")]
    Provider(String),

    /// A message failed the non-empty invariant.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A message is already waiting in the pending queue.
    #[error("duplicate message: {0}")]
    DuplicateMessage(String),

    /// Durable storage could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound delivery failed.
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, NudgeError>;

impl NudgeError {
    /// Whether this error is a configuration problem that must stop startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ProviderNotFound(_) | Self::ApiKeyMissing(_)
        )
    }
}
