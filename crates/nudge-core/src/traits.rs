//! Seams between the orchestrator and its collaborators.

use async_trait::async_trait;

use crate::error::Result;

/// Something that can write a reminder.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Produce one clean message for `prompt`.
    ///
    /// `Ok(None)` means the service answered but nothing usable came out of it.
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;
}

/// Outbound message endpoint: `send(text) -> ok/fail`.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, content: &str) -> Result<()>;
}
