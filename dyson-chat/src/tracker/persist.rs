//! The save collaborator.

use async_trait::async_trait;

/// Saves a finished transcript somewhere.
#[async_trait]
pub trait Persister: Send + Sync {
    /// Whether saving is possible at all. The tracker skips the call and
    /// leaves the thread unsaved when this is false.
    fn is_available(&self) -> bool {
        true
    }

    /// Save `content` under `title`.
    async fn save(&self, content: &str, title: &str) -> anyhow::Result<()>;
}

/// Persister used when nothing is configured to receive transcripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPersister;

#[async_trait]
impl Persister for NoopPersister {
    fn is_available(&self) -> bool {
        false
    }

    async fn save(&self, _content: &str, _title: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
