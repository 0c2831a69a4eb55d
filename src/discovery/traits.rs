use crate::error::Result;

/// Makes a friendly `<alias>.local` name resolve to this machine
#[async_trait::async_trait]
pub trait AliasPublisher: Send {
    /// Start answering for `alias`; publishing twice keeps the first alias
    async fn publish_alias(&mut self, alias: &str, port: u16) -> Result<()>;

    /// Withdraw the alias; safe to call when nothing was published
    async fn stop(&mut self);
}

/// Publisher that does nothing, for runs without an alias
#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait::async_trait]
impl AliasPublisher for NoopPublisher {
    async fn publish_alias(&mut self, alias: &str, port: u16) -> Result<()> {
        tracing::debug!("Alias publishing disabled, skipping {} on port {}", alias, port);
        Ok(())
    }

    async fn stop(&mut self) {}
}

/// Host name an alias is published under
pub fn alias_host(alias: &str) -> String {
    format!("{}.local", alias)
}
