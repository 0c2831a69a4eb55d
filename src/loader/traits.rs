use crate::core::Session;
use crate::error::PayloadLoadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Turns a path on disk into a ready-to-serve session
#[async_trait]
pub trait PayloadLoader: Send + Sync {
    /// Read `path` fully into memory
    ///
    /// Directories are packed into a single zip archive named
    /// `<directory>.zip`.
    async fn load(
        &self,
        path: &Path,
        id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, PayloadLoadError>;
}
