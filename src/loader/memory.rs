use crate::core::Session;
use crate::core::file::{ZIP_MIME, file_display_name, format_bytes, get_mime_type};
use crate::error::PayloadLoadError;
use crate::loader::archive::archive_directory;
use crate::loader::traits::PayloadLoader;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Default loader reading through tokio::fs
#[derive(Clone, Debug, Default)]
pub struct InMemoryLoader;

impl InMemoryLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PayloadLoader for InMemoryLoader {
    async fn load(
        &self,
        path: &Path,
        id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, PayloadLoadError> {
        tracing::debug!("Loading file: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PayloadLoadError::io(path, e))?;

        let (file_name, mime_type, payload) = if metadata.is_dir() {
            let root = path.to_path_buf();
            let payload = tokio::task::spawn_blocking(move || archive_directory(&root))
                .await
                .map_err(|e| PayloadLoadError::Join {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })??;
            (
                format!("{}.zip", file_display_name(path)),
                ZIP_MIME.to_string(),
                payload,
            )
        } else {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| PayloadLoadError::io(path, e))?;
            let file_name = file_display_name(path);
            let mime_type = get_mime_type(&file_name).to_string();
            (file_name, mime_type, Bytes::from(data))
        };

        tracing::info!(
            "File loaded: {} ({})",
            file_name,
            format_bytes(payload.len() as u64)
        );

        Ok(Session::new(id, file_name, mime_type, payload, expires_at))
    }
}
