use crate::protocol::{DEFAULT_DURATION, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

/// Settings the HTTP server runs with
///
/// `port` is rewritten by [`DropServer::start`](crate::server::DropServer::start)
/// with the port that was actually bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Answer `/` with the session held in the root slot, if any
    pub serve_at_root: bool,
    /// Lifetime given to sessions created through uploads
    pub duration: Duration,
    pub allow_uploads: bool,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            serve_at_root: false,
            duration: DEFAULT_DURATION,
            allow_uploads: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn is_wildcard_host(&self) -> bool {
        self.host == "0.0.0.0" || self.host == "::"
    }
}

/// Validated request to run a drop, as produced by the CLI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropConfig {
    /// File or directory to share; `None` starts in upload-only mode
    pub file_path: Option<PathBuf>,
    pub duration: Duration,
    pub port: u16,
    pub host: String,
    pub alias: Option<String>,
    pub single_use: bool,
    pub allow_uploads: bool,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            duration: DEFAULT_DURATION,
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            alias: None,
            single_use: false,
            allow_uploads: true,
        }
    }
}

impl DropConfig {
    /// A shared file goes into the root slot when an alias is published
    pub fn uses_root_slot(&self) -> bool {
        self.alias.is_some() && self.file_path.is_some()
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            host: self.host.clone(),
            serve_at_root: self.uses_root_slot(),
            duration: self.duration,
            allow_uploads: self.allow_uploads,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
