use crate::config::ServerConfig;
use crate::protocol::DEFAULT_HOST;
use std::time::Duration;

/// Builder for ServerConfig with sensible defaults
#[derive(Clone, Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create a new builder listening on the given port on all interfaces
    pub fn new(port: u16) -> Self {
        Self {
            config: ServerConfig {
                port,
                host: DEFAULT_HOST.to_string(),
                ..ServerConfig::default()
            },
        }
    }

    /// Set the bind host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Bind to the loopback interface only
    pub fn loopback(mut self) -> Self {
        self.config.host = "127.0.0.1".to_string();
        self
    }

    /// Serve the root-slot session at `/`
    pub fn serve_at_root(mut self) -> Self {
        self.config.serve_at_root = true;
        self
    }

    /// Set the lifetime of upload sessions
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Turn off the upload form and endpoint
    pub fn disable_uploads(mut self) -> Self {
        self.config.allow_uploads = false;
        self
    }

    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    /// Build the ServerConfig
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DEFAULT_DURATION, DEFAULT_MAX_UPLOAD_BYTES};

    #[test]
    fn test_server_config_builder_defaults() {
        let config = ServerConfigBuilder::new(8080).build();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(!config.serve_at_root);
        assert!(config.allow_uploads);
        assert_eq!(config.duration, DEFAULT_DURATION);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_server_config_builder_custom() {
        let config = ServerConfigBuilder::new(0)
            .loopback()
            .serve_at_root()
            .duration(Duration::from_secs(3))
            .disable_uploads()
            .max_upload_bytes(1024)
            .build();

        assert_eq!(config.host, "127.0.0.1");
        assert!(config.serve_at_root);
        assert!(!config.allow_uploads);
        assert_eq!(config.duration, Duration::from_secs(3));
        assert_eq!(config.max_upload_bytes, 1024);
    }
}
