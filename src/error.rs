use std::path::PathBuf;
use thiserror::Error;

/// Failure turning a filesystem path into an in-memory payload
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PayloadLoadError {
    #[error("Cannot load {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Loader task for {} failed: {message}", path.display())]
    Join { path: PathBuf, message: String },
}

impl PayloadLoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path that failed to load
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Archive { path, .. } | Self::Join { path, .. } => path,
        }
    }
}

/// Failure creating a session in the store
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SessionCreateError {
    #[error("Failed to create session: {0}")]
    Load(#[from] PayloadLoadError),

    #[error("Failed to create session: duration must be greater than zero")]
    InvalidDuration,

    #[error("Failed to create session: the root slot is already in use")]
    RootSlotTaken,
}

/// Failure binding the HTTP listener
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerStartError {
    #[error("Failed to start server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start server: no free port at or above {from}")]
    NoFreePort { from: u16 },
}

/// Errors that can occur when running a drop
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DropError {
    // ============================================================================
    // I/O and System Errors
    // ============================================================================
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    // ============================================================================
    // Network Errors
    // ============================================================================
    #[error("Network error: {message}")]
    Network { message: String },

    // ============================================================================
    // Session Errors
    // ============================================================================
    #[error(transparent)]
    PayloadLoad(#[from] PayloadLoadError),

    #[error(transparent)]
    SessionCreate(#[from] SessionCreateError),

    #[error(transparent)]
    ServerStart(#[from] ServerStartError),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl DropError {
    /// Create a network error with a message
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            message: msg.into(),
        }
    }

    /// Create an invalid configuration error with a message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DropError>;
