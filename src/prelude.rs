//! Prelude module for convenient imports
//!
//! Use `use lan_drop::prelude::*;` to import commonly used types

// Sessions
pub use crate::core::{
    Clock, ConsumptionPolicy, ROOT_SLOT, ServerConfigBuilder, Session,
    SessionStatus, SessionStore, SlugGenerator, StoreConfig, SystemClock,
};

// Payloads
pub use crate::loader::{InMemoryLoader, PayloadLoader, ZipBuilder, archive_directory};

// Protocol
pub use crate::protocol::{
    DEFAULT_DURATION, DEFAULT_PORT, UploadResponse, normalize_alias, validate_port,
};

// Server & discovery
pub use crate::config::{DropConfig, ServerConfig};
pub use crate::discovery::{AliasPublisher, MdnsPublisher, NoopPublisher};
pub use crate::server::DropServer;

// Error handling
pub use crate::error::{DropError, PayloadLoadError, Result, ServerStartError, SessionCreateError};
