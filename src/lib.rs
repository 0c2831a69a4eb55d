pub mod config;
pub mod core;
pub mod device;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod prelude;

pub use config::{DropConfig, ServerConfig};
pub use core::{
    ConsumptionPolicy, ServerConfigBuilder, Session, SessionStatus, SessionStore, SlugGenerator,
    StoreConfig, get_mime_type,
};
pub use device::get_local_ip;
pub use discovery::{AliasPublisher, MdnsPublisher, NoopPublisher};
pub use error::{DropError, PayloadLoadError, Result, ServerStartError, SessionCreateError};
pub use loader::{InMemoryLoader, PayloadLoader};
pub use protocol::UploadResponse;
pub use server::DropServer;

#[cfg(feature = "cli")]
pub mod cli;
