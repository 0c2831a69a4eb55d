pub mod builders;
pub mod clock;
pub mod file;
pub mod session;
pub mod slug;
pub mod store;

pub use builders::ServerConfigBuilder;
pub use clock::{Clock, SystemClock};
pub use file::{file_display_name, format_bytes, get_mime_type};
pub use session::{ROOT_SLOT, Session};
pub use slug::SlugGenerator;
pub use store::{ConsumptionPolicy, SessionStatus, SessionStore, StoreConfig};
