pub mod dns;
pub mod mdns;
pub mod traits;

pub use mdns::MdnsPublisher;
pub use traits::{AliasPublisher, NoopPublisher, alias_host};
