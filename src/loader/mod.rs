pub mod archive;
pub mod memory;
pub mod traits;

pub use archive::{ZipBuilder, archive_directory};
pub use memory::InMemoryLoader;
pub use traits::PayloadLoader;
