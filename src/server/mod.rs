pub mod handlers;
#[allow(clippy::module_inception)]
pub mod server;
pub mod views;

pub use handlers::{AppState, UploadError};
pub use server::{DropServer, bind_with_retry};
