pub mod constants;
pub mod types;
pub mod validation;

pub use constants::{
    APP_NAME, DEFAULT_DURATION, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT,
    DOWNLOAD_MARKER, RELEASE_DELAY, STYLESHEET_PATH, SWEEP_INTERVAL, UPLOAD_PATH,
};
pub use types::UploadResponse;
pub use validation::{normalize_alias, sanitize_entry_path, validate_duration, validate_port};
