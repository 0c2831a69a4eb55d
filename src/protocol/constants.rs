use std::time::Duration;

pub const APP_NAME: &str = "Drop";

/// Port the server tries first
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Session lifetime used when none is given
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// How often the store sweeps out dead sessions
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Grace period between consuming a session and reaping it
pub const RELEASE_DELAY: Duration = Duration::from_secs(1);

pub const STYLESHEET_PATH: &str = "/_/common.css";
pub const UPLOAD_PATH: &str = "/_/upload";

/// Query parameter that turns the interstitial page into the byte transfer
pub const DOWNLOAD_MARKER: &str = "download";
