use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body returned by `POST /_/upload`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub slug: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}
