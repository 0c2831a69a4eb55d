use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Identifier reserved for the session served at the base path
pub const ROOT_SLOT: &str = "";

/// One shared payload and the rules for handing it out
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub payload: Bytes,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_count: u64,
    /// Set on consumption under the single-use policy only
    pub consumed: bool,
}

impl Session {
    /// Create a new session; `file_size` is taken from the payload
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: Bytes,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            file_size: payload.len() as u64,
            mime_type: mime_type.into(),
            payload,
            created_at: Utc::now(),
            expires_at,
            download_count: 0,
            consumed: false,
        }
    }

    /// Expired strictly after the deadline; the deadline itself is still live
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_SLOT
    }

    /// Time left before expiry, zero once past it
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}
