//! Per-run client identity.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ChatConfig;

/// Identifies this run to the server. The id only disambiguates concurrent
/// sessions server-side; it is not a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    client_id: u64,
    endpoint_path: String,
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ClientSession {
    /// New session whose id is the current time in milliseconds.
    pub fn new(endpoint_path: impl Into<String>) -> Self {
        Self::with_id(now_ms(), endpoint_path)
    }

    pub fn with_id(client_id: u64, endpoint_path: impl Into<String>) -> Self {
        Self {
            client_id,
            endpoint_path: endpoint_path.into(),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.endpoint_path())
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn endpoint_path(&self) -> &str {
        &self.endpoint_path
    }

    /// `<base_url>/<endpoint_path>/ws/<client_id>`
    pub fn ws_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/ws/{}",
            base_url.trim_end_matches('/'),
            self.endpoint_path,
            self.client_id
        )
    }
}
