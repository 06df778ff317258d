//! Client configuration: defaults, TOML file loading, variant selection.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ChatError;

pub const DEFAULT_GREETING: &str = "Hello, I am your virtual tutor. How can I help you?";

/// Which tutoring backend route to talk to.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorVariant {
    /// Plain tutor without moral schemes.
    Dummy,
    /// Tutor driven by staged moral schemes.
    Moral,
}

impl TutorVariant {
    /// URL path segment the backend mounts this variant under.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            TutorVariant::Dummy => "test_1",
            TutorVariant::Moral => "test_2",
        }
    }
}

impl std::fmt::Display for TutorVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TutorVariant::Dummy => write!(f, "dummy"),
            TutorVariant::Moral => write!(f, "moral"),
        }
    }
}

/// What `send` does while the channel is not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotReadyPolicy {
    /// Refuse with `ChannelNotReady`; nothing reaches the wire.
    #[default]
    Reject,
    /// Hold the message and flush it once the channel opens.
    Queue,
}

/// Whether the essay buffer survives a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EssayRetention {
    #[default]
    Keep,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub variant: TutorVariant,
    /// Overrides the variant's path segment when set.
    pub endpoint_path: Option<String>,
    pub greeting: String,
    pub not_ready_policy: NotReadyPolicy,
    pub essay_retention: EssayRetention,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            variant: TutorVariant::Dummy,
            endpoint_path: None,
            greeting: DEFAULT_GREETING.to_string(),
            not_ready_policy: NotReadyPolicy::Reject,
            essay_retention: EssayRetention::Keep,
        }
    }
}

impl ChatConfig {
    /// Read a TOML file. Missing keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ChatError> {
        toml::from_str(text).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// The path segment to connect to; no validation is applied.
    pub fn endpoint_path(&self) -> &str {
        match &self.endpoint_path {
            Some(path) => path.as_str(),
            None => self.variant.endpoint_path(),
        }
    }

    /// `<scheme>://<host>:<port>`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}
