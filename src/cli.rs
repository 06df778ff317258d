use crate::config::{ChatConfig, EssayRetention, NotReadyPolicy, TutorVariant};
use crate::error::ChatError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tutor-chat")]
#[command(version)]
#[command(about = "Chat with the virtual tutor over WebSocket")]
pub struct Args {
    /// TOML config file; the flags below override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Backend host
    #[arg(long)]
    pub host: Option<String>,

    /// Backend port
    #[arg(long)]
    pub port: Option<u16>,

    /// URL scheme: ws or wss
    #[arg(long)]
    pub scheme: Option<String>,

    /// Tutor variant: dummy (plain tutor) or moral (moral-scheme tutor)
    #[arg(long, value_enum)]
    pub variant: Option<TutorVariant>,

    /// Raw endpoint path segment; takes precedence over --variant
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Hold messages typed before the connection opens instead of refusing them
    #[arg(long)]
    pub queue_until_open: bool,

    /// Clear the essay buffer after a successful essay submission
    #[arg(long)]
    pub clear_essay: bool,

    /// Greeting shown before connecting
    #[arg(long)]
    pub greeting: Option<String>,
}

impl Args {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ChatConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(scheme) = &self.scheme {
            config.scheme = scheme.clone();
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint_path = Some(endpoint.clone());
        }
        if self.queue_until_open {
            config.not_ready_policy = NotReadyPolicy::Queue;
        }
        if self.clear_essay {
            config.essay_retention = EssayRetention::Clear;
        }
        if let Some(greeting) = &self.greeting {
            config.greeting = greeting.clone();
        }
    }

    /// Config file (or defaults) with the flags applied on top.
    pub fn resolve_config(&self) -> Result<ChatConfig, ChatError> {
        let mut config = match &self.config {
            Some(path) => ChatConfig::load(path)?,
            None => ChatConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }
}
