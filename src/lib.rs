pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transcript;
pub mod view;

pub use app::ChatSession;
pub use config::{ChatConfig, EssayRetention, NotReadyPolicy, TutorVariant};
pub use connection::{ChannelState, ConnectionEvent, ConnectionManager, MessageSink, SendOutcome};
pub use error::ChatError;
pub use protocol::{InboundMessage, MessageKind, OutboundMessage};
pub use session::ClientSession;
pub use transcript::{ChatEntry, Origin, SubmitOutcome, Transcript, TranscriptController};
pub use view::{ChatView, MemoryView, TerminalView, ViewItem};
