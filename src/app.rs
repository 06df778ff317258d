//! Terminal front end: one event loop over stdin, the connection and Ctrl-C.
//!
//! ## Input
//! - a plain line submits the dialog (Enter); an empty line resends a draft
//!   kept after a failed send
//! - a line ending in `\` continues onto the next one (Shift+Enter)
//! - `:essay <path>` loads the essay buffer from a file and submits it
//! - `:essay` resubmits the current essay buffer
//! - `:essay-line <text>` appends a line to the essay buffer
//! - `:quit`, EOF or Ctrl-C closes the channel and exits

use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::connection::{ConnectionEvent, ConnectionManager};
use crate::error::ChatError;
use crate::session::ClientSession;
use crate::transcript::TranscriptController;
use crate::view::ChatView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dialog(String),
    /// Submit the essay, optionally replacing the buffer with a file first.
    Essay(Option<PathBuf>),
    EssayLine(String),
    Quit,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim() == ":quit" {
        return Command::Quit;
    }
    if let Some(rest) = line.strip_prefix(":essay-line") {
        if rest.is_empty() || rest.starts_with(' ') {
            return Command::EssayLine(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    if line.trim_end() == ":essay" {
        return Command::Essay(None);
    }
    if let Some(path) = line.strip_prefix(":essay ") {
        return Command::Essay(Some(PathBuf::from(path.trim())));
    }
    Command::Dialog(line.to_string())
}

/// Multi-line dialog input joined by trailing backslashes.
#[derive(Debug, Default)]
pub struct DialogDraft {
    buf: String,
    continuing: bool,
}

impl DialogDraft {
    /// Feed one line; returns the full message once a line does not end in `\`.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        match line.strip_suffix('\\') {
            Some(head) => {
                self.buf.push_str(head);
                self.buf.push('\n');
                self.continuing = true;
                None
            }
            None => {
                self.buf.push_str(line);
                self.continuing = false;
                Some(std::mem::take(&mut self.buf))
            }
        }
    }

    pub fn is_continuing(&self) -> bool {
        self.continuing
    }
}

/// Everything that lives for one run: identity, channel, transcript.
pub struct ChatSession<V: ChatView> {
    session: ClientSession,
    connection: ConnectionManager,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    events_open: bool,
    controller: TranscriptController<V>,
    draft: DialogDraft,
}

impl<V: ChatView> ChatSession<V> {
    /// Show the greeting, then start connecting.
    pub fn start(config: &ChatConfig, view: V) -> Self {
        let session = ClientSession::from_config(config);
        let mut controller = TranscriptController::new(view, config);
        controller.init();
        let (connection, events) = ConnectionManager::connect(&session, config);
        Self {
            session,
            connection,
            events,
            events_open: true,
            controller,
            draft: DialogDraft::default(),
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn controller(&self) -> &TranscriptController<V> {
        &self.controller
    }

    /// Handle one line of input. Returns `false` when the user asked to quit.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        let command = if self.draft.is_continuing() {
            Command::Dialog(line.trim_end_matches(['\r', '\n']).to_string())
        } else {
            parse_command(line)
        };

        match command {
            Command::Quit => return false,
            Command::Dialog(text) => {
                if let Some(message) = self.draft.feed(&text) {
                    let view = self.controller.view_mut();
                    // An empty Enter resends a draft left behind by a failed send.
                    let resend = message.trim().is_empty() && !view.dialog_text().trim().is_empty();
                    if !resend {
                        view.set_dialog_text(&message);
                    }
                    self.controller.submit_dialog(&mut self.connection);
                }
            }
            Command::EssayLine(text) => {
                let view = self.controller.view_mut();
                let mut essay = view.essay_text();
                if !essay.is_empty() {
                    essay.push('\n');
                }
                essay.push_str(&text);
                view.set_essay_text(&essay);
            }
            Command::Essay(path) => {
                if let Some(path) = path {
                    match tokio::fs::read_to_string(&path).await {
                        Ok(text) => self.controller.view_mut().set_essay_text(&text),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "cannot read essay file");
                            self.controller.view_mut().alert(&format!(
                                "Could not read essay file {}: {}",
                                path.display(),
                                e
                            ));
                            return true;
                        }
                    }
                }
                self.controller.submit_essay(&mut self.connection);
            }
        }
        true
    }

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match self.connection.handle_event(event) {
            Ok(Some(message)) => self.controller.on_inbound_entry(&message.content),
            Ok(None) => {}
            Err(e @ ChatError::MalformedPayload(_)) => self.controller.on_inbound_error(&e),
            Err(e) => {
                let undelivered = self.connection.take_undelivered();
                self.controller.on_undelivered(&e, &undelivered);
            }
        }
    }

    /// Wait for and apply the next connection event. Returns `false` once the
    /// I/O task has gone away.
    pub async fn next_connection_event(&mut self) -> bool {
        if !self.events_open {
            return false;
        }
        match self.events.recv().await {
            Some(event) => {
                self.handle_connection_event(event);
                true
            }
            None => {
                self.events_open = false;
                false
            }
        }
    }

    /// Drive the session until quit, end of input or Ctrl-C, then tear down.
    pub async fn run<S>(&mut self, mut input: S) -> Result<(), ChatError>
    where
        S: Stream<Item = std::io::Result<String>> + Unpin,
    {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let result = loop {
            tokio::select! {
                line = input.next() => {
                    match line {
                        Some(Ok(line)) => {
                            if !self.handle_line(&line).await {
                                break Ok(());
                            }
                        }
                        Some(Err(e)) => break Err(ChatError::Io(e)),
                        None => break Ok(()),
                    }
                }

                event = self.events.recv(), if self.events_open => {
                    match event {
                        Some(event) => self.handle_connection_event(event),
                        None => self.events_open = false,
                    }
                }

                _ = &mut ctrl_c => {
                    info!("interrupted");
                    break Ok(());
                }
            }
        };

        self.shutdown().await;
        result
    }

    /// Close the channel. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line_is_dialog() {
        assert_eq!(parse_command("Hello"), Command::Dialog("Hello".into()));
    }

    #[test]
    fn test_parse_strips_line_endings() {
        assert_eq!(parse_command("Hello\r\n"), Command::Dialog("Hello".into()));
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(parse_command(":quit"), Command::Quit);
        assert_eq!(parse_command("  :quit "), Command::Quit);
    }

    #[test]
    fn test_parse_essay_without_path() {
        assert_eq!(parse_command(":essay"), Command::Essay(None));
    }

    #[test]
    fn test_parse_essay_with_path() {
        assert_eq!(
            parse_command(":essay  drafts/essay.txt "),
            Command::Essay(Some(PathBuf::from("drafts/essay.txt")))
        );
    }

    #[test]
    fn test_parse_essay_line() {
        assert_eq!(
            parse_command(":essay-line My essay text"),
            Command::EssayLine("My essay text".into())
        );
        assert_eq!(parse_command(":essay-line"), Command::EssayLine(String::new()));
    }

    #[test]
    fn test_parse_lookalike_command_is_dialog() {
        assert_eq!(parse_command(":essayist"), Command::Dialog(":essayist".into()));
    }

    #[test]
    fn test_draft_single_line() {
        let mut d = DialogDraft::default();
        assert_eq!(d.feed("hi"), Some("hi".to_string()));
        assert!(!d.is_continuing());
    }

    #[test]
    fn test_draft_joins_continued_lines() {
        let mut d = DialogDraft::default();
        assert_eq!(d.feed("first\\"), None);
        assert!(d.is_continuing());
        assert_eq!(d.feed("second"), Some("first\nsecond".to_string()));
        assert_eq!(d.feed("fresh"), Some("fresh".to_string()));
    }
}
