//! Chat transcript and the controller that drives it.
//!
//! The transcript only grows: entries are appended in arrival order and never
//! reordered, edited or removed. The controller owns the typing indicator and
//! mediates between the view's input buffers and a `MessageSink`.

use tracing::{debug, error, warn};

use crate::config::{ChatConfig, EssayRetention};
use crate::connection::{MessageSink, SendOutcome};
use crate::error::ChatError;
use crate::protocol::{MessageKind, OutboundMessage};
use crate::view::ChatView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Tutor,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::User => write!(f, "user"),
            Origin::Tutor => write!(f, "tutor"),
        }
    }
}

/// One line of the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    text: String,
    origin: Origin,
    sequence: u64,
}

impl ChatEntry {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Zero-based position in the transcript.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Append-only list of entries.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unconditionally and return the new entry.
    pub fn push(&mut self, text: impl Into<String>, origin: Origin) -> &ChatEntry {
        let sequence = self.entries.len() as u64;
        self.entries.push(ChatEntry {
            text: text.into(),
            origin,
            sequence,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }
}

/// Result of a dialog or essay submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank dialog input; nothing happened.
    Ignored,
    /// Frame handed to the socket.
    Sent,
    /// Held until the channel opens.
    Queued,
    /// The send path failed; the user has been alerted.
    Failed(ChatError),
}

pub struct TranscriptController<V: ChatView> {
    transcript: Transcript,
    typing_visible: bool,
    view: V,
    greeting: String,
    essay_retention: EssayRetention,
}

impl<V: ChatView> TranscriptController<V> {
    pub fn new(view: V, config: &ChatConfig) -> Self {
        Self {
            transcript: Transcript::new(),
            typing_visible: false,
            view,
            greeting: config.greeting.clone(),
            essay_retention: config.essay_retention,
        }
    }

    /// Show the greeting. Call once, before any network activity.
    pub fn init(&mut self) {
        let greeting = self.greeting.clone();
        self.append_entry(&greeting, Origin::Tutor);
    }

    /// Append and render an entry. Blank user text is rejected; tutor text is
    /// taken as-is, even when empty.
    pub fn append_entry(&mut self, text: &str, origin: Origin) -> Option<&ChatEntry> {
        if origin == Origin::User && text.trim().is_empty() {
            return None;
        }
        let entry = self.transcript.push(text, origin);
        self.view.insert_entry(entry);
        self.view.scroll_to_bottom();
        self.transcript.last()
    }

    pub fn show_typing(&mut self) {
        if !self.typing_visible {
            self.typing_visible = true;
            self.view.set_typing_visible(true);
            self.view.scroll_to_bottom();
        }
    }

    pub fn hide_typing(&mut self) {
        if self.typing_visible {
            self.typing_visible = false;
            self.view.set_typing_visible(false);
        }
    }

    pub fn is_typing_visible(&self) -> bool {
        self.typing_visible
    }

    /// Send the dialog buffer as a chat message.
    ///
    /// On failure the typing indicator is hidden, the user is alerted and the
    /// buffer gets its text back, ready to resend. The user entry stays in the
    /// transcript.
    pub fn submit_dialog<S: MessageSink>(&mut self, sink: &mut S) -> SubmitOutcome {
        let message = self.view.dialog_text();
        if message.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        self.append_entry(&message, Origin::User);
        self.view.set_dialog_text("");
        self.show_typing();

        match sink.send(&OutboundMessage::chat(message.as_str())) {
            Ok(outcome) => Self::submitted(MessageKind::Chat, outcome),
            Err(e) => {
                self.view.set_dialog_text(&message);
                self.fail(MessageKind::Chat, e, Some(&message))
            }
        }
    }

    /// Send the whole essay buffer. The buffer is kept unless configured to be
    /// cleared after a successful send.
    pub fn submit_essay<S: MessageSink>(&mut self, sink: &mut S) -> SubmitOutcome {
        self.show_typing();
        let essay = self.view.essay_text();

        match sink.send(&OutboundMessage::essay(essay)) {
            Ok(outcome) => {
                if self.essay_retention == EssayRetention::Clear {
                    self.view.set_essay_text("");
                }
                Self::submitted(MessageKind::Essay, outcome)
            }
            Err(e) => self.fail(MessageKind::Essay, e, None),
        }
    }

    /// A reply arrived.
    pub fn on_inbound_entry(&mut self, content: &str) {
        self.hide_typing();
        self.append_entry(content, Origin::Tutor);
    }

    /// A frame arrived that could not be parsed. The reply may still come, so
    /// the indicator is left alone.
    pub fn on_inbound_error(&mut self, err: &ChatError) {
        warn!(error = %err, "ignoring unreadable reply");
    }

    /// Queued messages never reached the tutor, so no reply is coming.
    ///
    /// Hides the indicator, alerts the user and puts the lost text back into
    /// the input buffers when they are empty.
    pub fn on_undelivered(&mut self, err: &ChatError, messages: &[OutboundMessage]) {
        self.hide_typing();
        error!(error = %err, undelivered = messages.len(), "queued messages were not delivered");

        let dialog: Vec<&str> = messages
            .iter()
            .filter(|m| m.kind == MessageKind::Chat)
            .map(|m| m.content.as_str())
            .collect();
        if !dialog.is_empty() && self.view.dialog_text().trim().is_empty() {
            self.view.set_dialog_text(&dialog.join("\n"));
        }
        if let Some(essay) = messages.iter().rev().find(|m| m.kind == MessageKind::Essay) {
            if self.view.essay_text().is_empty() {
                self.view.set_essay_text(&essay.content);
            }
        }

        let count = messages.len();
        let alert = match err {
            ChatError::ChannelNotReady => format!(
                "Could not reach the tutor, {count} queued message(s) were not sent. Please try again."
            ),
            _ => format!("Error sending {count} queued message(s). Please try again."),
        };
        self.view.alert(&alert);
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn submitted(kind: MessageKind, outcome: SendOutcome) -> SubmitOutcome {
        debug!(%kind, ?outcome, "submitted");
        match outcome {
            SendOutcome::Sent => SubmitOutcome::Sent,
            SendOutcome::Queued => SubmitOutcome::Queued,
        }
    }

    fn fail(&mut self, kind: MessageKind, err: ChatError, kept: Option<&str>) -> SubmitOutcome {
        self.hide_typing();
        error!(%kind, error = %err, "error submitting {}", kind);
        let what = match kind {
            MessageKind::Chat => "dialog",
            MessageKind::Essay => "essay",
        };
        let mut alert = match err {
            ChatError::ChannelNotReady => {
                format!("Not connected to the tutor, could not submit {what}. Please try again.")
            }
            _ => format!("Error submitting {what}. Please try again."),
        };
        if let Some(text) = kept {
            alert.push_str(&format!(" Kept for resend: \"{text}\""));
        }
        self.view.alert(&alert);
        SubmitOutcome::Failed(err)
    }
}
