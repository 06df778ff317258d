//! Rendering targets for the transcript.
//!
//! A view exposes the four things the controller needs: the dialog input, the
//! essay input, the entry list, and the typing indicator. The indicator is
//! always drawn after the last entry.

use colored::*;
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, warn};

use crate::transcript::{ChatEntry, Origin};

pub const TYPING_TEXT: &str = "tutor is typing...";

pub trait ChatView {
    fn dialog_text(&self) -> String;
    fn set_dialog_text(&mut self, text: &str);
    fn essay_text(&self) -> String;
    fn set_essay_text(&mut self, text: &str);
    /// Add an entry directly above the typing indicator.
    fn insert_entry(&mut self, entry: &ChatEntry);
    fn set_typing_visible(&mut self, visible: bool);
    fn scroll_to_bottom(&mut self);
    /// Tell the user something went wrong. Views with a modal dialog may block
    /// until it is acknowledged; `TerminalView` prints and returns at once.
    fn alert(&mut self, message: &str);
}

// ---------------------------------------------------------------------------
// MemoryView
// ---------------------------------------------------------------------------

/// One visual element, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    Entry(ChatEntry),
    TypingIndicator,
}

/// Headless view that records everything it is asked to show.
#[derive(Debug, Default, Clone)]
pub struct MemoryView {
    entries: Vec<ChatEntry>,
    typing_visible: bool,
    dialog: String,
    essay: String,
    alerts: Vec<String>,
    scrolls: usize,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visual order: entries, then the indicator if shown.
    pub fn items(&self) -> Vec<ViewItem> {
        let mut items: Vec<ViewItem> = self.entries.iter().cloned().map(ViewItem::Entry).collect();
        if self.typing_visible {
            items.push(ViewItem::TypingIndicator);
        }
        items
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn typing_visible(&self) -> bool {
        self.typing_visible
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }
}

impl ChatView for MemoryView {
    fn dialog_text(&self) -> String {
        self.dialog.clone()
    }

    fn set_dialog_text(&mut self, text: &str) {
        self.dialog = text.to_string();
    }

    fn essay_text(&self) -> String {
        self.essay.clone()
    }

    fn set_essay_text(&mut self, text: &str) {
        self.essay = text.to_string();
    }

    fn insert_entry(&mut self, entry: &ChatEntry) {
        self.entries.push(entry.clone());
    }

    fn set_typing_visible(&mut self, visible: bool) {
        self.typing_visible = visible;
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// TerminalView
// ---------------------------------------------------------------------------

const ERASE_LINE: &str = "\r\x1b[2K";

/// Line-oriented terminal rendering. The typing indicator lives on the last
/// line without a trailing newline, so it can be erased before each entry and
/// redrawn after it.
///
/// Output errors never reach the controller: the first one is logged at
/// `warn`, later ones at `debug`, and the buffers keep working.
pub struct TerminalView<W: Write> {
    out: W,
    dialog: String,
    essay: String,
    typing_visible: bool,
    write_errors: usize,
}

impl TerminalView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            dialog: String::new(),
            essay: String::new(),
            typing_visible: false,
            write_errors: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Number of failed writes or flushes so far.
    pub fn write_errors(&self) -> usize {
        self.write_errors
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args) {
            self.output_failed(e);
        }
    }

    fn flush_out(&mut self) {
        if let Err(e) = self.out.flush() {
            self.output_failed(e);
        }
    }

    fn output_failed(&mut self, err: io::Error) {
        self.write_errors += 1;
        if self.write_errors == 1 {
            warn!(error = %err, "terminal output failed");
        } else {
            debug!(error = %err, failures = self.write_errors, "terminal output failed");
        }
    }

    fn label(origin: Origin) -> ColoredString {
        match origin {
            Origin::User => "you   ›".bright_blue().bold(),
            Origin::Tutor => "tutor ›".bright_green().bold(),
        }
    }

    fn draw_indicator(&mut self) {
        self.emit(format_args!("{}", TYPING_TEXT.dimmed().italic()));
    }

    fn erase_indicator(&mut self) {
        self.emit(format_args!("{ERASE_LINE}"));
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn dialog_text(&self) -> String {
        self.dialog.clone()
    }

    fn set_dialog_text(&mut self, text: &str) {
        self.dialog = text.to_string();
    }

    fn essay_text(&self) -> String {
        self.essay.clone()
    }

    fn set_essay_text(&mut self, text: &str) {
        self.essay = text.to_string();
    }

    fn insert_entry(&mut self, entry: &ChatEntry) {
        if self.typing_visible {
            self.erase_indicator();
        }
        let label = Self::label(entry.origin());
        let mut lines = entry.text().split('\n');
        let first = lines.next().unwrap_or("");
        self.emit(format_args!("{label} {first}\n"));
        for line in lines {
            self.emit(format_args!("        {line}\n"));
        }
        if self.typing_visible {
            self.draw_indicator();
        }
    }

    fn set_typing_visible(&mut self, visible: bool) {
        if visible == self.typing_visible {
            return;
        }
        self.typing_visible = visible;
        if visible {
            self.draw_indicator();
        } else {
            self.erase_indicator();
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.flush_out();
    }

    /// Prints the alert in red above the indicator and returns without
    /// waiting. The input loop reads whole lines, so the user's next line
    /// stands in for dismissing it.
    fn alert(&mut self, message: &str) {
        if self.typing_visible {
            self.erase_indicator();
        }
        self.emit(format_args!(
            "{} {}\n",
            "!".bright_red().bold(),
            message.bright_red()
        ));
        if self.typing_visible {
            self.draw_indicator();
        }
        self.flush_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    fn entries() -> Vec<ChatEntry> {
        let mut t = Transcript::new();
        t.push("hello", Origin::Tutor);
        t.push("hi", Origin::User);
        t.entries().to_vec()
    }

    #[test]
    fn test_memory_view_indicator_is_last() {
        let mut view = MemoryView::new();
        let es = entries();
        view.insert_entry(&es[0]);
        view.set_typing_visible(true);
        view.insert_entry(&es[1]);
        let items = view.items();
        assert_eq!(items.len(), 3);
        assert_eq!(items.last(), Some(&ViewItem::TypingIndicator));
        assert_eq!(items[1], ViewItem::Entry(es[1].clone()));
    }

    #[test]
    fn test_memory_view_hidden_indicator_not_listed() {
        let mut view = MemoryView::new();
        view.set_typing_visible(true);
        view.set_typing_visible(false);
        assert!(view.items().is_empty());
    }

    #[test]
    fn test_memory_view_buffers() {
        let mut view = MemoryView::new();
        view.set_dialog_text("d");
        view.set_essay_text("e");
        assert_eq!(view.dialog_text(), "d");
        assert_eq!(view.essay_text(), "e");
    }

    #[test]
    fn test_terminal_view_prints_entries_in_order() {
        let mut view = TerminalView::new(Vec::new());
        for e in entries() {
            view.insert_entry(&e);
        }
        let out = String::from_utf8(view.into_inner()).unwrap();
        let hello = out.find("hello").unwrap();
        let hi = out.find("hi\n").unwrap();
        assert!(hello < hi);
    }

    #[test]
    fn test_terminal_view_redraws_indicator_after_entry() {
        let mut view = TerminalView::new(Vec::new());
        view.set_typing_visible(true);
        view.insert_entry(&entries()[0]);
        let out = String::from_utf8(view.into_inner()).unwrap();
        let entry_at = out.find("hello").unwrap();
        let last_indicator = out.rfind("typing").unwrap();
        assert!(last_indicator > entry_at);
        assert!(out.contains(ERASE_LINE));
    }

    #[test]
    fn test_terminal_view_hide_erases_once() {
        let mut view = TerminalView::new(Vec::new());
        view.set_typing_visible(false);
        assert!(view.into_inner().is_empty());
    }

    #[test]
    fn test_terminal_view_multiline_entry_indented() {
        let mut t = Transcript::new();
        t.push("line one\nline two", Origin::User);
        let mut view = TerminalView::new(Vec::new());
        view.insert_entry(&t.entries()[0]);
        let out = String::from_utf8(view.into_inner()).unwrap();
        assert!(out.contains("        line two\n"));
    }

    #[test]
    fn test_terminal_view_alert_written() {
        let mut view = TerminalView::new(Vec::new());
        view.alert("Error submitting dialog. Please try again.");
        let out = String::from_utf8(view.into_inner()).unwrap();
        assert!(out.contains("Error submitting dialog"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_terminal_view_survives_failed_output() {
        let mut view = TerminalView::new(BrokenPipe);
        view.set_typing_visible(true);
        view.insert_entry(&entries()[0]);
        view.alert("Error submitting dialog. Please try again.");
        view.scroll_to_bottom();
        assert!(view.write_errors() >= 4);

        view.set_dialog_text("still here");
        assert_eq!(view.dialog_text(), "still here");
    }

    #[test]
    fn test_terminal_view_counts_no_errors_on_good_output() {
        let mut view = TerminalView::new(Vec::new());
        view.alert("fine");
        view.scroll_to_bottom();
        assert_eq!(view.write_errors(), 0);
    }
}
