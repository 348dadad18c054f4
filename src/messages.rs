//! Dialogue entries and the ordered message log
//!
//! The log is append-only apart from the transient typing placeholder, which
//! is replaced in place once its delayed bot entry resolves. All appends go
//! through a single FIFO [`MessageQueue`] so that delayed bot entries and the
//! user entries queued behind them land in enqueue order.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Text carried by the typing placeholder. Never rendered verbatim.
pub const TYPING_TEXT: &str = "Typing...";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// Structured role of a message; drives which affordance is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Plain,
    Typing,
    InitialChoice,
    LocationChoice,
    MapsLink,
}

/// A single dialogue entry.
///
/// Field names on the wire match the persisted session layout
/// (`type`, `isMarkdown`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(rename = "type", default)]
    pub kind: Option<MessageKind>,
    #[serde(rename = "isMarkdown", default)]
    pub is_markup: bool,
    #[serde(default)]
    pub link: Option<String>,
}

impl Message {
    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            text: text.into(),
            sender,
            kind: None,
            is_markup: false,
            link: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Bot)
    }

    pub fn typing() -> Self {
        Self::bot(TYPING_TEXT).with_kind(MessageKind::Typing)
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn markup(mut self) -> Self {
        self.is_markup = true;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn is_typing(&self) -> bool {
        self.kind == Some(MessageKind::Typing)
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}

/// Serialize resolved entries for the session store
pub fn encode_snapshot(messages: &[Message]) -> serde_json::Result<String> {
    let resolved: Vec<&Message> = messages.iter().filter(|m| !m.is_typing()).collect();
    serde_json::to_string(&resolved)
}

/// Parse a persisted snapshot, dropping any stray typing placeholder
pub fn decode_snapshot(raw: &str) -> serde_json::Result<Vec<Message>> {
    let mut messages: Vec<Message> = serde_json::from_str(raw)?;
    messages.retain(|m| !m.is_typing());
    Ok(messages)
}

// ============================================================================
// Message Log
// ============================================================================

/// Ordered dialogue history for one session
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log from persisted entries
    pub fn restore(mut entries: Vec<Message>) -> Self {
        entries.retain(|m| !m.is_typing());
        Self { entries }
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// Show the typing placeholder for a pending bot entry
    pub fn begin_typing(&mut self) {
        self.entries.push(Message::typing());
    }

    /// Replace the most recent entry if it is the typing placeholder, then
    /// append the resolved message. Returns whether a placeholder was removed.
    pub fn resolve_typing(&mut self, message: Message) -> bool {
        let replaced = matches!(self.entries.last(), Some(last) if last.is_typing());
        if replaced {
            self.entries.pop();
        }
        self.entries.push(message);
        replaced
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Entries that may be persisted (everything except the placeholder)
    pub fn resolved(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|m| !m.is_typing())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending_typing(&self) -> bool {
        self.entries.last().is_some_and(Message::is_typing)
    }
}

// ============================================================================
// Delivery Queue
// ============================================================================

/// FIFO of entries waiting to be appended to the log.
///
/// Bot entries are delivered through the typing placeholder and need one
/// timer tick each; user entries are appended as soon as they reach the head.
/// Only one typing delay is outstanding at a time.
#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: VecDeque<Message>,
    typing: bool,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: Message) {
        self.pending.push_back(message);
    }

    /// Deliver queued entries until a bot entry has to wait for the typing
    /// delay. Returns true when the caller must schedule that delay.
    pub fn pump(&mut self, log: &mut MessageLog) -> bool {
        if self.typing {
            return false;
        }
        while let Some(next) = self.pending.front() {
            if next.is_bot() {
                log.begin_typing();
                self.typing = true;
                return true;
            }
            if let Some(user) = self.pending.pop_front() {
                log.append(user);
            }
        }
        false
    }

    /// The typing delay elapsed: resolve the head entry and keep pumping.
    /// Returns true when another delay must be scheduled.
    pub fn resolve(&mut self, log: &mut MessageLog) -> bool {
        if !self.typing {
            return false;
        }
        self.typing = false;
        if let Some(message) = self.pending.pop_front() {
            log.resolve_typing(message);
        }
        self.pump(log)
    }

    /// Deliver everything immediately, skipping remaining delays
    pub fn flush(&mut self, log: &mut MessageLog) {
        if self.typing {
            self.typing = false;
            if let Some(message) = self.pending.pop_front() {
                log.resolve_typing(message);
            }
        }
        for message in self.pending.drain(..) {
            log.append(message);
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.typing && self.pending.is_empty()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
