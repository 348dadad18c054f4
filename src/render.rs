//! Message rendering pipeline
//!
//! Turns stored entries into HTML fragments for the chat window. Markup
//! entries go through a small bold/line-break transform and are emitted as
//! trusted HTML; everything else is escaped. Affordances are attached only
//! while [`is_interactive`] holds for the live state.

use crate::messages::{Message, MessageKind, Sender};
use crate::state_machine::{is_interactive, ConversationState};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern compiles"));

const TYPING_INDICATOR: &str = r#"<span class="typing-indicator" aria-label="Typing"><span></span><span></span><span></span></span>"#;

const INITIAL_CHOICE_HTML: &str = concat!(
    r#"<div class="choice-options">"#,
    r#"<button class="choice-btn" data-choice="find_doctor">Find a Doctor</button>"#,
    r#"<button class="choice-btn" data-choice="next_steps">What should I do next?</button>"#,
    "</div>"
);

const LOCATION_CHOICE_HTML: &str = concat!(
    r#"<div class="location-options">"#,
    r#"<button class="location-btn" data-location="auto">Share My Location</button>"#,
    r#"<form class="location-form">"#,
    r#"<input type="text" class="location-input" name="location" placeholder="e.g., Chicago, IL" autocomplete="off">"#,
    r#"<button type="submit" class="search-btn">Search</button>"#,
    "</form></div>"
);

/// Structured element attached to a rendered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Affordance {
    InitialChoice,
    LocationChoice,
    MapsLink { href: String },
}

/// A message ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub sender: Sender,
    pub kind: Option<MessageKind>,
    /// Inner content of the bubble
    pub body_html: String,
    pub affordance: Option<Affordance>,
    /// Complete bubble, affordance included
    pub html: String,
}

/// Escape text for inclusion in HTML content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `**bold**` becomes `<strong>bold</strong>`, then newlines become `<br/>`
pub fn render_markup(text: &str) -> String {
    BOLD.replace_all(text, "<strong>$1</strong>")
        .replace('\n', "<br/>")
}

fn body_html(message: &Message) -> String {
    if message.is_typing() {
        TYPING_INDICATOR.to_string()
    } else if message.is_markup {
        render_markup(&message.text)
    } else {
        escape_html(&message.text)
    }
}

fn affordance(message: &Message, state: ConversationState) -> Option<Affordance> {
    match message.kind {
        Some(MessageKind::MapsLink) => message
            .link
            .as_ref()
            .map(|href| Affordance::MapsLink { href: href.clone() }),
        Some(MessageKind::InitialChoice) if is_interactive(message, state) => {
            Some(Affordance::InitialChoice)
        }
        Some(MessageKind::LocationChoice) if is_interactive(message, state) => {
            Some(Affordance::LocationChoice)
        }
        _ => None,
    }
}

fn affordance_html(affordance: &Affordance) -> String {
    match affordance {
        Affordance::InitialChoice => INITIAL_CHOICE_HTML.to_string(),
        Affordance::LocationChoice => LOCATION_CHOICE_HTML.to_string(),
        Affordance::MapsLink { href } => format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer" class="maps-link">Open Google Maps</a>"#,
            escape_html(href)
        ),
    }
}

/// Render one entry against the live conversation state
pub fn render_message(message: &Message, state: ConversationState) -> RenderedMessage {
    let body_html = body_html(message);
    let affordance = affordance(message, state);

    let sender = match message.sender {
        Sender::User => "user",
        Sender::Bot => "bot",
    };
    let mut html = format!(r#"<div class="message {sender}"#);
    if message.is_typing() {
        html.push_str(" typing");
    }
    let _ = write!(html, r#""><p>{body_html}</p>"#);
    if let Some(affordance) = &affordance {
        html.push_str(&affordance_html(affordance));
    }
    html.push_str("</div>");

    RenderedMessage {
        sender: message.sender,
        kind: message.kind,
        body_html,
        affordance,
        html,
    }
}

/// Render the whole log in order
pub fn render_transcript(messages: &[Message], state: ConversationState) -> Vec<RenderedMessage> {
    messages
        .iter()
        .map(|m| render_message(m, state))
        .collect()
}
