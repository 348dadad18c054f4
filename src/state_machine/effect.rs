//! Effects produced by state transitions

use crate::messages::Message;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand a message to the delivery queue. Bot messages are delayed behind
    /// the typing placeholder; user messages land as soon as the queue is idle.
    Deliver { message: Message },

    /// Resolve the typing placeholder with the head of the queue
    ResolvePending,

    /// Ask the geolocation capability for the current position
    RequestLocation,
}

impl Effect {
    pub fn user_message(text: impl Into<String>) -> Self {
        Effect::Deliver {
            message: Message::user(text),
        }
    }

    pub fn bot_message(message: Message) -> Self {
        debug_assert!(message.is_bot());
        Effect::Deliver { message }
    }
}
