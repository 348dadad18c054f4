//! Which structured affordances are live
//!
//! An affordance attached to a message is interactive only while the live
//! state equals the state that produced it. Messages survive a reload while
//! the state resets to `Initial`, so this is what keeps an old location form
//! from coming back.

use super::state::ConversationState;
use crate::messages::{Message, MessageKind};

/// Whether the affordance attached to `message` accepts input in `state`
pub fn is_interactive(message: &Message, state: ConversationState) -> bool {
    matches!(
        (message.kind, state),
        (Some(MessageKind::InitialChoice), ConversationState::Initial)
            | (
                Some(MessageKind::LocationChoice),
                ConversationState::AwaitingLocationMethod
            )
    )
}
