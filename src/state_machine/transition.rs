//! Pure state transition function

use super::state::{Choice, ConversationState, SessionContext};
use super::{Effect, Event};
use crate::advice;
use crate::locator::{self, Resolution};
use crate::messages::{Message, MessageKind};
use thiserror::Error;

pub const INITIAL_PROMPT: &str = "What would you like to do?";
pub const FIND_DOCTOR: &str = "Find a nearby doctor.";
pub const NEXT_STEPS: &str = "What are the next steps?";
pub const LOCATION_PROMPT: &str = "To find a specialist, you can share your location automatically or type a location (like a city or zip code) below.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("That option is no longer available (conversation is {0})")]
    AffordanceInactive(ConversationState),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// expressed as effects for the runtime to carry out.
pub fn transition(
    state: ConversationState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Fresh conversation: greet, then offer the initial choice
        (current, Event::Mount { restored: 0 }) => Ok(TransitionResult::new(current)
            .with_effect(Effect::bot_message(Message::bot(context.fracture.greeting())))
            .with_effect(Effect::bot_message(
                Message::bot(INITIAL_PROMPT).with_kind(MessageKind::InitialChoice),
            ))),

        // Resumed conversation: nothing to add
        (current, Event::Mount { .. }) => Ok(TransitionResult::new(current)),

        // The runtime rebinds the context; the dialogue carries on where it is
        (current, Event::ContextChanged { .. }) => Ok(TransitionResult::new(current)),

        // ============================================================
        // Initial choice
        // ============================================================
        (ConversationState::Initial, Event::Choose { choice: Choice::FindDoctor }) => {
            Ok(
                TransitionResult::new(ConversationState::AwaitingLocationMethod)
                    .with_effect(Effect::user_message(FIND_DOCTOR))
                    .with_effect(Effect::bot_message(
                        Message::bot(LOCATION_PROMPT).with_kind(MessageKind::LocationChoice),
                    )),
            )
        }

        (ConversationState::Initial, Event::Choose { choice: Choice::NextSteps }) => {
            let advice = advice::next_steps_message(context.fracture.body_part());
            Ok(TransitionResult::new(ConversationState::ShowingResults)
                .with_effect(Effect::user_message(NEXT_STEPS))
                .with_effect(Effect::bot_message(Message::bot(advice).markup())))
        }

        (current, Event::Choose { .. }) => Err(TransitionError::AffordanceInactive(current)),

        // ============================================================
        // Location method
        // ============================================================
        (ConversationState::AwaitingLocationMethod, Event::SelectLocationMethod { method }) => {
            let intent = Effect::user_message(locator::user_intent(&method));
            match locator::resolve(&method, context.geolocation_available) {
                Resolution::Ignored => Ok(TransitionResult::new(
                    ConversationState::AwaitingLocationMethod,
                )),
                // The user entry is queued behind the answer
                Resolution::Ready(reply) => Ok(TransitionResult::new(
                    ConversationState::ShowingResults,
                )
                .with_effects([Effect::bot_message(reply), intent])),
                // State moves on before the position arrives
                Resolution::AwaitingPosition => Ok(TransitionResult::new(
                    ConversationState::ShowingResults,
                )
                .with_effects([Effect::RequestLocation, intent])),
            }
        }

        (current, Event::SelectLocationMethod { .. }) => {
            Err(TransitionError::AffordanceInactive(current))
        }

        // ============================================================
        // Geolocation results
        // ============================================================
        (ConversationState::ShowingResults, Event::LocationResolved { coords }) => {
            Ok(TransitionResult::new(ConversationState::ShowingResults)
                .with_effect(Effect::bot_message(locator::position_message(Ok(coords)))))
        }

        (ConversationState::ShowingResults, Event::LocationFailed { error }) => {
            Ok(TransitionResult::new(ConversationState::ShowingResults)
                .with_effect(Effect::bot_message(locator::position_message(Err(error)))))
        }

        (current, Event::LocationResolved { .. } | Event::LocationFailed { .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "location result while {current}"
            )))
        }

        // ============================================================
        // Delivery
        // ============================================================
        (current, Event::TypingElapsed) => {
            Ok(TransitionResult::new(current).with_effect(Effect::ResolvePending))
        }
    }
}
