//! Core dialogue state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod affordance;
mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use affordance::is_interactive;
pub use effect::Effect;
pub use event::Event;
pub use state::{
    Choice, ContextError, ConversationState, Coordinates, FractureContext, GeolocationError,
    LocationMethod, PredictionResponse, SessionContext,
};
pub use transition::{transition, TransitionError};
