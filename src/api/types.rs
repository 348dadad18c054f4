//! API request and response types

use crate::render::{render_transcript, RenderedMessage};
use crate::runtime::SessionSnapshot;
use crate::state_machine::{Choice, ConversationState, PredictionResponse};
use serde::{Deserialize, Serialize};

/// Request to mount the assistant: either the detection result itself or
/// the raw prediction payload it came from
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MountRequest {
    Context { body_part: String, confidence: f64 },
    Prediction(PredictionResponse),
}

/// Request to pick one of the initial options
#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub choice: Choice,
}

/// Outcome of the page's position request
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GeolocationReport {
    Position { latitude: f64, longitude: f64 },
    /// Platform error code (1 denied, 2 unavailable, 3 timeout)
    Failure { error: u16 },
}

/// Session as drawn by the chat window
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: ConversationState,
    pub body_part: String,
    pub confidence: f64,
    pub confidence_percent: String,
    pub geolocation_available: bool,
    pub typing: bool,
    pub messages: Vec<RenderedMessage>,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state,
            body_part: snapshot.context.body_part().to_string(),
            confidence: snapshot.context.confidence(),
            confidence_percent: snapshot.confidence_percent,
            geolocation_available: snapshot.geolocation_available,
            typing: snapshot.typing,
            messages: render_transcript(&snapshot.messages, snapshot.state),
        }
    }
}

/// Response for session actions
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
