//! Conversation state and session context types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Confidence above which the greeting calls the fracture "likely"
pub const LIKELY_THRESHOLD: f64 = 0.85;

/// Dialogue phase. Lives only as long as the mounted session; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Initial,
    AwaitingLocationMethod,
    ShowingResults,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::AwaitingLocationMethod => "awaiting_location_method",
            Self::ShowingResults => "showing_results",
        };
        f.write_str(name)
    }
}

/// Options offered by the initial prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    FindDoctor,
    NextSteps,
}

/// How the user wants to search for a doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LocationMethod {
    Auto,
    Manual { text: String },
}

/// A position reported by the geolocation capability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validated coordinates; `None` when out of range or not finite
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Why a position request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("location services not supported")]
    Unsupported,
}

impl GeolocationError {
    /// Map a platform error code (1 denied, 2 unavailable, 3 timeout)
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("confidence must be a number in [0, 1], got {0}")]
    InvalidConfidence(String),
    #[error("no fracture detected")]
    NoFracture,
}

// ============================================================================
// Fracture Context
// ============================================================================

/// The detection result that seeds the dialogue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FractureContext {
    body_part: String,
    confidence: f64,
}

impl FractureContext {
    pub fn new(body_part: impl Into<String>, confidence: f64) -> Result<Self, ContextError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ContextError::InvalidConfidence(confidence.to_string()));
        }
        Ok(Self {
            body_part: body_part.into(),
            confidence,
        })
    }

    /// Derive a context from a prediction result.
    ///
    /// Only a detected fracture mounts the assistant. Missing fields fall back
    /// to `N/A` and zero confidence.
    pub fn from_prediction(prediction: &PredictionResponse) -> Result<Self, ContextError> {
        let fracture = prediction.fracture_prediction.as_ref();
        if !fracture.and_then(|f| f.is_fractured).unwrap_or(false) {
            return Err(ContextError::NoFracture);
        }
        let confidence = fracture.and_then(|f| f.probability).unwrap_or(0.0);
        let body_part = prediction
            .body_part_prediction
            .as_ref()
            .and_then(|b| b.label.clone())
            .unwrap_or_else(|| "N/A".to_string());
        Self::new(body_part, confidence)
    }

    pub fn body_part(&self) -> &str {
        &self.body_part
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_likely(&self) -> bool {
        self.confidence > LIKELY_THRESHOLD
    }

    /// Confidence as shown in the results panel, e.g. `91.00%`
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }

    /// Opening line of a fresh conversation
    pub fn greeting(&self) -> String {
        let confidence_text = if self.is_likely() {
            "I've detected a likely fracture"
        } else {
            "I've detected a potential fracture"
        };
        format!(
            "{confidence_text} in the {} area. I can help with the next steps.",
            self.body_part
        )
    }
}

/// Response of the prediction endpoint. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub fracture_prediction: Option<FracturePrediction>,
    #[serde(default)]
    pub body_part_prediction: Option<BodyPartPrediction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FracturePrediction {
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub is_fractured: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyPartPrediction {
    #[serde(default)]
    pub label: Option<String>,
}

// ============================================================================
// Session Context
// ============================================================================

/// Immutable inputs for one mounted session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub fracture: FractureContext,
    /// Whether the platform offers a geolocation capability at all
    pub geolocation_available: bool,
}

impl SessionContext {
    pub fn new(fracture: FractureContext, geolocation_available: bool) -> Self {
        Self {
            fracture,
            geolocation_available,
        }
    }
}
