//! Events that can occur in a session

use super::state::{Choice, Coordinates, FractureContext, GeolocationError, LocationMethod};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The chat was mounted; `restored` is the number of persisted entries
    Mount { restored: usize },

    /// A different detection result was supplied to the live session
    ContextChanged { fracture: FractureContext },

    // User events
    Choose { choice: Choice },
    SelectLocationMethod { method: LocationMethod },

    // Geolocation capability
    LocationResolved { coords: Coordinates },
    LocationFailed { error: GeolocationError },

    /// The typing delay for the head of the delivery queue elapsed
    TypingElapsed,
}
