//! Doctor-locator: turn a search intent into a map-search link

use crate::messages::{Message, MessageKind};
use crate::state_machine::state::{Coordinates, GeolocationError, LocationMethod};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters `encodeURIComponent` leaves alone besides alphanumerics
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MAPS_SEARCH_BASE: &str = "https://www.google.com/maps/search/";
const SEARCH_TERM: &str = "orthopedic doctor";
const ZOOM: u8 = 14;

pub const FOUND_NEARBY: &str = "Great! Here is a link showing specialists near you.";
pub const LOCATION_FAILED: &str = "I couldn't get your location. Please ensure location services are enabled or try searching manually.";
pub const LOCATION_UNSUPPORTED: &str =
    "Sorry, your browser doesn't support location services. Please enter a location manually.";
pub const SHARE_LOCATION: &str = "Share my current location.";

/// Outcome of handing a search intent to the locator
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The answer is known now
    Ready(Message),
    /// Waiting on the geolocation capability
    AwaitingPosition,
    /// Blank manual input; nothing to do
    Ignored,
}

/// Same escaping as JavaScript's `encodeURIComponent`
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Search link centred on a position
pub fn nearby_search_url(coords: Coordinates) -> String {
    format!(
        "{MAPS_SEARCH_BASE}{}/@{},{},{ZOOM}z",
        SEARCH_TERM.replace(' ', "+"),
        js_number(coords.latitude),
        js_number(coords.longitude)
    )
}

/// Number text as a JavaScript template literal writes it, for values within
/// coordinate range: no negative zero, exponent form below 1e-6.
fn js_number(value: f64) -> String {
    // IEEE addition turns -0 into +0
    let value = value + 0.0;
    let magnitude = value.abs();
    if magnitude > 0.0 && magnitude < 1e-6 {
        format!("{value:e}")
    } else {
        value.to_string()
    }
}

/// Search link for a free-text location
pub fn manual_search_url(location: &str) -> String {
    let query = encode_uri_component(&format!("{SEARCH_TERM} in {location}"));
    format!("{MAPS_SEARCH_BASE}?api=1&query={query}")
}

/// Resolve a search intent.
///
/// `geolocation_available` reports whether the platform capability exists at
/// all; when it does, the answer arrives later through [`position_message`].
pub fn resolve(method: &LocationMethod, geolocation_available: bool) -> Resolution {
    match method {
        LocationMethod::Manual { text } if text.trim().is_empty() => Resolution::Ignored,
        LocationMethod::Manual { text } => Resolution::Ready(
            Message::bot(format!("Okay, here are the results for \"{text}\"."))
                .with_kind(MessageKind::MapsLink)
                .with_link(manual_search_url(text)),
        ),
        LocationMethod::Auto if geolocation_available => Resolution::AwaitingPosition,
        LocationMethod::Auto => Resolution::Ready(Message::bot(LOCATION_UNSUPPORTED)),
    }
}

/// Bot reply once the geolocation capability answers
pub fn position_message(result: Result<Coordinates, GeolocationError>) -> Message {
    match result {
        Ok(coords) => Message::bot(FOUND_NEARBY)
            .with_kind(MessageKind::MapsLink)
            .with_link(nearby_search_url(coords)),
        Err(GeolocationError::Unsupported) => Message::bot(LOCATION_UNSUPPORTED),
        Err(_) => Message::bot(LOCATION_FAILED),
    }
}

/// The user entry describing what was searched
pub fn user_intent(method: &LocationMethod) -> String {
    match method {
        LocationMethod::Auto => SHARE_LOCATION.to_string(),
        LocationMethod::Manual { text } => format!("Find a doctor near: {text}"),
    }
}
