//! Server-Sent Events support

use super::types::SessionResponse;
use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

enum Outgoing {
    Session(SessionEvent),
    LocationRequested,
}

/// Convert session and position-request broadcasts to one SSE stream.
///
/// Opens with the current snapshot when a session is mounted and ends when
/// the session is torn down.
pub fn sse_stream(
    init: Option<SessionResponse>,
    session_rx: broadcast::Receiver<SessionEvent>,
    location_rx: broadcast::Receiver<()>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::iter(init.map(|session| Ok(snapshot_event(&session))));

    // Lagged receivers skip ahead; the next snapshot carries the full log
    let sessions = BroadcastStream::new(session_rx)
        .filter_map(|result| result.ok().map(Outgoing::Session));
    let locations = BroadcastStream::new(location_rx)
        .filter_map(|result| result.ok().map(|()| Outgoing::LocationRequested));

    let updates = sessions
        .merge(locations)
        .take_while(|item| !matches!(item, Outgoing::Session(SessionEvent::Closed)))
        .map(|item| Ok(outgoing_to_axum(item)));

    Sse::new(init.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn snapshot_event(session: &SessionResponse) -> Event {
    let data = json!({
        "type": "snapshot",
        "session": session,
    });
    Event::default().event("snapshot").data(data.to_string())
}

fn outgoing_to_axum(item: Outgoing) -> Event {
    let (event_type, data) = match item {
        Outgoing::Session(SessionEvent::Snapshot(snapshot)) => {
            return snapshot_event(&SessionResponse::from(snapshot));
        }
        Outgoing::Session(SessionEvent::Error { message }) => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
        Outgoing::Session(SessionEvent::Closed) => (
            "closed",
            json!({
                "type": "closed"
            }),
        ),
        Outgoing::LocationRequested => (
            "location_requested",
            json!({
                "type": "location_requested"
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
