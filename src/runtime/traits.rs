//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{Database, MESSAGES_KEY};
use crate::messages::{decode_snapshot, encode_snapshot, Message};
use crate::state_machine::{Coordinates, GeolocationError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, oneshot};

/// Session-scoped persistence for the message log
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the persisted log; empty when nothing was stored
    async fn restore(&self) -> Result<Vec<Message>, String>;

    /// Overwrite the persisted log with a snapshot of resolved entries
    async fn persist(&self, messages: &[Message]) -> Result<(), String>;

    /// Forget the session
    async fn clear(&self) -> Result<(), String>;
}

/// Platform capability reporting the current position
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Whether the capability exists at all
    fn is_available(&self) -> bool;

    /// Single-shot position request
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn restore(&self) -> Result<Vec<Message>, String> {
        (**self).restore().await
    }

    async fn persist(&self, messages: &[Message]) -> Result<(), String> {
        (**self).persist(messages).await
    }

    async fn clear(&self) -> Result<(), String> {
        (**self).clear().await
    }
}

#[async_trait]
impl<T: Geolocator + ?Sized> Geolocator for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        (**self).current_position().await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as the session store
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn restore(&self) -> Result<Vec<Message>, String> {
        match self.db.get_item(MESSAGES_KEY).map_err(|e| e.to_string())? {
            Some(raw) => decode_snapshot(&raw).map_err(|e| format!("Corrupt session log: {e}")),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, messages: &[Message]) -> Result<(), String> {
        let raw = encode_snapshot(messages).map_err(|e| e.to_string())?;
        self.db
            .set_item(MESSAGES_KEY, &raw)
            .map_err(|e| e.to_string())
    }

    async fn clear(&self) -> Result<(), String> {
        self.db.remove_item(MESSAGES_KEY).map_err(|e| e.to_string())
    }
}

type PositionReply = oneshot::Sender<Result<Coordinates, GeolocationError>>;

/// Geolocation performed by the browser page.
///
/// A request parks a reply slot and pings subscribers; the page runs the
/// platform request and reports back through [`ClientGeolocator::report`],
/// which answers the oldest open slot. Requests are not deduplicated.
pub struct ClientGeolocator {
    enabled: bool,
    pending: Mutex<VecDeque<PositionReply>>,
    requests: broadcast::Sender<()>,
}

impl ClientGeolocator {
    pub fn new(enabled: bool) -> Self {
        let (requests, _) = broadcast::channel(16);
        Self {
            enabled,
            pending: Mutex::new(VecDeque::new()),
            requests,
        }
    }

    /// Notified once per position request
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.requests.subscribe()
    }

    /// Deliver the page's answer. Returns false when no request was waiting.
    pub fn report(&self, result: Result<Coordinates, GeolocationError>) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(reply) = pending.pop_front() {
            // A closed slot belongs to a session that has since been torn down
            if reply.send(result).is_ok() {
                return true;
            }
        }
        false
    }

    #[allow(dead_code)] // Used in tests
    pub fn pending_requests(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|reply| !reply.is_closed());
        pending.len()
    }
}

#[async_trait]
impl Geolocator for ClientGeolocator {
    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        if !self.enabled {
            return Err(GeolocationError::Unsupported);
        }
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.push_back(tx);
            // Nobody would ever answer; take the slot back
            if self.requests.send(()).is_err() {
                pending.pop_back();
                tracing::warn!("Position requested but no page is listening");
                return Err(GeolocationError::PositionUnavailable);
            }
        }
        rx.await
            .unwrap_or(Err(GeolocationError::PositionUnavailable))
    }
}
