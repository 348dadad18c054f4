//! Runtime for the chat session
//!
//! One browser page owns one session. Mounting the same result again (a
//! reload) replaces the running session with a fresh runtime over the
//! persisted log; mounting a different result rebinds the live one.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::messages::{Message, MessageLog};
use crate::state_machine::{ConversationState, Event, FractureContext, SessionContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause between showing the typing indicator and the bot entry it stands for
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(750);

/// Type alias for the production session manager
pub type ProductionManager = SessionManager<DatabaseStorage, ClientGeolocator>;

/// Everything a client needs to draw the chat window
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: ConversationState,
    pub context: FractureContext,
    pub confidence_percent: String,
    pub geolocation_available: bool,
    /// A typing placeholder is showing
    pub typing: bool,
    pub messages: Vec<Message>,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Snapshot(SessionSnapshot),
    Error { message: String },
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No session is mounted")]
    NotMounted,
    #[error("Session runtime has stopped")]
    Closed,
    #[error("Failed to clear session: {0}")]
    Store(String),
}

/// Handle to the running session
struct ActiveSession {
    fracture: FractureContext,
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveSession {
    /// Cancel the runtime and wait for its final flush
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session runtime panicked");
        }
    }
}

/// Owner of the (at most one) live session
pub struct SessionManager<S, G>
where
    S: SessionStore + Clone + 'static,
    G: Geolocator + 'static,
{
    store: S,
    geolocator: Arc<G>,
    typing_delay: Duration,
    active: Mutex<Option<ActiveSession>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: Arc<watch::Sender<Option<SessionSnapshot>>>,
}

impl<S, G> SessionManager<S, G>
where
    S: SessionStore + Clone + 'static,
    G: Geolocator + 'static,
{
    pub fn new(store: S, geolocator: Arc<G>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            store,
            geolocator,
            typing_delay: DEFAULT_TYPING_DELAY,
            active: Mutex::new(None),
            broadcast_tx,
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    pub fn geolocator(&self) -> &Arc<G> {
        &self.geolocator
    }

    /// Start a session for the given result.
    ///
    /// A live session given a different result keeps its dialogue state and
    /// only swaps the result. Otherwise the dialogue starts over and the
    /// message log is whatever the store still holds; a previous runtime is
    /// stopped first so its queued entries are flushed into the store before
    /// the restore.
    pub async fn mount(&self, fracture: FractureContext) -> Result<SessionSnapshot, SessionError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_mut() {
            if session.fracture != fracture {
                match self.rebind(session, fracture.clone()).await {
                    Ok(snapshot) => return Ok(snapshot),
                    Err(e) => tracing::warn!(error = %e, "Rebind failed, remounting"),
                }
            }
        }
        if let Some(previous) = active.take() {
            tracing::info!("Replacing mounted session");
            previous.stop().await;
        }

        let restored = match self.store.restore().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Could not restore session log, starting empty");
                Vec::new()
            }
        };
        let restored_count = restored.len();

        let context = SessionContext::new(fracture.clone(), self.geolocator.is_available());
        let (event_tx, event_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let runtime = SessionRuntime::new(
            context,
            MessageLog::restore(restored),
            self.store.clone(),
            self.geolocator.clone(),
            event_rx,
            event_tx.clone(),
            self.broadcast_tx.clone(),
            self.snapshot_tx.clone(),
        )
        .with_typing_delay(self.typing_delay)
        .with_cancel_token(cancel.clone());
        let snapshot = runtime.snapshot();

        // Queued ahead of run() so it is the first event processed
        event_tx
            .send(Event::Mount {
                restored: restored_count,
            })
            .await
            .map_err(|_| SessionError::Closed)?;

        let task = tokio::spawn(runtime.run());
        *active = Some(ActiveSession {
            fracture,
            event_tx,
            cancel,
            task,
        });

        tracing::info!(restored = restored_count, "Session mounted");
        Ok(snapshot)
    }

    /// Hand a new result to the running session and wait until it shows
    async fn rebind(
        &self,
        session: &mut ActiveSession,
        fracture: FractureContext,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut updates = self.snapshot_tx.subscribe();
        session
            .event_tx
            .send(Event::ContextChanged {
                fracture: fracture.clone(),
            })
            .await
            .map_err(|_| SessionError::Closed)?;

        let snapshot = updates
            .wait_for(|snapshot| {
                snapshot
                    .as_ref()
                    .is_some_and(|snapshot| snapshot.context == fracture)
            })
            .await
            .map_err(|_| SessionError::Closed)?
            .clone();

        tracing::info!(body_part = %fracture.body_part(), "Session context rebound");
        session.fracture = fracture;
        snapshot.ok_or(SessionError::Closed)
    }

    /// Send an event to the mounted session
    pub async fn send_event(&self, event: Event) -> Result<(), SessionError> {
        let event_tx = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .map(|session| session.event_tx.clone())
                .ok_or(SessionError::NotMounted)?
        };
        event_tx.send(event).await.map_err(|_| SessionError::Closed)
    }

    /// Latest published snapshot, if a session has been mounted
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Follow snapshot changes
    #[allow(dead_code)] // Used in tests
    pub fn watch(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to session updates
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    #[allow(dead_code)] // Used in tests
    pub async fn is_mounted(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// End the session and forget its log
    pub async fn teardown(&self) -> Result<(), SessionError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            session.stop().await;
        }
        self.snapshot_tx.send_replace(None);
        let _ = self.broadcast_tx.send(SessionEvent::Closed);
        self.store.clear().await.map_err(SessionError::Store)?;
        tracing::info!("Session torn down");
        Ok(())
    }
}
