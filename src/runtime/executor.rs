//! Session runtime executor

use super::traits::{Geolocator, SessionStore};
use super::{SessionEvent, SessionSnapshot};

use crate::messages::{MessageLog, MessageQueue};
use crate::state_machine::{transition, ConversationState, Effect, Event, SessionContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one mounted chat session: applies events to the state machine,
/// carries out the resulting effects and publishes snapshots.
pub struct SessionRuntime<S, G>
where
    S: SessionStore + 'static,
    G: Geolocator + 'static,
{
    context: SessionContext,
    state: ConversationState,
    log: MessageLog,
    queue: MessageQueue,
    store: S,
    geolocator: Arc<G>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: Arc<watch::Sender<Option<SessionSnapshot>>>,
    typing_delay: Duration,
    cancel: CancellationToken,
}

impl<S, G> SessionRuntime<S, G>
where
    S: SessionStore + 'static,
    G: Geolocator + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        log: MessageLog,
        store: S,
        geolocator: Arc<G>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        snapshot_tx: Arc<watch::Sender<Option<SessionSnapshot>>>,
    ) -> Self {
        Self {
            context,
            state: ConversationState::default(),
            log,
            queue: MessageQueue::new(),
            store,
            geolocator,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            typing_delay: super::DEFAULT_TYPING_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            confidence_percent: self.context.fracture.confidence_percent(),
            context: self.context.fracture.clone(),
            geolocation_available: self.context.geolocation_available,
            typing: self.log.has_pending_typing(),
            messages: self.log.entries().to_vec(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            body_part = %self.context.fracture.body_part(),
            restored = self.log.len(),
            "Starting session runtime"
        );
        self.publish();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event).await {
                        tracing::warn!(error = %e, state = %self.state, "Rejected event");
                        let _ = self.broadcast_tx.send(SessionEvent::Error {
                            message: e.clone(),
                        });
                    }
                }
                else => break,
            }
        }

        // Anything still queued lands without its delay so nothing is lost
        if !self.queue.is_idle() {
            tracing::debug!(pending = self.queue.len(), "Flushing queued messages");
            self.queue.flush(&mut self.log);
            self.persist().await;
            self.publish();
        }

        tracing::info!("Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), String> {
        tracing::debug!(state = %self.state, event = ?event, "Processing event");

        if let Event::ContextChanged { fracture } = &event {
            tracing::info!(
                from = %self.context.fracture.body_part(),
                to = %fracture.body_part(),
                "Rebinding session context"
            );
            self.context.fracture = fracture.clone();
        }

        let result =
            transition(self.state, &self.context, event).map_err(|e| e.to_string())?;

        if result.new_state != self.state {
            tracing::info!(from = %self.state, to = %result.new_state, "State transition");
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        self.publish();
        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Deliver { message } => {
                self.queue.enqueue(message);
                if self.queue.pump(&mut self.log) {
                    self.schedule_typing();
                }
                self.persist().await;
            }

            Effect::ResolvePending => {
                if self.queue.resolve(&mut self.log) {
                    self.schedule_typing();
                }
                self.persist().await;
            }

            Effect::RequestLocation => {
                let geolocator = self.geolocator.clone();
                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    let event = tokio::select! {
                        () = cancel.cancelled() => return,
                        result = geolocator.current_position() => match result {
                            Ok(coords) => Event::LocationResolved { coords },
                            Err(error) => {
                                tracing::info!(%error, "Position request failed");
                                Event::LocationFailed { error }
                            }
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }
        }
    }

    fn schedule_typing(&self) {
        let event_tx = self.event_tx.clone();
        let delay = self.typing_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx.send(Event::TypingElapsed).await;
        });
    }

    /// Store the resolved entries; a failed write is logged, never fatal
    async fn persist(&self) {
        if let Err(e) = self.store.persist(&self.log.resolved()).await {
            tracing::error!(error = %e, "Failed to persist session log");
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_replace(Some(snapshot.clone()));
        let _ = self.broadcast_tx.send(SessionEvent::Snapshot(snapshot));
    }
}
