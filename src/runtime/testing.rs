//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{SessionEvent, SessionManager, SessionSnapshot};
use crate::messages::{decode_snapshot, encode_snapshot, Message};
use crate::state_machine::{Coordinates, Event, FractureContext, GeolocationError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// In-Memory Store
// ============================================================================

/// Session store that keeps the serialized log and every write made to it
#[derive(Default)]
pub struct InMemoryStore {
    raw: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw persisted text, valid or not
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Currently stored entries
    pub fn persisted(&self) -> Vec<Message> {
        self.raw
            .lock()
            .unwrap()
            .as_deref()
            .map(|raw| decode_snapshot(raw).unwrap())
            .unwrap_or_default()
    }

    /// Every payload written so far, oldest first
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn restore(&self) -> Result<Vec<Message>, String> {
        match self.raw.lock().unwrap().as_deref() {
            Some(raw) => decode_snapshot(raw).map_err(|e| e.to_string()),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, messages: &[Message]) -> Result<(), String> {
        let raw = encode_snapshot(messages).map_err(|e| e.to_string())?;
        self.writes.lock().unwrap().push(raw.clone());
        *self.raw.lock().unwrap() = Some(raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        *self.raw.lock().unwrap() = None;
        Ok(())
    }
}

// ============================================================================
// Mock Geolocator
// ============================================================================

/// Geolocator that answers from a queue of canned results
pub struct MockGeolocator {
    available: bool,
    results: Mutex<VecDeque<Result<Coordinates, GeolocationError>>>,
    requests: AtomicUsize,
}

#[allow(dead_code)]
impl MockGeolocator {
    pub fn new() -> Self {
        Self {
            available: true,
            results: Mutex::new(VecDeque::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// A platform without the capability
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn queue_result(&self, result: Result<Coordinates, GeolocationError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for MockGeolocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geolocator for MockGeolocator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeolocationError::PositionUnavailable))
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// Helper for building test sessions with minimal boilerplate
pub struct TestRuntime {
    pub store: Arc<InMemoryStore>,
    pub geolocator: Arc<MockGeolocator>,
    pub manager: SessionManager<Arc<InMemoryStore>, MockGeolocator>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub struct TestRuntimeBuilder {
    store: InMemoryStore,
    geolocator: MockGeolocator,
    typing_delay: Duration,
}

#[allow(dead_code)]
impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            store: InMemoryStore::new(),
            geolocator: MockGeolocator::new(),
            typing_delay: Duration::from_millis(5),
        }
    }

    pub fn store(mut self, store: InMemoryStore) -> Self {
        self.store = store;
        self
    }

    pub fn geolocator(mut self, geolocator: MockGeolocator) -> Self {
        self.geolocator = geolocator;
        self
    }

    pub fn typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    pub fn build(self) -> TestRuntime {
        let store = Arc::new(self.store);
        let geolocator = Arc::new(self.geolocator);
        let manager = SessionManager::new(store.clone(), geolocator.clone())
            .with_typing_delay(self.typing_delay);
        let events = manager.subscribe();
        TestRuntime {
            store,
            geolocator,
            manager,
            events,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl TestRuntime {
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }

    /// Mount a session for a fracture result
    pub async fn mount(&self, body_part: &str, confidence: f64) -> SessionSnapshot {
        self.manager
            .mount(FractureContext::new(body_part, confidence).expect("valid context"))
            .await
            .expect("Failed to mount")
    }

    pub async fn send(&self, event: Event) {
        self.manager.send_event(event).await.expect("Failed to send event");
    }

    /// Wait until a published snapshot satisfies the predicate
    pub async fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl Fn(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.manager.watch();
        tokio::time::timeout(timeout, async {
            loop {
                if let Some(snapshot) = rx.borrow_and_update().as_ref() {
                    if predicate(snapshot) {
                        return snapshot.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
        .ok()
    }

    /// Wait until `count` entries are showing and nothing is typing
    pub async fn settled(&self, count: usize) -> SessionSnapshot {
        self.wait_for(Duration::from_secs(2), |s| !s.typing && s.messages.len() == count)
            .await
            .unwrap_or_else(|| {
                panic!(
                    "session did not settle at {count} messages: {:?}",
                    self.manager.snapshot()
                )
            })
    }

    /// Wait for an error event with timeout
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(SessionEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice;
    use crate::locator;
    use crate::messages::{MessageKind, Sender};
    use crate::render::render_message;
    use crate::state_machine::{is_interactive, Choice, ConversationState, LocationMethod};

    fn choose(choice: Choice) -> Event {
        Event::Choose { choice }
    }

    fn manual(text: &str) -> Event {
        Event::SelectLocationMethod {
            method: LocationMethod::Manual {
                text: text.to_string(),
            },
        }
    }

    fn auto() -> Event {
        Event::SelectLocationMethod {
            method: LocationMethod::Auto,
        }
    }

    /// Mount, settle the greeting and pick "find a doctor"
    async fn at_location_prompt(rt: &TestRuntime) -> SessionSnapshot {
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;
        rt.send(choose(Choice::FindDoctor)).await;
        rt.settled(4).await
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert!(store.restore().await.unwrap().is_empty());
        store
            .persist(&[Message::bot("a"), Message::typing()])
            .await
            .unwrap();
        assert_eq!(store.persisted(), vec![Message::bot("a")]);
        store.clear().await.unwrap();
        assert!(store.persisted().is_empty());
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_mount_greets_then_prompts() {
        let rt = TestRuntime::new().build();
        let mounted = rt.mount("WRIST", 0.9).await;
        assert_eq!(mounted.state, ConversationState::Initial);
        assert_eq!(mounted.confidence_percent, "90.00%");

        let snapshot = rt.settled(2).await;
        let context = FractureContext::new("WRIST", 0.9).unwrap();
        assert_eq!(snapshot.messages[0], Message::bot(context.greeting()));
        assert_eq!(snapshot.messages[1].kind, Some(MessageKind::InitialChoice));
        assert!(snapshot.messages.iter().all(Message::is_bot));
        assert_eq!(rt.store.persisted(), snapshot.messages);
    }

    #[tokio::test]
    async fn test_typing_placeholder_never_persisted() {
        let rt = TestRuntime::new().build();
        at_location_prompt(&rt).await;
        rt.send(manual("Chicago, IL")).await;
        rt.settled(6).await;

        let writes = rt.store.writes();
        assert!(!writes.is_empty());
        for raw in writes {
            assert!(!raw.contains("\"typing\""), "placeholder persisted: {raw}");
        }
    }

    #[tokio::test]
    async fn test_next_steps_for_wrist() {
        let rt = TestRuntime::new().build();
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;

        rt.send(choose(Choice::NextSteps)).await;
        let snapshot = rt.settled(4).await;

        assert_eq!(snapshot.state, ConversationState::ShowingResults);
        assert_eq!(snapshot.messages[2], Message::user("What are the next steps?"));
        let advice_msg = &snapshot.messages[3];
        assert!(advice_msg.is_bot());
        assert!(advice_msg.is_markup);
        assert!(advice_msg.text.contains(advice::lookup("WRIST")));
        assert!(advice_msg.text.contains(advice::DISCLAIMER));
    }

    #[tokio::test]
    async fn test_blank_manual_location_changes_nothing() {
        let rt = TestRuntime::new().build();
        at_location_prompt(&rt).await;

        rt.send(manual("   ")).await;
        // The form is still live, so a real submission is accepted afterwards
        rt.send(manual("Chicago, IL")).await;
        let snapshot = rt.settled(6).await;

        assert_eq!(snapshot.state, ConversationState::ShowingResults);
        assert!(!snapshot
            .messages
            .iter()
            .any(|m| m.text.contains("near:    ") || m.text.contains("\"   \"")));
    }

    #[tokio::test]
    async fn test_manual_location_answer_precedes_user_entry() {
        let rt = TestRuntime::new().build();
        at_location_prompt(&rt).await;

        rt.send(manual("Chicago, IL")).await;
        let snapshot = rt.settled(6).await;

        let answer = &snapshot.messages[4];
        assert_eq!(answer.sender, Sender::Bot);
        assert_eq!(answer.kind, Some(MessageKind::MapsLink));
        assert_eq!(
            answer.link.as_deref(),
            Some("https://www.google.com/maps/search/?api=1&query=orthopedic%20doctor%20in%20Chicago%2C%20IL")
        );
        assert_eq!(
            snapshot.messages[5],
            Message::user("Find a doctor near: Chicago, IL")
        );

        // The form that was submitted is now inert
        let form = &snapshot.messages[3];
        assert_eq!(form.kind, Some(MessageKind::LocationChoice));
        assert!(!is_interactive(form, snapshot.state));
        assert!(render_message(form, snapshot.state).affordance.is_none());
    }

    #[tokio::test]
    async fn test_auto_location_success() {
        let rt = TestRuntime::new().build();
        let coords = Coordinates::new(41.8781, -87.6298).unwrap();
        rt.geolocator.queue_result(Ok(coords));
        at_location_prompt(&rt).await;

        rt.send(auto()).await;
        let snapshot = rt.settled(6).await;

        assert_eq!(snapshot.messages[4], Message::user(locator::SHARE_LOCATION));
        assert_eq!(snapshot.messages[5].text, locator::FOUND_NEARBY);
        assert_eq!(
            snapshot.messages[5].link.as_deref(),
            Some(locator::nearby_search_url(coords).as_str())
        );
        assert_eq!(rt.geolocator.request_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_location_denied() {
        let rt = TestRuntime::new().build();
        rt.geolocator
            .queue_result(Err(GeolocationError::PermissionDenied));
        at_location_prompt(&rt).await;

        rt.send(auto()).await;
        let snapshot = rt.settled(6).await;

        assert_eq!(snapshot.messages[5].text, locator::LOCATION_FAILED);
        assert_eq!(snapshot.messages[5].link, None);
        assert_eq!(snapshot.state, ConversationState::ShowingResults);
    }

    #[tokio::test]
    async fn test_auto_location_without_capability() {
        let rt = TestRuntime::new()
            .geolocator(MockGeolocator::unavailable())
            .build();
        let mounted = rt.mount("ELBOW", 0.5).await;
        assert!(!mounted.geolocation_available);
        rt.settled(2).await;
        rt.send(choose(Choice::FindDoctor)).await;
        rt.settled(4).await;

        rt.send(auto()).await;
        let snapshot = rt.settled(6).await;

        assert_eq!(snapshot.messages[4].text, locator::LOCATION_UNSUPPORTED);
        assert_eq!(snapshot.messages[5], Message::user(locator::SHARE_LOCATION));
        assert_eq!(rt.geolocator.request_count(), 0);
    }

    #[tokio::test]
    async fn test_remount_keeps_log_and_resets_state() {
        let rt = TestRuntime::new().build();
        let before = at_location_prompt(&rt).await;
        assert_eq!(before.state, ConversationState::AwaitingLocationMethod);

        let remounted = rt.mount("WRIST", 0.9).await;
        assert_eq!(remounted.state, ConversationState::Initial);
        assert_eq!(remounted.messages, before.messages);

        // Initial again, so the first choice is accepted and nothing was re-greeted
        rt.send(choose(Choice::FindDoctor)).await;
        let snapshot = rt.settled(6).await;
        assert_eq!(snapshot.messages[4], Message::user("Find a nearby doctor."));
        assert_eq!(snapshot.messages[5].kind, Some(MessageKind::LocationChoice));
    }

    #[tokio::test]
    async fn test_new_result_keeps_conversation_state() {
        let rt = TestRuntime::new().build();
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;
        rt.send(choose(Choice::NextSteps)).await;
        let before = rt.settled(4).await;
        assert_eq!(before.state, ConversationState::ShowingResults);

        let rebound = rt.mount("ELBOW", 0.5).await;
        assert_eq!(rebound.state, ConversationState::ShowingResults);
        assert_eq!(rebound.context.body_part(), "ELBOW");
        assert_eq!(rebound.confidence_percent, "50.00%");
        assert_eq!(rebound.messages, before.messages);

        // Results already showing, so the first choice stays inert
        let initial = &rebound.messages[1];
        assert!(!is_interactive(initial, rebound.state));
    }

    #[tokio::test]
    async fn test_new_result_used_by_later_advice() {
        let rt = TestRuntime::new().build();
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;

        let rebound = rt.mount("ELBOW", 0.5).await;
        assert_eq!(rebound.state, ConversationState::Initial);
        assert_eq!(rebound.messages.len(), 2);

        rt.send(choose(Choice::NextSteps)).await;
        let snapshot = rt.settled(4).await;
        assert_eq!(snapshot.messages[3].text, advice::next_steps_message("ELBOW"));
        // No second greeting for the new result
        assert_eq!(
            snapshot.messages.iter().filter(|m| m.text.contains("detected")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_remount_flushes_pending_messages() {
        let rt = TestRuntime::new()
            .typing_delay(Duration::from_secs(30))
            .build();
        rt.mount("FINGER", 0.9).await;
        rt.wait_for(Duration::from_secs(2), |s| s.typing)
            .await
            .expect("greeting never started typing");
        assert!(rt.store.persisted().is_empty());

        let remounted = rt.mount("FINGER", 0.9).await;
        assert!(!remounted.typing);
        assert_eq!(remounted.messages.len(), 2);
        assert_eq!(remounted.messages[1].kind, Some(MessageKind::InitialChoice));
        assert_eq!(rt.store.persisted(), remounted.messages);
    }

    #[tokio::test]
    async fn test_corrupt_store_starts_fresh() {
        let rt = TestRuntime::new()
            .store(InMemoryStore::with_raw("{not json"))
            .build();
        let mounted = rt.mount("SHOULDER", 0.9).await;
        assert!(mounted.messages.is_empty());
        let snapshot = rt.settled(2).await;
        assert_eq!(snapshot.messages[1].text, "What would you like to do?");
    }

    #[tokio::test]
    async fn test_stale_choice_reports_error() {
        let mut rt = TestRuntime::new().build();
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;
        rt.send(choose(Choice::NextSteps)).await;
        rt.settled(4).await;

        rt.send(choose(Choice::FindDoctor)).await;
        let error = rt.wait_for_error(Duration::from_secs(2)).await;
        assert!(error.is_some());
        let snapshot = rt.manager.snapshot().unwrap();
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.state, ConversationState::ShowingResults);
    }

    #[tokio::test]
    async fn test_teardown_clears_session() {
        let rt = TestRuntime::new().build();
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;
        assert!(rt.manager.is_mounted().await);

        rt.manager.teardown().await.unwrap();

        assert!(rt.store.persisted().is_empty());
        assert!(rt.manager.snapshot().is_none());
        assert!(!rt.manager.is_mounted().await);
        assert!(matches!(
            rt.manager.send_event(choose(Choice::NextSteps)).await,
            Err(super::super::SessionError::NotMounted)
        ));

        // A new mount after teardown greets again
        rt.mount("WRIST", 0.9).await;
        rt.settled(2).await;
    }
}
