//! PositionSynchronizer - debounced drag-position persistence
//!
//! Every drag-move writes CardStore immediately so rendering never lags the
//! pointer. The backend write is debounced: each card owns one cancellable
//! scheduled task, reset on every move; when the settle window elapses
//! without further movement, exactly one position update is issued with the
//! coordinates current *at fire time*. Timers for different cards run
//! independently.
//!
//! The task handle is an explicit scoped resource: replaced on every move,
//! cancelled when the card is removed, and cancelled wholesale on
//! synchronizer drop so no timer outlives the engine.

use crate::models::{CardId, Position};
use crate::services::error::CanvasError;
use crate::services::persistence_gateway::PersistenceGateway;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct PositionSynchronizer {
    gateway: Arc<PersistenceGateway>,
    window: Duration,
    timers: Arc<Mutex<HashMap<CardId, JoinHandle<()>>>>,
}

impl PositionSynchronizer {
    pub fn new(gateway: Arc<PersistenceGateway>, window: Duration) -> Self {
        Self {
            gateway,
            window,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Handle one drag-move: immediate local write, then (re)arm the card's
    /// settle timer.
    pub fn card_moved(&self, card_id: CardId, position: Position) -> Result<(), CanvasError> {
        self.gateway.store().set_position(card_id, position)?;

        let gateway = self.gateway.clone();
        let timers = self.timers.clone();
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // A live task at this point is the card's current timer (every
            // replacement aborts its predecessor), so the entry can go
            // before the write: a move arriving mid-write schedules a fresh
            // timer instead of aborting the in-flight call.
            timers.lock().unwrap().remove(&card_id);
            if let Err(err) = gateway.persist_position(card_id).await {
                tracing::warn!(card = %card_id, error = %err, "debounced position write failed");
            }
        });

        if let Some(previous) = self.timers.lock().unwrap().insert(card_id, handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Cancel the card's pending write, if any. Called when the card is
    /// removed so the timer cannot fire for a card that no longer exists.
    pub fn cancel(&self, card_id: CardId) {
        if let Some(handle) = self.timers.lock().unwrap().remove(&card_id) {
            handle.abort();
            tracing::debug!(card = %card_id, "pending position write cancelled");
        }
    }

    /// Number of armed timers, for observability.
    pub fn pending(&self) -> usize {
        self.timers.lock().unwrap().len()
    }
}

impl Drop for PositionSynchronizer {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().unwrap().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CardBackend, InMemoryBackend, Session};
    use crate::models::{Card, CardPayload, CardType};
    use crate::services::notices::NoticeSink;
    use crate::store::CardStore;

    const WINDOW: Duration = Duration::from_millis(500);

    fn env() -> (Arc<CardStore>, Arc<InMemoryBackend>, PositionSynchronizer) {
        let store = Arc::new(CardStore::new());
        let backend = Arc::new(InMemoryBackend::new());
        let gateway = Arc::new(PersistenceGateway::new(
            store.clone(),
            backend.clone(),
            Session::new("token", 1),
            NoticeSink::new(8),
        ));
        let sync = PositionSynchronizer::new(gateway, WINDOW);
        (store, backend, sync)
    }

    async fn saved_card(
        store: &CardStore,
        backend: &InMemoryBackend,
    ) -> CardId {
        let record = backend
            .create_card(
                &Session::new("token", 1),
                crate::backend::NewCardRecord {
                    card_type: CardType::Thought,
                    data_id: 1,
                    position_x: 0.0,
                    position_y: 0.0,
                    project_id: 1,
                },
            )
            .await
            .unwrap();
        let mut card = Card::new(
            Position::default(),
            1,
            CardPayload::empty(CardType::Thought),
        );
        card.id = CardId::Remote(record.id);
        card.entity_id = Some(1);
        store.add_card(card).unwrap().id
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_within_window_produce_one_write() {
        let (store, backend, sync) = env();
        let id = saved_card(&store, &backend).await;

        sync.card_moved(id, Position::new(10.0, 10.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        sync.card_moved(id, Position::new(20.0, 20.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        sync.card_moved(id, Position::new(30.0, 40.0)).unwrap();

        // Local position reflects every move immediately.
        assert_eq!(store.get_card(id).unwrap().position, Position::new(30.0, 40.0));
        assert_eq!(backend.calls("update_card_position"), 0);

        tokio::time::sleep(WINDOW + Duration::from_millis(50)).await;

        // Exactly one write, carrying the final coordinates.
        assert_eq!(backend.calls("update_card_position"), 1);
        let record = backend.card_record(id.remote().unwrap()).unwrap();
        assert_eq!(record.position_x, 30.0);
        assert_eq!(record.position_y, 40.0);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_drags_write_once_each() {
        let (store, backend, sync) = env();
        let id = saved_card(&store, &backend).await;

        sync.card_moved(id, Position::new(10.0, 0.0)).unwrap();
        tokio::time::sleep(WINDOW + Duration::from_millis(50)).await;
        sync.card_moved(id, Position::new(20.0, 0.0)).unwrap();
        tokio::time::sleep(WINDOW + Duration::from_millis(50)).await;

        assert_eq!(backend.calls("update_card_position"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_card_timers_are_independent() {
        let (store, backend, sync) = env();
        let a = saved_card(&store, &backend).await;
        let b = saved_card(&store, &backend).await;

        sync.card_moved(a, Position::new(1.0, 1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        sync.card_moved(b, Position::new(2.0, 2.0)).unwrap();
        assert_eq!(sync.pending(), 2);

        tokio::time::sleep(WINDOW + Duration::from_millis(50)).await;

        assert_eq!(backend.calls("update_card_position"), 2);
        assert_eq!(
            backend.card_record(a.remote().unwrap()).unwrap().position_x,
            1.0
        );
        assert_eq!(
            backend.card_record(b.remote().unwrap()).unwrap().position_x,
            2.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_pending_write() {
        let (store, backend, sync) = env();
        let id = saved_card(&store, &backend).await;

        sync.card_moved(id, Position::new(9.0, 9.0)).unwrap();
        sync.cancel(id);
        tokio::time::sleep(WINDOW * 2).await;

        assert_eq!(backend.calls("update_card_position"), 0);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_card_never_hits_backend() {
        let (store, backend, sync) = env();
        let card = store
            .add_card(Card::new(
                Position::default(),
                1,
                CardPayload::empty(CardType::Insight),
            ))
            .unwrap();

        sync.card_moved(card.id, Position::new(5.0, 5.0)).unwrap();
        tokio::time::sleep(WINDOW * 2).await;

        assert_eq!(backend.calls("update_card_position"), 0);
        assert_eq!(store.get_card(card.id).unwrap().position, Position::new(5.0, 5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_removed_while_timer_runs() {
        let (store, backend, sync) = env();
        let id = saved_card(&store, &backend).await;

        sync.card_moved(id, Position::new(5.0, 5.0)).unwrap();
        store.remove_card(id);
        tokio::time::sleep(WINDOW * 2).await;

        // The fire-time re-check found the card gone and skipped the write.
        assert_eq!(backend.calls("update_card_position"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_of_unknown_card_errors() {
        let (_store, _backend, sync) = env();
        let err = sync
            .card_moved(CardId::Remote(404), Position::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, CanvasError::Store(_)));
    }
}
