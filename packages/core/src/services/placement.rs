//! PlacementController - "place a new card" mode
//!
//! State machine behind the canvas toolbar: picking a card type enters
//! placing mode with a pointer-tracking preview (ghost) node, and the next
//! confirmed click materializes a real unsaved card at the pointer.
//!
//! There is deliberately no cancel transition: placement ends by completing
//! it or is redirected by starting a new one, which replaces the preview
//! node's type in place.

use crate::config::EngineConfig;
use crate::models::{Card, CardPayload, CardType, Position};
use crate::services::error::CanvasError;
use crate::services::guided_chat::GuidedChatEngine;
use crate::store::{CanvasEvent, CardStore};
use std::sync::{Arc, Mutex};

/// Placement mode state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementState {
    Idle,
    Placing {
        card_type: CardType,
        /// Where the ghost node currently sits.
        preview: Position,
    },
}

pub struct PlacementController {
    store: Arc<CardStore>,
    config: Arc<EngineConfig>,
    chat: Arc<GuidedChatEngine>,
    project_id: i64,
    state: Mutex<PlacementState>,
}

impl PlacementController {
    pub fn new(
        store: Arc<CardStore>,
        config: Arc<EngineConfig>,
        chat: Arc<GuidedChatEngine>,
        project_id: i64,
    ) -> Self {
        Self {
            store,
            config,
            chat,
            project_id,
            state: Mutex::new(PlacementState::Idle),
        }
    }

    pub fn state(&self) -> PlacementState {
        *self.state.lock().unwrap()
    }

    /// The ghost node to render, if placement is active.
    pub fn preview(&self) -> Option<(CardType, Position)> {
        match self.state() {
            PlacementState::Idle => None,
            PlacementState::Placing { card_type, preview } => Some((card_type, preview)),
        }
    }

    /// Enter placing mode. While a placement is already active this only
    /// replaces the preview node's type; its position is kept, since the
    /// pointer has not moved.
    pub fn start_placing(&self, card_type: CardType) {
        let mut state = self.state.lock().unwrap();
        *state = match *state {
            PlacementState::Idle => PlacementState::Placing {
                card_type,
                preview: Position::default(),
            },
            PlacementState::Placing { preview, .. } => PlacementState::Placing {
                card_type,
                preview,
            },
        };
        tracing::debug!(%card_type, "placement started");
    }

    /// Track the pointer. No-op outside placing mode.
    pub fn pointer_moved(&self, position: Position) {
        let mut state = self.state.lock().unwrap();
        if let PlacementState::Placing { card_type, .. } = *state {
            *state = PlacementState::Placing {
                card_type,
                preview: position,
            };
        }
    }

    /// Materialize an unsaved card of the pending type exactly at
    /// `position`, open its detail view (guided when configured for the
    /// type), and return to idle.
    ///
    /// # Errors
    ///
    /// [`CanvasError::InvalidState`] when no placement is active.
    pub fn confirm_placement(&self, position: Position) -> Result<Card, CanvasError> {
        let card_type = {
            let mut state = self.state.lock().unwrap();
            let PlacementState::Placing { card_type, .. } = *state else {
                return Err(CanvasError::invalid_state(
                    "confirm_placement outside placing mode",
                ));
            };
            *state = PlacementState::Idle;
            card_type
        };

        let card = self.store.add_card(Card::new(
            position,
            self.project_id,
            CardPayload::empty(card_type),
        ))?;

        let guided = self.config.guided_enabled(card_type);
        if guided {
            self.chat.open_session(card.id)?;
        }
        self.store.publish(CanvasEvent::CardOpened {
            id: card.id,
            guided,
        });
        tracing::debug!(card = %card.id, %card_type, x = position.x, y = position.y, "card placed");
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, Session};
    use crate::services::notices::NoticeSink;
    use crate::services::persistence_gateway::PersistenceGateway;

    fn controller(config: EngineConfig) -> (Arc<CardStore>, Arc<GuidedChatEngine>, PlacementController) {
        let store = Arc::new(CardStore::new());
        let notices = NoticeSink::new(8);
        let gateway = Arc::new(PersistenceGateway::new(
            store.clone(),
            Arc::new(InMemoryBackend::new()),
            Session::new("token", 1),
            notices.clone(),
        ));
        let chat = Arc::new(GuidedChatEngine::new(gateway, notices));
        let placement = PlacementController::new(store.clone(), Arc::new(config), chat.clone(), 7);
        (store, chat, placement)
    }

    #[test]
    fn test_starts_idle() {
        let (_, _, placement) = controller(EngineConfig::default());
        assert_eq!(placement.state(), PlacementState::Idle);
        assert!(placement.preview().is_none());
    }

    #[tokio::test]
    async fn test_preview_tracks_pointer_only_while_placing() {
        let (_, _, placement) = controller(EngineConfig::default());

        // Moves while idle do nothing.
        placement.pointer_moved(Position::new(50.0, 50.0));
        assert!(placement.preview().is_none());

        placement.start_placing(CardType::Question);
        placement.pointer_moved(Position::new(10.0, 20.0));
        placement.pointer_moved(Position::new(30.0, 40.0));

        assert_eq!(
            placement.preview(),
            Some((CardType::Question, Position::new(30.0, 40.0)))
        );
    }

    #[tokio::test]
    async fn test_restart_replaces_type_keeps_preview() {
        let (_, _, placement) = controller(EngineConfig::default());
        placement.start_placing(CardType::Question);
        placement.pointer_moved(Position::new(30.0, 40.0));

        placement.start_placing(CardType::Insight);

        assert_eq!(
            placement.preview(),
            Some((CardType::Insight, Position::new(30.0, 40.0)))
        );
    }

    #[tokio::test]
    async fn test_confirm_materializes_card_at_exact_position() {
        let (store, chat, placement) = controller(EngineConfig::default());
        let mut events = store.subscribe();
        placement.start_placing(CardType::Question);
        placement.pointer_moved(Position::new(100.0, 100.0));

        let card = placement
            .confirm_placement(Position::new(120.0, 340.0))
            .unwrap();

        // Exact confirm coordinates, not the last preview position.
        assert_eq!(card.position, Position::new(120.0, 340.0));
        assert_eq!(card.card_type(), CardType::Question);
        assert!(card.is_unsaved());
        assert_eq!(card.project_id, 7);
        assert_eq!(placement.state(), PlacementState::Idle);
        assert!(placement.preview().is_none(), "ghost node removed");

        // Guided mode is on by default: session opened at step 0.
        assert!(chat.has_session(card.id));
        let transcript = chat.transcript(card.id).unwrap();
        assert_eq!(transcript.len(), 1);

        // CardAdded then CardOpened on the event channel.
        assert!(matches!(
            events.recv().await.unwrap(),
            CanvasEvent::CardAdded { .. }
        ));
        match events.recv().await.unwrap() {
            CanvasEvent::CardOpened { id, guided } => {
                assert_eq!(id, card.id);
                assert!(guided);
            }
            other => panic!("expected CardOpened, got {}", other.event_type()),
        }
    }

    #[tokio::test]
    async fn test_confirm_without_placing_is_invalid() {
        let (_, _, placement) = controller(EngineConfig::default());
        let err = placement
            .confirm_placement(Position::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, CanvasError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_guided_mode_respects_config() {
        let (_, chat, placement) =
            controller(EngineConfig::default().with_guided_types([CardType::Source]));
        placement.start_placing(CardType::Thought);

        let card = placement
            .confirm_placement(Position::new(1.0, 1.0))
            .unwrap();

        assert!(!chat.has_session(card.id));
    }

    #[tokio::test]
    async fn test_only_one_placement_at_a_time() {
        let (store, _, placement) = controller(EngineConfig::default());
        placement.start_placing(CardType::Question);
        placement.start_placing(CardType::Thought);

        let card = placement
            .confirm_placement(Position::new(5.0, 5.0))
            .unwrap();

        // The later type won; exactly one card was created.
        assert_eq!(card.card_type(), CardType::Thought);
        assert_eq!(store.list_cards().len(), 1);
        assert_eq!(placement.state(), PlacementState::Idle);
    }
}
