//! LinkManager - connection invariants and optimistic edge sync
//!
//! Drives edge creation/removal through the backend while keeping CardStore
//! responsive:
//!
//! - `connect` rejects a second link between the same unordered card pair
//!   with a non-fatal notice, otherwise inserts an optimistic local edge and
//!   confirms it against the backend (rebind on success, remove on failure).
//! - `disconnect` removes locally first; never-persisted edges issue no
//!   backend call, and a failing backend delete is logged without reverting
//!   local state.

use crate::backend::{CardBackend, NewLinkRecord, Session};
use crate::models::{CardId, CardLink, LinkId};
use crate::services::error::CanvasError;
use crate::services::notices::{Notice, NoticeSink};
use crate::store::CardStore;
use std::sync::Arc;

/// Outcome of a connect attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// Edge created (and persisted, when both endpoints were saved).
    Connected(CardLink),
    /// A link between the pair already exists; nothing changed.
    Rejected,
}

pub struct LinkManager {
    store: Arc<CardStore>,
    backend: Arc<dyn CardBackend>,
    session: Session,
    notices: NoticeSink,
}

impl LinkManager {
    pub fn new(
        store: Arc<CardStore>,
        backend: Arc<dyn CardBackend>,
        session: Session,
        notices: NoticeSink,
    ) -> Self {
        Self {
            store,
            backend,
            session,
            notices,
        }
    }

    /// Connect two cards. The duplicate check is undirected: once A→B
    /// exists, B→A is rejected too.
    pub async fn connect(
        &self,
        source: CardId,
        target: CardId,
        source_handle: &str,
        target_handle: &str,
    ) -> Result<ConnectOutcome, CanvasError> {
        if source == target {
            self.notices
                .publish(Notice::info("A card cannot be linked to itself"));
            return Ok(ConnectOutcome::Rejected);
        }
        if self.store.link_between(source, target).is_some() {
            tracing::debug!(%source, %target, "duplicate link rejected");
            self.notices
                .publish(Notice::info("These cards are already connected"));
            return Ok(ConnectOutcome::Rejected);
        }

        let source_card = self
            .store
            .get_card(source)
            .ok_or(CanvasError::CardNotFound { id: source })?;
        let target_card = self
            .store
            .get_card(target)
            .ok_or(CanvasError::CardNotFound { id: target })?;

        // Optimistic edge, visible immediately.
        let link = self.store.add_link(CardLink::new(
            source,
            target,
            source_handle,
            target_handle,
            source_card.project_id,
        ))?;

        // The wire contract only carries backend-issued integer card ids, so
        // an edge touching an unsaved card stays local until it is redrawn
        // after both cards are saved.
        let (Some(source_remote), Some(target_remote)) =
            (source_card.id.remote(), target_card.id.remote())
        else {
            tracing::debug!(link = %link.id, "endpoint unsaved, keeping link local-only");
            return Ok(ConnectOutcome::Connected(link));
        };

        let created = self
            .backend
            .create_link(
                &self.session,
                NewLinkRecord {
                    source_card_id: source_remote,
                    target_card_id: target_remote,
                    source_handle: source_handle.to_string(),
                    target_handle: target_handle.to_string(),
                    project_id: source_card.project_id,
                },
            )
            .await;

        match created {
            Ok(record) => {
                // The card (and with it the optimistic edge) may be gone by
                // the time the backend answers.
                match self.store.rebind_link_id(link.id, LinkId::Remote(record.id)) {
                    Ok(confirmed) => Ok(ConnectOutcome::Connected(confirmed)),
                    Err(err) => {
                        tracing::warn!(link = record.id, error = %err, "optimistic edge vanished before confirmation");
                        Ok(ConnectOutcome::Connected(link))
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "link create failed, rolling back optimistic edge");
                self.store.remove_link(link.id);
                self.notices
                    .publish(Notice::error("Connecting the cards failed"));
                Err(err.into())
            }
        }
    }

    /// Remove an edge. Local removal is immediate; the backend delete only
    /// runs for persisted edges and its failure does not revert anything.
    pub async fn disconnect(&self, link_id: LinkId) -> Result<(), CanvasError> {
        let Some(link) = self.store.remove_link(link_id) else {
            return Ok(());
        };
        if let LinkId::Remote(remote_id) = link.id {
            if let Err(err) = self.backend.delete_link(&self.session, remote_id).await {
                tracing::warn!(link = remote_id, error = %err, "link delete failed, local removal stands");
                self.notices
                    .publish(Notice::warning("The connection could not be removed on the server"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::models::{Card, CardPayload, CardType, Position};
    use crate::services::notices::NoticeLevel;

    fn env() -> (Arc<CardStore>, Arc<InMemoryBackend>, LinkManager, NoticeSink) {
        let store = Arc::new(CardStore::new());
        let backend = Arc::new(InMemoryBackend::new());
        let notices = NoticeSink::new(8);
        let manager = LinkManager::new(
            store.clone(),
            backend.clone(),
            Session::new("token", 1),
            notices.clone(),
        );
        (store, backend, manager, notices)
    }

    fn saved_card(store: &CardStore, remote_id: i64) -> CardId {
        let mut card = Card::new(
            Position::default(),
            1,
            CardPayload::empty(CardType::Thought),
        );
        card.id = CardId::Remote(remote_id);
        card.entity_id = Some(remote_id + 1000);
        store.add_card(card).unwrap().id
    }

    #[tokio::test]
    async fn test_connect_persists_and_rebinds() {
        let (store, backend, manager, _) = env();
        let a = saved_card(&store, 1);
        let b = saved_card(&store, 2);

        let outcome = manager.connect(a, b, "bottom", "top").await.unwrap();

        let ConnectOutcome::Connected(link) = outcome else {
            panic!("expected Connected");
        };
        assert!(!link.id.is_local());
        assert_eq!(backend.link_count(), 1);
        assert_eq!(store.list_links().len(), 1);
    }

    #[tokio::test]
    async fn test_reverse_connect_rejected_with_notice() {
        let (store, backend, manager, notices) = env();
        let mut rx = notices.subscribe();
        let a = saved_card(&store, 1);
        let b = saved_card(&store, 2);

        manager.connect(a, b, "bottom", "top").await.unwrap();
        let outcome = manager.connect(b, a, "top", "bottom").await.unwrap();

        assert_eq!(outcome, ConnectOutcome::Rejected);
        assert_eq!(store.list_links().len(), 1);
        assert_eq!(backend.link_count(), 1);
        // First recv drains nothing else: only the rejection notice fired.
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_connect_failure_rolls_back_optimistic_edge() {
        let (store, backend, manager, _) = env();
        let a = saved_card(&store, 1);
        let b = saved_card(&store, 2);
        backend.fail_next("create_link");

        let err = manager.connect(a, b, "bottom", "top").await.unwrap_err();

        assert!(matches!(err, CanvasError::Backend(_)));
        assert!(store.list_links().is_empty());
        assert_eq!(backend.link_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_unsaved_endpoint_stays_local() {
        let (store, backend, manager, _) = env();
        let a = saved_card(&store, 1);
        let unsaved = store
            .add_card(Card::new(
                Position::default(),
                1,
                CardPayload::empty(CardType::Insight),
            ))
            .unwrap()
            .id;

        let outcome = manager.connect(a, unsaved, "bottom", "top").await.unwrap();

        let ConnectOutcome::Connected(link) = outcome else {
            panic!("expected Connected");
        };
        assert!(link.id.is_local());
        assert_eq!(backend.calls("create_link"), 0);
    }

    #[tokio::test]
    async fn test_self_link_rejected() {
        let (store, _backend, manager, _) = env();
        let a = saved_card(&store, 1);

        let outcome = manager.connect(a, a, "bottom", "top").await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Rejected);
        assert!(store.list_links().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_local_edge_skips_backend() {
        let (store, backend, manager, _) = env();
        let a = saved_card(&store, 1);
        let unsaved = store
            .add_card(Card::new(
                Position::default(),
                1,
                CardPayload::empty(CardType::Insight),
            ))
            .unwrap()
            .id;
        let ConnectOutcome::Connected(link) =
            manager.connect(a, unsaved, "bottom", "top").await.unwrap()
        else {
            panic!()
        };

        manager.disconnect(link.id).await.unwrap();

        assert!(store.list_links().is_empty());
        assert_eq!(backend.calls("delete_link"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_failure_keeps_local_removal() {
        let (store, backend, manager, _) = env();
        let a = saved_card(&store, 1);
        let b = saved_card(&store, 2);
        let ConnectOutcome::Connected(link) =
            manager.connect(a, b, "bottom", "top").await.unwrap()
        else {
            panic!()
        };
        backend.fail_next("delete_link");

        manager.disconnect(link.id).await.unwrap();

        // Local state does not revert even though the backend kept the row.
        assert!(store.list_links().is_empty());
        assert_eq!(backend.link_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_absent_edge_is_idempotent() {
        let (_store, _backend, manager, _) = env();
        manager.disconnect(LinkId::Remote(404)).await.unwrap();
    }
}
