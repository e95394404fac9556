//! CardStore - authoritative in-memory graph state
//!
//! Holds every card and link of one project's canvas. All mutations are
//! synchronous and take the interior lock for their full duration, so
//! invariants hold at every observable instant:
//!
//! - ids are unique
//! - removing a card strips its links in the same critical section - no
//!   dangling endpoint is ever listed
//! - at most one link exists per unordered card pair
//!
//! The lock is never held across an await point; async services read, await
//! their backend call, then re-check state before applying results.
//!
//! Every mutation publishes a [`CanvasEvent`] on the store's broadcast
//! channel for the rendering surface and detail views to react to.

use crate::models::{Card, CardId, CardLink, CardPayloadPatch, LinkId, Position};
use crate::store::error::StoreError;
use crate::store::events::CanvasEvent;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Broadcast capacity for canvas events. 128 gives headroom for bursts
/// (project load, multi-link cleanup); subscribers that lag only miss
/// intermediate states.
const EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Default)]
struct Inner {
    cards: HashMap<CardId, Card>,
    links: HashMap<LinkId, CardLink>,
}

/// Authoritative in-memory set of cards and links for one project.
pub struct CardStore {
    inner: RwLock<Inner>,
    event_tx: broadcast::Sender<CanvasEvent>,
}

impl Default for CardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CardStore {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity);
        Self {
            inner: RwLock::new(Inner::default()),
            event_tx,
        }
    }

    /// Subscribe to canvas events. Each subscriber gets every event from the
    /// moment of subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.event_tx.subscribe()
    }

    /// Publish an event; dropped silently when nobody listens.
    pub(crate) fn publish(&self, event: CanvasEvent) {
        tracing::trace!(event = event.event_type(), "canvas event");
        let _ = self.event_tx.send(event);
    }

    //
    // CARDS
    //

    /// Insert a card. Fails on id collision.
    pub fn add_card(&self, card: Card) -> Result<Card, StoreError> {
        card.position.validate()?;
        {
            let mut inner = self.inner.write().unwrap();
            if inner.cards.contains_key(&card.id) {
                return Err(StoreError::DuplicateCard(card.id));
            }
            inner.cards.insert(card.id, card.clone());
        }
        self.publish(CanvasEvent::CardAdded { card: card.clone() });
        Ok(card)
    }

    pub fn get_card(&self, id: CardId) -> Option<Card> {
        self.inner.read().unwrap().cards.get(&id).cloned()
    }

    pub fn contains_card(&self, id: CardId) -> bool {
        self.inner.read().unwrap().cards.contains_key(&id)
    }

    /// All cards, oldest first.
    pub fn list_cards(&self) -> Vec<Card> {
        let mut cards: Vec<Card> = self.inner.read().unwrap().cards.values().cloned().collect();
        cards.sort_by_key(|c| c.created_at);
        cards
    }

    /// Apply a sparse payload patch.
    pub fn update_card_payload(
        &self,
        id: CardId,
        patch: &CardPayloadPatch,
    ) -> Result<Card, StoreError> {
        let card = {
            let mut inner = self.inner.write().unwrap();
            let card = inner
                .cards
                .get_mut(&id)
                .ok_or(StoreError::CardNotFound(id))?;
            card.apply_patch(patch)?;
            card.clone()
        };
        self.publish(CanvasEvent::CardUpdated { card: card.clone() });
        Ok(card)
    }

    /// Move a card. Synchronous and immediate so rendering never lags the
    /// pointer; the debounced backend write is the position synchronizer's
    /// job.
    pub fn set_position(&self, id: CardId, position: Position) -> Result<(), StoreError> {
        position.validate()?;
        let card = {
            let mut inner = self.inner.write().unwrap();
            let card = inner
                .cards
                .get_mut(&id)
                .ok_or(StoreError::CardNotFound(id))?;
            card.set_position(position);
            card.clone()
        };
        self.publish(CanvasEvent::CardUpdated { card });
        Ok(())
    }

    /// Replace the payload's uploaded-file URL list with the backend's
    /// authoritative one.
    pub fn set_file_urls(&self, id: CardId, urls: Vec<String>) -> Result<(), StoreError> {
        let card = {
            let mut inner = self.inner.write().unwrap();
            let card = inner
                .cards
                .get_mut(&id)
                .ok_or(StoreError::CardNotFound(id))?;
            card.payload.set_file_urls(urls);
            card.modified_at = chrono::Utc::now();
            card.clone()
        };
        self.publish(CanvasEvent::CardUpdated { card });
        Ok(())
    }

    /// Record the backend id of the card's underlying entity.
    pub fn set_entity_id(&self, id: CardId, entity_id: i64) -> Result<(), StoreError> {
        let card = {
            let mut inner = self.inner.write().unwrap();
            let card = inner
                .cards
                .get_mut(&id)
                .ok_or(StoreError::CardNotFound(id))?;
            card.entity_id = Some(entity_id);
            card.clone()
        };
        self.publish(CanvasEvent::CardUpdated { card });
        Ok(())
    }

    /// Replace a card's temporary id with the backend-issued one, rewriting
    /// every link endpoint that referenced the old id.
    pub fn rebind_card_id(&self, old_id: CardId, new_id: CardId) -> Result<Card, StoreError> {
        let card = {
            let mut inner = self.inner.write().unwrap();
            if inner.cards.contains_key(&new_id) {
                return Err(StoreError::DuplicateCard(new_id));
            }
            let mut card = inner
                .cards
                .remove(&old_id)
                .ok_or(StoreError::CardNotFound(old_id))?;
            card.id = new_id;
            inner.cards.insert(new_id, card.clone());

            for link in inner.links.values_mut() {
                if link.source_card_id == old_id {
                    link.source_card_id = new_id;
                }
                if link.target_card_id == old_id {
                    link.target_card_id = new_id;
                }
            }
            card
        };
        self.publish(CanvasEvent::CardRebound {
            old_id,
            card: card.clone(),
        });
        Ok(card)
    }

    /// Remove a card and every link touching it, atomically. Idempotent:
    /// removing an absent card returns `None`.
    ///
    /// Returns the removed card and its stripped links so callers can drive
    /// backend cleanup.
    pub fn remove_card(&self, id: CardId) -> Option<(Card, Vec<CardLink>)> {
        let (card, stripped) = {
            let mut inner = self.inner.write().unwrap();
            let card = inner.cards.remove(&id)?;
            let stripped_ids: Vec<LinkId> = inner
                .links
                .values()
                .filter(|l| l.touches(id))
                .map(|l| l.id)
                .collect();
            let stripped: Vec<CardLink> = stripped_ids
                .iter()
                .filter_map(|lid| inner.links.remove(lid))
                .collect();
            (card, stripped)
        };
        for link in &stripped {
            self.publish(CanvasEvent::LinkRemoved { id: link.id });
        }
        self.publish(CanvasEvent::CardRemoved { id });
        Some((card, stripped))
    }

    //
    // LINKS
    //

    /// Insert a link. Enforces unordered-pair uniqueness.
    pub fn add_link(&self, link: CardLink) -> Result<CardLink, StoreError> {
        {
            let mut inner = self.inner.write().unwrap();
            if inner.links.contains_key(&link.id) {
                return Err(StoreError::DuplicateLink(link.id));
            }
            if inner
                .links
                .values()
                .any(|l| l.joins(link.source_card_id, link.target_card_id))
            {
                return Err(StoreError::PairAlreadyLinked {
                    a: link.source_card_id,
                    b: link.target_card_id,
                });
            }
            inner.links.insert(link.id, link.clone());
        }
        self.publish(CanvasEvent::LinkAdded { link: link.clone() });
        Ok(link)
    }

    pub fn get_link(&self, id: LinkId) -> Option<CardLink> {
        self.inner.read().unwrap().links.get(&id).cloned()
    }

    /// The link joining `a` and `b` in either direction, if any.
    pub fn link_between(&self, a: CardId, b: CardId) -> Option<CardLink> {
        self.inner
            .read()
            .unwrap()
            .links
            .values()
            .find(|l| l.joins(a, b))
            .cloned()
    }

    /// All links, oldest first.
    pub fn list_links(&self) -> Vec<CardLink> {
        let mut links: Vec<CardLink> = self.inner.read().unwrap().links.values().cloned().collect();
        links.sort_by_key(|l| l.created_at);
        links
    }

    /// Remove a link. Idempotent.
    pub fn remove_link(&self, id: LinkId) -> Option<CardLink> {
        let link = self.inner.write().unwrap().links.remove(&id)?;
        self.publish(CanvasEvent::LinkRemoved { id });
        Some(link)
    }

    /// Replace a link's temporary id with the backend-issued one.
    pub fn rebind_link_id(&self, old_id: LinkId, new_id: LinkId) -> Result<CardLink, StoreError> {
        let link = {
            let mut inner = self.inner.write().unwrap();
            if inner.links.contains_key(&new_id) {
                return Err(StoreError::DuplicateLink(new_id));
            }
            let mut link = inner
                .links
                .remove(&old_id)
                .ok_or(StoreError::LinkNotFound(old_id))?;
            link.id = new_id;
            inner.links.insert(new_id, link.clone());
            link
        };
        self.publish(CanvasEvent::LinkRebound {
            old_id,
            link: link.clone(),
        });
        Ok(link)
    }
}
