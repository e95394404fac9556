//! PersistenceGateway - durable mirror of canvas mutations
//!
//! Turns finalized card content into backend state, exactly once per
//! finalize call, and owns the cleanup protocol for unsaved and deleted
//! cards.
//!
//! # Finalize sequence
//!
//! 1. Entity create-or-update. Creating a source material first creates its
//!    citation and records the citation id on the card payload the moment
//!    it exists; updating reuses the existing citation id unchanged.
//! 2. File uploads, only after an entity id exists - never against a
//!    not-yet-existing record.
//! 3. Card-record creation, only while the card still carries a local id.
//!    Position changes on existing records flow through the position
//!    synchronizer instead.
//! 4. Store update: entity id, merged payload, file URLs, id rebind.
//!
//! A failing step aborts the remaining steps and surfaces the error;
//! already-committed backend effects are NOT rolled back. A citation can
//! therefore outlive a failed source-material creation - the unsaved-card
//! cleanup deletes it when the card closes, but nothing repairs it
//! automatically.
//!
//! # Ordering
//!
//! Callers must await each card's save/delete/position call before issuing
//! the next one for the same card. Operations on different cards may
//! interleave freely.

use crate::backend::{CardBackend, NewCardRecord, Session};
use crate::models::{
    Card, CardId, CardPayload, CardPayloadPatch, CardType, Citation, FileAttachment, LinkId,
    Position, SourcePatch,
};
use crate::services::error::CanvasError;
use crate::services::notices::{Notice, NoticeSink};
use crate::store::CardStore;
use std::sync::Arc;

/// Everything a finalize call persists: the payload patch built from the
/// captured answers, the citation for a source card, and the files
/// collected across steps.
#[derive(Debug, Clone)]
pub struct FinalizedContent {
    pub patch: CardPayloadPatch,
    /// Source cards only; `None` for every other type.
    pub citation: Option<Citation>,
    pub files: Vec<FileAttachment>,
}

impl FinalizedContent {
    pub fn new(patch: CardPayloadPatch) -> Self {
        Self {
            patch,
            citation: None,
            files: Vec::new(),
        }
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }

    pub fn with_files(mut self, files: Vec<FileAttachment>) -> Self {
        self.files = files;
        self
    }
}

/// Maps CardStore mutations to backend calls for cards, links, entities,
/// citations, and uploads.
pub struct PersistenceGateway {
    store: Arc<CardStore>,
    backend: Arc<dyn CardBackend>,
    session: Session,
    notices: NoticeSink,
}

impl PersistenceGateway {
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

    pub fn store(&self) -> &Arc<CardStore> {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Persist a card's finalized content. See the module docs for the
    /// sequence and its non-transactional failure semantics.
    pub async fn finalize(
        &self,
        card_id: CardId,
        content: FinalizedContent,
    ) -> Result<Card, CanvasError> {
        match self.finalize_inner(card_id, content).await {
            Ok(card) => Ok(card),
            Err(err) => {
                tracing::warn!(card = %card_id, error = %err, "finalize failed");
                self.notices
                    .publish(Notice::error(format!("Saving the card failed: {err}")));
                Err(err)
            }
        }
    }

    async fn finalize_inner(
        &self,
        card_id: CardId,
        content: FinalizedContent,
    ) -> Result<Card, CanvasError> {
        // Optimistic local merge so the detail view reflects the captured
        // answers before any backend round-trip completes. Also the
        // existence check: a missing card fails here, before any backend
        // call.
        let card = self.store.update_card_payload(card_id, &content.patch)?;

        // Step 1: underlying entity (citation first on the source create
        // path).
        let entity_id = match &card.payload {
            CardPayload::Source(payload) => {
                let mut payload = payload.clone();
                match card.entity_id {
                    None => {
                        if payload.citation_id.is_none() {
                            let citation = content.citation.clone().unwrap_or_default();
                            let citation_id =
                                self.backend.create_citation(&self.session, citation).await?;
                            // Recorded immediately: if the source-material
                            // create below fails, close-card cleanup can
                            // still find and delete the orphaned citation.
                            payload.citation_id = Some(citation_id);
                            self.store.update_card_payload(
                                card_id,
                                &CardPayloadPatch::Source(SourcePatch {
                                    citation_id: Some(citation_id),
                                    ..Default::default()
                                }),
                            )?;
                        }
                        let entity_id = self
                            .backend
                            .create_source_material(&self.session, payload)
                            .await?;
                        self.store.set_entity_id(card_id, entity_id)?;
                        entity_id
                    }
                    Some(entity_id) => {
                        if let (Some(citation), Some(citation_id)) =
                            (&content.citation, payload.citation_id)
                        {
                            self.backend
                                .update_citation(&self.session, citation_id, citation.clone())
                                .await?;
                        }
                        self.backend
                            .update_source_material(&self.session, entity_id, payload)
                            .await?;
                        entity_id
                    }
                }
            }
            CardPayload::Question(payload) => match card.entity_id {
                None => {
                    let entity_id = self
                        .backend
                        .create_question(&self.session, payload.clone())
                        .await?;
                    self.store.set_entity_id(card_id, entity_id)?;
                    entity_id
                }
                Some(entity_id) => {
                    self.backend
                        .update_question(&self.session, entity_id, payload.clone())
                        .await?;
                    entity_id
                }
            },
            CardPayload::Insight(payload) => match card.entity_id {
                None => {
                    let entity_id = self
                        .backend
                        .create_insight(&self.session, payload.clone())
                        .await?;
                    self.store.set_entity_id(card_id, entity_id)?;
                    entity_id
                }
                Some(entity_id) => {
                    self.backend
                        .update_insight(&self.session, entity_id, payload.clone())
                        .await?;
                    entity_id
                }
            },
            CardPayload::Thought(payload) => match card.entity_id {
                None => {
                    let entity_id = self
                        .backend
                        .create_thought(&self.session, payload.clone())
                        .await?;
                    self.store.set_entity_id(card_id, entity_id)?;
                    entity_id
                }
                Some(entity_id) => {
                    self.backend
                        .update_thought(&self.session, entity_id, payload.clone())
                        .await?;
                    entity_id
                }
            },
        };

        // Step 2: uploads, now that the owning entity exists.
        if !content.files.is_empty() {
            let urls = self
                .backend
                .upload_files(
                    &self.session,
                    card.card_type(),
                    entity_id,
                    content.files.clone(),
                )
                .await?;
            self.store.set_file_urls(card_id, urls)?;
        }

        // Step 3: card record, first save only.
        if card.id.is_local() {
            // The card may have been deleted while the entity calls were in
            // flight; re-check before creating a record for it.
            let Some(current) = self.store.get_card(card_id) else {
                tracing::warn!(card = %card_id, "card removed mid-finalize, skipping card record");
                return Err(CanvasError::CardNotFound { id: card_id });
            };
            let record = self
                .backend
                .create_card(
                    &self.session,
                    NewCardRecord {
                        card_type: current.card_type(),
                        data_id: entity_id,
                        position_x: current.position.x,
                        position_y: current.position.y,
                        project_id: current.project_id,
                    },
                )
                .await?;
            self.store
                .rebind_card_id(card_id, CardId::Remote(record.id))?;
            tracing::debug!(old = %card_id, new = record.id, "card persisted");
            return self
                .store
                .get_card(CardId::Remote(record.id))
                .ok_or(CanvasError::CardNotFound {
                    id: CardId::Remote(record.id),
                });
        }

        self.store
            .get_card(card_id)
            .ok_or(CanvasError::CardNotFound { id: card_id })
    }

    /// Close a card's detail view.
    ///
    /// Closing a saved card is a pure view operation. Closing an *unsaved*
    /// card deletes it: the card and its edges leave the store, and any
    /// partially-created backend state (entity, citation) is deleted too.
    pub async fn close_card(&self, card_id: CardId) -> Result<(), CanvasError> {
        let Some(card) = self.store.get_card(card_id) else {
            return Ok(());
        };
        if !card.is_unsaved() {
            tracing::debug!(card = %card_id, "closed saved card");
            return Ok(());
        }

        tracing::debug!(card = %card_id, "closing unsaved card, cleaning up");
        self.store.remove_card(card_id);

        if let Some(entity_id) = card.entity_id {
            if let Err(err) = self.delete_entity(card.card_type(), entity_id).await {
                tracing::warn!(card = %card_id, error = %err, "partial entity cleanup failed");
            }
        }
        if let Some(citation_id) = card.payload.citation_id() {
            if let Err(err) = self
                .backend
                .delete_citation(&self.session, citation_id)
                .await
            {
                tracing::warn!(card = %card_id, error = %err, "citation cleanup failed");
            }
        }
        Ok(())
    }

    /// Delete a card outright: store removal (edges stripped atomically),
    /// then backend deletion of link records, card record, entity, and
    /// citation. Backend failures are reported but local state never
    /// reverts.
    ///
    /// Returns whether the card existed.
    pub async fn delete_card(&self, card_id: CardId) -> Result<bool, CanvasError> {
        let Some((card, stripped_links)) = self.store.remove_card(card_id) else {
            return Ok(false);
        };

        for link in stripped_links {
            if let LinkId::Remote(id) = link.id {
                if let Err(err) = self.backend.delete_link(&self.session, id).await {
                    tracing::warn!(link = id, error = %err, "link delete failed");
                }
            }
        }

        if let CardId::Remote(id) = card.id {
            if let Err(err) = self.backend.delete_card(&self.session, id).await {
                tracing::warn!(card = id, error = %err, "card record delete failed");
                self.notices
                    .publish(Notice::warning("The card could not be deleted on the server"));
            }
        }
        if let Some(entity_id) = card.entity_id {
            if let Err(err) = self.delete_entity(card.card_type(), entity_id).await {
                tracing::warn!(entity = entity_id, error = %err, "entity delete failed");
            }
        }
        if let Some(citation_id) = card.payload.citation_id() {
            if let Err(err) = self
                .backend
                .delete_citation(&self.session, citation_id)
                .await
            {
                tracing::warn!(citation = citation_id, error = %err, "citation delete failed");
            }
        }
        Ok(true)
    }

    /// Persist the card's current position. Called by the position
    /// synchronizer after the debounce window settles; unsaved cards and
    /// cards that vanished while the timer ran are skipped.
    pub async fn persist_position(&self, card_id: CardId) -> Result<(), CanvasError> {
        let Some(card) = self.store.get_card(card_id) else {
            tracing::debug!(card = %card_id, "position settle for removed card, skipping");
            return Ok(());
        };
        let Some(remote_id) = card.id.remote() else {
            tracing::debug!(card = %card_id, "position settle for unsaved card, skipping");
            return Ok(());
        };
        self.backend
            .update_card_position(&self.session, remote_id, card.position.x, card.position.y)
            .await?;
        tracing::debug!(card = remote_id, x = card.position.x, y = card.position.y, "position persisted");
        Ok(())
    }

    /// Seed the store from the backend's card and link collections for one
    /// project. Returns (cards, links) loaded.
    pub async fn load_project(&self, project_id: i64) -> Result<(usize, usize), CanvasError> {
        let records = self.backend.fetch_cards(&self.session, project_id).await?;
        let mut cards = 0usize;
        for record in records {
            let payload = match record.card_type {
                CardType::Source => CardPayload::Source(
                    self.backend
                        .get_source_material(&self.session, record.data_id)
                        .await?,
                ),
                CardType::Question => CardPayload::Question(
                    self.backend
                        .get_question(&self.session, record.data_id)
                        .await?,
                ),
                CardType::Insight => CardPayload::Insight(
                    self.backend
                        .get_insight(&self.session, record.data_id)
                        .await?,
                ),
                CardType::Thought => CardPayload::Thought(
                    self.backend
                        .get_thought(&self.session, record.data_id)
                        .await?,
                ),
            };
            let mut card = Card::new(
                Position::new(record.position_x, record.position_y),
                record.project_id,
                payload,
            );
            card.id = CardId::Remote(record.id);
            card.entity_id = Some(record.data_id);
            self.store.add_card(card)?;
            cards += 1;
        }

        let link_records = self.backend.fetch_links(&self.session, project_id).await?;
        let mut links = 0usize;
        for record in link_records {
            let mut link = crate::models::CardLink::new(
                CardId::Remote(record.source_card_id),
                CardId::Remote(record.target_card_id),
                record.source_handle,
                record.target_handle,
                record.project_id,
            );
            link.id = LinkId::Remote(record.id);
            match self.store.add_link(link) {
                Ok(_) => links += 1,
                Err(err) => {
                    tracing::warn!(link = record.id, error = %err, "skipping link on load")
                }
            }
        }

        tracing::info!(project = project_id, cards, links, "project loaded");
        Ok((cards, links))
    }

    /// Persisted user-defined options for an option prompt.
    pub async fn custom_options(&self, option_type: &str) -> Result<Vec<String>, CanvasError> {
        Ok(self
            .backend
            .fetch_custom_options(&self.session, option_type)
            .await?)
    }

    /// Persist a user-defined option value.
    pub async fn save_custom_option(
        &self,
        option_type: &str,
        value: &str,
    ) -> Result<(), CanvasError> {
        Ok(self
            .backend
            .save_custom_option(&self.session, option_type, value)
            .await?)
    }

    async fn delete_entity(
        &self,
        card_type: CardType,
        entity_id: i64,
    ) -> Result<(), CanvasError> {
        match card_type {
            CardType::Source => {
                self.backend
                    .delete_source_material(&self.session, entity_id)
                    .await?
            }
            CardType::Question => {
                self.backend
                    .delete_question(&self.session, entity_id)
                    .await?
            }
            CardType::Insight => {
                self.backend
                    .delete_insight(&self.session, entity_id)
                    .await?
            }
            CardType::Thought => {
                self.backend
                    .delete_thought(&self.session, entity_id)
                    .await?
            }
        }
        Ok(())
    }
}
