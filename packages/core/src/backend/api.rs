//! CardBackend trait - persistence service abstraction
//!
//! This module defines the `CardBackend` trait that abstracts the remote
//! persistence service the canvas mirrors into. The trait is the seam
//! between the engine's services and whatever transport actually carries the
//! calls; the engine never sees URLs or response framing.
//!
//! # Design decisions
//!
//! 1. **Async-first**: every method is async; all backend interaction is
//!    non-blocking and the canvas stays responsive while calls are in
//!    flight.
//! 2. **Explicit session**: a [`Session`] is passed into every call rather
//!    than read from ambient state, so ownership of credentials stays with
//!    the caller.
//! 3. **Minimal contract**: methods mirror the consumed collections
//!    (cards, per-type entities, citations, card_links, file uploads,
//!    custom prompt options) and nothing else.

use crate::models::{CardType, Citation, FileAttachment, InsightPayload, QuestionPayload, SourcePayload, ThoughtPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credentials attached to every backend call.
///
/// The engine never stores these anywhere else; the hosting application
/// decides where tokens live and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: i64) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }
}

/// Backend failure taxonomy surfaced to the services layer.
///
/// Nothing here is fatal to the engine; services map these onto transient
/// notices and, where the mutation was purely additive, roll the optimistic
/// change back.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Session rejected by backend")]
    Unauthorized,

    #[error("Backend request failed: {0}")]
    Transport(String),

    /// Non-OK response whose body could not be interpreted; surfaced with a
    /// generic message instead of crashing the flow.
    #[error("Unreadable backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// A persisted card record, field-for-field what the cards collection
/// stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub card_type: CardType,
    /// Id of the underlying entity in its per-type collection.
    pub data_id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub project_id: i64,
}

/// Payload for creating a card record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCardRecord {
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub data_id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub project_id: i64,
}

/// A persisted card link record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: i64,
    pub source_card_id: i64,
    pub target_card_id: i64,
    pub source_handle: String,
    pub target_handle: String,
    pub project_id: i64,
}

/// Payload for creating a card link record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLinkRecord {
    pub source_card_id: i64,
    pub target_card_id: i64,
    pub source_handle: String,
    pub target_handle: String,
    pub project_id: i64,
}

/// Abstraction over the persistence service's consumed collections.
///
/// Implementations must be `Send + Sync`; the engine shares one instance
/// across all services.
#[async_trait]
pub trait CardBackend: Send + Sync {
    //
    // CARDS
    //

    /// Fetch every card record of a project.
    async fn fetch_cards(
        &self,
        session: &Session,
        project_id: i64,
    ) -> Result<Vec<CardRecord>, BackendError>;

    /// Create a card record, returning it with its issued id.
    async fn create_card(
        &self,
        session: &Session,
        card: NewCardRecord,
    ) -> Result<CardRecord, BackendError>;

    /// Persist a card's position. The only card-record field that changes
    /// after creation.
    async fn update_card_position(
        &self,
        session: &Session,
        card_id: i64,
        position_x: f64,
        position_y: f64,
    ) -> Result<(), BackendError>;

    async fn delete_card(&self, session: &Session, card_id: i64) -> Result<(), BackendError>;

    //
    // PER-TYPE ENTITIES
    //

    async fn get_source_material(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<SourcePayload, BackendError>;

    /// Create a source material, returning its issued id. `payload.citation_id`
    /// must already point at the card's citation.
    async fn create_source_material(
        &self,
        session: &Session,
        payload: SourcePayload,
    ) -> Result<i64, BackendError>;

    async fn update_source_material(
        &self,
        session: &Session,
        id: i64,
        payload: SourcePayload,
    ) -> Result<(), BackendError>;

    async fn delete_source_material(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<(), BackendError>;

    async fn get_question(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<QuestionPayload, BackendError>;

    async fn create_question(
        &self,
        session: &Session,
        payload: QuestionPayload,
    ) -> Result<i64, BackendError>;

    async fn update_question(
        &self,
        session: &Session,
        id: i64,
        payload: QuestionPayload,
    ) -> Result<(), BackendError>;

    async fn delete_question(&self, session: &Session, id: i64) -> Result<(), BackendError>;

    async fn get_insight(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<InsightPayload, BackendError>;

    async fn create_insight(
        &self,
        session: &Session,
        payload: InsightPayload,
    ) -> Result<i64, BackendError>;

    async fn update_insight(
        &self,
        session: &Session,
        id: i64,
        payload: InsightPayload,
    ) -> Result<(), BackendError>;

    async fn delete_insight(&self, session: &Session, id: i64) -> Result<(), BackendError>;

    async fn get_thought(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<ThoughtPayload, BackendError>;

    async fn create_thought(
        &self,
        session: &Session,
        payload: ThoughtPayload,
    ) -> Result<i64, BackendError>;

    async fn update_thought(
        &self,
        session: &Session,
        id: i64,
        payload: ThoughtPayload,
    ) -> Result<(), BackendError>;

    async fn delete_thought(&self, session: &Session, id: i64) -> Result<(), BackendError>;

    //
    // CITATIONS
    //

    /// Create a citation, returning its issued id. One citation per source
    /// material, created before the source material that owns it.
    async fn create_citation(
        &self,
        session: &Session,
        citation: Citation,
    ) -> Result<i64, BackendError>;

    async fn update_citation(
        &self,
        session: &Session,
        id: i64,
        citation: Citation,
    ) -> Result<(), BackendError>;

    async fn delete_citation(&self, session: &Session, id: i64) -> Result<(), BackendError>;

    //
    // CARD LINKS
    //

    async fn fetch_links(
        &self,
        session: &Session,
        project_id: i64,
    ) -> Result<Vec<LinkRecord>, BackendError>;

    async fn create_link(
        &self,
        session: &Session,
        link: NewLinkRecord,
    ) -> Result<LinkRecord, BackendError>;

    async fn delete_link(&self, session: &Session, link_id: i64) -> Result<(), BackendError>;

    //
    // FILES
    //

    /// Upload files against an existing entity; returns the entity's full
    /// updated file-URL list. Never called before the entity exists.
    async fn upload_files(
        &self,
        session: &Session,
        card_type: CardType,
        entity_id: i64,
        files: Vec<FileAttachment>,
    ) -> Result<Vec<String>, BackendError>;

    //
    // CUSTOM PROMPT OPTIONS
    //

    /// Fetch the persisted user-defined options for one option prompt.
    async fn fetch_custom_options(
        &self,
        session: &Session,
        option_type: &str,
    ) -> Result<Vec<String>, BackendError>;

    /// Persist a user-defined option value under its option type.
    async fn save_custom_option(
        &self,
        session: &Session,
        option_type: &str,
        value: &str,
    ) -> Result<(), BackendError>;
}
