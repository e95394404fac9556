//! Card Data Structures
//!
//! This module defines the core `Card` struct and its identifier types.
//!
//! # Architecture
//!
//! - **Typed payloads**: every card carries exactly one [`CardPayload`]
//!   variant; the card type is derived from the variant and can never change
//!   after creation.
//! - **Two-phase identity**: cards are born with a client-generated
//!   [`CardId::Local`] id and are rebound to the backend-issued
//!   [`CardId::Remote`] id once the card record has been persisted.
//! - **Unsaved detection**: a card lacking a remote id, or lacking the id of
//!   its underlying entity, is *unsaved* and is cleaned up in full when its
//!   detail view closes.
//!
//! # Examples
//!
//! ```rust
//! use cardboard_core::models::{Card, CardPayload, Position, QuestionPayload};
//!
//! let card = Card::new(
//!     Position { x: 120.0, y: 340.0 },
//!     7,
//!     CardPayload::Question(QuestionPayload::default()),
//! );
//!
//! assert!(card.id.is_local());
//! assert!(card.is_unsaved());
//! ```

use crate::models::payload::{CardPayload, CardPayloadPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Card operations
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Payload patch targets {expected} but card is {actual}")]
    TypeMismatch { expected: CardType, actual: CardType },

    #[error("Position is not finite: ({x}, {y})")]
    NonFinitePosition { x: f64, y: f64 },
}

/// The four card types shown on the canvas.
///
/// Serialized in snake_case because the backend card records carry the type
/// as a lowercase string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Source,
    Question,
    Insight,
    Thought,
}

impl CardType {
    /// All card types, in canvas-toolbar order.
    pub const ALL: [CardType; 4] = [
        CardType::Source,
        CardType::Question,
        CardType::Insight,
        CardType::Thought,
    ];

    /// Lowercase wire name used by the backend `cards.type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Source => "source",
            CardType::Question => "question",
            CardType::Insight => "insight",
            CardType::Thought => "thought",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card identifier: client-generated until persisted, backend-issued after.
///
/// A `Local` id exists only inside this process. The backend never sees it;
/// once the card record is created the store rebinds the card (and every link
/// referencing it) to the `Remote` integer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CardId {
    /// Client-generated temporary identifier (never persisted)
    Local(Uuid),
    /// Backend-issued card record id
    Remote(i64),
}

impl CardId {
    /// Generate a fresh client-side id.
    pub fn generate() -> Self {
        CardId::Local(Uuid::new_v4())
    }

    /// True while the card record has not been created on the backend.
    pub fn is_local(&self) -> bool {
        matches!(self, CardId::Local(_))
    }

    /// The backend record id, if this card has been persisted.
    pub fn remote(&self) -> Option<i64> {
        match self {
            CardId::Local(_) => None,
            CardId::Remote(id) => Some(*id),
        }
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardId::Local(uuid) => write!(f, "local:{uuid}"),
            CardId::Remote(id) => write!(f, "card:{id}"),
        }
    }
}

/// A point on the canvas, in canvas-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rendering layers hand us whatever the pointer produced; reject NaN and
    /// infinities before they reach the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.x.is_finite() && self.y.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFinitePosition {
                x: self.x,
                y: self.y,
            })
        }
    }
}

/// A typed node on the canvas, backed by one underlying entity.
///
/// # Fields
///
/// - `id`: [`CardId::Local`] until the card record is persisted
/// - `position`: canvas coordinates, updated on every drag-move
/// - `project_id`: the project this canvas belongs to
/// - `payload`: type-specific content ([`CardPayload`])
/// - `entity_id`: backend id of the underlying entity, `None` until created
/// - `created_at` / `modified_at`: bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,

    pub position: Position,

    pub project_id: i64,

    pub payload: CardPayload,

    /// Backend id of the underlying entity (source material, question,
    /// insight, or thought record). `None` means the entity has not been
    /// created yet.
    pub entity_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl Card {
    /// Create a new unsaved card with a fresh local id.
    pub fn new(position: Position, project_id: i64, payload: CardPayload) -> Self {
        let now = Utc::now();
        Self {
            id: CardId::generate(),
            position,
            project_id,
            payload,
            entity_id: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// The card's type, derived from its payload variant.
    pub fn card_type(&self) -> CardType {
        self.payload.card_type()
    }

    /// A card is unsaved while it lacks a backend card record or a backend
    /// entity record. Closing an unsaved card's detail view deletes it.
    pub fn is_unsaved(&self) -> bool {
        self.id.is_local() || self.entity_id.is_none()
    }

    /// Move the card. Does not touch the backend; the position synchronizer
    /// owns the debounced persistence write.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
        self.modified_at = Utc::now();
    }

    /// Apply a sparse payload patch.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] when the patch variant does
    /// not match the card's payload variant; the card type is fixed at
    /// creation.
    pub fn apply_patch(&mut self, patch: &CardPayloadPatch) -> Result<(), ValidationError> {
        let expected = patch.card_type();
        let actual = self.card_type();
        if expected != actual {
            return Err(ValidationError::TypeMismatch { expected, actual });
        }
        self.payload.apply_patch(patch);
        self.modified_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::{InsightPayload, QuestionPayload, SourcePayload};

    #[test]
    fn test_new_card_is_unsaved() {
        let card = Card::new(
            Position::new(10.0, 20.0),
            1,
            CardPayload::Question(QuestionPayload::default()),
        );

        assert!(card.id.is_local());
        assert!(card.entity_id.is_none());
        assert!(card.is_unsaved());
        assert_eq!(card.card_type(), CardType::Question);
    }

    #[test]
    fn test_card_with_remote_id_but_no_entity_is_unsaved() {
        let mut card = Card::new(
            Position::default(),
            1,
            CardPayload::Insight(InsightPayload::default()),
        );
        card.id = CardId::Remote(42);

        assert!(card.is_unsaved());

        card.entity_id = Some(7);
        assert!(!card.is_unsaved());
    }

    #[test]
    fn test_set_position_bumps_modified() {
        let mut card = Card::new(
            Position::default(),
            1,
            CardPayload::Thought(Default::default()),
        );
        let before = card.modified_at;

        card.set_position(Position::new(5.0, -3.5));

        assert_eq!(card.position, Position::new(5.0, -3.5));
        assert!(card.modified_at >= before);
    }

    #[test]
    fn test_apply_patch_rejects_wrong_type() {
        let mut card = Card::new(
            Position::default(),
            1,
            CardPayload::Source(SourcePayload::default()),
        );

        let patch = CardPayloadPatch::question().with_text("wrong type".to_string());
        let err = card.apply_patch(&patch).unwrap_err();

        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_position_validation() {
        assert!(Position::new(0.0, 0.0).validate().is_ok());
        assert!(Position::new(f64::NAN, 0.0).validate().is_err());
        assert!(Position::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_card_id_serialization_is_tagged() {
        let id = CardId::Remote(99);
        let json = serde_json::to_value(&id).unwrap();

        assert_eq!(json["kind"], "remote");
        assert_eq!(json["value"], 99);
    }

    #[test]
    fn test_card_type_wire_names() {
        assert_eq!(CardType::Source.as_str(), "source");
        assert_eq!(CardType::Question.as_str(), "question");
        assert_eq!(CardType::Insight.as_str(), "insight");
        assert_eq!(CardType::Thought.as_str(), "thought");
    }
}
