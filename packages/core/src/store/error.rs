//! Store-level error types

use crate::models::{CardId, LinkId, ValidationError};
use thiserror::Error;

/// Errors raised by in-memory graph mutations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    #[error("Card id already present: {0}")]
    DuplicateCard(CardId),

    #[error("Link id already present: {0}")]
    DuplicateLink(LinkId),

    #[error("A link already connects {a} and {b}")]
    PairAlreadyLinked { a: CardId, b: CardId },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}
