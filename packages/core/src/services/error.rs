//! Service Layer Error Types
//!
//! Error types for the engine's services, chaining store and backend
//! failures with operation-level context.

use crate::backend::BackendError;
use crate::models::{CardId, ValidationError};
use crate::store::StoreError;
use thiserror::Error;

/// Canvas service errors
///
/// Nothing here is fatal to the process: every service catches these at the
/// operation boundary and reports them as a transient notice.
#[derive(Error, Debug)]
pub enum CanvasError {
    /// Card not found in the store
    #[error("Card not found: {id}")]
    CardNotFound { id: CardId },

    /// Local validation failed
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// In-memory store mutation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Backend call failed
    #[error("Backend operation failed: {0}")]
    Backend(#[from] BackendError),

    /// Operation issued in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No chat session open for the card
    #[error("No chat session for card {id}")]
    NoSession { id: CardId },
}

impl CanvasError {
    /// Create a card not found error
    pub fn card_not_found(id: CardId) -> Self {
        Self::CardNotFound { id }
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a missing-session error
    pub fn no_session(id: CardId) -> Self {
        Self::NoSession { id }
    }
}
