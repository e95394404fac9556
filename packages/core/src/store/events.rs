//! Canvas events
//!
//! This module defines the events emitted by [`CardStore`] when graph state
//! changes, plus the commands other components address to the canvas (open a
//! card's detail view). They follow the observer pattern over a tokio
//! broadcast channel: the engine mutates state, subscribers (the rendering
//! surface, the detail view) react - without coupling to the mutating
//! component.
//!
//! # Event flow
//!
//! 1. A service mutates CardStore (optimistically or on backend completion)
//! 2. CardStore publishes the matching event
//! 3. All subscribers receive it asynchronously
//!
//! [`CardStore`]: crate::store::CardStore

use crate::models::{Card, CardId, CardLink, LinkId};
use serde::{Deserialize, Serialize};

/// Events published by the card store.
///
/// `CardRebound`/`LinkRebound` fire when a temporary local id is replaced by
/// the backend-issued id; subscribers keyed by id must re-key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanvasEvent {
    CardAdded { card: Card },

    CardUpdated { card: Card },

    CardRemoved { id: CardId },

    CardRebound { old_id: CardId, card: Card },

    LinkAdded { link: CardLink },

    LinkRemoved { id: LinkId },

    LinkRebound { old_id: LinkId, link: CardLink },

    /// Command to the canvas: open this card's detail view. `guided` tells
    /// the view to show the chat panel instead of the plain editor.
    CardOpened { id: CardId, guided: bool },
}

impl CanvasEvent {
    /// Event type string, for logging and debugging.
    pub fn event_type(&self) -> &'static str {
        match self {
            CanvasEvent::CardAdded { .. } => "card:added",
            CanvasEvent::CardUpdated { .. } => "card:updated",
            CanvasEvent::CardRemoved { .. } => "card:removed",
            CanvasEvent::CardRebound { .. } => "card:rebound",
            CanvasEvent::LinkAdded { .. } => "link:added",
            CanvasEvent::LinkRemoved { .. } => "link:removed",
            CanvasEvent::LinkRebound { .. } => "link:rebound",
            CanvasEvent::CardOpened { .. } => "card:opened",
        }
    }
}
