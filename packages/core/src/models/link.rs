//! Card link data structures
//!
//! A [`CardLink`] is a directed visual connection between two cards. Links
//! are unique per *unordered* pair: once A→B exists, B→A is rejected.

use crate::models::card::CardId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Link identifier, client-generated until the backend record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum LinkId {
    /// Optimistic edge not yet confirmed by the backend
    Local(Uuid),
    /// Backend-issued card_links record id
    Remote(i64),
}

impl LinkId {
    pub fn generate() -> Self {
        LinkId::Local(Uuid::new_v4())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, LinkId::Local(_))
    }

    pub fn remote(&self) -> Option<i64> {
        match self {
            LinkId::Local(_) => None,
            LinkId::Remote(id) => Some(*id),
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkId::Local(uuid) => write!(f, "local:{uuid}"),
            LinkId::Remote(id) => write!(f, "link:{id}"),
        }
    }
}

/// A directed connection between two cards.
///
/// Handles name the anchor points on the rendered nodes ("top", "bottom",
/// ...); the engine treats them as opaque strings supplied by the rendering
/// surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLink {
    pub id: LinkId,
    pub source_card_id: CardId,
    pub target_card_id: CardId,
    pub source_handle: String,
    pub target_handle: String,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
}

impl CardLink {
    /// Create a new optimistic link with a fresh local id.
    pub fn new(
        source_card_id: CardId,
        target_card_id: CardId,
        source_handle: impl Into<String>,
        target_handle: impl Into<String>,
        project_id: i64,
    ) -> Self {
        Self {
            id: LinkId::generate(),
            source_card_id,
            target_card_id,
            source_handle: source_handle.into(),
            target_handle: target_handle.into(),
            project_id,
            created_at: Utc::now(),
        }
    }

    /// True when this link connects `a` and `b` in either direction.
    pub fn joins(&self, a: CardId, b: CardId) -> bool {
        (self.source_card_id == a && self.target_card_id == b)
            || (self.source_card_id == b && self.target_card_id == a)
    }

    /// True when either endpoint is `card_id`.
    pub fn touches(&self, card_id: CardId) -> bool {
        self.source_card_id == card_id || self.target_card_id == card_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_is_undirected() {
        let a = CardId::Remote(1);
        let b = CardId::Remote(2);
        let c = CardId::Remote(3);
        let link = CardLink::new(a, b, "bottom", "top", 1);

        assert!(link.joins(a, b));
        assert!(link.joins(b, a));
        assert!(!link.joins(a, c));
    }

    #[test]
    fn test_touches_either_endpoint() {
        let a = CardId::Remote(1);
        let b = CardId::Remote(2);
        let link = CardLink::new(a, b, "left", "right", 1);

        assert!(link.touches(a));
        assert!(link.touches(b));
        assert!(!link.touches(CardId::Remote(3)));
    }

    #[test]
    fn test_new_link_has_local_id() {
        let link = CardLink::new(CardId::Remote(1), CardId::Remote(2), "a", "b", 1);
        assert!(link.id.is_local());
        assert!(link.id.remote().is_none());
    }
}
