//! Per-type card payloads
//!
//! Each card type owns one payload struct mirroring the fields of its
//! underlying backend entity. The payloads form a tagged union
//! ([`CardPayload`]) keyed by card type, so a card can never hold fields that
//! do not belong to its type.
//!
//! Sparse updates go through [`CardPayloadPatch`]: only fields that are
//! `Some` are written, everything else is left untouched (same shape as a
//! PATCH request body).

use crate::models::card::CardType;
use serde::{Deserialize, Serialize};

/// Source material content captured for a `source` card.
///
/// `citation_id` points at the card's [`Citation`] record. It is set the
/// moment the citation is created on the backend, which may be before the
/// source material itself exists - the unsaved-card cleanup relies on this to
/// delete orphaned citations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePayload {
    pub content: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub argument_type: String,
    pub function: String,
    pub notes: String,
    pub file_urls: Vec<String>,
    pub citation_id: Option<i64>,
}

/// A question card's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub text: String,
    pub category: String,
    pub status: String,
    pub priority: String,
    pub file_urls: Vec<String>,
}

impl Default for QuestionPayload {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: String::new(),
            // New questions start open; status changes are a detail-view edit,
            // not part of the guided flow.
            status: "open".to_string(),
            priority: String::new(),
            file_urls: Vec::new(),
        }
    }
}

/// An insight card's content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightPayload {
    pub text: String,
    pub file_urls: Vec<String>,
}

/// A thought card's content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtPayload {
    pub text: String,
    pub file_urls: Vec<String>,
}

/// Bibliographic record attached 1:1 to a source material.
///
/// Created once per new source material, never shared between cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub text: String,
    pub credibility: String,
}

/// Tagged union of card content, keyed by card type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardPayload {
    Source(SourcePayload),
    Question(QuestionPayload),
    Insight(InsightPayload),
    Thought(ThoughtPayload),
}

impl CardPayload {
    /// The empty payload a freshly placed card of `card_type` starts with.
    pub fn empty(card_type: CardType) -> Self {
        match card_type {
            CardType::Source => CardPayload::Source(SourcePayload::default()),
            CardType::Question => CardPayload::Question(QuestionPayload::default()),
            CardType::Insight => CardPayload::Insight(InsightPayload::default()),
            CardType::Thought => CardPayload::Thought(ThoughtPayload::default()),
        }
    }

    pub fn card_type(&self) -> CardType {
        match self {
            CardPayload::Source(_) => CardType::Source,
            CardPayload::Question(_) => CardType::Question,
            CardPayload::Insight(_) => CardType::Insight,
            CardPayload::Thought(_) => CardType::Thought,
        }
    }

    /// The uploaded-file URL list every payload carries.
    pub fn file_urls(&self) -> &[String] {
        match self {
            CardPayload::Source(p) => &p.file_urls,
            CardPayload::Question(p) => &p.file_urls,
            CardPayload::Insight(p) => &p.file_urls,
            CardPayload::Thought(p) => &p.file_urls,
        }
    }

    pub fn set_file_urls(&mut self, urls: Vec<String>) {
        match self {
            CardPayload::Source(p) => p.file_urls = urls,
            CardPayload::Question(p) => p.file_urls = urls,
            CardPayload::Insight(p) => p.file_urls = urls,
            CardPayload::Thought(p) => p.file_urls = urls,
        }
    }

    /// The source payload's citation id, for non-source payloads `None`.
    pub fn citation_id(&self) -> Option<i64> {
        match self {
            CardPayload::Source(p) => p.citation_id,
            _ => None,
        }
    }

    /// Apply a sparse patch. The caller has already checked the patch variant
    /// matches (see `Card::apply_patch`); a mismatched patch is a no-op here.
    pub fn apply_patch(&mut self, patch: &CardPayloadPatch) {
        match (self, patch) {
            (CardPayload::Source(p), CardPayloadPatch::Source(u)) => {
                if let Some(v) = &u.content {
                    p.content = v.clone();
                }
                if let Some(v) = &u.summary {
                    p.summary = v.clone();
                }
                if let Some(v) = &u.tags {
                    p.tags = v.clone();
                }
                if let Some(v) = &u.argument_type {
                    p.argument_type = v.clone();
                }
                if let Some(v) = &u.function {
                    p.function = v.clone();
                }
                if let Some(v) = &u.notes {
                    p.notes = v.clone();
                }
                if let Some(v) = &u.citation_id {
                    p.citation_id = Some(*v);
                }
            }
            (CardPayload::Question(p), CardPayloadPatch::Question(u)) => {
                if let Some(v) = &u.text {
                    p.text = v.clone();
                }
                if let Some(v) = &u.category {
                    p.category = v.clone();
                }
                if let Some(v) = &u.status {
                    p.status = v.clone();
                }
                if let Some(v) = &u.priority {
                    p.priority = v.clone();
                }
            }
            (CardPayload::Insight(p), CardPayloadPatch::Insight(u)) => {
                if let Some(v) = &u.text {
                    p.text = v.clone();
                }
            }
            (CardPayload::Thought(p), CardPayloadPatch::Thought(u)) => {
                if let Some(v) = &u.text {
                    p.text = v.clone();
                }
            }
            _ => {}
        }
    }
}

/// Sparse update for a source payload. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePatch {
    pub content: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub argument_type: Option<String>,
    pub function: Option<String>,
    pub notes: Option<String>,
    pub citation_id: Option<i64>,
}

/// Sparse update for a question payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

/// Sparse update for an insight or thought payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPatch {
    pub text: Option<String>,
}

/// Tagged union of payload patches, matching [`CardPayload`] variant-for-variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardPayloadPatch {
    Source(SourcePatch),
    Question(QuestionPatch),
    Insight(TextPatch),
    Thought(TextPatch),
}

impl CardPayloadPatch {
    pub fn source() -> Self {
        CardPayloadPatch::Source(SourcePatch::default())
    }

    pub fn question() -> Self {
        CardPayloadPatch::Question(QuestionPatch::default())
    }

    pub fn insight() -> Self {
        CardPayloadPatch::Insight(TextPatch::default())
    }

    pub fn thought() -> Self {
        CardPayloadPatch::Thought(TextPatch::default())
    }

    pub fn card_type(&self) -> CardType {
        match self {
            CardPayloadPatch::Source(_) => CardType::Source,
            CardPayloadPatch::Question(_) => CardType::Question,
            CardPayloadPatch::Insight(_) => CardType::Insight,
            CardPayloadPatch::Thought(_) => CardType::Thought,
        }
    }

    /// Set the main text field (content for source, text otherwise).
    pub fn with_text(mut self, value: String) -> Self {
        match &mut self {
            CardPayloadPatch::Source(p) => p.content = Some(value),
            CardPayloadPatch::Question(p) => p.text = Some(value),
            CardPayloadPatch::Insight(p) => p.text = Some(value),
            CardPayloadPatch::Thought(p) => p.text = Some(value),
        }
        self
    }
}
