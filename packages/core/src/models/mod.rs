//! Data structures for the canvas graph: cards, payloads, links, and the
//! transient guided-chat session.

pub mod card;
pub mod chat;
pub mod link;
pub mod payload;

pub use card::{Card, CardId, CardType, Position, ValidationError};
pub use chat::{
    AnswerValue, ChatRole, ChatSession, FileAttachment, PromptDef, PromptKind, StepAdvance,
    TranscriptEntry, SKIPPED_MARKER,
};
pub use link::{CardLink, LinkId};
pub use payload::{
    CardPayload, CardPayloadPatch, Citation, InsightPayload, QuestionPatch, QuestionPayload,
    SourcePatch, SourcePayload, TextPatch, ThoughtPayload,
};
