//! GuidedChatEngine - step-sequenced content capture
//!
//! Drives one [`ChatSession`] per open card through its type's prompt
//! script, then hands the aggregated answers and files to the persistence
//! gateway.
//!
//! Termination policy differs by type: `source` enters a review state after
//! the last step and persists only on an explicit [`finalize`]; the other
//! types treat the last step's submit as the finalize action.
//!
//! [`finalize`]: GuidedChatEngine::finalize

use crate::models::{
    AnswerValue, Card, CardId, CardPayloadPatch, CardType, ChatSession, Citation, FileAttachment,
    PromptDef, PromptKind, QuestionPatch, SourcePatch, StepAdvance, TextPatch, TranscriptEntry,
};
use crate::services::error::CanvasError;
use crate::services::notices::NoticeSink;
use crate::services::persistence_gateway::{FinalizedContent, PersistenceGateway};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SOURCE_SCRIPT: &[PromptDef] = &[
    PromptDef {
        id: "content",
        question: "Paste the passage or describe the source material.",
        kind: PromptKind::Text { main: true },
    },
    PromptDef {
        id: "citation",
        question: "How should this source be cited?",
        kind: PromptKind::Text { main: false },
    },
    PromptDef {
        id: "credibility",
        question: "How credible is this source?",
        kind: PromptKind::Choice {
            choices: &[
                "Peer-reviewed",
                "Reputable publisher",
                "Grey literature",
                "Unverified",
            ],
            option_type: None,
        },
    },
    PromptDef {
        id: "summary",
        question: "Summarize the source in a sentence or two.",
        kind: PromptKind::Text { main: false },
    },
    PromptDef {
        id: "argument_type",
        question: "What kind of argument does it make?",
        kind: PromptKind::Choice {
            choices: &["Empirical", "Theoretical", "Statistical", "Anecdotal"],
            option_type: Some("argument_type"),
        },
    },
    PromptDef {
        id: "function",
        question: "What role does this source play in your research?",
        kind: PromptKind::Choice {
            choices: &[
                "Supports a claim",
                "Challenges a claim",
                "Provides context",
                "Defines a term",
            ],
            option_type: Some("source_function"),
        },
    },
    PromptDef {
        id: "tags",
        question: "Add tags so you can find this source later.",
        kind: PromptKind::Tags,
    },
    PromptDef {
        id: "notes",
        question: "Any notes for future you?",
        kind: PromptKind::Text { main: false },
    },
];

const QUESTION_SCRIPT: &[PromptDef] = &[
    PromptDef {
        id: "text",
        question: "What question is on your mind?",
        kind: PromptKind::Text { main: true },
    },
    PromptDef {
        id: "category",
        question: "What kind of question is it?",
        kind: PromptKind::Choice {
            choices: &["Background", "Clarifying", "Probing", "Challenging"],
            option_type: Some("question_category"),
        },
    },
    PromptDef {
        id: "priority",
        question: "How urgent is it?",
        kind: PromptKind::Choice {
            choices: &["High", "Medium", "Low"],
            option_type: None,
        },
    },
];

const INSIGHT_SCRIPT: &[PromptDef] = &[PromptDef {
    id: "text",
    question: "What did you realize?",
    kind: PromptKind::Text { main: true },
}];

const THOUGHT_SCRIPT: &[PromptDef] = &[PromptDef {
    id: "text",
    question: "What are you thinking?",
    kind: PromptKind::Text { main: true },
}];

/// The guided script for a card type.
pub fn script_for(card_type: CardType) -> &'static [PromptDef] {
    match card_type {
        CardType::Source => SOURCE_SCRIPT,
        CardType::Question => QUESTION_SCRIPT,
        CardType::Insight => INSIGHT_SCRIPT,
        CardType::Thought => THOUGHT_SCRIPT,
    }
}

/// Outcome of a submit call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The type's required main-content prompt was submitted empty; nothing
    /// was recorded.
    Rejected,
    /// Moved to the next prompt.
    Advanced,
    /// All steps captured; the source review state is showing. Persisting
    /// awaits the explicit finalize action.
    Review,
    /// The card was persisted and the session discarded.
    Finalized(Card),
}

/// Per-card guided capture flows.
pub struct GuidedChatEngine {
    gateway: Arc<PersistenceGateway>,
    notices: NoticeSink,
    sessions: Mutex<HashMap<CardId, ChatSession>>,
}

impl GuidedChatEngine {
    pub fn new(gateway: Arc<PersistenceGateway>, notices: NoticeSink) -> Self {
        Self {
            gateway,
            notices,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a fresh session for a card at step 0. Replaces any previous
    /// session for the card.
    pub fn open_session(&self, card_id: CardId) -> Result<(), CanvasError> {
        let card = self
            .gateway
            .store()
            .get_card(card_id)
            .ok_or(CanvasError::CardNotFound { id: card_id })?;
        let script = script_for(card.card_type());
        self.sessions
            .lock()
            .unwrap()
            .insert(card_id, ChatSession::new(card_id, script));
        tracing::debug!(card = %card_id, card_type = %card.card_type(), "chat session opened");
        Ok(())
    }

    pub fn has_session(&self, card_id: CardId) -> bool {
        self.sessions.lock().unwrap().contains_key(&card_id)
    }

    /// Discard a session without persisting anything. Used when the detail
    /// view closes; the unsaved-card cleanup is the gateway's job.
    pub fn abandon(&self, card_id: CardId) {
        if self.sessions.lock().unwrap().remove(&card_id).is_some() {
            tracing::debug!(card = %card_id, "chat session abandoned");
        }
    }

    /// The session's transcript, for rendering.
    pub fn transcript(&self, card_id: CardId) -> Result<Vec<TranscriptEntry>, CanvasError> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(&card_id)
            .ok_or(CanvasError::NoSession { id: card_id })?;
        Ok(session.transcript.clone())
    }

    /// The prompt awaiting an answer, `None` in the review state.
    pub fn current_prompt(&self, card_id: CardId) -> Result<Option<PromptDef>, CanvasError> {
        let (script, step_index) = self.session_script(card_id)?;
        Ok(script.get(step_index).copied())
    }

    /// The selectable values for the current prompt: fixed choices plus any
    /// persisted custom options for its option type. Empty for non-choice
    /// prompts.
    pub async fn prompt_choices(&self, card_id: CardId) -> Result<Vec<String>, CanvasError> {
        let Some(prompt) = self.current_prompt(card_id)? else {
            return Ok(Vec::new());
        };
        let PromptKind::Choice {
            choices,
            option_type,
        } = prompt.kind
        else {
            return Ok(Vec::new());
        };
        let mut values: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
        if let Some(option_type) = option_type {
            match self.gateway.custom_options(option_type).await {
                Ok(custom) => values.extend(custom),
                Err(err) => {
                    tracing::warn!(option_type, error = %err, "custom options unavailable")
                }
            }
        }
        Ok(values)
    }

    /// Bind files to the current step. Returns false when the prompt does
    /// not accept attachments.
    pub fn attach_files(
        &self,
        card_id: CardId,
        files: Vec<FileAttachment>,
    ) -> Result<bool, CanvasError> {
        let (script, _) = self.session_script(card_id)?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&card_id)
            .ok_or(CanvasError::NoSession { id: card_id })?;
        Ok(session.attach_files(script, files))
    }

    /// Record the current step's answer and advance the flow.
    ///
    /// Every step is skippable except the type's main-content prompt, which
    /// rejects an empty submission locally with a notice and no state
    /// change. Selecting a value outside a prompt's fixed choices persists
    /// it as a custom option. The last step finalizes directly for every
    /// type except `source`, which enters the review state instead.
    pub async fn submit_step(
        &self,
        card_id: CardId,
        answer: AnswerValue,
    ) -> Result<SubmitOutcome, CanvasError> {
        let (script, _) = self.session_script(card_id)?;
        let (prompt, advance) = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(&card_id)
                .ok_or(CanvasError::NoSession { id: card_id })?;
            let prompt = *session.current_prompt(script).ok_or_else(|| {
                CanvasError::invalid_state("every step has already been submitted")
            })?;
            if prompt.is_main() && answer.is_empty() {
                drop(sessions);
                self.notices
                    .publish(crate::services::notices::Notice::info(
                        "This step needs an answer before you can continue",
                    ));
                return Ok(SubmitOutcome::Rejected);
            }
            let advance = session
                .submit_step(script, answer.clone())
                .expect("prompt presence checked above");
            (prompt, advance)
        };

        if let PromptKind::Choice {
            choices,
            option_type: Some(option_type),
        } = prompt.kind
        {
            let value = answer.as_text();
            if !value.trim().is_empty() && !choices.contains(&value.as_str()) {
                if let Err(err) = self.gateway.save_custom_option(option_type, &value).await {
                    tracing::warn!(option_type, error = %err, "custom option not persisted");
                }
            }
        }

        match advance {
            StepAdvance::Advanced => Ok(SubmitOutcome::Advanced),
            StepAdvance::Terminal => {
                let card_type = self.card_type(card_id)?;
                if card_type == CardType::Source {
                    Ok(SubmitOutcome::Review)
                } else {
                    let card = self.finalize(card_id).await?;
                    Ok(SubmitOutcome::Finalized(card))
                }
            }
        }
    }

    /// Step back one prompt, rebuilding the transcript by replay. Works
    /// from the review state too. Returns false at step 0.
    pub fn back(&self, card_id: CardId) -> Result<bool, CanvasError> {
        let (script, _) = self.session_script(card_id)?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&card_id)
            .ok_or(CanvasError::NoSession { id: card_id })?;
        Ok(session.back(script))
    }

    /// The captured answers in script order, for the source review state.
    pub fn review_summary(&self, card_id: CardId) -> Result<Vec<(String, String)>, CanvasError> {
        let (script, _) = self.session_script(card_id)?;
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(&card_id)
            .ok_or(CanvasError::NoSession { id: card_id })?;
        Ok(script
            .iter()
            .filter_map(|prompt| {
                session
                    .answers
                    .get(prompt.id)
                    .map(|answer| (prompt.id.to_string(), answer.as_text()))
            })
            .collect())
    }

    /// Persist the session's aggregated content through the gateway and
    /// discard the session. Requires every step to have been submitted.
    pub async fn finalize(&self, card_id: CardId) -> Result<Card, CanvasError> {
        let card_type = self.card_type(card_id)?;
        let script = script_for(card_type);

        let content = {
            let sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get(&card_id)
                .ok_or(CanvasError::NoSession { id: card_id })?;
            if !session.is_complete(script) {
                return Err(CanvasError::invalid_state(
                    "cannot finalize before the last step is submitted",
                ));
            }
            build_content(card_type, session, script)
        };

        let card = self.gateway.finalize(card_id, content).await?;
        // Session survives a failed finalize (the ? above) so the user can
        // retry; it is discarded only once the card is durably saved.
        self.abandon(card_id);
        Ok(card)
    }

    fn card_type(&self, card_id: CardId) -> Result<CardType, CanvasError> {
        self.gateway
            .store()
            .get_card(card_id)
            .map(|card| card.card_type())
            .ok_or(CanvasError::CardNotFound { id: card_id })
    }

    fn session_script(
        &self,
        card_id: CardId,
    ) -> Result<(&'static [PromptDef], usize), CanvasError> {
        let card_type = self.card_type(card_id)?;
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(&card_id)
            .ok_or(CanvasError::NoSession { id: card_id })?;
        Ok((script_for(card_type), session.step_index))
    }
}

/// Aggregate a completed session into the gateway's finalize input.
fn build_content(
    card_type: CardType,
    session: &ChatSession,
    script: &[PromptDef],
) -> FinalizedContent {
    let text = |id: &str| -> Option<String> {
        session.answers.get(id).map(|answer| answer.as_text())
    };
    let items = |id: &str| -> Option<Vec<String>> {
        session.answers.get(id).map(|answer| match answer {
            AnswerValue::Items(items) => items.clone(),
            AnswerValue::Text(value) if !value.trim().is_empty() => vec![value.clone()],
            AnswerValue::Text(_) => Vec::new(),
        })
    };

    let patch = match card_type {
        CardType::Source => CardPayloadPatch::Source(SourcePatch {
            content: text("content"),
            summary: text("summary"),
            tags: items("tags"),
            argument_type: text("argument_type"),
            function: text("function"),
            notes: text("notes"),
            citation_id: None,
        }),
        CardType::Question => CardPayloadPatch::Question(QuestionPatch {
            text: text("text"),
            category: text("category"),
            priority: text("priority"),
            status: None,
        }),
        CardType::Insight => CardPayloadPatch::Insight(TextPatch { text: text("text") }),
        CardType::Thought => CardPayloadPatch::Thought(TextPatch { text: text("text") }),
    };

    let mut content = FinalizedContent::new(patch).with_files(session.collected_files(script));
    if card_type == CardType::Source {
        content = content.with_citation(Citation {
            text: text("citation").unwrap_or_default(),
            credibility: text("credibility").unwrap_or_default(),
        });
    }
    content
}
