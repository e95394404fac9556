//! Guided chat session state
//!
//! A [`ChatSession`] is the transient, per-card state of the guided capture
//! flow: the current step, the answers recorded so far, the files attached
//! per prompt, and the rendered transcript. It is never persisted - only its
//! finalized answers and files reach the backend, via the persistence
//! gateway.
//!
//! The session is a pure state machine over a prompt script
//! (`&[PromptDef]`); it performs no I/O. The [`GuidedChatEngine`] owns the
//! scripts and drives sessions.
//!
//! [`GuidedChatEngine`]: crate::services::GuidedChatEngine

use crate::models::card::CardId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transcript marker recorded when a step is submitted without an answer.
/// The answer map still stores the empty value; only the transcript shows
/// the marker.
pub const SKIPPED_MARKER: &str = "Skipped";

/// What a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Fixed choices, plus user-defined options persisted under
    /// `option_type` when present.
    Choice {
        choices: &'static [&'static str],
        option_type: Option<&'static str>,
    },
    /// Free text. The type's main-content prompt (`main == true`) also
    /// accepts file attachments.
    Text { main: bool },
    /// Incrementally built string list (source tags).
    Tags,
}

/// One step of a card type's guided script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptDef {
    /// Stable key for the answer map and per-prompt file binding.
    pub id: &'static str,
    /// The system-side question shown in the transcript.
    pub question: &'static str,
    pub kind: PromptKind,
}

impl PromptDef {
    /// The type's main-content prompt: required, and the only step that
    /// accepts file attachments.
    pub fn is_main(&self) -> bool {
        matches!(self.kind, PromptKind::Text { main: true })
    }

    pub fn accepts_files(&self) -> bool {
        self.is_main()
    }
}

/// A recorded step answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum AnswerValue {
    Text(String),
    Items(Vec<String>),
}

impl AnswerValue {
    /// The empty answer for a skipped step.
    pub fn empty() -> Self {
        AnswerValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(s) => s.trim().is_empty(),
            AnswerValue::Items(items) => items.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::Items(items) => items.join(", "),
        }
    }

    /// Transcript rendering: the literal skip marker for empty answers.
    fn transcript_text(&self) -> String {
        if self.is_empty() {
            SKIPPED_MARKER.to_string()
        } else {
            self.as_text()
        }
    }
}

/// A file handed to the engine by the detail view, bound to the prompt it
/// was attached under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatRole {
    System,
    User,
}

/// One rendered transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub role: ChatRole,
    pub text: String,
    pub attached_files: Vec<FileAttachment>,
}

impl TranscriptEntry {
    fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
            attached_files: Vec::new(),
        }
    }

    fn user(text: String, attached_files: Vec<FileAttachment>) -> Self {
        Self {
            role: ChatRole::User,
            text,
            attached_files,
        }
    }
}

/// Result of submitting a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvance {
    /// Moved to the next prompt.
    Advanced,
    /// The last step was submitted; `step_index == prompt count`. What
    /// happens next (review or finalize) is the engine's termination policy.
    Terminal,
}

/// Transient per-card state of the guided capture flow.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub card_id: CardId,
    /// Index of the prompt awaiting an answer. Equal to the script length
    /// once every step has been submitted.
    pub step_index: usize,
    pub answers: HashMap<String, AnswerValue>,
    pub files_by_prompt: HashMap<String, Vec<FileAttachment>>,
    pub transcript: Vec<TranscriptEntry>,
}

impl ChatSession {
    /// Open a session at step 0, seeding the transcript with the first
    /// prompt.
    pub fn new(card_id: CardId, script: &[PromptDef]) -> Self {
        let mut transcript = Vec::new();
        if let Some(first) = script.first() {
            transcript.push(TranscriptEntry::system(first.question));
        }
        Self {
            card_id,
            step_index: 0,
            answers: HashMap::new(),
            files_by_prompt: HashMap::new(),
            transcript,
        }
    }

    /// The prompt awaiting an answer, `None` once all steps are submitted.
    pub fn current_prompt<'s>(&self, script: &'s [PromptDef]) -> Option<&'s PromptDef> {
        script.get(self.step_index)
    }

    /// True once every step has been submitted.
    pub fn is_complete(&self, script: &[PromptDef]) -> bool {
        self.step_index >= script.len()
    }

    /// Bind files to the current step's prompt. Returns false (and drops
    /// nothing into the session) when the current prompt does not accept
    /// files or all steps are already submitted.
    pub fn attach_files(&mut self, script: &[PromptDef], files: Vec<FileAttachment>) -> bool {
        let Some(prompt) = self.current_prompt(script) else {
            return false;
        };
        if !prompt.accepts_files() {
            return false;
        }
        self.files_by_prompt
            .entry(prompt.id.to_string())
            .or_default()
            .extend(files);
        true
    }

    /// Record the current step's answer and advance.
    ///
    /// An empty answer is stored as the empty value in the answer map but
    /// rendered as the literal [`SKIPPED_MARKER`] in the transcript. Returns
    /// `None` when all steps were already submitted.
    pub fn submit_step(
        &mut self,
        script: &[PromptDef],
        answer: AnswerValue,
    ) -> Option<StepAdvance> {
        let prompt = *self.current_prompt(script)?;

        let files = self
            .files_by_prompt
            .get(prompt.id)
            .cloned()
            .unwrap_or_default();
        self.transcript
            .push(TranscriptEntry::user(answer.transcript_text(), files));
        self.answers.insert(prompt.id.to_string(), answer);

        self.step_index += 1;
        if let Some(next) = script.get(self.step_index) {
            self.transcript.push(TranscriptEntry::system(next.question));
            Some(StepAdvance::Advanced)
        } else {
            Some(StepAdvance::Terminal)
        }
    }

    /// Step back one prompt, discarding everything entered at or beyond the
    /// new position, and rebuild the transcript from scratch by replaying
    /// the surviving answers. Returns false at step 0.
    pub fn back(&mut self, script: &[PromptDef]) -> bool {
        if self.step_index == 0 {
            return false;
        }
        let new_index = self.step_index - 1;

        for prompt in &script[new_index..] {
            self.answers.remove(prompt.id);
            self.files_by_prompt.remove(prompt.id);
        }

        let mut transcript = Vec::new();
        for prompt in &script[..new_index] {
            transcript.push(TranscriptEntry::system(prompt.question));
            let answer = self
                .answers
                .get(prompt.id)
                .cloned()
                .unwrap_or_else(AnswerValue::empty);
            let files = self
                .files_by_prompt
                .get(prompt.id)
                .cloned()
                .unwrap_or_default();
            transcript.push(TranscriptEntry::user(answer.transcript_text(), files));
        }
        transcript.push(TranscriptEntry::system(script[new_index].question));

        self.step_index = new_index;
        self.transcript = transcript;
        true
    }

    /// All attached files in script order, for the finalize upload.
    pub fn collected_files(&self, script: &[PromptDef]) -> Vec<FileAttachment> {
        let mut files = Vec::new();
        for prompt in script {
            if let Some(batch) = self.files_by_prompt.get(prompt.id) {
                files.extend(batch.iter().cloned());
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &[PromptDef] = &[
        PromptDef {
            id: "text",
            question: "What is on your mind?",
            kind: PromptKind::Text { main: true },
        },
        PromptDef {
            id: "category",
            question: "Pick a category.",
            kind: PromptKind::Choice {
                choices: &["Background", "Probing"],
                option_type: Some("question_category"),
            },
        },
        PromptDef {
            id: "priority",
            question: "How urgent is this?",
            kind: PromptKind::Choice {
                choices: &["High", "Medium", "Low"],
                option_type: None,
            },
        },
    ];

    fn session() -> ChatSession {
        ChatSession::new(CardId::generate(), SCRIPT)
    }

    #[test]
    fn test_new_session_seeds_first_prompt() {
        let s = session();
        assert_eq!(s.step_index, 0);
        assert_eq!(s.transcript.len(), 1);
        assert_eq!(s.transcript[0].role, ChatRole::System);
        assert_eq!(s.transcript[0].text, "What is on your mind?");
    }

    #[test]
    fn test_submit_advances_and_appends_pair() {
        let mut s = session();
        let advance = s
            .submit_step(SCRIPT, AnswerValue::Text("Why?".to_string()))
            .unwrap();

        assert_eq!(advance, StepAdvance::Advanced);
        assert_eq!(s.step_index, 1);
        // system(0), user(0), system(1)
        assert_eq!(s.transcript.len(), 3);
        assert_eq!(s.transcript[1].role, ChatRole::User);
        assert_eq!(s.transcript[1].text, "Why?");
        assert_eq!(s.transcript[2].text, "Pick a category.");
        assert_eq!(
            s.answers.get("text"),
            Some(&AnswerValue::Text("Why?".to_string()))
        );
    }

    #[test]
    fn test_empty_answer_skipped_in_transcript_empty_in_map() {
        let mut s = session();
        s.submit_step(SCRIPT, AnswerValue::empty()).unwrap();

        assert_eq!(s.transcript[1].text, SKIPPED_MARKER);
        assert_eq!(s.answers.get("text"), Some(&AnswerValue::empty()));
    }

    #[test]
    fn test_last_step_submit_is_terminal() {
        let mut s = session();
        s.submit_step(SCRIPT, AnswerValue::Text("a".to_string()))
            .unwrap();
        s.submit_step(SCRIPT, AnswerValue::Text("Background".to_string()))
            .unwrap();
        let advance = s.submit_step(SCRIPT, AnswerValue::empty()).unwrap();

        assert_eq!(advance, StepAdvance::Terminal);
        assert!(s.is_complete(SCRIPT));
        assert!(s.current_prompt(SCRIPT).is_none());
        // No trailing system prompt after the last user entry.
        assert_eq!(s.transcript.last().unwrap().role, ChatRole::User);
    }

    #[test]
    fn test_attach_files_binds_to_current_prompt() {
        let mut s = session();
        assert!(s.attach_files(SCRIPT, vec![FileAttachment::new("notes.pdf", vec![1])]));
        s.submit_step(SCRIPT, AnswerValue::Text("Why?".to_string()))
            .unwrap();

        // Files show up on the user transcript entry for that step.
        assert_eq!(s.transcript[1].attached_files.len(), 1);
        assert_eq!(s.transcript[1].attached_files[0].name, "notes.pdf");

        // Choice prompts do not accept files.
        assert!(!s.attach_files(SCRIPT, vec![FileAttachment::new("x", vec![])]));
    }

    #[test]
    fn test_back_discards_and_rebuilds() {
        let mut s = session();
        s.submit_step(SCRIPT, AnswerValue::Text("Why?".to_string()))
            .unwrap();
        s.submit_step(SCRIPT, AnswerValue::Text("Probing".to_string()))
            .unwrap();

        assert!(s.back(SCRIPT));

        assert_eq!(s.step_index, 1);
        assert!(s.answers.contains_key("text"));
        assert!(!s.answers.contains_key("category"));
        // system(0), user(0), system(1)
        assert_eq!(s.transcript.len(), 3);
        assert_eq!(s.transcript[2].text, "Pick a category.");
    }

    #[test]
    fn test_back_then_resubmit_matches_straight_run() {
        let mut detour = session();
        detour
            .submit_step(SCRIPT, AnswerValue::Text("Why?".to_string()))
            .unwrap();
        detour
            .submit_step(SCRIPT, AnswerValue::Text("Background".to_string()))
            .unwrap();
        detour.back(SCRIPT);
        detour
            .submit_step(SCRIPT, AnswerValue::Text("Probing".to_string()))
            .unwrap();

        let mut straight = session();
        straight
            .submit_step(SCRIPT, AnswerValue::Text("Why?".to_string()))
            .unwrap();
        straight
            .submit_step(SCRIPT, AnswerValue::Text("Probing".to_string()))
            .unwrap();

        assert_eq!(detour.transcript, straight.transcript);
        assert_eq!(detour.answers, straight.answers);
        assert_eq!(detour.step_index, straight.step_index);
    }

    #[test]
    fn test_back_at_step_zero_is_noop() {
        let mut s = session();
        assert!(!s.back(SCRIPT));
        assert_eq!(s.step_index, 0);
        assert_eq!(s.transcript.len(), 1);
    }

    #[test]
    fn test_collected_files_in_script_order() {
        let mut s = session();
        s.attach_files(SCRIPT, vec![FileAttachment::new("a.pdf", vec![1])]);
        s.attach_files(SCRIPT, vec![FileAttachment::new("b.pdf", vec![2])]);
        s.submit_step(SCRIPT, AnswerValue::Text("t".to_string()))
            .unwrap();

        let files = s.collected_files(SCRIPT);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.pdf");
        assert_eq!(files[1].name, "b.pdf");
    }
}
