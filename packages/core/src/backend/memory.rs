//! In-memory CardBackend implementation
//!
//! A complete implementation of [`CardBackend`] over plain maps, used by the
//! engine's tests and by embedders that want an offline mode. Behaves like
//! the real service at the contract level: monotonic ids, 404s for missing
//! records, and session-token checks.
//!
//! Failure injection: `fail_next(op)` makes the next call of the named
//! operation fail with a transport error, which is how the error-path tests
//! drive the gateway's abort-without-rollback behavior.

use crate::backend::api::{
    BackendError, CardBackend, CardRecord, LinkRecord, NewCardRecord, NewLinkRecord, Session,
};
use crate::models::{
    CardType, Citation, FileAttachment, InsightPayload, QuestionPayload, SourcePayload,
    ThoughtPayload,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    next_id: i64,
    cards: HashMap<i64, CardRecord>,
    sources: HashMap<i64, SourcePayload>,
    questions: HashMap<i64, QuestionPayload>,
    insights: HashMap<i64, InsightPayload>,
    thoughts: HashMap<i64, ThoughtPayload>,
    citations: HashMap<i64, Citation>,
    links: HashMap<i64, LinkRecord>,
    /// (entity collection, entity id) -> uploaded file URLs
    files: HashMap<(CardType, i64), Vec<String>>,
    custom_options: HashMap<String, Vec<String>>,
    fail_next: HashSet<String>,
    call_counts: HashMap<String, usize>,
}

impl State {
    fn issue_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory persistence service double.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` (method name, e.g. `"create_card"`) fail
    /// with a transport error.
    pub fn fail_next(&self, op: &str) {
        self.state.lock().unwrap().fail_next.insert(op.to_string());
    }

    /// How many times `op` has been called (failed calls included).
    pub fn calls(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_counts
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    /// Direct table inspection for assertions.
    pub fn card_count(&self) -> usize {
        self.state.lock().unwrap().cards.len()
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }

    pub fn citation_count(&self) -> usize {
        self.state.lock().unwrap().citations.len()
    }

    pub fn entity_count(&self, card_type: CardType) -> usize {
        let state = self.state.lock().unwrap();
        match card_type {
            CardType::Source => state.sources.len(),
            CardType::Question => state.questions.len(),
            CardType::Insight => state.insights.len(),
            CardType::Thought => state.thoughts.len(),
        }
    }

    pub fn card_record(&self, id: i64) -> Option<CardRecord> {
        self.state.lock().unwrap().cards.get(&id).cloned()
    }

    pub fn question_record(&self, id: i64) -> Option<QuestionPayload> {
        self.state.lock().unwrap().questions.get(&id).cloned()
    }

    pub fn source_record(&self, id: i64) -> Option<SourcePayload> {
        self.state.lock().unwrap().sources.get(&id).cloned()
    }

    /// Shared entry bookkeeping: session check, call count, injected failure.
    fn enter(&self, state: &mut State, session: &Session, op: &str) -> Result<(), BackendError> {
        *state.call_counts.entry(op.to_string()).or_default() += 1;
        if session.token.is_empty() {
            return Err(BackendError::Unauthorized);
        }
        if state.fail_next.remove(op) {
            return Err(BackendError::transport(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CardBackend for InMemoryBackend {
    async fn fetch_cards(
        &self,
        session: &Session,
        project_id: i64,
    ) -> Result<Vec<CardRecord>, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "fetch_cards")?;
        let mut cards: Vec<CardRecord> = state
            .cards
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.id);
        Ok(cards)
    }

    async fn create_card(
        &self,
        session: &Session,
        card: NewCardRecord,
    ) -> Result<CardRecord, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_card")?;
        let id = state.issue_id();
        let record = CardRecord {
            id,
            card_type: card.card_type,
            data_id: card.data_id,
            position_x: card.position_x,
            position_y: card.position_y,
            project_id: card.project_id,
        };
        state.cards.insert(id, record.clone());
        Ok(record)
    }

    async fn update_card_position(
        &self,
        session: &Session,
        card_id: i64,
        position_x: f64,
        position_y: f64,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_card_position")?;
        let card = state
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| BackendError::not_found(format!("card {card_id}")))?;
        card.position_x = position_x;
        card.position_y = position_y;
        Ok(())
    }

    async fn delete_card(&self, session: &Session, card_id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_card")?;
        state
            .cards
            .remove(&card_id)
            .ok_or_else(|| BackendError::not_found(format!("card {card_id}")))?;
        Ok(())
    }

    async fn get_source_material(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<SourcePayload, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "get_source_material")?;
        state
            .sources
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("source material {id}")))
    }

    async fn create_source_material(
        &self,
        session: &Session,
        payload: SourcePayload,
    ) -> Result<i64, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_source_material")?;
        let id = state.issue_id();
        state.sources.insert(id, payload);
        Ok(id)
    }

    async fn update_source_material(
        &self,
        session: &Session,
        id: i64,
        payload: SourcePayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_source_material")?;
        match state.sources.get_mut(&id) {
            Some(existing) => {
                *existing = payload;
                Ok(())
            }
            None => Err(BackendError::not_found(format!("source material {id}"))),
        }
    }

    async fn delete_source_material(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_source_material")?;
        state
            .sources
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("source material {id}")))?;
        Ok(())
    }

    async fn get_question(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<QuestionPayload, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "get_question")?;
        state
            .questions
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("question {id}")))
    }

    async fn create_question(
        &self,
        session: &Session,
        payload: QuestionPayload,
    ) -> Result<i64, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_question")?;
        let id = state.issue_id();
        state.questions.insert(id, payload);
        Ok(id)
    }

    async fn update_question(
        &self,
        session: &Session,
        id: i64,
        payload: QuestionPayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_question")?;
        match state.questions.get_mut(&id) {
            Some(existing) => {
                *existing = payload;
                Ok(())
            }
            None => Err(BackendError::not_found(format!("question {id}"))),
        }
    }

    async fn delete_question(&self, session: &Session, id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_question")?;
        state
            .questions
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("question {id}")))?;
        Ok(())
    }

    async fn get_insight(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<InsightPayload, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "get_insight")?;
        state
            .insights
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("insight {id}")))
    }

    async fn create_insight(
        &self,
        session: &Session,
        payload: InsightPayload,
    ) -> Result<i64, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_insight")?;
        let id = state.issue_id();
        state.insights.insert(id, payload);
        Ok(id)
    }

    async fn update_insight(
        &self,
        session: &Session,
        id: i64,
        payload: InsightPayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_insight")?;
        match state.insights.get_mut(&id) {
            Some(existing) => {
                *existing = payload;
                Ok(())
            }
            None => Err(BackendError::not_found(format!("insight {id}"))),
        }
    }

    async fn delete_insight(&self, session: &Session, id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_insight")?;
        state
            .insights
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("insight {id}")))?;
        Ok(())
    }

    async fn get_thought(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<ThoughtPayload, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "get_thought")?;
        state
            .thoughts
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("thought {id}")))
    }

    async fn create_thought(
        &self,
        session: &Session,
        payload: ThoughtPayload,
    ) -> Result<i64, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_thought")?;
        let id = state.issue_id();
        state.thoughts.insert(id, payload);
        Ok(id)
    }

    async fn update_thought(
        &self,
        session: &Session,
        id: i64,
        payload: ThoughtPayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_thought")?;
        match state.thoughts.get_mut(&id) {
            Some(existing) => {
                *existing = payload;
                Ok(())
            }
            None => Err(BackendError::not_found(format!("thought {id}"))),
        }
    }

    async fn delete_thought(&self, session: &Session, id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_thought")?;
        state
            .thoughts
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("thought {id}")))?;
        Ok(())
    }

    async fn create_citation(
        &self,
        session: &Session,
        citation: Citation,
    ) -> Result<i64, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_citation")?;
        let id = state.issue_id();
        state.citations.insert(id, citation);
        Ok(id)
    }

    async fn update_citation(
        &self,
        session: &Session,
        id: i64,
        citation: Citation,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "update_citation")?;
        match state.citations.get_mut(&id) {
            Some(existing) => {
                *existing = citation;
                Ok(())
            }
            None => Err(BackendError::not_found(format!("citation {id}"))),
        }
    }

    async fn delete_citation(&self, session: &Session, id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_citation")?;
        state
            .citations
            .remove(&id)
            .ok_or_else(|| BackendError::not_found(format!("citation {id}")))?;
        Ok(())
    }

    async fn fetch_links(
        &self,
        session: &Session,
        project_id: i64,
    ) -> Result<Vec<LinkRecord>, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "fetch_links")?;
        let mut links: Vec<LinkRecord> = state
            .links
            .values()
            .filter(|l| l.project_id == project_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn create_link(
        &self,
        session: &Session,
        link: NewLinkRecord,
    ) -> Result<LinkRecord, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "create_link")?;
        let id = state.issue_id();
        let record = LinkRecord {
            id,
            source_card_id: link.source_card_id,
            target_card_id: link.target_card_id,
            source_handle: link.source_handle,
            target_handle: link.target_handle,
            project_id: link.project_id,
        };
        state.links.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_link(&self, session: &Session, link_id: i64) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "delete_link")?;
        state
            .links
            .remove(&link_id)
            .ok_or_else(|| BackendError::not_found(format!("link {link_id}")))?;
        Ok(())
    }

    async fn upload_files(
        &self,
        session: &Session,
        card_type: CardType,
        entity_id: i64,
        files: Vec<FileAttachment>,
    ) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "upload_files")?;
        let exists = match card_type {
            CardType::Source => state.sources.contains_key(&entity_id),
            CardType::Question => state.questions.contains_key(&entity_id),
            CardType::Insight => state.insights.contains_key(&entity_id),
            CardType::Thought => state.thoughts.contains_key(&entity_id),
        };
        if !exists {
            return Err(BackendError::not_found(format!(
                "{card_type} {entity_id}"
            )));
        }
        let urls = state.files.entry((card_type, entity_id)).or_default();
        for file in &files {
            urls.push(format!("files/{card_type}/{entity_id}/{}", file.name));
        }
        Ok(urls.clone())
    }

    async fn fetch_custom_options(
        &self,
        session: &Session,
        option_type: &str,
    ) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "fetch_custom_options")?;
        Ok(state
            .custom_options
            .get(option_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_custom_option(
        &self,
        session: &Session,
        option_type: &str,
        value: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        self.enter(&mut state, session, "save_custom_option")?;
        let options = state
            .custom_options
            .entry(option_type.to_string())
            .or_default();
        if !options.iter().any(|v| v == value) {
            options.push(value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("test-token", 1)
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_across_collections() {
        let backend = InMemoryBackend::new();
        let s = session();

        let citation_id = backend
            .create_citation(&s, Citation::default())
            .await
            .unwrap();
        let question_id = backend
            .create_question(&s, QuestionPayload::default())
            .await
            .unwrap();

        assert!(question_id > citation_id);
    }

    #[tokio::test]
    async fn test_empty_token_is_unauthorized() {
        let backend = InMemoryBackend::new();
        let bad = Session::new("", 1);

        let err = backend.fetch_cards(&bad, 1).await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));
    }

    #[tokio::test]
    async fn test_fail_next_fails_exactly_once() {
        let backend = InMemoryBackend::new();
        let s = session();
        backend.fail_next("create_question");

        let err = backend
            .create_question(&s, QuestionPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));

        backend
            .create_question(&s, QuestionPayload::default())
            .await
            .unwrap();
        assert_eq!(backend.calls("create_question"), 2);
    }

    #[tokio::test]
    async fn test_upload_requires_existing_entity() {
        let backend = InMemoryBackend::new();
        let s = session();

        let err = backend
            .upload_files(
                &s,
                CardType::Insight,
                404,
                vec![FileAttachment::new("a.txt", vec![1])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));

        let id = backend
            .create_insight(&s, InsightPayload::default())
            .await
            .unwrap();
        let urls = backend
            .upload_files(
                &s,
                CardType::Insight,
                id,
                vec![FileAttachment::new("a.txt", vec![1])],
            )
            .await
            .unwrap();
        assert_eq!(urls, vec![format!("files/insight/{id}/a.txt")]);
    }

    #[tokio::test]
    async fn test_custom_options_deduplicate() {
        let backend = InMemoryBackend::new();
        let s = session();

        backend
            .save_custom_option(&s, "question_category", "Rhetorical")
            .await
            .unwrap();
        backend
            .save_custom_option(&s, "question_category", "Rhetorical")
            .await
            .unwrap();

        let options = backend
            .fetch_custom_options(&s, "question_category")
            .await
            .unwrap();
        assert_eq!(options, vec!["Rhetorical"]);
    }

    #[tokio::test]
    async fn test_fetch_cards_filters_by_project() {
        let backend = InMemoryBackend::new();
        let s = session();
        let q = backend
            .create_question(&s, QuestionPayload::default())
            .await
            .unwrap();
        backend
            .create_card(
                &s,
                NewCardRecord {
                    card_type: CardType::Question,
                    data_id: q,
                    position_x: 1.0,
                    position_y: 2.0,
                    project_id: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(backend.fetch_cards(&s, 1).await.unwrap().len(), 1);
        assert!(backend.fetch_cards(&s, 2).await.unwrap().is_empty());
    }
}
