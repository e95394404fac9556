//! Runtime engine configuration
//!
//! EngineConfig is the single source of truth for the engine's tunables. It
//! is built once by the embedder at startup and stays immutable for the
//! engine's lifetime; services hold it behind an `Arc`.

use crate::models::CardType;
use std::collections::HashSet;
use std::time::Duration;

/// Default settle window for debounced position writes.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Default broadcast capacity for canvas events and notices.
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Immutable engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a card must sit still before its position is persisted.
    pub debounce_window: Duration,

    /// Card types that open a guided chat session when placed. Types not in
    /// the set open the plain detail editor instead.
    pub guided_types: HashSet<CardType>,

    /// Capacity of the canvas event and notice broadcast channels.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            guided_types: CardType::ALL.into_iter().collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// True when placing a card of `card_type` should start a chat session.
    pub fn guided_enabled(&self, card_type: CardType) -> bool {
        self.guided_types.contains(&card_type)
    }

    /// Builder-style override for the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Builder-style override for the guided card types.
    pub fn with_guided_types(mut self, types: impl IntoIterator<Item = CardType>) -> Self {
        self.guided_types = types.into_iter().collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_window, Duration::from_millis(500));
        for card_type in CardType::ALL {
            assert!(config.guided_enabled(card_type));
        }
    }

    #[test]
    fn test_guided_override() {
        let config = EngineConfig::default().with_guided_types([CardType::Source]);
        assert!(config.guided_enabled(CardType::Source));
        assert!(!config.guided_enabled(CardType::Thought));
    }
}
