//! In-memory graph state and the canvas event channel.

pub mod card_store;
pub mod error;
pub mod events;

pub use card_store::CardStore;
pub use error::StoreError;
pub use events::CanvasEvent;
