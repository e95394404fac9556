//! Engine services: persistence gateway, link manager, placement and guided
//! chat state machines, position synchronizer, notices.

pub mod error;
pub mod guided_chat;
pub mod link_manager;
pub mod notices;
pub mod persistence_gateway;
pub mod placement;
pub mod position_sync;

pub use error::CanvasError;
pub use guided_chat::{script_for, GuidedChatEngine, SubmitOutcome};
pub use link_manager::{ConnectOutcome, LinkManager};
pub use notices::{Notice, NoticeLevel, NoticeSink};
pub use persistence_gateway::{FinalizedContent, PersistenceGateway};
pub use placement::{PlacementController, PlacementState};
pub use position_sync::PositionSynchronizer;
