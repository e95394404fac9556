//! Cardboard Core Engine
//!
//! This crate provides the graph state engine behind the Cardboard canvas: a
//! free-form 2D surface of typed cards (source material, question, insight,
//! thought) connected by directed links, with every mutation mirrored to a
//! backend persistence service.
//!
//! # Architecture
//!
//! - **Optimistic local state**: [`store::CardStore`] is the authoritative
//!   in-memory graph; mutations apply synchronously, backend confirmation
//!   follows asynchronously.
//! - **Two-phase identity**: cards and links are born with client-generated
//!   local ids and rebound to backend-issued ids once persisted.
//! - **Typed payloads**: one payload variant per card type - a card's type
//!   never changes after creation.
//! - **Trait-boundary backend**: services talk to
//!   [`backend::CardBackend`], never to a transport.
//!
//! # Modules
//!
//! - [`models`] - Data structures (Card, CardLink, ChatSession, payloads)
//! - [`store`] - In-memory graph state and canvas events
//! - [`backend`] - Persistence service trait and in-memory implementation
//! - [`services`] - Placement, guided chat, link, sync, and gateway services
//! - [`config`] - Runtime engine configuration

pub mod backend;
pub mod config;
pub mod models;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use backend::{BackendError, CardBackend, InMemoryBackend, Session};
pub use config::EngineConfig;
pub use models::*;
pub use services::*;
pub use store::{CanvasEvent, CardStore, StoreError};
