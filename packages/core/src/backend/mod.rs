//! Persistence service abstraction: the [`CardBackend`] trait and the
//! in-memory implementation used by tests and offline embedders.

pub mod api;
pub mod memory;

pub use api::{
    BackendError, CardBackend, CardRecord, LinkRecord, NewCardRecord, NewLinkRecord, Session,
};
pub use memory::InMemoryBackend;
