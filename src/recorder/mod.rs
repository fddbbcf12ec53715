//! Request history.
//!
//! A recorder captures a [`RequestSnapshot`] of every request dispatched by the
//! servers it is attached to. Every server owns a default [`Recorder`]; further
//! recorders can be injected and shared between servers.

mod snapshot;
mod history;

pub use snapshot::RequestSnapshot;
pub use history::{HistoryRecorder, Recorder};
