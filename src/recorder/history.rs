//! Recorder trait and the default in-memory recorder.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::parser::HttpRequest;
use crate::recorder::snapshot::RequestSnapshot;

/// Observes requests dispatched by a server.
///
/// Implementations must not fail: recording happens on the dispatch path
/// before the handler runs.
pub trait HistoryRecorder: Send + Sync {
    /// Capture a snapshot of `request` and append it to the history.
    fn record(&self, request: &HttpRequest);

    /// The most recently recorded request, if any.
    fn last_request(&self) -> Option<RequestSnapshot>;

    /// All recorded requests, oldest first.
    fn requests(&self) -> Vec<RequestSnapshot>;

    /// Forget every recorded request.
    fn reset(&self);
}

/// In-memory request history.
///
/// `Recorder` is a handle: clones share one history, which is how a single
/// recorder is attached to several servers. [`Recorder::new`] always creates
/// a fresh, unshared history.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    history: Arc<Mutex<Vec<RequestSnapshot>>>,
}

impl Recorder {
    /// Create a recorder with an empty history of its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded requests.
    pub fn len(&self) -> usize {
        self.history().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.history().is_empty()
    }

    /// Whether `other` is a handle onto the same history.
    pub fn shares_history_with(&self, other: &Recorder) -> bool {
        Arc::ptr_eq(&self.history, &other.history)
    }

    fn history(&self) -> MutexGuard<'_, Vec<RequestSnapshot>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HistoryRecorder for Recorder {
    fn record(&self, request: &HttpRequest) {
        let snapshot = RequestSnapshot::capture(request);
        self.history().push(snapshot);
    }

    fn last_request(&self) -> Option<RequestSnapshot> {
        self.history().last().cloned()
    }

    fn requests(&self) -> Vec<RequestSnapshot> {
        self.history().clone()
    }

    fn reset(&self) {
        self.history().clear();
    }
}
