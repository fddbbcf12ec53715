//! Mutable state owned by one server instance.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, watch};

use crate::parser::HttpRequest;
use crate::recorder::{HistoryRecorder, Recorder};
use crate::server::handler::HandlerQueue;
use crate::server::logging::ServerLogger;

/// A bound listener and the task accepting on it.
pub(crate) struct Running {
    pub(crate) addr: SocketAddr,
    pub(crate) shutdown_tx: oneshot::Sender<()>,
    pub(crate) stopped: StoppedSignal,
}

/// Flips to `true` once the accept loop has released the port and drained
/// its connections.
pub(crate) type StoppedSignal = watch::Receiver<bool>;

/// Lifecycle phase. Every phase but `Stopped` counts as listening.
///
/// The accept loop moves `Listening` and `Stopping` to `Stopped` itself when
/// it exits, so the phase settles even if no `close` call is left waiting.
pub(crate) enum Phase {
    Stopped,
    Starting,
    Listening(Running),
    Stopping(StoppedSignal),
}

pub(crate) struct ServerState {
    pub(crate) phase: Phase,
    pub(crate) port: Option<u16>,
    pub(crate) handlers: HandlerQueue,
    pub(crate) default_recorder: Recorder,
    pub(crate) recorders: Vec<Arc<dyn HistoryRecorder>>,
    pub(crate) logger: ServerLogger,
}

pub(crate) type SharedState = Arc<Mutex<ServerState>>;

impl ServerState {
    pub(crate) fn new(logger: ServerLogger, extra_recorder: Option<Arc<dyn HistoryRecorder>>) -> Self {
        Self {
            phase: Phase::Stopped,
            port: None,
            handlers: HandlerQueue::default(),
            default_recorder: Recorder::new(),
            recorders: extra_recorder.into_iter().collect(),
            logger,
        }
    }

    pub(crate) fn is_listening(&self) -> bool {
        !matches!(self.phase, Phase::Stopped)
    }

    /// Called by the accept loop on exit.
    pub(crate) fn mark_stopped(&mut self) {
        if matches!(self.phase, Phase::Listening(_) | Phase::Stopping(_)) {
            self.phase = Phase::Stopped;
        }
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.phase {
            Phase::Listening(running) => Some(running.addr),
            _ => None,
        }
    }

    /// Hand `request` to the default recorder and every attached one.
    pub(crate) fn record(&self, request: &HttpRequest) {
        self.default_recorder.record(request);
        for recorder in &self.recorders {
            recorder.record(request);
        }
    }
}

pub(crate) fn lock_state(state: &SharedState) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
