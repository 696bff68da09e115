//! Session operation state
//!
//! One process-wide state machine tracking which long-running session
//! operation is currently in progress, behind thread-safe accessors.
//!
//! Transition table:
//!
//! | current          | `begin(op)`        | `end(op)`                  |
//! |------------------|--------------------|----------------------------|
//! | `Idle`           | -> `InProgress(op)` | rejected                  |
//! | `InProgress(op)` | rejected           | -> `Idle`                  |
//! | `InProgress(x)`  | rejected           | rejected unless `x == op`  |
//!
//! Rejected transitions return `false` and leave the state unchanged, so a
//! re-entrant begin (say, a second shutdown signal while the shutdown
//! snapshot pass is still running) is an observable no-op instead of a
//! silently re-run operation.

use std::sync::{Mutex, OnceLock};

/// Operations tracked by the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Save,
    Cut,
    Paste,
    Undo,
    Redo,
    Snapshot,
}

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    InProgress(SessionOp),
}

/// Thread-safe session state holder
#[derive(Debug, Default)]
pub struct SessionState {
    phase: Mutex<SessionPhase>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `InProgress(op)`. Returns false (and changes nothing) unless
    /// the session is currently idle.
    pub fn begin(&self, op: SessionOp) -> bool {
        let mut phase = self.phase.lock().unwrap();
        if *phase != SessionPhase::Idle {
            return false;
        }
        *phase = SessionPhase::InProgress(op);
        true
    }

    /// Return to `Idle`. Returns false (and changes nothing) unless `op` is
    /// the operation currently in progress.
    pub fn end(&self, op: SessionOp) -> bool {
        let mut phase = self.phase.lock().unwrap();
        if *phase != SessionPhase::InProgress(op) {
            return false;
        }
        *phase = SessionPhase::Idle;
        true
    }

    pub fn current(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    pub fn is_idle(&self) -> bool {
        self.current() == SessionPhase::Idle
    }

    pub fn is_in_progress(&self, op: SessionOp) -> bool {
        self.current() == SessionPhase::InProgress(op)
    }
}

static SESSION: OnceLock<SessionState> = OnceLock::new();

/// The process-wide session state.
pub fn session() -> &'static SessionState {
    SESSION.get_or_init(SessionState::new)
}
