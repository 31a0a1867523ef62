//! State machine for tracking one publishing run
//!
//! A run moves `Start → IdentityExtracted → DuplicateChecked`, then either
//! ends in `Skipped` or goes through `Rewritten`/`NotRewritten` to `Pushed`
//! and `Done`. Any non-terminal state may move to `Failed`.

use crate::core::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Start,
    IdentityExtracted,
    DuplicateChecked,
    Skipped,
    Rewritten,
    NotRewritten,
    Pushed,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Done | Self::Failed)
    }

    /// Whether `self → to` is an edge of the run graph
    pub fn can_transition_to(self, to: RunState) -> bool {
        use RunState::*;

        if to == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, to),
            (Start, IdentityExtracted)
                | (IdentityExtracted, DuplicateChecked)
                | (DuplicateChecked, Skipped)
                | (DuplicateChecked, Rewritten)
                | (DuplicateChecked, NotRewritten)
                | (Rewritten, Skipped)
                | (NotRewritten, Skipped)
                | (Rewritten, Pushed)
                | (NotRewritten, Pushed)
                | (Pushed, Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub timestamp: DateTime<Utc>,
}

/// State machine for tracking the publishing workflow
#[derive(Debug)]
pub struct PublishStateMachine {
    run_id: Uuid,
    current_state: RunState,
    transitions: Vec<StateTransition>,
    error: Option<String>,
}

impl Default for PublishStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStateMachine {
    /// Create a new state machine in `Start`
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            current_state: RunState::Start,
            transitions: Vec::new(),
            error: None,
        }
    }

    /// Identifier of this run, used in log spans
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: RunState) -> Result<(), PublishError> {
        if !self.current_state.can_transition_to(to) {
            return Err(PublishError::InvalidTransition {
                from: self.current_state.to_string(),
                to: to.to_string(),
            });
        }

        debug!(run_id = %self.run_id, from = %self.current_state, to = %to, "state transition");

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
        });
        self.current_state = to;

        Ok(())
    }

    /// Move to `Failed`, recording the error message
    ///
    /// Already-terminal runs are left untouched.
    pub fn fail(&mut self, error: &PublishError) {
        if self.current_state.is_terminal() {
            return;
        }
        self.error = Some(error.to_string());
        // Failed is reachable from every non-terminal state
        let _ = self.transition(RunState::Failed);
    }

    /// Get current state
    pub fn state(&self) -> RunState {
        self.current_state
    }

    /// Get last error
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Get elapsed milliseconds between the first and last transition
    pub fn elapsed_millis(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {} → {}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
