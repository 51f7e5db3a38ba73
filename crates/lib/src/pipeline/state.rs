//! Run state machine.
//!
//! One pipeline run walks `Pending → Fetched → Verified → Built → Installed
//! → Complete` strictly in order; the first unrecoverable error moves any
//! non-terminal state into the absorbing `Failed` state. Each state's
//! postcondition is the next state's precondition, so no transition is ever
//! skipped.

use serde::Serialize;

/// Progress of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
  Pending,
  Fetched,
  Verified,
  Built,
  Installed,
  Complete,
  Failed,
}

impl RunState {
  /// The state a successful stage advances into, if any.
  pub fn next(self) -> Option<RunState> {
    match self {
      RunState::Pending => Some(RunState::Fetched),
      RunState::Fetched => Some(RunState::Verified),
      RunState::Verified => Some(RunState::Built),
      RunState::Built => Some(RunState::Installed),
      RunState::Installed => Some(RunState::Complete),
      RunState::Complete | RunState::Failed => None,
    }
  }

  /// Advance a non-terminal state; terminal states are left untouched.
  pub fn advance(&mut self) {
    if let Some(next) = self.next() {
      *self = next;
    }
  }

  /// Move into `Failed` from any non-terminal state.
  pub fn fail(self) -> RunState {
    if self.is_terminal() { self } else { RunState::Failed }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, RunState::Complete | RunState::Failed)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      RunState::Pending => "pending",
      RunState::Fetched => "fetched",
      RunState::Verified => "verified",
      RunState::Built => "built",
      RunState::Installed => "installed",
      RunState::Complete => "complete",
      RunState::Failed => "failed",
    }
  }
}

impl std::fmt::Display for RunState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
