//! Execution state events and notifiers.
//!
//! Observers receive the state of each execution as it moves through its
//! steps. Exactly one terminal state (`Finished`, `Cancelled` or `Failure`)
//! is emitted per execution, and it is the last event for that workflow.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// State of a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
  /// Execution is at `pc`; `-1` before the first step.
  Running { workflow_id: String, pc: i64 },

  /// Execution reached the end of the program or a stop signal.
  Finished { workflow_id: String, log: String },

  /// Execution was cancelled from outside.
  Cancelled { workflow_id: String, log: String },

  /// A step failed under the stop policy, or the run aborted.
  Failure {
    workflow_id: String,
    pc: i64,
    log: String,
  },
}

impl ExecutionState {
  pub fn workflow_id(&self) -> &str {
    match self {
      Self::Running { workflow_id, .. }
      | Self::Finished { workflow_id, .. }
      | Self::Cancelled { workflow_id, .. }
      | Self::Failure { workflow_id, .. } => workflow_id,
    }
  }

  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Running { .. })
  }

  /// Log text carried by terminal states.
  pub fn log(&self) -> Option<&str> {
    match self {
      Self::Running { .. } => None,
      Self::Finished { log, .. } | Self::Cancelled { log, .. } | Self::Failure { log, .. } => {
        Some(log)
      }
    }
  }
}

/// Receives execution state events.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, state: ExecutionState);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _state: ExecutionState) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionState>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionState>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, state: ExecutionState) {
    // Receiver may have been dropped
    let _ = self.sender.send(state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_state_serialization() {
    let state = ExecutionState::Failure {
      workflow_id: "wf".to_string(),
      pc: 2,
      log: "boom".to_string(),
    };
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["state"], "failure");
    assert_eq!(json["pc"], 2);
    assert!(state.is_terminal());
    assert_eq!(state.log(), Some("boom"));
  }

  #[test]
  fn test_channel_notifier_forwards() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    notifier.notify(ExecutionState::Running {
      workflow_id: "wf".to_string(),
      pc: -1,
    });
    let state = rx.try_recv().unwrap();
    assert_eq!(state.workflow_id(), "wf");
    assert!(!state.is_terminal());
  }
}
