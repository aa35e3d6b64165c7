use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Outputs;

/// Direction of a loop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
  Start,
  End,
}

/// Control-flow request returned by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionSignal {
  /// Continue at an absolute step position.
  Jump { pc: usize },
  /// A loop block was entered or its end was reached.
  Loop { action: LoopAction },
  /// Leave the innermost enclosing loop.
  Break,
  /// Skip to the end of the innermost enclosing loop.
  Continue,
  /// Stop the whole execution; reported as finished.
  Stop,
  /// End the current workflow and hand a value back to the caller.
  Return { value: Value },
}

/// Outcome of a single step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
  Success { outputs: Outputs },
  Failure { title: String, message: String },
  Signal(ExecutionSignal),
}

impl ExecutionResult {
  pub fn success(outputs: Outputs) -> Self {
    Self::Success { outputs }
  }

  /// Success without outputs.
  pub fn done() -> Self {
    Self::Success {
      outputs: Outputs::new(),
    }
  }

  /// Success with a single output.
  pub fn output(id: impl Into<String>, value: impl Into<Value>) -> Self {
    let mut outputs = Outputs::new();
    outputs.insert(id.into(), value.into());
    Self::Success { outputs }
  }

  pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Failure {
      title: title.into(),
      message: message.into(),
    }
  }

  pub fn signal(signal: ExecutionSignal) -> Self {
    Self::Signal(signal)
  }

  pub fn jump(pc: usize) -> Self {
    Self::Signal(ExecutionSignal::Jump { pc })
  }

  pub fn loop_start() -> Self {
    Self::Signal(ExecutionSignal::Loop {
      action: LoopAction::Start,
    })
  }

  pub fn loop_end() -> Self {
    Self::Signal(ExecutionSignal::Loop {
      action: LoopAction::End,
    })
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, Self::Failure { .. })
  }
}
