//! Steps that end a workflow early.

use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{ExecutionContext, ExecutionResult, ExecutionSignal, ProgressSink, StepAction};

/// Stop the whole execution, callers included. Reported as finished.
pub struct StopWorkflow;

#[async_trait]
impl StepAction for StopWorkflow {
  fn type_id(&self) -> &str {
    "logic.stop"
  }

  fn name(&self) -> &str {
    "Stop workflow"
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    if let Some(reason) = ctx.input_str("reason") {
      ctx.log().info("stop", reason);
    }
    ExecutionResult::signal(ExecutionSignal::Stop)
  }
}

/// End the current workflow and return `value` to the caller.
pub struct ReturnValue;

#[async_trait]
impl StepAction for ReturnValue {
  fn type_id(&self) -> &str {
    "logic.return"
  }

  fn name(&self) -> &str {
    "Stop and return"
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let value = ctx.input("value").cloned().unwrap_or(Value::Null);
    ExecutionResult::signal(ExecutionSignal::Return { value })
  }
}
