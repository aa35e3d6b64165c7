//! Calling another workflow.

use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{
  CallError, ExecutionContext, ExecutionResult, OutputDefinition, OutputType, ProgressSink,
  ProgressUpdate, StepAction,
};
use sequin_workflow::Step;

/// Run the workflow named by `workflow_id` and expose its return value as
/// the `result` output.
pub struct CallWorkflow;

#[async_trait]
impl StepAction for CallWorkflow {
  fn type_id(&self) -> &str {
    "system.call_workflow"
  }

  fn name(&self) -> &str {
    "Call workflow"
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    vec![OutputDefinition::new("result", "Return value", OutputType::Any)]
  }

  async fn execute(&self, ctx: &ExecutionContext, progress: &ProgressSink) -> ExecutionResult {
    let Some(workflow_id) = ctx.input_str("workflow_id") else {
      return ExecutionResult::failure("Invalid call", "'workflow_id' is required");
    };
    let Some(caller) = ctx.caller.as_ref() else {
      return ExecutionResult::failure("Invalid call", CallError::Unavailable.to_string());
    };

    progress(ProgressUpdate::new(format!("calling {workflow_id}")));
    match caller.call_workflow(&workflow_id, ctx).await {
      Ok(value) => ExecutionResult::output("result", value.unwrap_or(Value::Null)),
      Err(err) => ExecutionResult::failure("Sub-workflow failed", err.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{context_at, no_progress};
  use serde_json::json;
  use sequin_step::WorkflowCaller;
  use std::sync::Arc;

  struct FixedCaller(Result<Option<Value>, &'static str>);

  #[async_trait]
  impl WorkflowCaller for FixedCaller {
    async fn call_workflow(
      &self,
      workflow_id: &str,
      parent: &ExecutionContext,
    ) -> Result<Option<Value>, CallError> {
      assert_eq!(workflow_id, "child");
      assert_eq!(parent.step_id, "call");
      match &self.0 {
        Ok(value) => Ok(value.clone()),
        Err(message) => Err(CallError::Failed {
          title: "Child".to_string(),
          message: message.to_string(),
        }),
      }
    }
  }

  fn call_context(caller: FixedCaller) -> ExecutionContext {
    let step = Step::new("call", "system.call_workflow").with_param("workflow_id", "child");
    let mut ctx = context_at(vec![step], 0);
    ctx.caller = Some(Arc::new(caller));
    ctx
  }

  #[tokio::test]
  async fn test_return_value_becomes_result() {
    let ctx = call_context(FixedCaller(Ok(Some(json!(42)))));
    assert_eq!(
      CallWorkflow.execute(&ctx, &no_progress).await,
      ExecutionResult::output("result", 42)
    );
  }

  #[tokio::test]
  async fn test_callee_failure_becomes_failure() {
    let ctx = call_context(FixedCaller(Err("went wrong")));
    let result = CallWorkflow.execute(&ctx, &no_progress).await;
    assert_eq!(
      result,
      ExecutionResult::failure("Sub-workflow failed", "Child: went wrong")
    );
  }

  #[tokio::test]
  async fn test_missing_caller_fails() {
    let step = Step::new("call", "system.call_workflow").with_param("workflow_id", "child");
    let ctx = context_at(vec![step], 0);
    assert_eq!(
      CallWorkflow.execute(&ctx, &no_progress).await,
      ExecutionResult::failure(
        "Invalid call",
        "sub-workflow calls are not available in this context"
      )
    );
  }
}
