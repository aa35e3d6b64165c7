//! Sub-workflow calls.

use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{CallError, ExecutionContext, WorkflowCaller};

use crate::{Interpreter, RunOutcome, RuntimeError};

impl Interpreter {
  /// Run the workflow stored under `workflow_id` as a callee of the frame
  /// that `parent` belongs to.
  ///
  /// The callee starts with empty step outputs and loop state and shares
  /// named variables, work directory, trigger data and cancellation with the
  /// caller.
  pub async fn call_sub_workflow(
    &self,
    workflow_id: &str,
    parent: &ExecutionContext,
  ) -> Result<RunOutcome, RuntimeError> {
    let Some(workflow) = self.workflows().get(workflow_id) else {
      return Err(RuntimeError::WorkflowNotFound {
        workflow_id: workflow_id.to_string(),
      });
    };

    let limit = self.config().max_call_depth;
    if parent.call_depth() >= limit {
      return Err(RuntimeError::CallDepthExceeded {
        workflow_id: workflow.workflow_id.clone(),
        limit,
      });
    }

    parent.log().info(
      "call",
      format!(
        "{} -> {} (depth {})",
        parent.workflow_id,
        workflow.workflow_id,
        parent.call_depth() + 1
      ),
    );

    let frame = parent.sub_frame(workflow.workflow_id.clone());
    self.run(&workflow, frame).await
  }
}

#[async_trait]
impl WorkflowCaller for Interpreter {
  async fn call_workflow(
    &self,
    workflow_id: &str,
    parent: &ExecutionContext,
  ) -> Result<Option<Value>, CallError> {
    match self.call_sub_workflow(workflow_id, parent).await {
      Ok(RunOutcome::Completed { return_value }) => Ok(return_value),
      Ok(RunOutcome::Failed { title, message, .. }) => Err(CallError::Failed { title, message }),
      Err(RuntimeError::Cancelled) => Err(CallError::Cancelled),
      Err(RuntimeError::CallDepthExceeded { workflow_id, limit }) => {
        Err(CallError::DepthExceeded { workflow_id, limit })
      }
      Err(RuntimeError::WorkflowNotFound { workflow_id }) => Err(CallError::NotFound { workflow_id }),
      Err(err) => Err(CallError::Runtime {
        message: err.to_string(),
      }),
    }
  }
}
