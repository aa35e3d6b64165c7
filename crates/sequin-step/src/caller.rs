use async_trait::async_trait;
use serde_json::Value;

use crate::ExecutionContext;

/// Errors surfaced to a step that calls another workflow.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
  #[error("workflow '{workflow_id}' not found")]
  NotFound { workflow_id: String },

  /// The callee stopped on a failing step.
  #[error("{title}: {message}")]
  Failed { title: String, message: String },

  #[error("call depth limit of {limit} exceeded calling '{workflow_id}'")]
  DepthExceeded { workflow_id: String, limit: usize },

  #[error("execution cancelled")]
  Cancelled,

  #[error("sub-workflow call failed: {message}")]
  Runtime { message: String },

  /// The context was built without a caller.
  #[error("sub-workflow calls are not available in this context")]
  Unavailable,
}

/// Runs another workflow on behalf of a step.
///
/// The callee shares the caller's named variables, work directory and
/// cancellation but gets fresh step outputs and loop state.
#[async_trait]
pub trait WorkflowCaller: Send + Sync {
  /// Run `workflow_id` to completion and return its `Return` value, if any.
  async fn call_workflow(
    &self,
    workflow_id: &str,
    parent: &ExecutionContext,
  ) -> Result<Option<Value>, CallError>;
}
