/// Errors that can occur when working with workflow definitions.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
  /// Two steps share the same id.
  #[error("duplicate step id '{step_id}' in workflow '{workflow_id}'")]
  DuplicateStepId {
    workflow_id: String,
    step_id: String,
  },

  /// A step is missing its id.
  #[error("step at position {position} in workflow '{workflow_id}' has an empty id")]
  EmptyStepId {
    workflow_id: String,
    position: usize,
  },

  /// The workflow definition could not be parsed.
  #[error("invalid workflow definition: {0}")]
  Parse(#[from] serde_json::Error),
}
