//! Runtime error types.

/// Errors that abort an interpreter run.
///
/// Step failures are not errors; they are handled by the step's error policy
/// and surface as [`crate::RunOutcome::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// A called workflow does not exist.
  #[error("workflow '{workflow_id}' not found")]
  WorkflowNotFound { workflow_id: String },

  /// Sub-workflow calls nested deeper than allowed.
  #[error("call depth limit of {limit} exceeded calling '{workflow_id}'")]
  CallDepthExceeded { workflow_id: String, limit: usize },

  /// The execution work directory could not be prepared.
  #[error("failed to prepare work directory: {source}")]
  WorkDir {
    #[source]
    source: std::io::Error,
  },
}
