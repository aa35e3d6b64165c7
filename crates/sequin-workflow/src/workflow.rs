use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WorkflowError;

/// A single step in a workflow.
///
/// The `type_id` selects the step implementation from the step registry.
/// Parameters are passed through as raw JSON values; string parameters may
/// contain `{{stepId.outputId}}` or `[[name]]` references that are resolved
/// just before the step runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub id: String,
  pub type_id: String,
  #[serde(default)]
  pub parameters: HashMap<String, Value>,
}

impl Step {
  pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      type_id: type_id.into(),
      parameters: HashMap::new(),
    }
  }

  /// Builder-style helper to attach a parameter.
  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.parameters.insert(key.into(), value.into());
    self
  }
}

/// An ordered list of steps executed by a program counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl Workflow {
  pub fn new(workflow_id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      name: name.into(),
      steps,
    }
  }

  /// Parse a workflow from JSON and validate it.
  pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
    let workflow: Workflow = serde_json::from_str(json)?;
    workflow.validate()?;
    Ok(workflow)
  }

  /// Check that every step has a non-empty, unique id.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for (position, step) in self.steps.iter().enumerate() {
      if step.id.is_empty() {
        return Err(WorkflowError::EmptyStepId {
          workflow_id: self.workflow_id.clone(),
          position,
        });
      }
      if !seen.insert(step.id.as_str()) {
        return Err(WorkflowError::DuplicateStepId {
          workflow_id: self.workflow_id.clone(),
          step_id: step.id.clone(),
        });
      }
    }
    Ok(())
  }

  pub fn get_step(&self, step_id: &str) -> Option<&Step> {
    self.steps.iter().find(|s| s.id == step_id)
  }

  /// Position of a step in the program.
  pub fn position_of(&self, step_id: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.id == step_id)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_workflow_json() {
    let json = r#"{
      "workflow_id": "wf-1",
      "name": "Greeting",
      "steps": [
        { "id": "a", "type_id": "system.log", "parameters": { "message": "hi" } },
        { "id": "b", "type_id": "logic.stop" }
      ]
    }"#;

    let workflow = Workflow::from_json(json).unwrap();
    assert_eq!(workflow.len(), 2);
    assert_eq!(workflow.steps[0].parameters.get("message"), Some(&json!("hi")));
    assert!(workflow.steps[1].parameters.is_empty());
    assert_eq!(workflow.position_of("b"), Some(1));
  }

  #[test]
  fn test_duplicate_step_id_rejected() {
    let workflow = Workflow::new(
      "wf",
      "dup",
      vec![Step::new("a", "system.log"), Step::new("a", "system.log")],
    );

    let err = workflow.validate().unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateStepId { ref step_id, .. } if step_id == "a"));
  }

  #[test]
  fn test_empty_step_id_rejected() {
    let workflow = Workflow::new("wf", "empty", vec![Step::new("", "system.log")]);
    assert!(matches!(
      workflow.validate(),
      Err(WorkflowError::EmptyStepId { position: 0, .. })
    ));
  }
}
