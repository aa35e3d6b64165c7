use std::collections::HashMap;
use std::sync::RwLock;

use crate::Workflow;

/// Lookup of workflow definitions by id.
///
/// Used to resolve sub-workflow calls. Persistence of definitions lives
/// outside this crate; implementations only need to answer lookups.
pub trait WorkflowStore: Send + Sync {
  fn get(&self, workflow_id: &str) -> Option<Workflow>;
}

/// In-memory workflow store.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
  workflows: RwLock<HashMap<String, Workflow>>,
}

impl MemoryWorkflowStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace a workflow definition.
  pub fn insert(&self, workflow: Workflow) {
    self
      .workflows
      .write()
      .unwrap()
      .insert(workflow.workflow_id.clone(), workflow);
  }

  pub fn remove(&self, workflow_id: &str) -> Option<Workflow> {
    self.workflows.write().unwrap().remove(workflow_id)
  }

  pub fn len(&self) -> usize {
    self.workflows.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.workflows.read().unwrap().is_empty()
  }
}

impl FromIterator<Workflow> for MemoryWorkflowStore {
  fn from_iter<I: IntoIterator<Item = Workflow>>(iter: I) -> Self {
    let store = Self::new();
    for workflow in iter {
      store.insert(workflow);
    }
    store
  }
}

impl WorkflowStore for MemoryWorkflowStore {
  fn get(&self, workflow_id: &str) -> Option<Workflow> {
    self.workflows.read().unwrap().get(workflow_id).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Step;

  #[test]
  fn test_insert_and_get() {
    let store: MemoryWorkflowStore = [
      Workflow::new("a", "A", vec![Step::new("s1", "system.log")]),
      Workflow::new("b", "B", vec![]),
    ]
    .into_iter()
    .collect();

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a").unwrap().steps.len(), 1);
    assert!(store.get("missing").is_none());

    store.remove("a");
    assert!(store.get("a").is_none());
  }
}
