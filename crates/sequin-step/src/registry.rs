use std::collections::HashMap;
use std::sync::Arc;

use sequin_workflow::{BlockBehavior, BlockLayout, Workflow};
use tracing::{debug, warn};

use crate::StepAction;

/// Lookup from step type id to implementation.
#[derive(Clone, Default)]
pub struct StepRegistry {
  actions: HashMap<String, Arc<dyn StepAction>>,
}

impl StepRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a step type. A previous registration under the same id is
  /// replaced and `false` is returned.
  pub fn register<A: StepAction + 'static>(&mut self, action: A) -> bool {
    self.register_arc(Arc::new(action))
  }

  pub fn register_arc(&mut self, action: Arc<dyn StepAction>) -> bool {
    let type_id = action.type_id().to_string();
    let replaced = self.actions.insert(type_id.clone(), action).is_some();
    if replaced {
      warn!(type_id = %type_id, "step type registered twice, replacing");
    } else {
      debug!(type_id = %type_id, "step type registered");
    }
    !replaced
  }

  pub fn lookup(&self, type_id: &str) -> Option<Arc<dyn StepAction>> {
    self.actions.get(type_id).cloned()
  }

  pub fn contains(&self, type_id: &str) -> bool {
    self.actions.contains_key(type_id)
  }

  /// Remove every registration.
  pub fn reset(&mut self) {
    self.actions.clear();
  }

  /// Registered ids, sorted.
  pub fn type_ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.actions.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Block behavior of a step type; unknown types behave as plain steps.
  pub fn behavior(&self, type_id: &str) -> BlockBehavior {
    self
      .actions
      .get(type_id)
      .map(|action| action.block_behavior())
      .unwrap_or_else(BlockBehavior::none)
  }

  /// Block layout of a workflow under this registry.
  pub fn layout(&self, workflow: &Workflow) -> BlockLayout {
    BlockLayout::new(
      workflow
        .steps
        .iter()
        .map(|step| self.behavior(&step.type_id))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ExecutionContext, ExecutionResult, ProgressSink};
  use async_trait::async_trait;
  use sequin_workflow::{BlockKind, Step};

  struct Marker(&'static str, BlockBehavior);

  #[async_trait]
  impl StepAction for Marker {
    fn type_id(&self) -> &str {
      self.0
    }

    fn block_behavior(&self) -> BlockBehavior {
      self.1.clone()
    }

    async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
      ExecutionResult::done()
    }
  }

  #[test]
  fn test_register_lookup_reset() {
    let mut registry = StepRegistry::new();
    assert!(registry.register(Marker("b", BlockBehavior::none())));
    assert!(registry.register(Marker("a", BlockBehavior::none())));
    assert!(!registry.register(Marker("a", BlockBehavior::none())));

    assert_eq!(registry.type_ids(), vec!["a", "b"]);
    assert!(registry.lookup("a").is_some());
    assert!(registry.lookup("c").is_none());

    registry.reset();
    assert!(registry.is_empty());
  }

  #[test]
  fn test_layout_treats_unknown_types_as_plain() {
    let mut registry = StepRegistry::new();
    registry.register(Marker("open", BlockBehavior::start("x")));
    registry.register(Marker("close", BlockBehavior::end("x")));

    let workflow = Workflow::new(
      "wf",
      "layout",
      vec![
        Step::new("1", "open"),
        Step::new("2", "mystery"),
        Step::new("3", "close"),
      ],
    );

    let layout = registry.layout(&workflow);
    assert_eq!(layout.behavior(1).unwrap().kind, BlockKind::None);
    assert_eq!(layout.find_block_end(0, "x"), Some(2));
  }
}
