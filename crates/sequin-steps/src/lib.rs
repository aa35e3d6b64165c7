//! Built-in steps for sequin.
//!
//! Control flow (loops, branches, stop/return), sub-workflow calls, named
//! variables and a few system utilities. Domain steps are registered next to
//! these by the embedding application.

pub mod data;
pub mod logic;
pub mod system;

use sequin_step::StepRegistry;

/// Register every built-in step type.
pub fn register_builtins(registry: &mut StepRegistry) {
  registry.register(logic::loops::CountLoopStart);
  registry.register(logic::loops::CountLoopEnd);
  registry.register(logic::loops::ForEachStart);
  registry.register(logic::loops::ForEachEnd);
  registry.register(logic::loops::WhileStart);
  registry.register(logic::loops::WhileEnd);
  registry.register(logic::loops::BreakLoop);
  registry.register(logic::loops::ContinueLoop);
  registry.register(logic::branch::IfStart);
  registry.register(logic::branch::Else);
  registry.register(logic::branch::EndIf);
  registry.register(logic::branch::JumpTo);
  registry.register(logic::flow::StopWorkflow);
  registry.register(logic::flow::ReturnValue);
  registry.register(system::call::CallWorkflow);
  registry.register(system::delay::Delay);
  registry.register(system::log::LogMessage);
  registry.register(data::variables::CreateVariable);
  registry.register(data::variables::ModifyVariable);
  registry.register(data::variables::GetVariable);
}

/// A registry holding only the built-in steps.
pub fn builtin_registry() -> StepRegistry {
  let mut registry = StepRegistry::new();
  register_builtins(&mut registry);
  registry
}

#[cfg(test)]
pub(crate) mod test_support {
  use std::path::PathBuf;
  use std::sync::Arc;

  use serde_json::Value;
  use sequin_step::{ExecutionContext, ExecutionHandle, ProgressUpdate};
  use sequin_workflow::{Step, Workflow};

  /// Context positioned at `pc` of a workflow laid out by the built-ins.
  pub fn context_at(steps: Vec<Step>, pc: usize) -> ExecutionContext {
    let workflow = Workflow::new("wf", "test", steps);
    let registry = super::builtin_registry();
    let mut base = ExecutionContext::new(
      ExecutionHandle::new("exec"),
      "wf",
      PathBuf::from("/tmp/sequin-test"),
      Value::Null,
    );
    base.layout = Arc::new(registry.layout(&workflow));
    base.for_step(&workflow.steps[pc], pc)
  }

  pub fn no_progress(_update: ProgressUpdate) {}
}
