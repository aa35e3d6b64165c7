//! Named variables shared across the whole call chain.

use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{
  ExecutionContext, ExecutionResult, OutputDefinition, OutputType, ProgressSink, StepAction,
};
use sequin_workflow::Step;

fn variable_name(ctx: &ExecutionContext) -> Result<String, ExecutionResult> {
  match ctx.input_str("name") {
    Some(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
    _ => Err(ExecutionResult::failure("Invalid variable", "'name' is required")),
  }
}

fn value_output() -> Vec<OutputDefinition> {
  vec![OutputDefinition::new("value", "Value", OutputType::Any)]
}

/// Define (or redefine) a named variable.
pub struct CreateVariable;

#[async_trait]
impl StepAction for CreateVariable {
  fn type_id(&self) -> &str {
    "data.variable.create"
  }

  fn name(&self) -> &str {
    "Create variable"
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    value_output()
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let name = match variable_name(ctx) {
      Ok(name) => name,
      Err(failure) => return failure,
    };
    let value = ctx.input("value").cloned().unwrap_or(Value::Null);
    ctx.named_variables.set(name, value.clone());
    ExecutionResult::output("value", value)
  }
}

/// Change an existing named variable.
pub struct ModifyVariable;

#[async_trait]
impl StepAction for ModifyVariable {
  fn type_id(&self) -> &str {
    "data.variable.modify"
  }

  fn name(&self) -> &str {
    "Modify variable"
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    value_output()
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let name = match variable_name(ctx) {
      Ok(name) => name,
      Err(failure) => return failure,
    };
    if !ctx.named_variables.contains(&name) {
      return ExecutionResult::failure("Unknown variable", format!("'{name}' is not defined"));
    }
    let value = ctx.input("value").cloned().unwrap_or(Value::Null);
    ctx.named_variables.set(name, value.clone());
    ExecutionResult::output("value", value)
  }
}

/// Read a named variable into the `value` output.
pub struct GetVariable;

#[async_trait]
impl StepAction for GetVariable {
  fn type_id(&self) -> &str {
    "data.variable.get"
  }

  fn name(&self) -> &str {
    "Get variable"
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    value_output()
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let name = match variable_name(ctx) {
      Ok(name) => name,
      Err(failure) => return failure,
    };
    match ctx.named_variables.get(&name) {
      Some(value) => ExecutionResult::output("value", value),
      None => ExecutionResult::failure("Unknown variable", format!("'{name}' is not defined")),
    }
  }
}
