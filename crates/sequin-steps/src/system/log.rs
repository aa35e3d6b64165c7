use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{
  ExecutionContext, ExecutionResult, OutputDefinition, OutputType, ProgressSink, StepAction,
};
use sequin_workflow::Step;

/// Write `message` to the execution log and pass it through as an output.
pub struct LogMessage;

#[async_trait]
impl StepAction for LogMessage {
  fn type_id(&self) -> &str {
    "system.log"
  }

  fn name(&self) -> &str {
    "Log"
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    vec![OutputDefinition::new("message", "Message", OutputType::Any)]
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let message = ctx.input("message").cloned().unwrap_or(Value::Null);
    let text = match &message {
      Value::String(s) => s.clone(),
      Value::Null => String::new(),
      other => other.to_string(),
    };
    ctx.log().info("workflow", format!("{}: {text}", ctx.step_id));
    ExecutionResult::output("message", message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{context_at, no_progress};
  use serde_json::json;

  #[tokio::test]
  async fn test_logs_and_outputs_typed_message() {
    let step = Step::new("say", "system.log").with_param("message", "{{loop.loop_index}}");
    let mut ctx = context_at(vec![step], 0);
    ctx.magic_variables.insert("message".to_string(), json!(2));

    assert_eq!(
      LogMessage.execute(&ctx, &no_progress).await,
      ExecutionResult::output("message", 2)
    );
    assert!(ctx.log().text().contains("I/workflow: say: 2"));
  }
}
