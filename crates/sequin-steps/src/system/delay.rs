use std::time::Duration;

use async_trait::async_trait;
use sequin_step::{ExecutionContext, ExecutionResult, ProgressSink, ProgressUpdate, StepAction};

/// Wait for `duration_ms` milliseconds, or until the execution is cancelled.
pub struct Delay;

#[async_trait]
impl StepAction for Delay {
  fn type_id(&self) -> &str {
    "system.delay"
  }

  fn name(&self) -> &str {
    "Delay"
  }

  async fn execute(&self, ctx: &ExecutionContext, progress: &ProgressSink) -> ExecutionResult {
    let millis = match ctx.input_f64("duration_ms") {
      Some(ms) if ms >= 0.0 => ms as u64,
      _ => return ExecutionResult::failure("Invalid delay", "'duration_ms' must be >= 0"),
    };

    progress(ProgressUpdate::new(format!("waiting {millis}ms")));
    tokio::select! {
      _ = ctx.execution.cancelled() => {
        ExecutionResult::failure("Delay interrupted", "execution cancelled")
      }
      _ = tokio::time::sleep(Duration::from_millis(millis)) => ExecutionResult::done(),
    }
  }
}
