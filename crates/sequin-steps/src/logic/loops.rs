//! Loop blocks: counted, for-each and while, plus break and continue.
//!
//! Loop-start steps push a [`LoopState`] and signal `Loop(Start)`; loop-end
//! steps signal `Loop(End)` and the interpreter decides whether to repeat.
//! While loops keep no state and jump back to their start instead.

use async_trait::async_trait;
use serde_json::Value;
use sequin_step::{
  ExecutionContext, ExecutionResult, ExecutionSignal, LoopState, OutputDefinition, OutputType,
  ProgressSink, StepAction,
};
use sequin_workflow::{BlockBehavior, Step};

use super::condition;
use super::pairing::{COUNT_LOOP, FOR_EACH, WHILE};

/// Jump past the end of the block started at the current step.
fn skip_block(ctx: &ExecutionContext, pairing: &str) -> ExecutionResult {
  match ctx.layout.find_block_end(ctx.pc, pairing) {
    Some(end) => ExecutionResult::jump(end + 1),
    None => unmatched(pairing),
  }
}

fn unmatched(pairing: &str) -> ExecutionResult {
  ExecutionResult::failure(
    "Block structure",
    format!("no matching '{pairing}' block for this step"),
  )
}

/// Repeat the enclosed steps `count` times.
pub struct CountLoopStart;

#[async_trait]
impl StepAction for CountLoopStart {
  fn type_id(&self) -> &str {
    "logic.loop.start"
  }

  fn name(&self) -> &str {
    "Loop"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::start(COUNT_LOOP).looping()
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    vec![
      OutputDefinition::new("loop_index", "Current iteration", OutputType::Number),
      OutputDefinition::new("loop_total", "Total iterations", OutputType::Number),
    ]
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let Some(count) = ctx.input_f64("count").filter(|count| count.is_finite()) else {
      return ExecutionResult::failure("Invalid loop", "'count' must be a number");
    };

    let total = count.floor();
    if total < 1.0 {
      return skip_block(ctx, COUNT_LOOP);
    }

    ctx.loop_stack.push(LoopState::count(ctx.pc, total as u64));
    ExecutionResult::loop_start()
  }
}

pub struct CountLoopEnd;

#[async_trait]
impl StepAction for CountLoopEnd {
  fn type_id(&self) -> &str {
    "logic.loop.end"
  }

  fn name(&self) -> &str {
    "End loop"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::end(COUNT_LOOP).looping()
  }

  async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    ExecutionResult::loop_end()
  }
}

/// Repeat the enclosed steps once per item of a list.
pub struct ForEachStart;

impl ForEachStart {
  fn items(ctx: &ExecutionContext) -> Result<Vec<Value>, String> {
    match ctx.input("items") {
      Some(Value::Array(items)) => Ok(items.clone()),
      Some(Value::String(text)) => serde_json::from_str::<Vec<Value>>(text)
        .map_err(|_| format!("'items' is not a list: {text}")),
      Some(other) => Err(format!("'items' is not a list: {other}")),
      None => Err("'items' is required".to_string()),
    }
  }
}

#[async_trait]
impl StepAction for ForEachStart {
  fn type_id(&self) -> &str {
    "logic.foreach.start"
  }

  fn name(&self) -> &str {
    "For each"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::start(FOR_EACH).looping()
  }

  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    vec![
      OutputDefinition::new("index", "Current index", OutputType::Number),
      OutputDefinition::new("item", "Current item", OutputType::Any),
    ]
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let items = match Self::items(ctx) {
      Ok(items) => items,
      Err(message) => return ExecutionResult::failure("Invalid loop", message),
    };

    if items.is_empty() {
      return skip_block(ctx, FOR_EACH);
    }

    ctx.loop_stack.push(LoopState::for_each(ctx.pc, items));
    ExecutionResult::loop_start()
  }
}

pub struct ForEachEnd;

#[async_trait]
impl StepAction for ForEachEnd {
  fn type_id(&self) -> &str {
    "logic.foreach.end"
  }

  fn name(&self) -> &str {
    "End for each"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::end(FOR_EACH).looping()
  }

  async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    ExecutionResult::loop_end()
  }
}

/// Repeat the enclosed steps while a condition holds.
pub struct WhileStart;

#[async_trait]
impl StepAction for WhileStart {
  fn type_id(&self) -> &str {
    "logic.while.start"
  }

  fn name(&self) -> &str {
    "While"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::start(WHILE).looping()
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    match condition::evaluate(ctx) {
      Ok(true) => ExecutionResult::loop_start(),
      Ok(false) => skip_block(ctx, WHILE),
      Err(message) => ExecutionResult::failure("Invalid condition", message),
    }
  }
}

pub struct WhileEnd;

#[async_trait]
impl StepAction for WhileEnd {
  fn type_id(&self) -> &str {
    "logic.while.end"
  }

  fn name(&self) -> &str {
    "End while"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::end(WHILE).looping()
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    match ctx.layout.find_block_start(ctx.pc, WHILE) {
      Some(start) => ExecutionResult::jump(start),
      None => unmatched(WHILE),
    }
  }
}

/// Leave the innermost loop.
pub struct BreakLoop;

#[async_trait]
impl StepAction for BreakLoop {
  fn type_id(&self) -> &str {
    "logic.break"
  }

  fn name(&self) -> &str {
    "Break"
  }

  async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    ExecutionResult::signal(ExecutionSignal::Break)
  }
}

/// Skip to the next iteration of the innermost loop.
pub struct ContinueLoop;

#[async_trait]
impl StepAction for ContinueLoop {
  fn type_id(&self) -> &str {
    "logic.continue"
  }

  fn name(&self) -> &str {
    "Continue"
  }

  async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    ExecutionResult::signal(ExecutionSignal::Continue)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{context_at, no_progress};
  use serde_json::json;

  fn count_loop(count: Value) -> Vec<Step> {
    vec![
      Step::new("loop", "logic.loop.start").with_param("count", count),
      Step::new("body", "system.log"),
      Step::new("end", "logic.loop.end"),
    ]
  }

  #[tokio::test]
  async fn test_count_loop_pushes_state() {
    let ctx = context_at(count_loop(json!(3)), 0);
    let result = CountLoopStart.execute(&ctx, &no_progress).await;

    assert_eq!(result, ExecutionResult::loop_start());
    assert_eq!(ctx.loop_stack.peek(), Some(LoopState::count(0, 3)));
  }

  #[tokio::test]
  async fn test_zero_count_skips_block() {
    let ctx = context_at(count_loop(json!("0")), 0);
    let result = CountLoopStart.execute(&ctx, &no_progress).await;

    assert_eq!(result, ExecutionResult::jump(3));
    assert!(ctx.loop_stack.is_empty());
  }

  #[tokio::test]
  async fn test_count_must_be_numeric() {
    let ctx = context_at(count_loop(json!("many")), 0);
    assert!(CountLoopStart.execute(&ctx, &no_progress).await.is_failure());
  }

  #[tokio::test]
  async fn test_count_must_be_finite() {
    for count in ["NaN", "inf", "-inf"] {
      let ctx = context_at(count_loop(json!(count)), 0);
      let result = CountLoopStart.execute(&ctx, &no_progress).await;
      assert!(result.is_failure(), "count {count} was accepted");
      assert!(ctx.loop_stack.is_empty());
    }
  }

  #[tokio::test]
  async fn test_for_each_accepts_json_string() {
    let steps = vec![
      Step::new("each", "logic.foreach.start").with_param("items", r#"["a", "b"]"#),
      Step::new("end", "logic.foreach.end"),
    ];
    let ctx = context_at(steps, 0);
    let result = ForEachStart.execute(&ctx, &no_progress).await;

    assert_eq!(result, ExecutionResult::loop_start());
    assert_eq!(
      ctx.loop_stack.peek(),
      Some(LoopState::for_each(0, vec![json!("a"), json!("b")]))
    );
  }

  #[tokio::test]
  async fn test_empty_for_each_skips_block() {
    let steps = vec![
      Step::new("each", "logic.foreach.start").with_param("items", json!([])),
      Step::new("end", "logic.foreach.end"),
      Step::new("after", "system.log"),
    ];
    let ctx = context_at(steps, 0);
    assert_eq!(
      ForEachStart.execute(&ctx, &no_progress).await,
      ExecutionResult::jump(2)
    );
  }

  #[tokio::test]
  async fn test_while_end_jumps_to_start() {
    let steps = vec![
      Step::new("w", "logic.while.start").with_param("input", true),
      Step::new("body", "system.log"),
      Step::new("end", "logic.while.end"),
    ];
    let start = context_at(steps.clone(), 0);
    assert_eq!(
      WhileStart.execute(&start, &no_progress).await,
      ExecutionResult::loop_start()
    );

    let end = context_at(steps, 2);
    assert_eq!(WhileEnd.execute(&end, &no_progress).await, ExecutionResult::jump(0));
  }

  #[tokio::test]
  async fn test_unmatched_start_fails() {
    let steps = vec![Step::new("loop", "logic.loop.start").with_param("count", 0)];
    let ctx = context_at(steps, 0);
    assert!(CountLoopStart.execute(&ctx, &no_progress).await.is_failure());
  }
}
