//! If/else blocks and absolute jumps.

use async_trait::async_trait;
use sequin_step::{ExecutionContext, ExecutionResult, ProgressSink, StepAction};
use sequin_workflow::{BlockBehavior, BlockKind};

use super::condition;
use super::pairing::IF;

/// Run the enclosed steps only when a condition holds.
///
/// When the condition is false execution continues after the `else` step,
/// or after the end of the block when there is none.
pub struct IfStart;

#[async_trait]
impl StepAction for IfStart {
  fn type_id(&self) -> &str {
    "logic.if.start"
  }

  fn name(&self) -> &str {
    "If"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::start(IF)
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    match condition::evaluate(ctx) {
      Ok(true) => ExecutionResult::done(),
      Ok(false) => match ctx.layout.find_next_branch(ctx.pc, IF) {
        Some(branch) => ExecutionResult::jump(branch + 1),
        None => ExecutionResult::failure("Block structure", "no matching end for this 'if'"),
      },
      Err(message) => ExecutionResult::failure("Invalid condition", message),
    }
  }
}

/// Separates the true and false branches; reached only from the true branch.
pub struct Else;

#[async_trait]
impl StepAction for Else {
  fn type_id(&self) -> &str {
    "logic.if.else"
  }

  fn name(&self) -> &str {
    "Else"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::middle(IF)
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    match ctx.layout.find_block_end(ctx.pc, IF) {
      Some(end) => ExecutionResult::jump(end + 1),
      None => ExecutionResult::failure("Block structure", "no matching end for this 'else'"),
    }
  }
}

pub struct EndIf;

#[async_trait]
impl StepAction for EndIf {
  fn type_id(&self) -> &str {
    "logic.if.end"
  }

  fn name(&self) -> &str {
    "End if"
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::end(IF)
  }

  async fn execute(&self, _ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    ExecutionResult::done()
  }
}

/// Continue at an absolute step position (`target`).
pub struct JumpTo;

#[async_trait]
impl StepAction for JumpTo {
  fn type_id(&self) -> &str {
    "logic.jump"
  }

  fn name(&self) -> &str {
    "Jump"
  }

  async fn execute(&self, ctx: &ExecutionContext, _progress: &ProgressSink) -> ExecutionResult {
    let target = match ctx.input_f64("target") {
      Some(target) if target >= 0.0 && target.fract() == 0.0 => target as usize,
      _ => return ExecutionResult::failure("Invalid jump", "'target' must be a step position"),
    };

    if target > ctx.layout.len() {
      return ExecutionResult::failure(
        "Invalid jump",
        format!("target {target} is past the end of the workflow"),
      );
    }

    // Jumping onto a MIDDLE step would run the other branch's exit.
    if ctx
      .layout
      .behavior(target)
      .is_some_and(|b| b.kind == BlockKind::BlockMiddle)
    {
      return ExecutionResult::failure(
        "Invalid jump",
        format!("target {target} is inside a block separator"),
      );
    }

    ExecutionResult::jump(target)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{context_at, no_progress};
  use serde_json::json;
  use sequin_workflow::Step;

  fn if_else(input: bool) -> Vec<Step> {
    vec![
      Step::new("if", "logic.if.start")
        .with_param("input", input)
        .with_param("operator", "is_true"),
      Step::new("yes", "system.log"),
      Step::new("else", "logic.if.else"),
      Step::new("no", "system.log"),
      Step::new("end", "logic.if.end"),
    ]
  }

  #[tokio::test]
  async fn test_true_condition_enters_block() {
    let ctx = context_at(if_else(true), 0);
    assert_eq!(IfStart.execute(&ctx, &no_progress).await, ExecutionResult::done());
  }

  #[tokio::test]
  async fn test_false_condition_jumps_past_else() {
    let ctx = context_at(if_else(false), 0);
    assert_eq!(IfStart.execute(&ctx, &no_progress).await, ExecutionResult::jump(3));
  }

  #[tokio::test]
  async fn test_false_condition_without_else_jumps_past_end() {
    let steps = vec![
      Step::new("if", "logic.if.start").with_param("input", false),
      Step::new("yes", "system.log"),
      Step::new("end", "logic.if.end"),
      Step::new("after", "system.log"),
    ];
    let ctx = context_at(steps, 0);
    assert_eq!(IfStart.execute(&ctx, &no_progress).await, ExecutionResult::jump(3));
  }

  #[tokio::test]
  async fn test_else_jumps_past_end() {
    let ctx = context_at(if_else(true), 2);
    assert_eq!(Else.execute(&ctx, &no_progress).await, ExecutionResult::jump(5));
  }

  #[tokio::test]
  async fn test_jump_validates_target() {
    let steps = vec![
      Step::new("j", "logic.jump").with_param("target", json!(2)),
      Step::new("a", "system.log"),
    ];
    let ctx = context_at(steps.clone(), 0);
    assert_eq!(JumpTo.execute(&ctx, &no_progress).await, ExecutionResult::jump(2));

    let mut far = steps;
    far[0] = Step::new("j", "logic.jump").with_param("target", json!(9));
    let ctx = context_at(far, 0);
    assert!(JumpTo.execute(&ctx, &no_progress).await.is_failure());
  }
}
