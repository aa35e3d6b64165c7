//! Program-counter interpreter.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use sequin_step::{
  ExecutionContext, ExecutionLog, ExecutionResult, ExecutionSignal, LoopAction, Outputs,
  ProgressSink, ProgressUpdate, StepAction, StepRegistry,
};
use sequin_workflow::{BlockLayout, Step, Workflow, WorkflowStore};
use tracing::{Instrument, info_span};

use crate::input::resolve_parameters;
use crate::retry::{Attempted, ErrorPolicy, RetryPolicy, invoke_with_retry};
use crate::{ExecutionNotifier, ExecutionState, NoopNotifier, RuntimeConfig, RuntimeError};

const TAG: &str = "interpreter";

/// How a workflow frame ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  /// Ran off the end, or ended through a stop or return signal.
  Completed { return_value: Option<Value> },
  /// A step failed under the stop policy (or ran out of retries).
  Failed {
    pc: usize,
    title: String,
    message: String,
  },
}

/// Executes workflows step by step.
///
/// Cloning is cheap; clones share the registry, store and notifier.
#[derive(Clone)]
pub struct Interpreter {
  registry: Arc<StepRegistry>,
  workflows: Arc<dyn WorkflowStore>,
  notifier: Arc<dyn ExecutionNotifier>,
  config: RuntimeConfig,
}

impl Interpreter {
  pub fn new(registry: Arc<StepRegistry>, workflows: Arc<dyn WorkflowStore>) -> Self {
    Self {
      registry,
      workflows,
      notifier: Arc::new(NoopNotifier),
      config: RuntimeConfig::default(),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_config(mut self, config: RuntimeConfig) -> Self {
    self.config = config;
    self
  }

  pub fn registry(&self) -> &StepRegistry {
    &self.registry
  }

  pub fn workflows(&self) -> &dyn WorkflowStore {
    self.workflows.as_ref()
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Run a workflow frame to completion.
  ///
  /// `base` supplies the shared state of the frame: step outputs, named
  /// variables, loop stack and the execution handle. Only the root frame
  /// (a call stack of one) publishes `Running` events.
  pub fn run<'a>(
    &'a self,
    workflow: &'a Workflow,
    base: ExecutionContext,
  ) -> BoxFuture<'a, Result<RunOutcome, RuntimeError>> {
    let span = info_span!(
      "workflow.run",
      execution_id = %base.execution.execution_id(),
      workflow_id = %workflow.workflow_id,
      depth = base.call_depth(),
    );
    Box::pin(self.run_frame(workflow, base).instrument(span))
  }

  async fn run_frame(
    &self,
    workflow: &Workflow,
    base: ExecutionContext,
  ) -> Result<RunOutcome, RuntimeError> {
    let execution = base.execution.clone();
    let log = execution.log().clone();
    let layout = Arc::new(self.registry.layout(workflow));

    let mut frame = base;
    frame.workflow_id = workflow.workflow_id.clone();
    frame.layout = layout.clone();
    frame.caller = Some(Arc::new(self.clone()));
    let is_root = frame.is_root();

    let steps = &workflow.steps;
    let name = workflow.name.as_str();
    let mut pc = 0usize;
    let mut return_value = None;

    log.info(TAG, format!("[{name}] start ({} steps)", steps.len()));

    while pc < steps.len() {
      if execution.is_cancelled() {
        log.warn(TAG, format!("[{name}][{pc}] cancelled"));
        return Err(RuntimeError::Cancelled);
      }
      if execution.is_stopped() {
        break;
      }

      let step = &steps[pc];
      let Some(action) = self.registry.lookup(&step.type_id) else {
        log.warn(
          TAG,
          format!("[{name}][{pc}] unknown step type '{}', skipping", step.type_id),
        );
        pc += 1;
        continue;
      };

      if !frame.loop_stack.is_empty() {
        refresh_loop_outputs(&frame, &layout, steps, pc);
      }

      if is_root {
        execution.set_position(pc);
        self.notifier.notify(ExecutionState::Running {
          workflow_id: workflow.workflow_id.clone(),
          pc: pc as i64,
        });
      }

      let mut ctx = frame.for_step(step, pc);
      ctx.magic_variables =
        resolve_parameters(&step.parameters, &frame.step_outputs, &frame.named_variables);

      log.debug(TAG, format!("[{name}][{pc}] -> {} ({})", action.name(), step.id));

      let policy = RetryPolicy::from_parameters(&step.parameters, &self.config.retry);
      let progress_log = log.clone();
      let step_id = step.id.clone();
      let progress = move |update: ProgressUpdate| {
        let line = match update.percent {
          Some(percent) => format!("{step_id}: {} ({percent}%)", update.message),
          None => format!("{step_id}: {}", update.message),
        };
        progress_log.debug("progress", line);
      };

      let step_action: &dyn StepAction = action.as_ref();
      let step_ctx = &ctx;
      let progress: &ProgressSink = &progress;
      let Attempted { result, attempts } =
        invoke_with_retry(&policy, &execution, action.name(), move |_| {
          step_action.execute(step_ctx, progress)
        })
        .await?;

      // Steps (and callees) may return normally after a cancellation.
      if execution.is_cancelled() && !execution.is_stopped() {
        log.warn(TAG, format!("[{name}][{pc}] cancelled"));
        return Err(RuntimeError::Cancelled);
      }

      match result {
        ExecutionResult::Success { outputs } => {
          if !outputs.is_empty() {
            frame.step_outputs.insert(step.id.clone(), outputs);
          }
          pc += 1;
        }
        ExecutionResult::Failure { title, message } => {
          if policy.policy == ErrorPolicy::Skip {
            log.warn(
              TAG,
              format!("[{name}][{pc}] {} failed, skipping: {title}: {message}", step.id),
            );
            frame
              .step_outputs
              .insert(step.id.clone(), skipped_outputs(action.as_ref(), step, &message));
            pc += 1;
          } else {
            log.error(
              TAG,
              format!(
                "[{name}][{pc}] {} failed after {attempts} attempt(s): {title}: {message}",
                step.id
              ),
            );
            return Ok(RunOutcome::Failed { pc, title, message });
          }
        }
        ExecutionResult::Signal(signal) => {
          pc = self.apply_signal(signal, pc, &frame, steps.len(), &mut return_value, &log);
        }
      }
    }

    log.info(TAG, format!("[{name}] end"));
    Ok(RunOutcome::Completed { return_value })
  }

  /// Compute the next program counter for a signal.
  fn apply_signal(
    &self,
    signal: ExecutionSignal,
    pc: usize,
    frame: &ExecutionContext,
    len: usize,
    return_value: &mut Option<Value>,
    log: &ExecutionLog,
  ) -> usize {
    let layout = frame.layout.as_ref();
    match signal {
      ExecutionSignal::Jump { pc: target } => {
        log.debug(TAG, format!("[{pc}] jump -> {target}"));
        target
      }
      ExecutionSignal::Loop {
        action: LoopAction::Start,
      } => pc + 1,
      ExecutionSignal::Loop {
        action: LoopAction::End,
      } => loop_end(pc, frame, log),
      ExecutionSignal::Break => match enclosing_loop(layout, pc) {
        Some((start, end)) => {
          if frame.loop_stack.peek().is_some_and(|s| s.start_pc() == start) {
            frame.loop_stack.pop();
          }
          log.debug(TAG, format!("[{pc}] break -> {}", end + 1));
          end + 1
        }
        None => {
          log.warn(TAG, format!("[{pc}] break outside of a loop, ignoring"));
          pc + 1
        }
      },
      ExecutionSignal::Continue => match enclosing_loop(layout, pc) {
        Some((_, end)) => {
          log.debug(TAG, format!("[{pc}] continue -> {end}"));
          end
        }
        None => {
          log.warn(TAG, format!("[{pc}] continue outside of a loop, ignoring"));
          pc + 1
        }
      },
      ExecutionSignal::Stop => {
        log.info(TAG, format!("[{pc}] stop requested"));
        frame.execution.mark_stopped();
        len
      }
      ExecutionSignal::Return { value } => {
        log.info(TAG, format!("[{pc}] return"));
        *return_value = Some(value);
        len
      }
    }
  }
}

/// Handle `Loop(End)`: repeat the body or pop the finished loop.
fn loop_end(pc: usize, frame: &ExecutionContext, log: &ExecutionLog) -> usize {
  let layout = frame.layout.as_ref();
  let Some(start) = layout
    .pairing_id(pc)
    .and_then(|pairing| layout.find_block_start(pc, pairing))
  else {
    log.warn(TAG, format!("[{pc}] loop end without a matching start"));
    return pc + 1;
  };

  let repeat = frame
    .loop_stack
    .with_top(|state| (state.start_pc() == start).then(|| state.advance()))
    .flatten();

  match repeat {
    Some(true) => start + 1,
    Some(false) => {
      frame.loop_stack.pop();
      pc + 1
    }
    None => {
      log.warn(TAG, format!("[{pc}] loop end without loop state"));
      pc + 1
    }
  }
}

/// Start and end of the innermost loop enclosing `pc`.
fn enclosing_loop(layout: &BlockLayout, pc: usize) -> Option<(usize, usize)> {
  let start = layout.find_enclosing_loop_start(pc)?;
  let pairing = layout.pairing_id(start)?;
  let end = layout.find_block_end(start, pairing)?;
  Some((start, end))
}

/// Publish the active loop's index variables under its start step's id.
fn refresh_loop_outputs(frame: &ExecutionContext, layout: &BlockLayout, steps: &[Step], pc: usize) {
  let Some(start) = layout.find_enclosing_loop_start(pc) else {
    return;
  };
  let Some(state) = frame.loop_stack.peek() else {
    return;
  };
  if state.start_pc() == start {
    frame
      .step_outputs
      .insert(steps[start].id.clone(), state.outputs());
  }
}

/// Outputs recorded for a failed step under the skip policy.
fn skipped_outputs(action: &dyn StepAction, step: &Step, message: &str) -> Outputs {
  let mut outputs: Outputs = action
    .outputs(step)
    .into_iter()
    .map(|def| (def.id, def.output_type.default_value()))
    .collect();
  outputs.insert("error".to_string(), json!(message));
  outputs.insert("success".to_string(), json!(false));
  outputs
}
