//! Execution context handed to each step invocation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use sequin_workflow::{BlockLayout, Step};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::{ExecutionLog, LoopStack, WorkflowCaller};

/// Output map of a single step.
pub type Outputs = HashMap<String, Value>;

/// Outputs of completed steps, keyed by step id.
///
/// Only the interpreter writes here; steps read through the resolver.
#[derive(Debug, Clone, Default)]
pub struct StepOutputs {
  inner: Arc<RwLock<HashMap<String, Outputs>>>,
}

impl StepOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, step_id: &str, output_id: &str) -> Option<Value> {
    self
      .inner
      .read()
      .unwrap()
      .get(step_id)
      .and_then(|outputs| outputs.get(output_id))
      .cloned()
  }

  pub fn outputs(&self, step_id: &str) -> Option<Outputs> {
    self.inner.read().unwrap().get(step_id).cloned()
  }

  /// Replace the outputs recorded for a step.
  pub fn insert(&self, step_id: impl Into<String>, outputs: Outputs) {
    self.inner.write().unwrap().insert(step_id.into(), outputs);
  }

  pub fn contains(&self, step_id: &str) -> bool {
    self.inner.read().unwrap().contains_key(step_id)
  }

  pub fn snapshot(&self) -> HashMap<String, Outputs> {
    self.inner.read().unwrap().clone()
  }
}

/// User-named variables shared across the whole call chain.
#[derive(Debug, Clone, Default)]
pub struct NamedVariables {
  inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl NamedVariables {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<Value> {
    self.inner.read().unwrap().get(name).cloned()
  }

  /// Set a variable, returning the previous value.
  pub fn set(&self, name: impl Into<String>, value: Value) -> Option<Value> {
    self.inner.write().unwrap().insert(name.into(), value)
  }

  pub fn remove(&self, name: &str) -> Option<Value> {
    self.inner.write().unwrap().remove(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.inner.read().unwrap().contains_key(name)
  }

  pub fn snapshot(&self) -> HashMap<String, Value> {
    self.inner.read().unwrap().clone()
  }
}

/// Execution-wide handle shared by every frame of one run.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
  execution_id: String,
  cancel: CancellationToken,
  stopped: Arc<AtomicBool>,
  position: Arc<AtomicI64>,
  log: ExecutionLog,
}

impl ExecutionHandle {
  pub fn new(execution_id: impl Into<String>) -> Self {
    let execution_id = execution_id.into();
    Self {
      log: ExecutionLog::new(execution_id.clone()),
      execution_id,
      cancel: CancellationToken::new(),
      stopped: Arc::new(AtomicBool::new(false)),
      position: Arc::new(AtomicI64::new(-1)),
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  pub fn log(&self) -> &ExecutionLog {
    &self.log
  }

  /// Request cancellation from outside the execution.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Resolves once the execution is cancelled.
  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.cancel.cancelled()
  }

  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Record that a step asked the execution to stop.
  pub fn mark_stopped(&self) {
    self.stopped.store(true, Ordering::SeqCst);
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped.load(Ordering::SeqCst)
  }

  /// Last root-frame position announced, `-1` before the first step.
  pub fn position(&self) -> i64 {
    self.position.load(Ordering::SeqCst)
  }

  pub fn set_position(&self, pc: usize) {
    self.position.store(pc as i64, Ordering::SeqCst);
  }
}

/// Everything a step can see while it runs.
#[derive(Clone)]
pub struct ExecutionContext {
  pub execution: ExecutionHandle,
  /// Workflow of the current frame.
  pub workflow_id: String,
  pub step_id: String,
  pub pc: usize,
  pub layout: Arc<BlockLayout>,
  /// Raw step parameters.
  pub variables: HashMap<String, Value>,
  /// Parameters whose references resolved; preferred over `variables`.
  pub magic_variables: HashMap<String, Value>,
  pub step_outputs: StepOutputs,
  pub named_variables: NamedVariables,
  pub loop_stack: LoopStack,
  /// Call stack of workflow ids; the last entry is the current workflow.
  pub workflow_stack: Vec<String>,
  pub work_dir: PathBuf,
  pub trigger_data: Arc<Value>,
  pub caller: Option<Arc<dyn WorkflowCaller>>,
}

impl ExecutionContext {
  /// Context for the root frame of a new execution.
  pub fn new(
    execution: ExecutionHandle,
    workflow_id: impl Into<String>,
    work_dir: PathBuf,
    trigger_data: Value,
  ) -> Self {
    let workflow_id = workflow_id.into();
    Self {
      execution,
      workflow_stack: vec![workflow_id.clone()],
      workflow_id,
      step_id: String::new(),
      pc: 0,
      layout: Arc::default(),
      variables: HashMap::new(),
      magic_variables: HashMap::new(),
      step_outputs: StepOutputs::new(),
      named_variables: NamedVariables::new(),
      loop_stack: LoopStack::new(),
      work_dir,
      trigger_data: Arc::new(trigger_data),
      caller: None,
    }
  }

  /// Derive the context for one step of this frame.
  pub fn for_step(&self, step: &Step, pc: usize) -> Self {
    Self {
      step_id: step.id.clone(),
      pc,
      variables: step.parameters.clone(),
      magic_variables: HashMap::new(),
      ..self.clone()
    }
  }

  /// Derive the root context of a called workflow.
  ///
  /// Step outputs and loop state start empty; named variables, work dir,
  /// trigger data and the execution handle are shared with the caller.
  pub fn sub_frame(&self, workflow_id: impl Into<String>) -> Self {
    let workflow_id = workflow_id.into();
    let mut workflow_stack = self.workflow_stack.clone();
    workflow_stack.push(workflow_id.clone());
    Self {
      execution: self.execution.clone(),
      workflow_id,
      step_id: String::new(),
      pc: 0,
      layout: Arc::default(),
      variables: HashMap::new(),
      magic_variables: HashMap::new(),
      step_outputs: StepOutputs::new(),
      named_variables: self.named_variables.clone(),
      loop_stack: LoopStack::new(),
      workflow_stack,
      work_dir: self.work_dir.clone(),
      trigger_data: self.trigger_data.clone(),
      caller: self.caller.clone(),
    }
  }

  /// Number of frames in the call chain, the root frame included.
  pub fn call_depth(&self) -> usize {
    self.workflow_stack.len()
  }

  pub fn is_root(&self) -> bool {
    self.workflow_stack.len() <= 1
  }

  pub fn log(&self) -> &ExecutionLog {
    self.execution.log()
  }

  /// Parameter value, preferring the resolved form.
  pub fn input(&self, key: &str) -> Option<&Value> {
    self
      .magic_variables
      .get(key)
      .or_else(|| self.variables.get(key))
  }

  /// Parameter as text. Strings are returned raw, other values as JSON.
  pub fn input_str(&self, key: &str) -> Option<String> {
    match self.input(key)? {
      Value::Null => None,
      Value::String(s) => Some(s.clone()),
      other => Some(other.to_string()),
    }
  }

  /// Parameter as a number, accepting numeric strings.
  pub fn input_f64(&self, key: &str) -> Option<f64> {
    match self.input(key)? {
      Value::Number(n) => n.as_f64(),
      Value::String(s) => s.trim().parse().ok(),
      Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
      _ => None,
    }
  }

  pub fn input_bool(&self, key: &str) -> Option<bool> {
    match self.input(key)? {
      Value::Bool(b) => Some(*b),
      Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
      },
      Value::Number(n) => n.as_f64().map(|v| v != 0.0),
      _ => None,
    }
  }
}
