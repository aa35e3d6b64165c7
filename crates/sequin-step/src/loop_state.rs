use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::Outputs;

/// Iteration state of an active loop.
///
/// `start_pc` is the position of the loop-start step that pushed the state,
/// which ties the state to one block even when loops of the same kind nest.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
  Count {
    start_pc: usize,
    current_iteration: u64,
    total_iterations: u64,
  },
  ForEach {
    start_pc: usize,
    current_index: usize,
    items: Vec<Value>,
  },
}

impl LoopState {
  pub fn count(start_pc: usize, total_iterations: u64) -> Self {
    Self::Count {
      start_pc,
      current_iteration: 0,
      total_iterations,
    }
  }

  pub fn for_each(start_pc: usize, items: Vec<Value>) -> Self {
    Self::ForEach {
      start_pc,
      current_index: 0,
      items,
    }
  }

  pub fn start_pc(&self) -> usize {
    match self {
      Self::Count { start_pc, .. } | Self::ForEach { start_pc, .. } => *start_pc,
    }
  }

  /// Move to the next iteration. Returns whether another iteration remains.
  pub fn advance(&mut self) -> bool {
    match self {
      Self::Count {
        current_iteration,
        total_iterations,
        ..
      } => {
        *current_iteration += 1;
        *current_iteration < *total_iterations
      }
      Self::ForEach {
        current_index,
        items,
        ..
      } => {
        *current_index += 1;
        *current_index < items.len()
      }
    }
  }

  /// Outputs visible to steps inside the loop. Indices are 1-based.
  pub fn outputs(&self) -> Outputs {
    let mut outputs = Outputs::new();
    match self {
      Self::Count {
        current_iteration,
        total_iterations,
        ..
      } => {
        outputs.insert("loop_index".to_string(), json!(current_iteration + 1));
        outputs.insert("loop_total".to_string(), json!(total_iterations));
      }
      Self::ForEach {
        current_index,
        items,
        ..
      } => {
        outputs.insert("index".to_string(), json!(current_index + 1));
        outputs.insert(
          "item".to_string(),
          items.get(*current_index).cloned().unwrap_or(Value::Null),
        );
      }
    }
    outputs
  }
}

/// Shared stack of active loops for one workflow frame.
#[derive(Debug, Clone, Default)]
pub struct LoopStack {
  inner: Arc<Mutex<Vec<LoopState>>>,
}

impl LoopStack {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, state: LoopState) {
    self.inner.lock().unwrap().push(state);
  }

  pub fn pop(&self) -> Option<LoopState> {
    self.inner.lock().unwrap().pop()
  }

  pub fn peek(&self) -> Option<LoopState> {
    self.inner.lock().unwrap().last().cloned()
  }

  /// Run `f` against the top state, if any.
  pub fn with_top<R>(&self, f: impl FnOnce(&mut LoopState) -> R) -> Option<R> {
    self.inner.lock().unwrap().last_mut().map(f)
  }

  pub fn len(&self) -> usize {
    self.inner.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().unwrap().is_empty()
  }
}
