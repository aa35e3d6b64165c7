//! Execution registry.
//!
//! At most one execution per workflow id is live at a time. Each execution
//! runs on its own tokio task, gets a private work directory and publishes
//! its states on the [`StateBus`]. Cleanup (work directory removal, registry
//! removal, the terminal state) runs on that task after the interpreter
//! returns, whether it finished, failed, panicked or was cancelled. The
//! terminal state is the last state published for an execution, and a rerun
//! of the same workflow id is only accepted once it is out.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sequin_runtime::{
  ExecutionNotifier, ExecutionState, Interpreter, RunOutcome, RuntimeConfig, RuntimeError,
};
use sequin_step::{ExecutionContext, ExecutionHandle, StepRegistry};
use sequin_workflow::{Workflow, WorkflowStore};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{StateBus, StateSubscription};

const TAG: &str = "executor";

/// Configuration for the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
  /// Directory under which per-execution work directories are created.
  pub work_root: PathBuf,
  /// Capacity of the state bus.
  pub event_capacity: usize,
  #[serde(default)]
  pub runtime: RuntimeConfig,
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    Self {
      work_root: std::env::temp_dir().join("sequin"),
      event_capacity: 256,
      runtime: RuntimeConfig::default(),
    }
  }
}

/// Registry of live workflow executions.
///
/// Cloning is cheap; clones share the registry and the bus.
#[derive(Clone)]
pub struct WorkflowExecutor {
  interpreter: Interpreter,
  bus: StateBus,
  running: Arc<Mutex<HashMap<String, ExecutionHandle>>>,
  work_root: PathBuf,
}

impl WorkflowExecutor {
  pub fn new(
    registry: Arc<StepRegistry>,
    workflows: Arc<dyn WorkflowStore>,
    config: ExecutorConfig,
  ) -> Self {
    let bus = StateBus::new(config.event_capacity);
    let interpreter = Interpreter::new(registry, workflows)
      .with_notifier(Arc::new(bus.clone()))
      .with_config(config.runtime);

    Self {
      interpreter,
      bus,
      running: Arc::new(Mutex::new(HashMap::new())),
      work_root: config.work_root,
    }
  }

  pub fn bus(&self) -> &StateBus {
    &self.bus
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ExecutionState> {
    self.bus.subscribe()
  }

  pub fn subscribe_to(&self, workflow_id: impl Into<String>) -> StateSubscription {
    self.bus.subscribe_to(workflow_id)
  }

  /// Start executing a workflow in the background.
  ///
  /// Returns `false` without doing anything when the workflow is already
  /// running or when called outside a tokio runtime.
  pub fn execute(&self, workflow: Workflow, trigger_data: Value) -> bool {
    let workflow_id = workflow.workflow_id.clone();
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      error!(workflow_id = %workflow_id, "execute called outside a tokio runtime");
      return false;
    };
    let handle = ExecutionHandle::new(Uuid::new_v4().to_string());

    {
      let mut running = self.running.lock().unwrap();
      if running.contains_key(&workflow_id) {
        warn!(workflow_id = %workflow_id, "workflow is already running, ignoring execute");
        return false;
      }
      running.insert(workflow_id.clone(), handle.clone());
    }

    info!(
      workflow_id = %workflow_id,
      execution_id = %handle.execution_id(),
      "execution_started"
    );

    let executor = self.clone();
    runtime.spawn(async move {
      executor.run_execution(workflow, trigger_data, handle).await;
    });
    true
  }

  /// Cancel a running workflow. Returns whether one was running.
  pub fn stop(&self, workflow_id: &str) -> bool {
    let running = self.running.lock().unwrap();
    match running.get(workflow_id) {
      Some(handle) => {
        info!(
          workflow_id = %workflow_id,
          execution_id = %handle.execution_id(),
          "execution_stop_requested"
        );
        handle.cancel();
        true
      }
      None => false,
    }
  }

  /// Cancel every running workflow.
  pub fn stop_all(&self) {
    for handle in self.running.lock().unwrap().values() {
      handle.cancel();
    }
  }

  pub fn is_running(&self, workflow_id: &str) -> bool {
    self.running.lock().unwrap().contains_key(workflow_id)
  }

  /// Ids of the running workflows.
  pub fn running(&self) -> Vec<String> {
    self.running.lock().unwrap().keys().cloned().collect()
  }

  async fn run_execution(self, workflow: Workflow, trigger_data: Value, handle: ExecutionHandle) {
    let workflow_id = workflow.workflow_id.clone();
    let log = handle.log().clone();
    log.raw(format!(
      "--- start: {} ---\nworkflow: {}\nexecution: {}\ntrigger: {}",
      workflow.name,
      workflow_id,
      handle.execution_id(),
      trigger_data
    ));

    self.bus.notify(ExecutionState::Running {
      workflow_id: workflow_id.clone(),
      pc: -1,
    });

    let outcome = match self.create_work_dir(&workflow_id).await {
      Ok(work_dir) => {
        let ctx = ExecutionContext::new(
          handle.clone(),
          workflow_id.clone(),
          work_dir.path().to_path_buf(),
          trigger_data,
        );
        let outcome = AssertUnwindSafe(self.interpreter.run(&workflow, ctx))
          .catch_unwind()
          .await;
        self.remove_work_dir(work_dir, &handle).await;
        outcome
      }
      Err(err) => Ok(Err(err)),
    };

    let state = match outcome {
      Ok(Ok(RunOutcome::Completed { .. })) => {
        log.info(TAG, "finished");
        ExecutionState::Finished {
          workflow_id: workflow_id.clone(),
          log: log.text(),
        }
      }
      Ok(Ok(RunOutcome::Failed { pc, .. })) => ExecutionState::Failure {
        workflow_id: workflow_id.clone(),
        pc: pc as i64,
        log: log.text(),
      },
      Ok(Err(RuntimeError::Cancelled)) if handle.is_stopped() => ExecutionState::Finished {
        workflow_id: workflow_id.clone(),
        log: log.text(),
      },
      Ok(Err(RuntimeError::Cancelled)) => {
        log.info(TAG, "cancelled");
        ExecutionState::Cancelled {
          workflow_id: workflow_id.clone(),
          log: log.text(),
        }
      }
      Ok(Err(err)) => {
        log.error(TAG, format!("execution aborted: {err}"));
        ExecutionState::Failure {
          workflow_id: workflow_id.clone(),
          pc: handle.position(),
          log: log.text(),
        }
      }
      Err(panic) => {
        log.error(TAG, format!("step panicked: {}", panic_message(panic.as_ref())));
        ExecutionState::Failure {
          workflow_id: workflow_id.clone(),
          pc: handle.position(),
          log: log.text(),
        }
      }
    };

    match &state {
      ExecutionState::Failure { pc, .. } => error!(
        workflow_id = %workflow_id,
        execution_id = %handle.execution_id(),
        pc,
        "execution_failed"
      ),
      _ => info!(
        workflow_id = %workflow_id,
        execution_id = %handle.execution_id(),
        "execution_completed"
      ),
    }

    // Publishing under the lock keeps a rerun's first state behind this one.
    let mut running = self.running.lock().unwrap();
    running.remove(&workflow_id);
    self.bus.notify(state);
  }

  async fn create_work_dir(&self, workflow_id: &str) -> Result<TempDir, RuntimeError> {
    tokio::fs::create_dir_all(&self.work_root)
      .await
      .map_err(|source| RuntimeError::WorkDir { source })?;

    let prefix = format!("exec_{}_", sanitize(workflow_id));
    tempfile::Builder::new()
      .prefix(&prefix)
      .tempdir_in(&self.work_root)
      .map_err(|source| RuntimeError::WorkDir { source })
  }

  async fn remove_work_dir(&self, work_dir: TempDir, handle: &ExecutionHandle) {
    let path = work_dir.path().display().to_string();
    match tokio::task::spawn_blocking(move || work_dir.close()).await {
      Ok(Ok(())) => {}
      Ok(Err(err)) => handle
        .log()
        .warn(TAG, format!("failed to remove work dir {path}: {err}")),
      Err(err) => handle
        .log()
        .warn(TAG, format!("failed to remove work dir {path}: {err}")),
    }
  }
}

fn sanitize(workflow_id: &str) -> String {
  workflow_id
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
    .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sanitize_work_dir_prefix() {
    assert_eq!(sanitize("daily-report"), "daily-report");
    assert_eq!(sanitize("../etc/passwd"), "___etc_passwd");
  }

  #[test]
  fn test_panic_message() {
    let payload: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(panic_message(payload.as_ref()), "boom");
    let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
    assert_eq!(panic_message(payload.as_ref()), "bang");
    let payload: Box<dyn Any + Send> = Box::new(7);
    assert_eq!(panic_message(payload.as_ref()), "unknown panic");
  }
}
