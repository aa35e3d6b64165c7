//! Sequin Workflow Engine
//!
//! Tracks live executions and publishes their state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkflowExecutor                        │
//! │  - execute(workflow, trigger) spawns one task per workflow  │
//! │  - stop(workflow_id) cancels, cleanup always runs           │
//! │  - publishes Running / Finished / Cancelled / Failure       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Interpreter                           │
//! │  - program counter loop, signals, retries                   │
//! │  - parameter resolution, sub-workflow calls                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StepRegistry                          │
//! │  - step type id → StepAction                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let registry = Arc::new(sequin_steps::builtin_registry());
//! let store = Arc::new(MemoryWorkflowStore::new());
//! let executor = WorkflowExecutor::new(registry, store, ExecutorConfig::default());
//!
//! let mut states = executor.subscribe_to(&workflow.workflow_id);
//! executor.execute(workflow, serde_json::json!({}));
//! let terminal = states.wait_terminal().await;
//! ```

mod bus;
mod executor;

pub use bus::{StateBus, StateSubscription};
pub use executor::{ExecutorConfig, WorkflowExecutor};

pub use sequin_runtime::{ExecutionNotifier, ExecutionState, RuntimeConfig};
