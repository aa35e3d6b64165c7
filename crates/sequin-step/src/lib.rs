//! Step contract for sequin.
//!
//! This crate defines what a step implementation sees and returns:
//! - [`StepAction`] is the trait every step type implements
//! - [`ExecutionContext`] carries parameters, resolved references and the
//!   shared state of the running execution
//! - [`ExecutionResult`] and [`ExecutionSignal`] are the protocol a step uses
//!   to report success, failure or a control-flow request
//! - [`StepRegistry`] maps step type ids to implementations

mod action;
mod caller;
mod context;
mod log;
mod loop_state;
pub mod reference;
mod registry;
mod result;

pub use action::{OutputDefinition, OutputType, ProgressSink, ProgressUpdate, StepAction};
pub use caller::{CallError, WorkflowCaller};
pub use context::{ExecutionContext, ExecutionHandle, NamedVariables, Outputs, StepOutputs};
pub use log::{ExecutionLog, LogLevel};
pub use loop_state::{LoopStack, LoopState};
pub use registry::StepRegistry;
pub use result::{ExecutionResult, ExecutionSignal, LoopAction};

pub use async_trait::async_trait;
