//! Workflow interpreter for sequin.
//!
//! Runs a workflow's steps with a program counter:
//! - string parameters are resolved against earlier outputs and named
//!   variables before each step
//! - failures go through the step's error policy (stop, skip or retry)
//! - control-flow signals move the program counter
//! - `system.call_workflow` style steps recurse into a fresh frame

mod call;
mod config;
mod error;
mod events;
pub mod input;
mod interpreter;
pub mod retry;

pub use config::{RetryDefaults, RuntimeConfig};
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionNotifier, ExecutionState, NoopNotifier};
pub use interpreter::{Interpreter, RunOutcome};
pub use retry::{ErrorPolicy, RetryPolicy};
