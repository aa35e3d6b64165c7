//! Workflow definitions for sequin.
//!
//! A workflow is a flat, ordered list of steps. Control flow is expressed with
//! bracket-like block steps (loop start/end, if/else/end) whose structure is
//! recovered at run time by [`BlockLayout`].

mod block;
mod error;
mod layout;
mod store;
mod workflow;

pub use block::{BlockBehavior, BlockKind};
pub use error::WorkflowError;
pub use layout::BlockLayout;
pub use store::{MemoryWorkflowStore, WorkflowStore};
pub use workflow::{Step, Workflow};
