use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sequin_workflow::{BlockBehavior, Step};

use crate::{ExecutionContext, ExecutionResult};

/// Declared type of a step output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
  Text,
  Number,
  Boolean,
  List,
  Dictionary,
  Image,
  Any,
}

impl OutputType {
  /// Empty value used when a failing step is skipped.
  pub fn default_value(self) -> Value {
    match self {
      Self::Text | Self::Any => Value::String(String::new()),
      Self::Number => json!(0),
      Self::Boolean => Value::Bool(false),
      Self::List => Value::Array(Vec::new()),
      Self::Dictionary => Value::Object(Default::default()),
      Self::Image => json!({ "uri": "" }),
    }
  }
}

/// An output a step type promises to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDefinition {
  pub id: String,
  pub name: String,
  pub output_type: OutputType,
}

impl OutputDefinition {
  pub fn new(id: impl Into<String>, name: impl Into<String>, output_type: OutputType) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      output_type,
    }
  }
}

/// Progress report from a long-running step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
  pub message: String,
  pub percent: Option<u8>,
}

impl ProgressUpdate {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      percent: None,
    }
  }

  pub fn with_percent(mut self, percent: u8) -> Self {
    self.percent = Some(percent.min(100));
    self
  }
}

/// Callback a step uses to report progress.
pub type ProgressSink = dyn Fn(ProgressUpdate) + Send + Sync;

/// A step type.
///
/// Implementations are stateless; everything they need comes from the
/// [`ExecutionContext`]. Control-flow steps return signals and let the
/// interpreter move the program counter.
#[async_trait]
pub trait StepAction: Send + Sync {
  /// Identifier referenced by `Step::type_id`.
  fn type_id(&self) -> &str;

  /// Human-readable name used in logs.
  fn name(&self) -> &str {
    self.type_id()
  }

  fn block_behavior(&self) -> BlockBehavior {
    BlockBehavior::none()
  }

  /// Outputs this step declares for the given configuration.
  fn outputs(&self, _step: &Step) -> Vec<OutputDefinition> {
    Vec::new()
  }

  async fn execute(&self, ctx: &ExecutionContext, progress: &ProgressSink) -> ExecutionResult;
}
