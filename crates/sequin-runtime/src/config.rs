use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry settings used when a step does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDefaults {
  pub retry_count: u32,
  #[serde(with = "millis")]
  pub retry_interval: Duration,
}

impl Default for RetryDefaults {
  fn default() -> Self {
    Self {
      retry_count: 3,
      retry_interval: Duration::from_millis(1000),
    }
  }
}

/// Configuration for the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
  #[serde(default)]
  pub retry: RetryDefaults,
  /// Maximum number of nested workflow frames, the root included.
  #[serde(default = "default_max_call_depth")]
  pub max_call_depth: usize,
}

fn default_max_call_depth() -> usize {
  32
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      retry: RetryDefaults::default(),
      max_call_depth: default_max_call_depth(),
    }
  }
}

mod millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}
