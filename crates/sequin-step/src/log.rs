//! Per-execution log buffer.
//!
//! Every execution accumulates a plain-text log that is attached to its
//! terminal state event. Lines are mirrored to `tracing` with the execution id
//! so the same messages reach the process log.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Debug,
  Info,
  Warn,
  Error,
}

impl LogLevel {
  fn letter(self) -> char {
    match self {
      Self::Debug => 'D',
      Self::Info => 'I',
      Self::Warn => 'W',
      Self::Error => 'E',
    }
  }
}

/// Append-only log shared by everything running inside one execution.
#[derive(Clone)]
pub struct ExecutionLog {
  execution_id: Arc<str>,
  buffer: Arc<Mutex<String>>,
}

impl ExecutionLog {
  pub fn new(execution_id: impl Into<String>) -> Self {
    Self {
      execution_id: Arc::from(execution_id.into()),
      buffer: Arc::default(),
    }
  }

  /// Append a formatted line: `[HH:MM:SS.mmm] L/tag: message`.
  pub fn append(&self, level: LogLevel, tag: &str, message: impl AsRef<str>) {
    let message = message.as_ref();
    let execution_id = &*self.execution_id;
    match level {
      LogLevel::Debug => debug!(execution_id, tag, "{message}"),
      LogLevel::Info => info!(execution_id, tag, "{message}"),
      LogLevel::Warn => warn!(execution_id, tag, "{message}"),
      LogLevel::Error => error!(execution_id, tag, "{message}"),
    }

    let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{timestamp}] {}/{tag}: {message}\n", level.letter());
    self.buffer.lock().unwrap().push_str(&line);
  }

  /// Append text verbatim, without a timestamp or mirroring.
  pub fn raw(&self, text: impl AsRef<str>) {
    let mut buffer = self.buffer.lock().unwrap();
    buffer.push_str(text.as_ref());
    if !buffer.ends_with('\n') {
      buffer.push('\n');
    }
  }

  pub fn debug(&self, tag: &str, message: impl AsRef<str>) {
    self.append(LogLevel::Debug, tag, message);
  }

  pub fn info(&self, tag: &str, message: impl AsRef<str>) {
    self.append(LogLevel::Info, tag, message);
  }

  pub fn warn(&self, tag: &str, message: impl AsRef<str>) {
    self.append(LogLevel::Warn, tag, message);
  }

  pub fn error(&self, tag: &str, message: impl AsRef<str>) {
    self.append(LogLevel::Error, tag, message);
  }

  /// Snapshot of the accumulated text.
  pub fn text(&self) -> String {
    self.buffer.lock().unwrap().clone()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.lock().unwrap().is_empty()
  }
}

impl fmt::Debug for ExecutionLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionLog")
      .field("execution_id", &self.execution_id)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lines_are_tagged_and_ordered() {
    let log = ExecutionLog::new("exec-1");
    log.raw("--- start ---");
    log.info("interpreter", "first");
    log.warn("retry", "second");

    let text = log.text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "--- start ---");
    assert!(lines[1].ends_with("I/interpreter: first"));
    assert!(lines[2].ends_with("W/retry: second"));
    assert!(lines[1].starts_with('['));
  }

  #[test]
  fn test_clones_share_buffer() {
    let log = ExecutionLog::new("exec-2");
    log.clone().error("step", "boom");
    assert!(log.text().contains("E/step: boom"));
  }
}
