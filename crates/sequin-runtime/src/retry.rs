//! Per-step error policy and retries.
//!
//! A step declares its policy through reserved parameters:
//! `__error_policy` (`STOP`, `SKIP` or `RETRY`), `__retry_count` and
//! `__retry_interval` (milliseconds). Only failures are retried; successes
//! and signals are returned as soon as they are produced.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sequin_step::{ExecutionHandle, ExecutionResult};

use crate::{RetryDefaults, RuntimeError};

pub const ERROR_POLICY_KEY: &str = "__error_policy";
pub const RETRY_COUNT_KEY: &str = "__retry_count";
pub const RETRY_INTERVAL_KEY: &str = "__retry_interval";

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorPolicy {
  /// Fail the execution.
  #[default]
  Stop,
  /// Record default outputs and continue with the next step.
  Skip,
  /// Retry, then fail the execution when attempts run out.
  Retry,
}

impl ErrorPolicy {
  fn parse(value: &str) -> Option<Self> {
    match value.trim().to_ascii_uppercase().as_str() {
      "STOP" => Some(Self::Stop),
      "SKIP" => Some(Self::Skip),
      "RETRY" => Some(Self::Retry),
      _ => None,
    }
  }
}

/// Error policy of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub policy: ErrorPolicy,
  /// Retries after the first attempt; at least 1.
  pub retry_count: u32,
  pub retry_interval: Duration,
}

impl RetryPolicy {
  /// Read the policy from a step's raw parameters.
  pub fn from_parameters(parameters: &HashMap<String, Value>, defaults: &RetryDefaults) -> Self {
    let policy = parameters
      .get(ERROR_POLICY_KEY)
      .and_then(Value::as_str)
      .and_then(ErrorPolicy::parse)
      .unwrap_or_default();

    let retry_count = parameters
      .get(RETRY_COUNT_KEY)
      .and_then(as_number)
      .map(|n| n.max(1.0) as u32)
      .unwrap_or(defaults.retry_count)
      .max(1);

    let retry_interval = parameters
      .get(RETRY_INTERVAL_KEY)
      .and_then(as_number)
      .map(|ms| Duration::from_millis(ms.max(0.0) as u64))
      .unwrap_or(defaults.retry_interval);

    Self {
      policy,
      retry_count,
      retry_interval,
    }
  }

  /// Total attempts allowed under this policy.
  pub fn max_attempts(&self) -> u32 {
    match self.policy {
      ErrorPolicy::Retry => self.retry_count + 1,
      ErrorPolicy::Stop | ErrorPolicy::Skip => 1,
    }
  }
}

fn as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

/// Result of a step after retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
  pub result: ExecutionResult,
  pub attempts: u32,
}

/// Invoke a step under its retry policy.
///
/// Each attempt and each wait between attempts race the execution's
/// cancellation; cancellation drops the in-flight attempt.
pub async fn invoke_with_retry<F, Fut>(
  policy: &RetryPolicy,
  execution: &ExecutionHandle,
  label: &str,
  mut attempt: F,
) -> Result<Attempted, RuntimeError>
where
  F: FnMut(u32) -> Fut,
  Fut: Future<Output = ExecutionResult>,
{
  let max_attempts = policy.max_attempts();
  let mut attempts = 1;

  loop {
    let result = tokio::select! {
      biased;
      _ = execution.cancelled() => return Err(RuntimeError::Cancelled),
      result = attempt(attempts) => result,
    };

    match &result {
      ExecutionResult::Failure { title, message } if attempts < max_attempts => {
        execution.log().warn(
          "retry",
          format!(
            "{label}: attempt {attempts}/{max_attempts} failed ({title}: {message}), retrying in {}ms",
            policy.retry_interval.as_millis()
          ),
        );
        tokio::select! {
          biased;
          _ = execution.cancelled() => return Err(RuntimeError::Cancelled),
          _ = tokio::time::sleep(policy.retry_interval) => {}
        }
        attempts += 1;
      }
      _ => return Ok(Attempted { result, attempts }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use sequin_step::ExecutionSignal;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicU32, Ordering};
  use tokio::time::Instant;

  fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect()
  }

  fn retry(count: u32, interval_ms: u64) -> RetryPolicy {
    RetryPolicy {
      policy: ErrorPolicy::Retry,
      retry_count: count,
      retry_interval: Duration::from_millis(interval_ms),
    }
  }

  #[test]
  fn test_policy_defaults() {
    let policy = RetryPolicy::from_parameters(&HashMap::new(), &RetryDefaults::default());
    assert_eq!(policy.policy, ErrorPolicy::Stop);
    assert_eq!(policy.retry_count, 3);
    assert_eq!(policy.retry_interval, Duration::from_millis(1000));
    assert_eq!(policy.max_attempts(), 1);
  }

  #[test]
  fn test_policy_from_parameters() {
    let policy = RetryPolicy::from_parameters(
      &params(&[
        (ERROR_POLICY_KEY, json!("RETRY")),
        (RETRY_COUNT_KEY, json!("2")),
        (RETRY_INTERVAL_KEY, json!(50)),
      ]),
      &RetryDefaults::default(),
    );
    assert_eq!(policy, retry(2, 50));
    assert_eq!(policy.max_attempts(), 3);
  }

  #[test]
  fn test_policy_clamps_invalid_values() {
    let policy = RetryPolicy::from_parameters(
      &params(&[
        (ERROR_POLICY_KEY, json!("skip")),
        (RETRY_COUNT_KEY, json!(0)),
        (RETRY_INTERVAL_KEY, json!(-10)),
      ]),
      &RetryDefaults::default(),
    );
    assert_eq!(policy.policy, ErrorPolicy::Skip);
    assert_eq!(policy.retry_count, 1);
    assert_eq!(policy.retry_interval, Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn test_succeeds_on_third_attempt_after_two_waits() {
    let handle = ExecutionHandle::new("exec");
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let attempted = invoke_with_retry(&retry(2, 100), &handle, "flaky", |_| {
      let calls = calls.clone();
      async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          ExecutionResult::failure("flaky", "not yet")
        } else {
          ExecutionResult::done()
        }
      }
    })
    .await
    .unwrap();

    assert_eq!(attempted.attempts, 3);
    assert_eq!(attempted.result, ExecutionResult::done());
    assert_eq!(started.elapsed(), Duration::from_millis(200));
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhausted_retries_return_last_failure() {
    let handle = ExecutionHandle::new("exec");
    let attempted = invoke_with_retry(&retry(2, 10), &handle, "broken", |n| async move {
      ExecutionResult::failure("broken", format!("attempt {n}"))
    })
    .await
    .unwrap();

    assert_eq!(attempted.attempts, 3);
    assert_eq!(attempted.result, ExecutionResult::failure("broken", "attempt 3"));
    assert!(handle.log().text().contains("attempt 2/3 failed"));
  }

  #[tokio::test]
  async fn test_signals_are_never_retried() {
    let handle = ExecutionHandle::new("exec");
    let attempted = invoke_with_retry(&retry(3, 10), &handle, "jump", |_| async {
      ExecutionResult::signal(ExecutionSignal::Break)
    })
    .await
    .unwrap();
    assert_eq!(attempted.attempts, 1);
  }

  #[tokio::test]
  async fn test_non_retry_policies_attempt_once() {
    let handle = ExecutionHandle::new("exec");
    for policy in [ErrorPolicy::Stop, ErrorPolicy::Skip] {
      let policy = RetryPolicy {
        policy,
        ..retry(5, 10)
      };
      let attempted = invoke_with_retry(&policy, &handle, "once", |_| async {
        ExecutionResult::failure("nope", "nope")
      })
      .await
      .unwrap();
      assert_eq!(attempted.attempts, 1);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancellation_interrupts_retry_wait() {
    let handle = ExecutionHandle::new("exec");
    let canceller = handle.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(500)).await;
      canceller.cancel();
    });

    let result = invoke_with_retry(&retry(3, 60_000), &handle, "slow", |_| async {
      ExecutionResult::failure("slow", "down")
    })
    .await;
    assert!(matches!(result, Err(RuntimeError::Cancelled)));
  }
}
