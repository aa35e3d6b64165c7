//! Broadcast bus for execution states.

use sequin_runtime::{ExecutionNotifier, ExecutionState};
use tokio::sync::broadcast;
use tracing::warn;

/// Fans execution states out to any number of subscribers.
///
/// Subscribers only see states published after they subscribed. A slow
/// subscriber that falls more than the bus capacity behind skips the oldest
/// states.
#[derive(Debug, Clone)]
pub struct StateBus {
  sender: broadcast::Sender<ExecutionState>,
}

impl StateBus {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  /// Subscribe to the states of every workflow.
  pub fn subscribe(&self) -> broadcast::Receiver<ExecutionState> {
    self.sender.subscribe()
  }

  /// Subscribe to the states of a single workflow.
  pub fn subscribe_to(&self, workflow_id: impl Into<String>) -> StateSubscription {
    StateSubscription {
      workflow_id: workflow_id.into(),
      receiver: self.sender.subscribe(),
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

impl Default for StateBus {
  fn default() -> Self {
    Self::new(256)
  }
}

impl ExecutionNotifier for StateBus {
  fn notify(&self, state: ExecutionState) {
    // No subscribers is fine
    let _ = self.sender.send(state);
  }
}

/// States of one workflow, in publication order.
#[derive(Debug)]
pub struct StateSubscription {
  workflow_id: String,
  receiver: broadcast::Receiver<ExecutionState>,
}

impl StateSubscription {
  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  /// Next state of this workflow, or `None` once the bus is gone.
  pub async fn recv(&mut self) -> Option<ExecutionState> {
    loop {
      match self.receiver.recv().await {
        Ok(state) if state.workflow_id() == self.workflow_id => return Some(state),
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          warn!(workflow_id = %self.workflow_id, skipped, "state subscriber lagged");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// Skip `Running` states and return the terminal state.
  pub async fn wait_terminal(&mut self) -> Option<ExecutionState> {
    while let Some(state) = self.recv().await {
      if state.is_terminal() {
        return Some(state);
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn running(workflow_id: &str, pc: i64) -> ExecutionState {
    ExecutionState::Running {
      workflow_id: workflow_id.to_string(),
      pc,
    }
  }

  #[tokio::test]
  async fn test_subscription_filters_by_workflow() {
    let bus = StateBus::new(16);
    let mut sub = bus.subscribe_to("a");

    bus.notify(running("b", 0));
    bus.notify(running("a", 3));
    bus.notify(ExecutionState::Finished {
      workflow_id: "a".to_string(),
      log: String::new(),
    });

    assert_eq!(sub.recv().await, Some(running("a", 3)));
    assert!(sub.wait_terminal().await.unwrap().is_terminal());
  }

  #[tokio::test]
  async fn test_closed_bus_ends_subscription() {
    let bus = StateBus::new(4);
    let mut sub = bus.subscribe_to("a");
    drop(bus);
    assert_eq!(sub.recv().await, None);
  }

  #[test]
  fn test_publish_without_subscribers() {
    let bus = StateBus::default();
    bus.notify(running("a", -1));
    assert_eq!(bus.subscriber_count(), 0);
  }
}
