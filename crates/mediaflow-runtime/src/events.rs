//! Execution events and notifiers.
//!
//! The runtime reports progress through an [`ExecutionNotifier`]. Consumers
//! decide what to do with the events: stream them to a UI, persist them, or
//! drop them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::result::NodeFailure;

/// Events emitted while a workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// The workflow was planned and execution has begun.
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
    batches: usize,
  },

  /// A batch is about to run.
  BatchStarted {
    execution_id: String,
    batch: usize,
    node_ids: Vec<String>,
  },

  /// A node's executor was invoked.
  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  /// A node succeeded.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    output: serde_json::Value,
  },

  /// A node failed, timed out, was cancelled or was blocked by its upstreams.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error: NodeFailure,
  },

  /// Every node in the batch has a recorded outcome.
  BatchCompleted { execution_id: String, batch: usize },

  /// The run finished; every node has a recorded outcome.
  WorkflowCompleted {
    execution_id: String,
    succeeded: usize,
    failed: usize,
  },
}

impl ExecutionEvent {
  pub fn execution_id(&self) -> &str {
    match self {
      Self::WorkflowStarted { execution_id, .. }
      | Self::BatchStarted { execution_id, .. }
      | Self::NodeStarted { execution_id, .. }
      | Self::NodeCompleted { execution_id, .. }
      | Self::NodeFailed { execution_id, .. }
      | Self::BatchCompleted { execution_id, .. }
      | Self::WorkflowCompleted { execution_id, .. } => execution_id,
    }
  }
}

/// Receives execution events.
///
/// `notify` is called from inside the scheduler and from concurrently running
/// node units, so it must not block.
pub trait ExecutionNotifier: Send + Sync + 'static {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a batch.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_event_wire_format() {
    let event = ExecutionEvent::BatchStarted {
      execution_id: "exec-1".to_string(),
      batch: 1,
      node_ids: vec!["b".to_string(), "c".to_string()],
    };

    assert_eq!(
      serde_json::to_value(&event).unwrap(),
      json!({
        "event": "batch_started",
        "execution_id": "exec-1",
        "batch": 1,
        "node_ids": ["b", "c"]
      })
    );
    assert_eq!(event.execution_id(), "exec-1");
  }

  #[test]
  fn test_channel_notifier_forwards_and_survives_dropped_receiver() {
    let (notifier, mut receiver) = ChannelNotifier::channel();
    notifier.notify(ExecutionEvent::BatchCompleted {
      execution_id: "exec-1".to_string(),
      batch: 0,
    });

    assert_eq!(
      receiver.try_recv().unwrap(),
      ExecutionEvent::BatchCompleted {
        execution_id: "exec-1".to_string(),
        batch: 0,
      }
    );

    drop(receiver);
    notifier.notify(ExecutionEvent::BatchCompleted {
      execution_id: "exec-1".to_string(),
      batch: 1,
    });
  }
}
