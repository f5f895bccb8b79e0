//! The node execution capability.
//!
//! The runtime never knows what a node type does. Every node is handed to a
//! [`NodeExecutor`], which runs it (FFmpeg, a transcription API, a reframing
//! model, ...) and returns its JSON output.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use mediaflow_workflow::Node;

use crate::error::NodeError;
use crate::input::NodeInput;

/// Runs one node with its resolved inputs.
///
/// Implementations may use `async fn`. Errors and panics are contained by
/// the runtime and recorded against the node; they never abort a run.
///
/// `execute` must not block the calling thread. Timeouts and cancellation
/// take effect at `.await` points, so a future that blocks its worker thread
/// holds the batch until it returns. Blocking work belongs in
/// [`from_blocking_fn`], which moves it onto tokio's blocking pool.
pub trait NodeExecutor: Send + Sync + 'static {
  fn execute(
    &self,
    node: &Node,
    inputs: &[NodeInput],
  ) -> impl Future<Output = Result<serde_json::Value, NodeError>> + Send;
}

/// A [`NodeExecutor`] backed by a closure.
///
/// Created with [`from_fn`].
pub struct FnExecutor<F> {
  f: F,
}

impl<F> fmt::Debug for FnExecutor<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnExecutor").finish_non_exhaustive()
  }
}

/// Lift a closure into a [`NodeExecutor`].
///
/// The closure receives owned copies of the node and its inputs so the
/// returned future can be `'static`.
///
/// ```ignore
/// let executor = from_fn(|node, inputs| async move {
///   Ok(json!({ "node": node.node_id, "inputs": inputs.len() }))
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnExecutor<F>
where
  F: Fn(Node, Vec<NodeInput>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<serde_json::Value, NodeError>> + Send + 'static,
{
  FnExecutor { f }
}

impl<F, Fut> NodeExecutor for FnExecutor<F>
where
  F: Fn(Node, Vec<NodeInput>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<serde_json::Value, NodeError>> + Send + 'static,
{
  fn execute(
    &self,
    node: &Node,
    inputs: &[NodeInput],
  ) -> impl Future<Output = Result<serde_json::Value, NodeError>> + Send {
    (self.f)(node.clone(), inputs.to_vec())
  }
}

/// A [`NodeExecutor`] running a blocking closure on tokio's blocking pool.
///
/// Created with [`from_blocking_fn`].
pub struct BlockingFnExecutor<F> {
  f: Arc<F>,
}

impl<F> fmt::Debug for BlockingFnExecutor<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockingFnExecutor").finish_non_exhaustive()
  }
}

/// Lift a blocking closure into a [`NodeExecutor`].
///
/// Each call runs on `tokio::task::spawn_blocking`. A node that times out or
/// is cancelled is recorded immediately; the closure itself keeps running in
/// the background until it returns, and its result is discarded.
pub fn from_blocking_fn<F>(f: F) -> BlockingFnExecutor<F>
where
  F: Fn(Node, Vec<NodeInput>) -> Result<serde_json::Value, NodeError> + Send + Sync + 'static,
{
  BlockingFnExecutor { f: Arc::new(f) }
}

impl<F> NodeExecutor for BlockingFnExecutor<F>
where
  F: Fn(Node, Vec<NodeInput>) -> Result<serde_json::Value, NodeError> + Send + Sync + 'static,
{
  fn execute(
    &self,
    node: &Node,
    inputs: &[NodeInput],
  ) -> impl Future<Output = Result<serde_json::Value, NodeError>> + Send {
    let f = self.f.clone();
    let node = node.clone();
    let inputs = inputs.to_vec();

    async move {
      match tokio::task::spawn_blocking(move || f(node, inputs)).await {
        Ok(result) => result,
        // Re-raise so the runtime records the node as panicked.
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(NodeError::failed(format!("blocking task failed: {e}"))),
      }
    }
  }
}
