//! Workflow runtime for mediaflow.
//!
//! Executes a validated [`Workflow`](mediaflow_workflow::Workflow) batch by
//! batch:
//!
//! - inputs for each node are aggregated from upstream outputs in connection
//!   order ([`resolve_inputs`]);
//! - nodes are handed to a [`NodeExecutor`], inline for a single-node batch
//!   and as concurrent tasks behind a barrier otherwise;
//! - every outcome, success or failure, is written once to a [`ResultStore`].
//!
//! ```ignore
//! let runtime = Runtime::new(ProcessExecutor::new("/opt/handlers"), RuntimeConfig::default());
//! let result = runtime.execute(&workflow, CancellationToken::new()).await?;
//! for (node_id, outcome) in &result.results {
//!   println!("{node_id}: {}", outcome.is_success());
//! }
//! ```

mod error;
mod events;
mod executor;
mod input;
mod process;
mod result;
mod runtime;
mod store;

pub use error::{NodeError, RuntimeError, StoreError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::{BlockingFnExecutor, FnExecutor, NodeExecutor, from_blocking_fn, from_fn};
pub use input::{DependencyPolicy, NodeInput, Resolution, payloads, resolve_inputs};
pub use process::ProcessExecutor;
pub use result::{ErrorKind, NodeFailure, NodeOutcome, Results, RunResult};
pub use runtime::{RunState, Runtime, RuntimeConfig, WorkflowRun};
pub use store::ResultStore;
