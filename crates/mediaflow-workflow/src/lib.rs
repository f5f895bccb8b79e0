//! Mediaflow Workflow
//!
//! The validated graph model and level planner for mediaflow.
//!
//! - [`Workflow`] validates a definition: unique node IDs, connections that
//!   reference existing nodes, no cycles.
//! - [`DependencyIndex`] holds the direct upstream/downstream adjacency.
//! - [`plan`] groups nodes into [`ExecutionPlan`] batches that can each run
//!   fully in parallel once the previous batch has finished.

mod error;
mod graph;
mod node;
mod plan;
mod workflow;

pub use error::WorkflowError;
pub use graph::DependencyIndex;
pub use node::{Connection, Node};
pub use plan::{ExecutionPlan, plan};
pub use workflow::Workflow;
