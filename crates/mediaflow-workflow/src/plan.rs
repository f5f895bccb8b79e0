//! Level planning.
//!
//! Kahn's algorithm, emitting one batch per level instead of one node at a
//! time. Every node in a batch has all of its dependencies in earlier
//! batches, and no two nodes in a batch depend on each other, so a batch can
//! run fully in parallel. A node only lands in a later batch when one of its
//! dependencies forces it there.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::graph::DependencyIndex;

/// Ordered execution batches for one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
  batches: Vec<Vec<String>>,
}

impl ExecutionPlan {
  pub fn batches(&self) -> &[Vec<String>] {
    &self.batches
  }

  pub fn into_batches(self) -> Vec<Vec<String>> {
    self.batches
  }

  /// Number of batches.
  pub fn len(&self) -> usize {
    self.batches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.batches.is_empty()
  }

  /// Index of the batch containing `node_id`.
  pub fn batch_index(&self, node_id: &str) -> Option<usize> {
    self
      .batches
      .iter()
      .position(|batch| batch.iter().any(|id| id == node_id))
  }

  /// All node IDs in execution order.
  pub fn node_ids(&self) -> impl Iterator<Item = &str> {
    self.batches.iter().flatten().map(|id| id.as_str())
  }
}

/// Compute the execution batches for a dependency index.
///
/// Batches, and the nodes within each batch, are sorted by node ID so the
/// same graph always produces the same plan. If some nodes can never become
/// ready the graph has a cycle; that is reported as
/// [`WorkflowError::UnplannableGraph`] instead of looping.
pub fn plan(index: &DependencyIndex) -> Result<ExecutionPlan, WorkflowError> {
  let mut in_degree: HashMap<&str, usize> = index
    .node_ids()
    .iter()
    .map(|id| (id.as_str(), index.depends_on(id).len()))
    .collect();

  let mut current: Vec<&str> = in_degree
    .iter()
    .filter(|(_, degree)| **degree == 0)
    .map(|(id, _)| *id)
    .collect();
  current.sort_unstable();

  let mut batches: Vec<Vec<String>> = Vec::new();
  let mut planned = 0;

  while !current.is_empty() {
    let mut next: Vec<&str> = Vec::new();
    for node_id in &current {
      for dependent in index.dependents(node_id) {
        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            next.push(dependent.as_str());
          }
        }
      }
    }
    next.sort_unstable();

    planned += current.len();
    batches.push(current.iter().map(|id| id.to_string()).collect());
    current = next;
  }

  if planned < index.len() {
    let mut remaining: Vec<String> = in_degree
      .into_iter()
      .filter(|(_, degree)| *degree > 0)
      .map(|(id, _)| id.to_string())
      .collect();
    remaining.sort_unstable();
    return Err(WorkflowError::UnplannableGraph { remaining });
  }

  Ok(ExecutionPlan { batches })
}
