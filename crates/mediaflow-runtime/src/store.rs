//! Per-run result store.
//!
//! Append-only: each node's outcome is written once by the unit that ran it
//! and never overwritten. Concurrent units always write distinct keys, so a
//! single lock around the map is enough.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::result::{NodeOutcome, Results};

/// Thread-safe, write-once map from node ID to outcome.
///
/// Cloning is cheap and every clone shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
  outcomes: Arc<RwLock<HashMap<String, NodeOutcome>>>,
}

impl ResultStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a node's outcome.
  ///
  /// A second write for the same node is rejected and the first outcome kept.
  pub fn record(&self, node_id: &str, outcome: NodeOutcome) -> Result<(), StoreError> {
    let mut outcomes = self.outcomes.write().unwrap_or_else(|e| e.into_inner());
    if outcomes.contains_key(node_id) {
      return Err(StoreError::AlreadyRecorded {
        node_id: node_id.to_string(),
      });
    }
    outcomes.insert(node_id.to_string(), outcome);
    Ok(())
  }

  pub fn get(&self, node_id: &str) -> Option<NodeOutcome> {
    let outcomes = self.outcomes.read().unwrap_or_else(|e| e.into_inner());
    outcomes.get(node_id).cloned()
  }

  pub fn contains(&self, node_id: &str) -> bool {
    let outcomes = self.outcomes.read().unwrap_or_else(|e| e.into_inner());
    outcomes.contains_key(node_id)
  }

  pub fn len(&self) -> usize {
    let outcomes = self.outcomes.read().unwrap_or_else(|e| e.into_inner());
    outcomes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy of everything recorded so far.
  pub fn snapshot(&self) -> Results {
    let outcomes = self.outcomes.read().unwrap_or_else(|e| e.into_inner());
    outcomes
      .iter()
      .map(|(id, outcome)| (id.clone(), outcome.clone()))
      .collect()
  }
}
