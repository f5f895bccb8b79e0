use std::collections::{HashMap, HashSet};

use crate::error::WorkflowError;
use crate::node::{Connection, Node};

/// Direct dependency / dependent adjacency derived from a workflow's connections.
///
/// Built once per run and read-only afterwards. `depends_on` and `dependents`
/// are inverses of each other: `a` is in `depends_on(b)` exactly when `b` is
/// in `dependents(a)`.
#[derive(Debug, Clone)]
pub struct DependencyIndex {
  /// Node IDs in declaration order.
  node_ids: Vec<String>,
  /// node_id -> direct upstream node_ids (first-seen connection order, no repeats).
  depends_on: HashMap<String, Vec<String>>,
  /// node_id -> direct downstream node_ids (first-seen connection order, no repeats).
  dependents: HashMap<String, Vec<String>>,
}

impl DependencyIndex {
  /// Validate nodes and connections and build the adjacency.
  ///
  /// Checks, in order: duplicate node IDs, connections referencing unknown
  /// nodes, cycles. Caller data is only read.
  pub fn build(nodes: &[Node], connections: &[Connection]) -> Result<Self, WorkflowError> {
    let mut node_ids = Vec::with_capacity(nodes.len());
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
      if !seen.insert(node.node_id.as_str()) {
        return Err(WorkflowError::DuplicateNodeId {
          node_id: node.node_id.clone(),
        });
      }
      node_ids.push(node.node_id.clone());
    }

    for conn in connections {
      for endpoint in [&conn.source, &conn.target] {
        if !seen.contains(endpoint.as_str()) {
          return Err(WorkflowError::UnknownNodeReference {
            node_id: endpoint.clone(),
            from: conn.source.clone(),
            to: conn.target.clone(),
          });
        }
      }
    }

    let index = Self::adjacency(node_ids, connections);

    if let Some(node_id) = index.find_cycle() {
      return Err(WorkflowError::CyclicGraph { node_id });
    }

    Ok(index)
  }

  /// Build the adjacency without validating anything.
  fn adjacency(node_ids: Vec<String>, connections: &[Connection]) -> Self {
    let mut depends_on: HashMap<String, Vec<String>> = HashMap::new();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for node_id in &node_ids {
      depends_on.entry(node_id.clone()).or_default();
      dependents.entry(node_id.clone()).or_default();
    }

    // Parallel connections (same pair, different slots) collapse into one dependency.
    for conn in connections {
      let upstream = depends_on.entry(conn.target.clone()).or_default();
      if !upstream.contains(&conn.source) {
        upstream.push(conn.source.clone());
        dependents
          .entry(conn.source.clone())
          .or_default()
          .push(conn.target.clone());
      }
    }

    Self {
      node_ids,
      depends_on,
      dependents,
    }
  }

  /// Adjacency for a graph that skipped validation (may contain cycles).
  #[cfg(test)]
  pub(crate) fn unchecked(nodes: &[Node], connections: &[Connection]) -> Self {
    let node_ids = nodes.iter().map(|n| n.node_id.clone()).collect();
    Self::adjacency(node_ids, connections)
  }

  /// Node IDs in declaration order.
  pub fn node_ids(&self) -> &[String] {
    &self.node_ids
  }

  pub fn len(&self) -> usize {
    self.node_ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.node_ids.is_empty()
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.depends_on.contains_key(node_id)
  }

  /// Direct upstream nodes of `node_id`.
  pub fn depends_on(&self, node_id: &str) -> &[String] {
    self
      .depends_on
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Direct downstream nodes of `node_id`.
  pub fn dependents(&self, node_id: &str) -> &[String] {
    self
      .dependents
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes with no upstream dependencies, in declaration order.
  pub fn entry_points(&self) -> Vec<&str> {
    self
      .node_ids
      .iter()
      .filter(|id| self.depends_on(id).is_empty())
      .map(|id| id.as_str())
      .collect()
  }

  /// Check if a node has more than one upstream dependency (fan-in).
  pub fn is_join_point(&self, node_id: &str) -> bool {
    self.depends_on(node_id).len() > 1
  }

  /// Depth-first search with white/gray/black colouring.
  ///
  /// Returns the node a back edge points at, which always lies on a cycle.
  /// Roots are visited in declaration order and successors in connection
  /// order, so the reported node is deterministic.
  fn find_cycle(&self) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
      White,
      Gray,
      Black,
    }

    fn dfs<'a>(
      node: &'a str,
      index: &'a DependencyIndex,
      color: &mut HashMap<&'a str, Color>,
    ) -> Option<&'a str> {
      color.insert(node, Color::Gray);

      for next in index.dependents(node) {
        match color.get(next.as_str()) {
          Some(Color::Gray) => return Some(next.as_str()),
          Some(Color::White) => {
            if let Some(found) = dfs(next, index, color) {
              return Some(found);
            }
          }
          _ => {}
        }
      }

      color.insert(node, Color::Black);
      None
    }

    let mut color: HashMap<&str, Color> = self
      .node_ids
      .iter()
      .map(|id| (id.as_str(), Color::White))
      .collect();

    for node_id in &self.node_ids {
      if color.get(node_id.as_str()) == Some(&Color::White) {
        if let Some(found) = dfs(node_id, self, &mut color) {
          return Some(found.to_string());
        }
      }
    }

    None
  }
}
