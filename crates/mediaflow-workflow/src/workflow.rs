use std::collections::HashMap;

use mediaflow_config::WorkflowDef;

use crate::error::WorkflowError;
use crate::graph::DependencyIndex;
use crate::node::{Connection, Node};
use crate::plan::{ExecutionPlan, plan};

/// A validated workflow ready for planning and execution.
///
/// Construction checks node uniqueness, connection endpoints and acyclicity,
/// so every `Workflow` value is a DAG.
#[derive(Debug, Clone)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: Option<String>,
  /// Default per-node timeout for nodes without their own.
  pub timeout_ms: Option<u64>,
  nodes: Vec<Node>,
  connections: Vec<Connection>,
  index: DependencyIndex,
  /// node_id -> position in `nodes`.
  positions: HashMap<String, usize>,
  /// node_id -> positions in `connections` targeting it, in declaration order.
  incoming: HashMap<String, Vec<usize>>,
}

impl Workflow {
  /// Validate nodes and connections into a workflow.
  pub fn new(
    workflow_id: impl Into<String>,
    nodes: Vec<Node>,
    connections: Vec<Connection>,
  ) -> Result<Self, WorkflowError> {
    let index = DependencyIndex::build(&nodes, &connections)?;

    let positions = nodes
      .iter()
      .enumerate()
      .map(|(i, node)| (node.node_id.clone(), i))
      .collect();

    let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, conn) in connections.iter().enumerate() {
      incoming.entry(conn.target.clone()).or_default().push(i);
    }

    Ok(Self {
      workflow_id: workflow_id.into(),
      name: None,
      timeout_ms: None,
      nodes,
      connections,
      index,
      positions,
      incoming,
    })
  }

  /// Validate a serialized definition.
  pub fn from_def(def: WorkflowDef) -> Result<Self, WorkflowError> {
    let nodes = def.nodes.into_iter().map(Node::from).collect();
    let connections = def.connections.into_iter().map(Connection::from).collect();

    let mut workflow = Self::new(def.workflow_id, nodes, connections)?;
    workflow.name = def.name;
    workflow.timeout_ms = def.timeout_ms;
    Ok(workflow)
  }

  /// Compute the execution batches.
  pub fn plan(&self) -> Result<ExecutionPlan, WorkflowError> {
    plan(&self.index)
  }

  pub fn index(&self) -> &DependencyIndex {
    &self.index
  }

  /// Nodes in declaration order.
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  /// Connections in declaration order.
  pub fn connections(&self) -> &[Connection] {
    &self.connections
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.positions.get(node_id).map(|&i| &self.nodes[i])
  }

  /// Connections targeting `node_id`, in declaration order.
  pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
    self
      .incoming
      .get(node_id)
      .into_iter()
      .flatten()
      .map(|&i| &self.connections[i])
  }

  /// Effective timeout for a node: its own, else the workflow default.
  pub fn node_timeout_ms(&self, node_id: &str) -> Option<u64> {
    self
      .get_node(node_id)
      .and_then(|node| node.timeout_ms)
      .or(self.timeout_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn podcast_def() -> WorkflowDef {
    serde_json::from_value(json!({
      "workflow_id": "podcast",
      "name": "Podcast clips",
      "timeout_ms": 30000,
      "nodes": [
        { "node_id": "upload", "type": "video_input", "config": { "input": "clip.mp4" } },
        { "node_id": "transcribe", "type": "transcription", "timeout_ms": 120000 },
        { "node_id": "enhance", "type": "audio_enhance" },
        { "node_id": "captions", "type": "captions" }
      ],
      "connections": [
        { "source": "transcribe", "target": "captions", "target_input_slot": "transcript" },
        { "source": "upload", "target": "transcribe" },
        { "source": "upload", "target": "enhance" },
        { "source": "enhance", "target": "captions", "target_input_slot": "audio" }
      ]
    }))
    .unwrap()
  }

  #[test]
  fn test_from_def() {
    let workflow = Workflow::from_def(podcast_def()).unwrap();

    assert_eq!(workflow.workflow_id, "podcast");
    assert_eq!(workflow.name.as_deref(), Some("Podcast clips"));
    assert_eq!(workflow.nodes().len(), 4);
    assert_eq!(
      workflow.get_node("transcribe").unwrap().node_type,
      "transcription"
    );
    assert!(workflow.get_node("missing").is_none());
  }

  #[test]
  fn test_incoming_keeps_declaration_order() {
    let workflow = Workflow::from_def(podcast_def()).unwrap();

    let sources: Vec<&str> = workflow
      .incoming("captions")
      .map(|c| c.source.as_str())
      .collect();
    assert_eq!(sources, vec!["transcribe", "enhance"]);
    assert_eq!(workflow.incoming("upload").count(), 0);
  }

  #[test]
  fn test_node_timeout_falls_back_to_workflow() {
    let workflow = Workflow::from_def(podcast_def()).unwrap();

    assert_eq!(workflow.node_timeout_ms("transcribe"), Some(120000));
    assert_eq!(workflow.node_timeout_ms("enhance"), Some(30000));
  }

  #[test]
  fn test_plan() {
    let workflow = Workflow::from_def(podcast_def()).unwrap();
    let plan = workflow.plan().unwrap();

    assert_eq!(
      plan.batches(),
      [
        vec!["upload".to_string()],
        vec!["enhance".to_string(), "transcribe".to_string()],
        vec!["captions".to_string()],
      ]
    );
  }

  #[test]
  fn test_from_def_rejects_cycle() {
    let mut def = podcast_def();
    def.connections.push(mediaflow_config::ConnectionDef {
      source: "captions".to_string(),
      target: "upload".to_string(),
      source_output_slot: None,
      target_input_slot: None,
    });

    let err = Workflow::from_def(def).unwrap_err();
    assert!(matches!(err, WorkflowError::CyclicGraph { .. }));
  }
}
