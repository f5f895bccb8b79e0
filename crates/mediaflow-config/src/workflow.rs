use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDef;
use crate::node::NodeDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  /// Only used to label runs; a bare `{nodes, connections}` graph leaves it empty.
  #[serde(default, alias = "id")]
  pub workflow_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// Default per-node timeout for nodes that don't set their own.
  #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeoutMs")]
  pub timeout_ms: Option<u64>,
  pub nodes: Vec<NodeDef>,
  #[serde(default, alias = "edges")]
  pub connections: Vec<ConnectionDef>,
}
