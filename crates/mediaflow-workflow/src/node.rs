use mediaflow_config::{ConnectionDef, NodeConfig, NodeDef};
use serde::{Deserialize, Serialize};

/// A node in a validated workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  /// Opaque type tag, passed through to the node executor untouched.
  pub node_type: String,
  pub config: NodeConfig,
  pub timeout_ms: Option<u64>,
}

impl Node {
  pub fn new(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      node_type: node_type.into(),
      config: NodeConfig::new(),
      timeout_ms: None,
    }
  }

  /// Set a config entry (builder style).
  pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.config.insert(key.into(), value);
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }
}

impl From<NodeDef> for Node {
  fn from(def: NodeDef) -> Self {
    Self {
      node_id: def.node_id,
      node_type: def.node_type,
      config: def.config,
      timeout_ms: def.timeout_ms,
    }
  }
}

/// A validated connection: `target` consumes `source`'s output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub source: String,
  pub target: String,
  pub source_output_slot: Option<String>,
  pub target_input_slot: Option<String>,
}

impl Connection {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_output_slot: None,
      target_input_slot: None,
    }
  }

  pub fn with_source_slot(mut self, slot: impl Into<String>) -> Self {
    self.source_output_slot = Some(slot.into());
    self
  }

  pub fn with_target_slot(mut self, slot: impl Into<String>) -> Self {
    self.target_input_slot = Some(slot.into());
    self
  }
}

impl From<ConnectionDef> for Connection {
  fn from(def: ConnectionDef) -> Self {
    Self {
      source: def.source,
      target: def.target,
      source_output_slot: def.source_output_slot,
      target_input_slot: def.target_input_slot,
    }
  }
}
