use serde::{Deserialize, Serialize};

/// Opaque per-node configuration.
///
/// The engine never interprets these values. They are handed to whatever
/// executes the node type (an FFmpeg wrapper, a transcription provider, ...).
pub type NodeConfig = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  #[serde(alias = "id")]
  pub node_id: String,

  /// Node type tag, e.g. "transcription" or "shorts_extraction".
  #[serde(rename = "type")]
  pub node_type: String,

  #[serde(default)]
  pub config: NodeConfig,

  #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeoutMs")]
  pub timeout_ms: Option<u64>,
}
