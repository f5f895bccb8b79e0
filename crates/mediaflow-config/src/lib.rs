//! Mediaflow Config
//!
//! This crate contains the serializable workflow definition types for mediaflow.
//! A definition is what a user assembles in the editor: processing nodes
//! (transcription, translation, captions, audio enhancement, shorts extraction...)
//! and the connections that route one node's output into another's input.
//!
//! Definitions can be loaded from:
//! - JSON files (via the CLI)
//! - request bodies of a host service (as JSON)
//!
//! Nothing here is validated. `mediaflow-workflow` turns a [`WorkflowDef`] into a
//! checked graph that is ready for planning and execution.

mod connection;
mod node;
mod workflow;

pub use connection::ConnectionDef;
pub use node::{NodeConfig, NodeDef};
pub use workflow::WorkflowDef;

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_snake_case_definition() {
    let def: WorkflowDef = serde_json::from_value(json!({
      "workflow_id": "wf-1",
      "name": "Podcast to shorts",
      "nodes": [
        { "node_id": "upload", "type": "video_input", "config": { "input": "s3://bucket/in.mp4" } },
        { "node_id": "transcribe", "type": "transcription", "timeout_ms": 60000 }
      ],
      "connections": [
        { "source": "upload", "target": "transcribe", "source_output_slot": "video" }
      ]
    }))
    .unwrap();

    assert_eq!(def.workflow_id, "wf-1");
    assert_eq!(def.name.as_deref(), Some("Podcast to shorts"));
    assert_eq!(def.nodes.len(), 2);
    assert_eq!(def.nodes[0].node_type, "video_input");
    assert_eq!(def.nodes[0].config["input"], "s3://bucket/in.mp4");
    assert!(def.nodes[1].config.is_empty());
    assert_eq!(def.nodes[1].timeout_ms, Some(60000));
    assert_eq!(
      def.connections[0].source_output_slot.as_deref(),
      Some("video")
    );
    assert_eq!(def.connections[0].target_input_slot, None);
  }

  #[test]
  fn test_parse_editor_style_definition() {
    // The browser editor emits camelCase keys and `id` / `edges`.
    let def: WorkflowDef = serde_json::from_value(json!({
      "id": "wf-2",
      "nodes": [
        { "id": "a", "type": "audio_enhance" },
        { "id": "b", "type": "captions" }
      ],
      "edges": [
        { "source": "a", "target": "b", "sourceOutputSlot": "audio", "targetInputSlot": "track" }
      ]
    }))
    .unwrap();

    assert_eq!(def.workflow_id, "wf-2");
    assert_eq!(def.name, None);
    assert_eq!(def.nodes[0].node_id, "a");
    assert_eq!(def.connections[0].target_input_slot.as_deref(), Some("track"));
  }

  #[test]
  fn test_serialize_skips_empty_optionals() {
    let def = WorkflowDef {
      workflow_id: "wf".to_string(),
      name: None,
      timeout_ms: None,
      nodes: vec![NodeDef {
        node_id: "n".to_string(),
        node_type: "noop".to_string(),
        config: NodeConfig::new(),
        timeout_ms: None,
      }],
      connections: vec![],
    };

    let value = serde_json::to_value(&def).unwrap();
    assert!(value.get("name").is_none());
    assert!(value.get("timeout_ms").is_none());
    assert!(value["nodes"][0].get("timeout_ms").is_none());
  }

  #[test]
  fn test_bare_graph_without_id() {
    let def: WorkflowDef = serde_json::from_value(json!({
      "nodes": [{ "id": "upload", "type": "video_input" }],
      "connections": []
    }))
    .unwrap();

    assert_eq!(def.workflow_id, "");
    assert_eq!(def.nodes.len(), 1);
  }
}
