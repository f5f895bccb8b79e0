//! Input aggregation.
//!
//! Before a node runs, the outputs of its upstream nodes are collected into
//! an ordered input list, one entry per incoming connection in declaration
//! order.
//!
//! # Fan-in
//! `a -> c` declared before `b -> c` gives `c` the inputs `[a.output, b.output]`.
//!
//! # Output slots
//! A connection with `source_output_slot: "audio"` forwards only
//! `output["audio"]`. If the upstream output has no such field the input is
//! left out.
//!
//! # Roots
//! A node without incoming connections reads a single input from its own
//! config (`config["input"]` by default), so a video-upload node can supply
//! its own source reference.
//!
//! # Failed upstreams
//! Under [`DependencyPolicy::Lenient`] a failed upstream simply contributes
//! nothing and the node runs with what is left. Under
//! [`DependencyPolicy::Strict`] the node does not run and is recorded as
//! failed.

use mediaflow_workflow::{Node, Workflow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::result::{ErrorKind, NodeFailure, NodeOutcome, Results};

/// What happens to a node when one of its upstream nodes failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
  /// Run anyway, omitting the failed upstream's input.
  #[default]
  Lenient,
  /// Don't run; record a `DependencyFailed` failure.
  Strict,
}

/// One entry of a node's input list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
  /// Upstream node the payload came from; `None` for config-supplied input.
  pub source: Option<String>,
  /// Target input slot named on the connection, if any.
  pub slot: Option<String>,
  pub payload: serde_json::Value,
}

impl NodeInput {
  /// Input that didn't come from a connection.
  pub fn direct(payload: serde_json::Value) -> Self {
    Self {
      source: None,
      slot: None,
      payload,
    }
  }
}

/// The bare payloads of an input list, in order.
pub fn payloads(inputs: &[NodeInput]) -> Vec<serde_json::Value> {
  inputs.iter().map(|input| input.payload.clone()).collect()
}

/// Result of resolving a node's inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  /// Run the node with these inputs.
  Ready(Vec<NodeInput>),
  /// Don't run the node; record this failure instead.
  Blocked(NodeFailure),
}

/// Resolve a node's inputs against the results recorded so far.
///
/// # Arguments
/// * `workflow` - The workflow the node belongs to (for its incoming connections)
/// * `node` - The node about to run
/// * `results` - Outcomes of earlier batches
/// * `policy` - How failed upstreams are treated
/// * `static_input_key` - Config key a root node reads its input from
pub fn resolve_inputs(
  workflow: &Workflow,
  node: &Node,
  results: &Results,
  policy: DependencyPolicy,
  static_input_key: &str,
) -> Resolution {
  let mut inputs = Vec::new();
  let mut failed: Vec<&str> = Vec::new();
  let mut has_incoming = false;

  for conn in workflow.incoming(&node.node_id) {
    has_incoming = true;

    match results.get(&conn.source) {
      Some(NodeOutcome::Success { output }) => {
        let payload = match &conn.source_output_slot {
          None => Some(output.clone()),
          Some(slot) => {
            let selected = output.get(slot).cloned();
            if selected.is_none() {
              warn!(
                node_id = %node.node_id,
                source = %conn.source,
                slot = %slot,
                "upstream output has no such slot, input omitted"
              );
            }
            selected
          }
        };

        if let Some(payload) = payload {
          inputs.push(NodeInput {
            source: Some(conn.source.clone()),
            slot: conn.target_input_slot.clone(),
            payload,
          });
        }
      }
      Some(NodeOutcome::Failure(_)) => {
        if !failed.contains(&conn.source.as_str()) {
          failed.push(&conn.source);
        }
      }
      None => {
        warn!(
          node_id = %node.node_id,
          source = %conn.source,
          "upstream node has no recorded result, input omitted"
        );
      }
    }
  }

  if policy == DependencyPolicy::Strict && !failed.is_empty() {
    return Resolution::Blocked(NodeFailure::new(
      ErrorKind::DependencyFailed,
      format!("upstream node(s) failed: {}", failed.join(", ")),
    ));
  }

  if !has_incoming {
    if let Some(value) = node.config.get(static_input_key) {
      inputs.push(NodeInput::direct(value.clone()));
    }
  }

  Resolution::Ready(inputs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use mediaflow_workflow::Connection;
  use serde_json::json;

  fn fan_in_workflow() -> Workflow {
    Workflow::new(
      "fan-in",
      vec![
        Node::new("a", "transcription"),
        Node::new("b", "audio_enhance"),
        Node::new("c", "captions"),
      ],
      vec![
        Connection::new("b", "c").with_target_slot("audio"),
        Connection::new("a", "c").with_target_slot("transcript"),
      ],
    )
    .unwrap()
  }

  fn ready(resolution: Resolution) -> Vec<NodeInput> {
    match resolution {
      Resolution::Ready(inputs) => inputs,
      Resolution::Blocked(failure) => panic!("unexpected block: {failure}"),
    }
  }

  #[test]
  fn test_fan_in_follows_connection_order() {
    let workflow = fan_in_workflow();
    let results = Results::from([
      ("a".to_string(), NodeOutcome::success(json!("text"))),
      ("b".to_string(), NodeOutcome::success(json!("wav"))),
    ]);

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("c").unwrap(),
      &results,
      DependencyPolicy::Lenient,
      "input",
    ));

    assert_eq!(
      inputs,
      vec![
        NodeInput {
          source: Some("b".to_string()),
          slot: Some("audio".to_string()),
          payload: json!("wav"),
        },
        NodeInput {
          source: Some("a".to_string()),
          slot: Some("transcript".to_string()),
          payload: json!("text"),
        },
      ]
    );
  }

  #[test]
  fn test_lenient_omits_failed_upstream() {
    let workflow = fan_in_workflow();
    let results = Results::from([
      ("a".to_string(), NodeOutcome::success(json!("text"))),
      (
        "b".to_string(),
        NodeOutcome::failure(ErrorKind::Execution, "denoiser crashed"),
      ),
    ]);

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("c").unwrap(),
      &results,
      DependencyPolicy::Lenient,
      "input",
    ));

    assert_eq!(payloads(&inputs), vec![json!("text")]);
  }

  #[test]
  fn test_strict_blocks_on_failed_upstream() {
    let workflow = fan_in_workflow();
    let results = Results::from([
      ("a".to_string(), NodeOutcome::success(json!("text"))),
      (
        "b".to_string(),
        NodeOutcome::failure(ErrorKind::Timeout, "slow"),
      ),
    ]);

    let resolution = resolve_inputs(
      &workflow,
      workflow.get_node("c").unwrap(),
      &results,
      DependencyPolicy::Strict,
      "input",
    );

    assert_eq!(
      resolution,
      Resolution::Blocked(NodeFailure::new(
        ErrorKind::DependencyFailed,
        "upstream node(s) failed: b"
      ))
    );
  }

  #[test]
  fn test_output_slot_selects_field() {
    let workflow = Workflow::new(
      "slots",
      vec![Node::new("split", "demux"), Node::new("enhance", "audio_enhance")],
      vec![
        Connection::new("split", "enhance").with_source_slot("audio"),
        Connection::new("split", "enhance").with_source_slot("subtitles"),
      ],
    )
    .unwrap();
    let results = Results::from([(
      "split".to_string(),
      NodeOutcome::success(json!({"audio": "a.wav", "video": "v.mp4"})),
    )]);

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("enhance").unwrap(),
      &results,
      DependencyPolicy::Lenient,
      "input",
    ));

    // "subtitles" is missing from the output and is left out.
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].payload, json!("a.wav"));
  }

  #[test]
  fn test_root_reads_static_input() {
    let workflow = Workflow::new(
      "root",
      vec![Node::new("upload", "video_input").with_config("input", json!("s3://in.mp4"))],
      vec![],
    )
    .unwrap();

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("upload").unwrap(),
      &Results::new(),
      DependencyPolicy::Lenient,
      "input",
    ));

    assert_eq!(inputs, vec![NodeInput::direct(json!("s3://in.mp4"))]);
  }

  #[test]
  fn test_root_without_static_input_is_empty() {
    let workflow = Workflow::new(
      "root",
      vec![Node::new("upload", "video_input").with_config("source", json!("x"))],
      vec![],
    )
    .unwrap();

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("upload").unwrap(),
      &Results::new(),
      DependencyPolicy::Lenient,
      "input",
    ));
    assert!(inputs.is_empty());

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("upload").unwrap(),
      &Results::new(),
      DependencyPolicy::Lenient,
      "source",
    ));
    assert_eq!(inputs, vec![NodeInput::direct(json!("x"))]);
  }

  #[test]
  fn test_connected_node_ignores_static_input() {
    let workflow = Workflow::new(
      "wf",
      vec![
        Node::new("a", "transcription"),
        Node::new("b", "translation").with_config("input", json!("ignored")),
      ],
      vec![Connection::new("a", "b")],
    )
    .unwrap();
    let results = Results::from([(
      "a".to_string(),
      NodeOutcome::failure(ErrorKind::Execution, "no audio"),
    )]);

    let inputs = ready(resolve_inputs(
      &workflow,
      workflow.get_node("b").unwrap(),
      &results,
      DependencyPolicy::Lenient,
      "input",
    ));
    assert!(inputs.is_empty());
  }
}
