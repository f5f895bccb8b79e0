//! Subprocess-backed node executor.
//!
//! Each node type maps to an executable in a handlers directory. The handler
//! gets the node as JSON on stdin and answers with its output on stdout:
//!
//! ```text
//! stdin:  {"node_id": "transcribe", "type": "transcription",
//!          "config": {...}, "inputs": [{"source": "upload", "slot": null, "payload": ...}]}
//! stdout: {"transcript": "..."}
//! ```
//!
//! A non-zero exit fails the node with the handler's stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use mediaflow_workflow::Node;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::NodeError;
use crate::executor::NodeExecutor;
use crate::input::NodeInput;

/// Runs node types as external handler programs.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
  handlers_dir: PathBuf,
}

#[derive(Serialize)]
struct HandlerRequest<'a> {
  node_id: &'a str,
  #[serde(rename = "type")]
  node_type: &'a str,
  config: &'a mediaflow_config::NodeConfig,
  inputs: &'a [NodeInput],
}

impl ProcessExecutor {
  pub fn new(handlers_dir: impl Into<PathBuf>) -> Self {
    Self {
      handlers_dir: handlers_dir.into(),
    }
  }

  pub fn handlers_dir(&self) -> &Path {
    &self.handlers_dir
  }

  /// Path of the handler for a node type.
  ///
  /// `/` in the type becomes `--`, so `audio/enhance` maps to
  /// `<handlers_dir>/audio--enhance`.
  pub fn handler_path(&self, node_type: &str) -> PathBuf {
    self.handlers_dir.join(node_type.replace('/', "--"))
  }
}

impl NodeExecutor for ProcessExecutor {
  async fn execute(
    &self,
    node: &Node,
    inputs: &[NodeInput],
  ) -> Result<serde_json::Value, NodeError> {
    let handler = self.handler_path(&node.node_type);
    if node.node_type.is_empty() || !handler.is_file() {
      return Err(NodeError::UnsupportedType(node.node_type.clone()));
    }

    let request = serde_json::to_vec(&HandlerRequest {
      node_id: &node.node_id,
      node_type: &node.node_type,
      config: &node.config,
      inputs,
    })?;

    debug!(node_id = %node.node_id, handler = %handler.display(), "spawning handler");

    let mut child = Command::new(&handler)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
      // Handlers that ignore stdin may exit before reading it.
      stdin.write_all(&request).await.ok();
    }

    let output = child.wait_with_output().await?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
      return Err(NodeError::failed(if stderr.is_empty() {
        format!("handler exited with {code}")
      } else {
        format!("handler exited with {code}: {stderr}")
      }));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if stdout.is_empty() {
      return Ok(serde_json::Value::Null);
    }

    Ok(
      serde_json::from_str(stdout)
        .unwrap_or_else(|_| serde_json::Value::String(stdout.to_string())),
    )
  }
}
