use serde::{Deserialize, Serialize};

/// A data-flow edge: `target` consumes `source`'s output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDef {
  pub source: String,
  pub target: String,

  /// Named field of the source output to forward instead of the whole output.
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    alias = "sourceOutputSlot"
  )]
  pub source_output_slot: Option<String>,

  /// Input slot on the target the data is meant for.
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    alias = "targetInputSlot"
  )]
  pub target_input_slot: Option<String>,
}
