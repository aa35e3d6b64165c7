use serde::{Deserialize, Serialize};

/// Position of a step within a bracketed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
  #[default]
  None,
  BlockStart,
  BlockMiddle,
  BlockEnd,
}

/// Block role a step type plays in the program.
///
/// Steps sharing a `pairing_id` form one block family: every START must be
/// matched by a later END with the same pairing id, and MIDDLE steps only
/// appear inside an open block of their pairing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBehavior {
  pub kind: BlockKind,
  pub pairing_id: Option<String>,
  pub individually_deletable: bool,
  /// Loop blocks are the targets of break/continue and loop variable injection.
  #[serde(default)]
  pub is_loop: bool,
}

impl BlockBehavior {
  /// A plain step outside any block structure.
  pub fn none() -> Self {
    Self {
      individually_deletable: true,
      ..Self::default()
    }
  }

  pub fn start(pairing_id: impl Into<String>) -> Self {
    Self::bracket(BlockKind::BlockStart, pairing_id)
  }

  pub fn middle(pairing_id: impl Into<String>) -> Self {
    Self::bracket(BlockKind::BlockMiddle, pairing_id)
  }

  pub fn end(pairing_id: impl Into<String>) -> Self {
    Self::bracket(BlockKind::BlockEnd, pairing_id)
  }

  /// Mark this behavior as part of a loop block.
  pub fn looping(mut self) -> Self {
    self.is_loop = true;
    self
  }

  fn bracket(kind: BlockKind, pairing_id: impl Into<String>) -> Self {
    Self {
      kind,
      pairing_id: Some(pairing_id.into()),
      individually_deletable: false,
      is_loop: false,
    }
  }

  /// Whether this behavior has the given kind within the given pairing.
  pub fn is(&self, kind: BlockKind, pairing_id: &str) -> bool {
    self.kind == kind && self.pairing_id.as_deref() == Some(pairing_id)
  }
}
