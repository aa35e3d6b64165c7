//! Block structure navigation over a flat step list.
//!
//! Blocks are recovered by counted bracket matching: scanning away from a
//! position, every opening (or closing) step of the same pairing increments a
//! depth counter and the match is the first bracket seen at depth zero. Steps
//! of other pairings are transparent.

use std::collections::HashMap;

use crate::{BlockBehavior, BlockKind};

/// Block behaviors laid out in program order.
#[derive(Debug, Clone, Default)]
pub struct BlockLayout {
  behaviors: Vec<BlockBehavior>,
}

impl BlockLayout {
  /// Build a layout from the behavior of each step, in program order.
  pub fn new(behaviors: Vec<BlockBehavior>) -> Self {
    Self { behaviors }
  }

  pub fn len(&self) -> usize {
    self.behaviors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.behaviors.is_empty()
  }

  pub fn behavior(&self, pc: usize) -> Option<&BlockBehavior> {
    self.behaviors.get(pc)
  }

  pub fn pairing_id(&self, pc: usize) -> Option<&str> {
    self.behaviors.get(pc).and_then(|b| b.pairing_id.as_deref())
  }

  /// Find the START matching a position inside (or at the END of) a block.
  ///
  /// Scans backward from `from_pc - 1`.
  pub fn find_block_start(&self, from_pc: usize, pairing_id: &str) -> Option<usize> {
    let upper = from_pc.min(self.behaviors.len());
    let mut depth = 0usize;

    for pc in (0..upper).rev() {
      let behavior = &self.behaviors[pc];
      if behavior.is(BlockKind::BlockEnd, pairing_id) {
        depth += 1;
      } else if behavior.is(BlockKind::BlockStart, pairing_id) {
        if depth == 0 {
          return Some(pc);
        }
        depth -= 1;
      }
    }
    None
  }

  /// Find the END matching a position inside (or at the START of) a block.
  ///
  /// Scans forward from `from_pc + 1`.
  pub fn find_block_end(&self, from_pc: usize, pairing_id: &str) -> Option<usize> {
    let mut depth = 0usize;

    for pc in (from_pc + 1)..self.behaviors.len() {
      let behavior = &self.behaviors[pc];
      if behavior.is(BlockKind::BlockStart, pairing_id) {
        depth += 1;
      } else if behavior.is(BlockKind::BlockEnd, pairing_id) {
        if depth == 0 {
          return Some(pc);
        }
        depth -= 1;
      }
    }
    None
  }

  /// Find the next MIDDLE or END of the same block after `from_pc`.
  pub fn find_next_branch(&self, from_pc: usize, pairing_id: &str) -> Option<usize> {
    let mut depth = 0usize;

    for pc in (from_pc + 1)..self.behaviors.len() {
      let behavior = &self.behaviors[pc];
      if behavior.is(BlockKind::BlockStart, pairing_id) {
        depth += 1;
      } else if behavior.is(BlockKind::BlockMiddle, pairing_id) {
        if depth == 0 {
          return Some(pc);
        }
      } else if behavior.is(BlockKind::BlockEnd, pairing_id) {
        if depth == 0 {
          return Some(pc);
        }
        depth -= 1;
      }
    }
    None
  }

  /// Find the START of the innermost loop block enclosing `pc`.
  ///
  /// Each loop pairing keeps its own depth so that closed inner loops of any
  /// family are skipped.
  pub fn find_enclosing_loop_start(&self, pc: usize) -> Option<usize> {
    let upper = pc.min(self.behaviors.len());
    let mut depths: HashMap<&str, usize> = HashMap::new();

    for pos in (0..upper).rev() {
      let behavior = &self.behaviors[pos];
      if !behavior.is_loop {
        continue;
      }
      let Some(pairing) = behavior.pairing_id.as_deref() else {
        continue;
      };
      match behavior.kind {
        BlockKind::BlockEnd => *depths.entry(pairing).or_default() += 1,
        BlockKind::BlockStart => {
          let depth = depths.entry(pairing).or_default();
          if *depth == 0 {
            return Some(pos);
          }
          *depth -= 1;
        }
        BlockKind::BlockMiddle | BlockKind::None => {}
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn loop_start() -> BlockBehavior {
    BlockBehavior::start("loop").looping()
  }

  fn loop_end() -> BlockBehavior {
    BlockBehavior::end("loop").looping()
  }

  fn each_start() -> BlockBehavior {
    BlockBehavior::start("foreach").looping()
  }

  fn each_end() -> BlockBehavior {
    BlockBehavior::end("foreach").looping()
  }

  fn plain() -> BlockBehavior {
    BlockBehavior::none()
  }

  // 0 loop, 1 plain, 2 loop, 3 plain, 4 end, 5 if, 6 else, 7 end-if, 8 end
  fn nested_layout() -> BlockLayout {
    BlockLayout::new(vec![
      loop_start(),
      plain(),
      loop_start(),
      plain(),
      loop_end(),
      BlockBehavior::start("if"),
      BlockBehavior::middle("if"),
      BlockBehavior::end("if"),
      loop_end(),
    ])
  }

  #[test]
  fn test_find_block_end_skips_nested_blocks() {
    let layout = nested_layout();
    assert_eq!(layout.find_block_end(0, "loop"), Some(8));
    assert_eq!(layout.find_block_end(2, "loop"), Some(4));
    assert_eq!(layout.find_block_end(5, "if"), Some(7));
  }

  #[test]
  fn test_find_block_start_skips_nested_blocks() {
    let layout = nested_layout();
    assert_eq!(layout.find_block_start(8, "loop"), Some(0));
    assert_eq!(layout.find_block_start(4, "loop"), Some(2));
    assert_eq!(layout.find_block_start(6, "if"), Some(5));
  }

  #[test]
  fn test_start_end_round_trip_for_every_block() {
    let layouts = vec![
      nested_layout(),
      BlockLayout::new(vec![
        each_start(),
        loop_start(),
        each_start(),
        each_end(),
        loop_end(),
        plain(),
        loop_start(),
        loop_end(),
        each_end(),
      ]),
      BlockLayout::new(vec![
        BlockBehavior::start("if"),
        BlockBehavior::start("if"),
        BlockBehavior::middle("if"),
        BlockBehavior::end("if"),
        BlockBehavior::middle("if"),
        BlockBehavior::start("if"),
        BlockBehavior::end("if"),
        BlockBehavior::end("if"),
      ]),
    ];

    for layout in &layouts {
      for pc in 0..layout.len() {
        let behavior = layout.behavior(pc).unwrap();
        if behavior.kind != BlockKind::BlockStart {
          continue;
        }
        let pairing = behavior.pairing_id.as_deref().unwrap();
        let end = layout.find_block_end(pc, pairing).unwrap();
        assert_eq!(layout.find_block_start(end, pairing), Some(pc));
      }
    }
  }

  #[test]
  fn test_find_next_branch_prefers_middle_at_same_depth() {
    let layout = BlockLayout::new(vec![
      BlockBehavior::start("if"),
      BlockBehavior::start("if"),
      BlockBehavior::middle("if"),
      BlockBehavior::end("if"),
      BlockBehavior::middle("if"),
      plain(),
      BlockBehavior::end("if"),
    ]);

    assert_eq!(layout.find_next_branch(0, "if"), Some(4));
    assert_eq!(layout.find_next_branch(1, "if"), Some(2));
    assert_eq!(layout.find_next_branch(4, "if"), Some(6));
  }

  #[test]
  fn test_enclosing_loop_start_ignores_closed_loops() {
    let layout = nested_layout();
    // inside the inner loop
    assert_eq!(layout.find_enclosing_loop_start(3), Some(2));
    // after the inner loop closed, inside the if
    assert_eq!(layout.find_enclosing_loop_start(6), Some(0));
    assert_eq!(layout.find_enclosing_loop_start(0), None);
  }

  #[test]
  fn test_enclosing_loop_start_across_pairings() {
    let layout = BlockLayout::new(vec![
      each_start(),
      loop_start(),
      loop_end(),
      plain(),
      each_end(),
    ]);

    assert_eq!(layout.find_enclosing_loop_start(3), Some(0));
    assert_eq!(layout.find_enclosing_loop_start(2), Some(1));
  }

  #[test]
  fn test_unbalanced_blocks_return_none() {
    let layout = BlockLayout::new(vec![loop_start(), plain()]);
    assert_eq!(layout.find_block_end(0, "loop"), None);
    assert_eq!(layout.find_block_start(1, "foreach"), None);
  }
}
