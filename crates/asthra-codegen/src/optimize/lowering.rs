//! Lowering helpers for source-level `match` and `for` constructs into CFG
//! shape, registering the relocations generated code needs to resolve
//! pattern-match dispatch and runtime iteration helpers.

use crate::relocation::RelocationManager;

use super::{BasicBlock, BlockId, Cfg, Inst, Operand};

/// One arm of a source-level match: the variant tag it dispatches on and
/// the block to jump to when matched.
#[derive(Debug, Clone)]
pub struct MatchArmTarget {
    pub variant_tag: u32,
    pub target_block: BlockId,
}

/// Builds a linear decision-tree dispatch (tag equality + conditional jump
/// per arm) starting at `dispatch_block`, and records one
/// `pattern-match-jump` relocation per arm pointing at its target block's
/// entry symbol.
///
/// Returns the list of block ids created for the per-arm equality tests.
pub fn lower_match_decision_tree(
    cfg: &mut Cfg,
    reloc: &mut RelocationManager,
    section: u16,
    dispatch_block: BlockId,
    scrutinee_tag: Operand,
    arms: &[MatchArmTarget],
    default_block: BlockId,
) -> Vec<BlockId> {
    cfg.add_block(dispatch_block);
    let mut test_blocks = Vec::with_capacity(arms.len());
    let mut current = dispatch_block;

    for (i, arm) in arms.iter().enumerate() {
        let tag_value = cfg.fresh_value();
        let eq_value = cfg.fresh_value();
        {
            let block = cfg.blocks.get_mut(&current).unwrap();
            block.instructions.push(Inst::Const { dest: tag_value, value: arm.variant_tag as i64 });
            block.instructions.push(Inst::BinOp {
                dest: eq_value,
                op: super::BinOp::Eq,
                lhs: scrutinee_tag.clone(),
                rhs: Operand::Value(tag_value),
            });
        }
        cfg.add_edge(current, arm.target_block);
        reloc.add_pattern_match(section, (current as u64) * 0x100 + i as u64, arm.target_block as u32, 0);
        test_blocks.push(current);

        let next_test = if i + 1 < arms.len() { cfg.fresh_block_id() } else { default_block };
        cfg.add_edge(current, next_test);
        current = next_test;
    }
    cfg.add_edge(current, default_block);
    test_blocks
}

/// Closed-form lowering for a numeric range `for i in start..end { body }`:
/// an induction-variable block, a loop-condition block, and a body block
/// wired as a standard counted loop (header -> body -> latch -> header).
pub struct RangeLoopBlocks {
    pub header: BlockId,
    pub body: BlockId,
    pub exit: BlockId,
}

pub fn lower_range_for(cfg: &mut Cfg, header: BlockId, body: BlockId, exit: BlockId, start: i64, end: Operand) -> RangeLoopBlocks {
    cfg.add_block(header);
    cfg.add_block(body);
    cfg.add_block(exit);

    let induction = cfg.fresh_value();
    let cond = cfg.fresh_value();
    {
        let header_block: &mut BasicBlock = cfg.blocks.get_mut(&header).unwrap();
        header_block.instructions.push(Inst::Const { dest: induction, value: start });
        header_block.instructions.push(Inst::BinOp {
            dest: cond,
            op: super::BinOp::Lt,
            lhs: Operand::Value(induction),
            rhs: end,
        });
    }
    cfg.add_edge(header, body);
    cfg.add_edge(header, exit);
    cfg.add_edge(body, header);

    RangeLoopBlocks { header, body, exit }
}

/// Generic-iterator lowering for a `for` loop whose source is not a
/// closed-form range: emits a `next()` call relocation per iteration step
/// instead of synthesizing the induction variable directly.
pub fn lower_iterator_for(
    cfg: &mut Cfg,
    reloc: &mut RelocationManager,
    section: u16,
    header: BlockId,
    body: BlockId,
    exit: BlockId,
    next_fn_symbol: u32,
) -> RangeLoopBlocks {
    cfg.add_block(header);
    cfg.add_block(body);
    cfg.add_block(exit);

    let item = cfg.fresh_value();
    {
        let header_block = cfg.blocks.get_mut(&header).unwrap();
        header_block.instructions.push(Inst::Call {
            dest: Some(item),
            callee: "__asthra_iter_next".to_string(),
            args: vec![],
        });
    }
    reloc.add_string_op(section, header as u64, next_fn_symbol, 0);
    cfg.add_edge(header, body);
    cfg.add_edge(header, exit);
    cfg.add_edge(body, header);

    RangeLoopBlocks { header, body, exit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_lowering_emits_one_relocation_per_arm() {
        let mut cfg = Cfg::new(0);
        let mut reloc = RelocationManager::new();
        let scrutinee = cfg.fresh_value();
        let arms = vec![
            MatchArmTarget { variant_tag: 0, target_block: 10 },
            MatchArmTarget { variant_tag: 1, target_block: 11 },
        ];
        lower_match_decision_tree(&mut cfg, &mut reloc, 0, 0, Operand::Value(scrutinee), &arms, 99);
        assert_eq!(reloc.get_relocations_by_type(crate::relocation::RelocationType::PatternMatchJump).len(), 2);
    }

    #[test]
    fn range_for_wires_header_body_and_back_edge() {
        let mut cfg = Cfg::new(0);
        let blocks = lower_range_for(&mut cfg, 1, 2, 3, 0, Operand::Const(10));
        assert!(cfg.blocks[&blocks.header].successors.contains(&blocks.body));
        assert!(cfg.blocks[&blocks.header].successors.contains(&blocks.exit));
        assert!(cfg.blocks[&blocks.body].successors.contains(&blocks.header));
    }

    #[test]
    fn iterator_for_emits_next_call_relocation() {
        let mut cfg = Cfg::new(0);
        let mut reloc = RelocationManager::new();
        lower_iterator_for(&mut cfg, &mut reloc, 0, 1, 2, 3, 7);
        assert_eq!(reloc.get_relocations_by_type(crate::relocation::RelocationType::StringOpCall).len(), 1);
    }
}
