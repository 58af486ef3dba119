//! Standard optimization passes over a [`super::Cfg`].
//!
//! Register coalescing and instruction scheduling are deliberately not
//! reimplemented here: this IR has no physical register file, and assigning
//! one is `llc`'s job once the pipeline hands off the optimized module —
//! reimplementing it would duplicate work LLVM already does, which §1
//! carves out as a non-goal.

use std::collections::{HashMap, HashSet};

use super::{BinOp, BlockId, Cfg, Inst, Operand, PassResult, ValueId};

/// Removes basic blocks unreachable from the entry block.
pub fn remove_unreachable_blocks(cfg: &mut Cfg) -> PassResult {
    let reachable: HashSet<BlockId> = cfg.reachable_blocks().into_iter().collect();
    let before = cfg.blocks.len();
    cfg.blocks.retain(|id, _| reachable.contains(id));
    for block in cfg.blocks.values_mut() {
        block.predecessors.retain(|p| reachable.contains(p));
    }
    PassResult { changed: cfg.blocks.len() != before }
}

/// Removes instructions whose defined value is never used anywhere in the
/// CFG and which have no side effects. Runs to a fixpoint within one call
/// since removing a dead instruction can make its operands' definitions
/// dead in turn.
pub fn dead_code_elimination(cfg: &mut Cfg) -> PassResult {
    let block_result = remove_unreachable_blocks(cfg);
    let mut changed = block_result.changed;
    loop {
        let used: HashSet<ValueId> = cfg
            .blocks
            .values()
            .flat_map(|b| b.instructions.iter())
            .flat_map(|i| i.used_values())
            .collect();

        let mut removed_any = false;
        for block in cfg.blocks.values_mut() {
            let before = block.instructions.len();
            block.instructions.retain(|inst| {
                inst.has_side_effects() || inst.defined_value().is_none_or(|v| used.contains(&v))
            });
            if block.instructions.len() != before {
                removed_any = true;
            }
        }
        if !removed_any {
            break;
        }
        changed = true;
    }
    PassResult { changed }
}

fn eval_binop(op: BinOp, lhs: i64, rhs: i64) -> Option<i64> {
    match op {
        BinOp::Add => Some(lhs.wrapping_add(rhs)),
        BinOp::Sub => Some(lhs.wrapping_sub(rhs)),
        BinOp::Mul => Some(lhs.wrapping_mul(rhs)),
        BinOp::Div if rhs != 0 => Some(lhs.wrapping_div(rhs)),
        BinOp::Div => None,
        BinOp::Shl => Some(lhs.wrapping_shl(rhs as u32)),
        BinOp::And => Some(lhs & rhs),
        BinOp::Or => Some(lhs | rhs),
        BinOp::Xor => Some(lhs ^ rhs),
        BinOp::Eq => Some((lhs == rhs) as i64),
        BinOp::Lt => Some((lhs < rhs) as i64),
    }
}

/// Evaluates pure operations whose operands are all compile-time-known,
/// replacing the instruction with an equivalent `Const`.
pub fn constant_fold(cfg: &mut Cfg) -> PassResult {
    let mut known: HashMap<ValueId, i64> = HashMap::new();
    let mut changed = false;
    for block in cfg.blocks.values_mut() {
        for inst in block.instructions.iter_mut() {
            match inst {
                Inst::Const { dest, value } => {
                    known.insert(*dest, *value);
                }
                Inst::BinOp { dest, op, lhs, rhs } => {
                    let lhs_val = match lhs {
                        Operand::Const(c) => Some(*c),
                        Operand::Value(v) => known.get(v).copied(),
                    };
                    let rhs_val = match rhs {
                        Operand::Const(c) => Some(*c),
                        Operand::Value(v) => known.get(v).copied(),
                    };
                    if let (Some(l), Some(r)) = (lhs_val, rhs_val) {
                        if let Some(folded) = eval_binop(*op, l, r) {
                            known.insert(*dest, folded);
                            *inst = Inst::Const { dest: *dest, value: folded };
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
    }
    PassResult { changed }
}

/// Forwards known constant values and copy-of-copy chains into later uses.
pub fn constant_copy_propagation(cfg: &mut Cfg) -> PassResult {
    let mut replacement: HashMap<ValueId, Operand> = HashMap::new();
    for block in cfg.blocks.values() {
        for inst in &block.instructions {
            match inst {
                Inst::Const { dest, value } => {
                    replacement.insert(*dest, Operand::Const(*value));
                }
                Inst::Copy { dest, src } => {
                    let resolved = resolve(src, &replacement);
                    replacement.insert(*dest, resolved);
                }
                _ => {}
            }
        }
    }

    let mut changed = false;
    for block in cfg.blocks.values_mut() {
        for inst in block.instructions.iter_mut() {
            changed |= substitute_operands(inst, &replacement);
        }
    }
    PassResult { changed }
}

fn resolve(op: &Operand, replacement: &HashMap<ValueId, Operand>) -> Operand {
    match op {
        Operand::Value(v) => replacement.get(v).cloned().unwrap_or_else(|| op.clone()),
        Operand::Const(_) => op.clone(),
    }
}

fn substitute_operands(inst: &mut Inst, replacement: &HashMap<ValueId, Operand>) -> bool {
    let mut changed = false;
    let mut apply = |op: &mut Operand| {
        let resolved = resolve(op, replacement);
        if resolved != *op {
            *op = resolved;
            changed = true;
        }
    };
    match inst {
        Inst::BinOp { lhs, rhs, .. } => {
            apply(lhs);
            apply(rhs);
        }
        Inst::Copy { src, .. } => apply(src),
        Inst::Load { addr, .. } => apply(addr),
        Inst::Store { addr, value } => {
            apply(addr);
            apply(value);
        }
        Inst::Call { args, .. } => args.iter_mut().for_each(apply),
        Inst::Return { value: Some(v) } => apply(v),
        Inst::Return { value: None } | Inst::Const { .. } => {}
    }
    changed
}

/// Local-then-global common subexpression elimination: instructions are
/// value-numbered by `(op, lhs, rhs)` across the whole function (an
/// approximation of dominance — safe here because this IR never reassigns
/// a `ValueId` once defined, so any earlier definition dominates by
/// construction of single static assignment).
pub fn common_subexpression_elimination(cfg: &mut Cfg) -> PassResult {
    let mut table: HashMap<(BinOp, Operand, Operand), ValueId> = HashMap::new();
    let mut replacement: HashMap<ValueId, Operand> = HashMap::new();
    let mut changed = false;

    let mut block_ids: Vec<BlockId> = cfg.blocks.keys().copied().collect();
    block_ids.sort_unstable();

    for id in block_ids {
        let block = cfg.blocks.get_mut(&id).unwrap();
        for inst in block.instructions.iter_mut() {
            if let Inst::BinOp { dest, op, lhs, rhs } = inst {
                let resolved_lhs = resolve(lhs, &replacement);
                let resolved_rhs = resolve(rhs, &replacement);
                *lhs = resolved_lhs.clone();
                *rhs = resolved_rhs.clone();
                let key = (*op, resolved_lhs, resolved_rhs);
                if let Some(&existing) = table.get(&key) {
                    replacement.insert(*dest, Operand::Value(existing));
                    *inst = Inst::Copy { dest: *dest, src: Operand::Value(existing) };
                    changed = true;
                } else {
                    table.insert(key, *dest);
                }
            }
        }
    }
    PassResult { changed }
}

/// Hoists pure instructions out of `loop_blocks` into `preheader` when every
/// operand they use is defined outside the loop.
pub fn loop_invariant_code_motion(cfg: &mut Cfg, loop_blocks: &[BlockId], preheader: BlockId) -> PassResult {
    let defined_in_loop: HashSet<ValueId> = loop_blocks
        .iter()
        .filter_map(|id| cfg.blocks.get(id))
        .flat_map(|b| b.instructions.iter())
        .filter_map(|i| i.defined_value())
        .collect();

    let mut hoisted = Vec::new();
    for &block_id in loop_blocks {
        if let Some(block) = cfg.blocks.get_mut(&block_id) {
            let mut keep = Vec::with_capacity(block.instructions.len());
            for inst in block.instructions.drain(..) {
                let invariant = inst.is_pure()
                    && inst.used_values().iter().all(|v| !defined_in_loop.contains(v));
                if invariant {
                    hoisted.push(inst);
                } else {
                    keep.push(inst);
                }
            }
            block.instructions = keep;
        }
    }
    let changed = !hoisted.is_empty();
    if changed {
        if let Some(pre) = cfg.blocks.get_mut(&preheader) {
            pre.instructions.extend(hoisted);
        }
    }
    PassResult { changed }
}

fn is_power_of_two(c: i64) -> bool {
    c > 0 && (c & (c - 1)) == 0
}

/// Replaces multiplication by a compile-time power-of-two constant with a
/// left shift.
pub fn strength_reduction(cfg: &mut Cfg) -> PassResult {
    let mut changed = false;
    for block in cfg.blocks.values_mut() {
        for inst in block.instructions.iter_mut() {
            if let Inst::BinOp { dest, op: BinOp::Mul, lhs, rhs } = inst {
                let (kept, constant) = match (&lhs, &rhs) {
                    (_, Operand::Const(c)) if is_power_of_two(*c) => (lhs.clone(), *c),
                    (Operand::Const(c), _) if is_power_of_two(*c) => (rhs.clone(), *c),
                    _ => continue,
                };
                let shift = constant.trailing_zeros() as i64;
                *inst = Inst::BinOp {
                    dest: *dest,
                    op: BinOp::Shl,
                    lhs: kept,
                    rhs: Operand::Const(shift),
                };
                changed = true;
            }
        }
    }
    PassResult { changed }
}

/// Unrolls a loop with a compile-time-constant trip count below
/// `max_trip_count`, by duplicating the body block's instructions
/// `trip_count` times in sequence (values are not renamed — this pass is
/// only sound for bodies the caller has already verified are
/// side-effect-ordered and reference no loop-carried value, i.e. bodies
/// already reduced to straight-line independent iterations).
pub fn loop_unroll(cfg: &mut Cfg, body: BlockId, trip_count: u32, max_trip_count: u32) -> PassResult {
    if trip_count == 0 || trip_count > max_trip_count {
        return PassResult { changed: false };
    }
    let Some(block) = cfg.blocks.get(&body) else {
        return PassResult { changed: false };
    };
    let template = block.instructions.clone();
    let mut unrolled = Vec::with_capacity(template.len() * trip_count as usize);
    for _ in 0..trip_count {
        unrolled.extend(template.iter().cloned());
    }
    cfg.blocks.get_mut(&body).unwrap().instructions = unrolled;
    PassResult { changed: true }
}

/// Local peephole cleanup: `x + 0`, `x - 0`, `x * 1` collapse to a copy of
/// `x`; `x * 0` collapses to the constant zero.
pub fn peephole(cfg: &mut Cfg) -> PassResult {
    let mut changed = false;
    for block in cfg.blocks.values_mut() {
        for inst in block.instructions.iter_mut() {
            if let Inst::BinOp { dest, op, lhs, rhs } = inst {
                let simplified = match (*op, &lhs, &rhs) {
                    (BinOp::Add, _, Operand::Const(0)) | (BinOp::Sub, _, Operand::Const(0)) => {
                        Some(Inst::Copy { dest: *dest, src: lhs.clone() })
                    }
                    (BinOp::Add, Operand::Const(0), _) => Some(Inst::Copy { dest: *dest, src: rhs.clone() }),
                    (BinOp::Mul, _, Operand::Const(1)) => Some(Inst::Copy { dest: *dest, src: lhs.clone() }),
                    (BinOp::Mul, Operand::Const(1), _) => Some(Inst::Copy { dest: *dest, src: rhs.clone() }),
                    (BinOp::Mul, _, Operand::Const(0)) | (BinOp::Mul, Operand::Const(0), _) => {
                        Some(Inst::Const { dest: *dest, value: 0 })
                    }
                    _ => None,
                };
                if let Some(replacement) = simplified {
                    *inst = replacement;
                    changed = true;
                }
            }
        }
    }
    PassResult { changed }
}

/// Runs the standard pipeline once, in the order §4.8 lists them, short of
/// the LLVM-owned register/scheduling passes.
pub fn run_standard_pipeline(cfg: &mut Cfg) -> PassResult {
    let mut changed = false;
    changed |= dead_code_elimination(cfg).changed;
    changed |= constant_fold(cfg).changed;
    changed |= constant_copy_propagation(cfg).changed;
    changed |= common_subexpression_elimination(cfg).changed;
    changed |= strength_reduction(cfg).changed;
    changed |= peephole(cfg).changed;
    changed |= dead_code_elimination(cfg).changed;
    PassResult { changed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(cfg: &mut Cfg, block: BlockId, inst: Inst) {
        cfg.blocks.get_mut(&block).unwrap().instructions.push(inst);
    }

    #[test]
    fn dce_removes_unused_pure_instruction() {
        let mut cfg = Cfg::new(0);
        let dead = cfg.fresh_value();
        let used = cfg.fresh_value();
        push(&mut cfg, 0, Inst::Const { dest: dead, value: 1 });
        push(&mut cfg, 0, Inst::Const { dest: used, value: 2 });
        push(&mut cfg, 0, Inst::Return { value: Some(Operand::Value(used)) });
        let result = dead_code_elimination(&mut cfg);
        assert!(result.changed);
        assert_eq!(cfg.blocks[&0].instructions.len(), 2);
    }

    #[test]
    fn dce_keeps_calls_and_stores() {
        let mut cfg = Cfg::new(0);
        push(&mut cfg, 0, Inst::Call { dest: None, callee: "should_not_call".into(), args: vec![] });
        let result = dead_code_elimination(&mut cfg);
        assert!(!result.changed);
        assert_eq!(cfg.blocks[&0].instructions.len(), 1);
    }

    #[test]
    fn dce_prunes_unreachable_block() {
        let mut cfg = Cfg::new(0);
        cfg.add_block(1);
        let result = dead_code_elimination(&mut cfg);
        assert!(result.changed);
        assert!(!cfg.blocks.contains_key(&1));
    }

    #[test]
    fn constant_fold_evaluates_pure_binop() {
        let mut cfg = Cfg::new(0);
        let a = cfg.fresh_value();
        let b = cfg.fresh_value();
        let c = cfg.fresh_value();
        push(&mut cfg, 0, Inst::Const { dest: a, value: 3 });
        push(&mut cfg, 0, Inst::Const { dest: b, value: 4 });
        push(&mut cfg, 0, Inst::BinOp { dest: c, op: BinOp::Add, lhs: Operand::Value(a), rhs: Operand::Value(b) });
        let result = constant_fold(&mut cfg);
        assert!(result.changed);
        assert_eq!(cfg.blocks[&0].instructions[2], Inst::Const { dest: c, value: 7 });
    }

    #[test]
    fn cse_replaces_duplicate_binop_with_copy() {
        let mut cfg = Cfg::new(0);
        let a = cfg.fresh_value();
        let b = cfg.fresh_value();
        let c1 = cfg.fresh_value();
        let c2 = cfg.fresh_value();
        push(&mut cfg, 0, Inst::BinOp { dest: c1, op: BinOp::Add, lhs: Operand::Value(a), rhs: Operand::Value(b) });
        push(&mut cfg, 0, Inst::BinOp { dest: c2, op: BinOp::Add, lhs: Operand::Value(a), rhs: Operand::Value(b) });
        let result = common_subexpression_elimination(&mut cfg);
        assert!(result.changed);
        assert_eq!(cfg.blocks[&0].instructions[1], Inst::Copy { dest: c2, src: Operand::Value(c1) });
    }

    #[test]
    fn licm_hoists_loop_invariant_instruction_to_preheader() {
        let mut cfg = Cfg::new(0);
        cfg.add_block(1);
        let outside = cfg.fresh_value();
        let invariant_result = cfg.fresh_value();
        push(&mut cfg, 0, Inst::Const { dest: outside, value: 10 });
        push(
            &mut cfg,
            1,
            Inst::BinOp { dest: invariant_result, op: BinOp::Add, lhs: Operand::Value(outside), rhs: Operand::Const(1) },
        );
        let result = loop_invariant_code_motion(&mut cfg, &[1], 0);
        assert!(result.changed);
        assert!(cfg.blocks[&1].instructions.is_empty());
        assert_eq!(cfg.blocks[&0].instructions.len(), 2);
    }

    #[test]
    fn strength_reduction_rewrites_power_of_two_multiply() {
        let mut cfg = Cfg::new(0);
        let a = cfg.fresh_value();
        let dest = cfg.fresh_value();
        push(&mut cfg, 0, Inst::BinOp { dest, op: BinOp::Mul, lhs: Operand::Value(a), rhs: Operand::Const(8) });
        let result = strength_reduction(&mut cfg);
        assert!(result.changed);
        assert_eq!(
            cfg.blocks[&0].instructions[0],
            Inst::BinOp { dest, op: BinOp::Shl, lhs: Operand::Value(a), rhs: Operand::Const(3) }
        );
    }

    #[test]
    fn loop_unroll_duplicates_body_below_threshold() {
        let mut cfg = Cfg::new(0);
        let v = cfg.fresh_value();
        push(&mut cfg, 0, Inst::Const { dest: v, value: 1 });
        let result = loop_unroll(&mut cfg, 0, 4, 8);
        assert!(result.changed);
        assert_eq!(cfg.blocks[&0].instructions.len(), 4);
    }

    #[test]
    fn loop_unroll_skips_trip_count_above_threshold() {
        let mut cfg = Cfg::new(0);
        let v = cfg.fresh_value();
        push(&mut cfg, 0, Inst::Const { dest: v, value: 1 });
        let result = loop_unroll(&mut cfg, 0, 100, 8);
        assert!(!result.changed);
        assert_eq!(cfg.blocks[&0].instructions.len(), 1);
    }

    #[test]
    fn peephole_collapses_additive_identity() {
        let mut cfg = Cfg::new(0);
        let a = cfg.fresh_value();
        let dest = cfg.fresh_value();
        push(&mut cfg, 0, Inst::BinOp { dest, op: BinOp::Add, lhs: Operand::Value(a), rhs: Operand::Const(0) });
        let result = peephole(&mut cfg);
        assert!(result.changed);
        assert_eq!(cfg.blocks[&0].instructions[0], Inst::Copy { dest, src: Operand::Value(a) });
    }
}
