//! A pass framework over a control-flow graph: basic blocks owning a linear
//! instruction sequence, with successor/predecessor edges. Dynamic dispatch
//! over instruction kinds is a tagged-variant match, not vtable
//! inheritance, per design notes.

pub mod lowering;
pub mod passes;

use std::collections::HashMap;
use std::fmt;

pub type ValueId = u32;
pub type BlockId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    And,
    Or,
    Xor,
    Eq,
    Lt,
}

/// An instruction operand: either an immediate constant or a reference to a
/// previously defined value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Const(i64),
    Value(ValueId),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(c) => write!(f, "{c}"),
            Operand::Value(v) => write!(f, "%{v}"),
        }
    }
}

/// One CFG instruction. Each variant corresponds to one instruction kind;
/// passes match on the tag rather than dispatching through a trait object.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Const { dest: ValueId, value: i64 },
    BinOp { dest: ValueId, op: BinOp, lhs: Operand, rhs: Operand },
    Copy { dest: ValueId, src: Operand },
    Load { dest: ValueId, addr: Operand },
    Store { addr: Operand, value: Operand },
    Call { dest: Option<ValueId>, callee: String, args: Vec<Operand> },
    Return { value: Option<Operand> },
}

impl Inst {
    /// The value this instruction defines, if any.
    pub fn defined_value(&self) -> Option<ValueId> {
        match self {
            Inst::Const { dest, .. } => Some(*dest),
            Inst::BinOp { dest, .. } => Some(*dest),
            Inst::Copy { dest, .. } => Some(*dest),
            Inst::Load { dest, .. } => Some(*dest),
            Inst::Call { dest, .. } => *dest,
            Inst::Store { .. } | Inst::Return { .. } => None,
        }
    }

    /// Values this instruction reads.
    pub fn used_values(&self) -> Vec<ValueId> {
        let mut used = Vec::new();
        let mut push = |op: &Operand| {
            if let Operand::Value(v) = op {
                used.push(*v);
            }
        };
        match self {
            Inst::Const { .. } => {}
            Inst::BinOp { lhs, rhs, .. } => {
                push(lhs);
                push(rhs);
            }
            Inst::Copy { src, .. } => push(src),
            Inst::Load { addr, .. } => push(addr),
            Inst::Store { addr, value } => {
                push(addr);
                push(value);
            }
            Inst::Call { args, .. } => args.iter().for_each(&mut push),
            Inst::Return { value } => {
                if let Some(v) = value {
                    push(v);
                }
            }
        }
        used
    }

    /// Calls and stores have effects beyond their result value and must
    /// never be removed by dead-code elimination.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Inst::Call { .. } | Inst::Store { .. } | Inst::Return { .. })
    }

    /// True for instructions whose result depends only on their operands —
    /// eligible for constant folding, CSE, and LICM hoisting.
    pub fn is_pure(&self) -> bool {
        matches!(self, Inst::Const { .. } | Inst::BinOp { .. } | Inst::Copy { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Inst>,
    /// Branch target block ids, in source order (empty for a block ending
    /// in `Return`).
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }
}

/// The control-flow graph for one function body.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub blocks: HashMap<BlockId, BasicBlock>,
    pub entry: BlockId,
    next_value: ValueId,
    next_block: BlockId,
}

impl Cfg {
    pub fn new(entry: BlockId) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(entry, BasicBlock::new(entry));
        Self {
            blocks,
            entry,
            next_value: 0,
            next_block: entry + 1,
        }
    }

    pub fn add_block(&mut self, id: BlockId) {
        self.blocks.entry(id).or_insert_with(|| BasicBlock::new(id));
        if id >= self.next_block {
            self.next_block = id + 1;
        }
    }

    pub fn fresh_value(&mut self) -> ValueId {
        let id = self.next_value;
        self.next_value += 1;
        id
    }

    /// Allocates a block id not yet used anywhere in this CFG, without
    /// inserting the block itself (callers still call `add_block`).
    pub fn fresh_block_id(&mut self) -> BlockId {
        let id = self.next_block;
        self.next_block += 1;
        id
    }

    /// Adds a directed edge `from -> to`, keeping both sides of the
    /// adjacency consistent.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.add_block(to);
        if let Some(block) = self.blocks.get_mut(&from) {
            if !block.successors.contains(&to) {
                block.successors.push(to);
            }
        }
        if let Some(block) = self.blocks.get_mut(&to) {
            if !block.predecessors.contains(&from) {
                block.predecessors.push(from);
            }
        }
    }

    /// Blocks reachable from the entry block via a breadth-first walk of
    /// the successor edges.
    pub fn reachable_blocks(&self) -> Vec<BlockId> {
        let mut visited = vec![self.entry];
        let mut frontier = vec![self.entry];
        while let Some(id) = frontier.pop() {
            if let Some(block) = self.blocks.get(&id) {
                for &succ in &block.successors {
                    if !visited.contains(&succ) {
                        visited.push(succ);
                        frontier.push(succ);
                    }
                }
            }
        }
        visited
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.values().map(|b| b.instructions.len()).sum()
    }
}

/// Outcome of running one pass: whether it changed the CFG. Passes never
/// fail outright on well-formed input; a malformed CFG (e.g. a branch to a
/// block id that doesn't exist) is a driver-level abort, not a pass-level
/// `Err`, per §4.8's "driver retains the right to abort on any pass
/// failure".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassResult {
    pub changed: bool,
}
