use std::collections::HashMap;

use super::{BlockId, FunctionType, InstId, Instruction, Type, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<InstId>,
}

/// A function definition, or just a declaration when it has no blocks.
///
/// Instructions and blocks live in arenas owned by the function, `layout`
/// decides which blocks are actually part of the body and in what order.
/// Dropping a block or an instruction only unlinks it, ids stay stable.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub ty: FunctionType,

    instructions: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
    layout: Vec<BlockId>,
}

impl Function {
    pub fn new(name: &str, ty: FunctionType) -> Function {
        Function {
            name: name.to_string(),
            ty,
            instructions: vec![],
            blocks: vec![],
            layout: vec![],
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn append_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock {
            name: name.to_string(),
            instructions: vec![],
        });
        self.layout.push(id);
        id
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Blocks in layout order, the first one is the entry
    pub fn block_order(&self) -> &[BlockId] {
        &self.layout
    }

    pub fn contains_block(&self, id: BlockId) -> bool {
        self.layout.contains(&id)
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    /// First block in layout order with the given name
    pub fn find_block(&self, name: &str) -> Option<BlockId> {
        self.layout
            .iter()
            .copied()
            .find(|id| self.blocks[id.0].name == name)
    }

    /// Unlinks a block from the body, its instructions go with it
    pub fn remove_block(&mut self, id: BlockId) {
        self.layout.retain(|b| *b != id);
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.instructions[id.0]
    }

    pub fn push_inst(&mut self, block: BlockId, inst: Instruction) -> InstId {
        let id = InstId(self.instructions.len());
        self.instructions.push(inst);
        self.blocks[block.0].instructions.push(id);
        id
    }

    pub fn remove_inst(&mut self, block: BlockId, id: InstId) {
        self.blocks[block.0].instructions.retain(|i| *i != id);
    }

    /// Every linked instruction together with the block holding it, in layout order
    pub fn live_instructions(&self) -> Vec<(BlockId, InstId)> {
        self.layout
            .iter()
            .flat_map(|b| self.blocks[b.0].instructions.iter().map(move |i| (*b, *i)))
            .collect()
    }

    pub fn terminator(&self, block: BlockId) -> Option<&Instruction> {
        self.blocks[block.0]
            .instructions
            .last()
            .map(|id| &self.instructions[id.0])
            .filter(|inst| inst.is_terminator())
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(|t| t.successors())
            .unwrap_or_default()
    }

    /// Predecessor list of every linked block, a block branching twice to the same target counts once
    pub fn predecessors(&self) -> HashMap<BlockId, Vec<BlockId>> {
        let mut preds: HashMap<BlockId, Vec<BlockId>> =
            self.layout.iter().map(|b| (*b, vec![])).collect();
        for block in self.layout.iter() {
            let mut succs = self.successors(*block);
            succs.dedup();
            for succ in succs {
                preds.entry(succ).or_default().push(*block);
            }
        }
        preds
    }

    pub fn value_type(&self, value: &Value) -> Type {
        match value {
            Value::Const(c) => c.ty(),
            Value::Inst(id) => self.instructions[id.0].ty.clone(),
        }
    }

    /// How often every linked instruction is used as an operand
    pub fn use_counts(&self) -> HashMap<InstId, usize> {
        let mut counts = HashMap::new();
        for (_, id) in self.live_instructions() {
            for operand in self.instructions[id.0].operands() {
                if let Value::Inst(used) = operand {
                    *counts.entry(*used).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    pub fn replace_all_uses(&mut self, from: InstId, with: &Value) {
        for (_, id) in self.live_instructions() {
            for operand in self.instructions[id.0].operands_mut() {
                if *operand == Value::Inst(from) {
                    *operand = with.clone();
                }
            }
        }
    }
}
