use std::collections::HashSet;

use crate::ir::{BlockId, Function, InstKind};

/// Conditional branches on a constant, or with both targets the same, become plain branches
fn fold_branches(function: &mut Function) -> bool {
    let mut changed = false;
    for block in function.block_order().to_vec() {
        let id = match function.block(block).instructions.last() {
            Some(id) => *id,
            None => continue,
        };

        let folded = match &function.inst(id).kind {
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                if then_block == else_block {
                    Some(*then_block)
                } else {
                    cond.as_const()
                        .and_then(|c| c.as_unsigned())
                        .map(|c| if c != 0 { *then_block } else { *else_block })
                }
            }
            _ => None,
        };

        if let Some(target) = folded {
            function.inst_mut(id).kind = InstKind::Br { target };
            changed = true;
        }
    }
    changed
}

/// Blocks that do nothing but jump somewhere else get skipped over
fn forward_empty_blocks(function: &mut Function) -> bool {
    let entry = function.entry_block();
    let mut changed = false;

    for block in function.block_order().to_vec() {
        if Some(block) == entry || function.block(block).instructions.len() != 1 {
            continue;
        }
        let target = match function.terminator(block).map(|t| &t.kind) {
            Some(InstKind::Br { target }) if *target != block => *target,
            _ => continue,
        };

        for pred in function.block_order().to_vec() {
            let terminator = match function.block(pred).instructions.last() {
                Some(id) => *id,
                None => continue,
            };
            for succ in function.inst_mut(terminator).successors_mut() {
                if *succ == block {
                    *succ = target;
                    changed = true;
                }
            }
        }
    }
    changed
}

fn remove_unreachable(function: &mut Function) -> bool {
    let entry = match function.entry_block() {
        Some(entry) => entry,
        None => return false,
    };

    let mut reachable: HashSet<BlockId> = HashSet::new();
    let mut worklist = vec![entry];
    while let Some(block) = worklist.pop() {
        if reachable.insert(block) {
            worklist.extend(function.successors(block));
        }
    }

    let unreachable: Vec<_> = function
        .block_order()
        .iter()
        .copied()
        .filter(|b| !reachable.contains(b))
        .collect();
    for block in unreachable.iter() {
        function.remove_block(*block);
    }
    !unreachable.is_empty()
}

/// Folds a block into its only predecessor when that predecessor jumps straight to it
fn merge_blocks(function: &mut Function) -> bool {
    let mut changed = false;

    loop {
        let preds = function.predecessors();
        let entry = function.entry_block();

        let candidate = function.block_order().iter().copied().find_map(|block| {
            if Some(block) == entry {
                return None;
            }
            match preds.get(&block).map(Vec::as_slice) {
                Some([pred]) if *pred != block => match function.terminator(*pred).map(|t| &t.kind) {
                    Some(InstKind::Br { target }) if *target == block => Some((*pred, block)),
                    _ => None,
                },
                _ => None,
            }
        });

        let (pred, block) = match candidate {
            Some(pair) => pair,
            None => break,
        };

        let moved = function.block(block).instructions.clone();
        let into = function.block_mut(pred);
        // drop the branch, the merged block's own terminator takes over
        into.instructions.pop();
        into.instructions.extend(moved);
        function.remove_block(block);
        changed = true;
    }

    changed
}

/// Cleans up the control flow graph until there is nothing left to do
pub fn simplify_cfg(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let mut round_changed = fold_branches(function);
        round_changed |= forward_empty_blocks(function);
        round_changed |= remove_unreachable(function);
        round_changed |= merge_blocks(function);

        if !round_changed {
            break;
        }
        changed = true;
    }
    changed
}
