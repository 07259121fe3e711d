use std::collections::{HashMap, HashSet};

use crate::ir::{BlockId, Constant, Function, InstId, InstKind, Type, Value};

use super::{access_size, may_alias, pointer_location, pointer_root};

/// What is known about memory and values while walking one block
#[derive(Default)]
struct BlockState {
    /// Pure instructions seen so far, keyed by what they compute
    expressions: HashMap<InstKind, InstId>,
    /// Address, type and the value known to be stored there
    available: Vec<(Value, Type, Value)>,
    /// Stores nothing has read back yet: address, type, the store itself
    pending_stores: Vec<(Value, Type, InstId)>,
    /// Allocas known to be all zero apart from the listed (offset, size) ranges
    zeroed: HashMap<InstId, Vec<(i64, u64)>>,
}

/// Allocas whose address leaks into a call or into memory, calls may touch those
fn escaped_allocas(function: &Function) -> HashSet<InstId> {
    let mut escaped = HashSet::new();
    for (_, id) in function.live_instructions() {
        let leaked: Vec<&Value> = match &function.inst(id).kind {
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Store { value, .. } => vec![value],
            _ => vec![],
        };
        for value in leaked {
            if function.value_type(value) == Type::Ptr {
                if let Some(root) = pointer_root(function, value) {
                    escaped.insert(root);
                }
            }
        }
    }
    escaped
}

fn resolve(replaced: &HashMap<InstId, Value>, value: &Value) -> Value {
    let mut value = value.clone();
    // chains are short, the bound only guards against a cycle
    for _ in 0..replaced.len() {
        match value.as_inst().and_then(|id| replaced.get(&id)) {
            Some(next) => value = next.clone(),
            None => break,
        }
    }
    value
}

fn known_zero(function: &Function, state: &BlockState, ptr: &Value, ty: &Type) -> Option<Value> {
    let bits = ty.int_width()?;
    let (root, offset) = pointer_location(function, ptr)?;
    let offset = offset?;
    let dirty = state.zeroed.get(&root)?;
    let size = access_size(ty) as i128;
    let overlaps = dirty.iter().any(|(d_offset, d_size)| {
        (offset as i128) < (*d_offset as i128) + (*d_size as i128)
            && (*d_offset as i128) < (offset as i128) + size
    });
    if overlaps {
        None
    } else {
        Some(Value::int(bits, 0))
    }
}

fn forget_store_target(function: &Function, state: &mut BlockState, ptr: &Value, ty: &Type) {
    let size = access_size(ty);
    state
        .available
        .retain(|(p, t, _)| !may_alias(function, p, access_size(t), ptr, size));
    state
        .pending_stores
        .retain(|(p, t, _)| !may_alias(function, p, access_size(t), ptr, size));

    match pointer_location(function, ptr) {
        Some((root, Some(offset))) => {
            if let Some(dirty) = state.zeroed.get_mut(&root) {
                dirty.push((offset, size));
            }
        }
        Some((root, None)) => {
            state.zeroed.remove(&root);
        }
        None => state.zeroed.clear(),
    }
}

/// Block local value numbering: forwards stored values to later loads, reuses
/// identical loads and pure computations, and drops stores that get overwritten
/// before anything reads them.
pub fn gvn(function: &mut Function) -> bool {
    let escaped = escaped_allocas(function);
    let mut replaced: HashMap<InstId, Value> = HashMap::new();
    let mut dead: Vec<(BlockId, InstId)> = vec![];

    for block in function.block_order().to_vec() {
        let mut state = BlockState::default();

        for id in function.block(block).instructions.clone() {
            for operand in function.inst_mut(id).operands_mut() {
                let resolved = resolve(&replaced, operand);
                *operand = resolved;
            }

            let kind = function.inst(id).kind.clone();
            match kind {
                InstKind::Load { ty, ptr } => {
                    let known = state
                        .available
                        .iter()
                        .find(|(p, t, _)| *p == ptr && *t == ty)
                        .map(|(_, _, v)| v.clone())
                        .or_else(|| known_zero(function, &state, &ptr, &ty));

                    match known {
                        Some(value) => {
                            replaced.insert(id, value);
                            dead.push((block, id));
                        }
                        None => {
                            // the load stays, so whatever was stored there has been observed
                            let size = access_size(&ty);
                            state.pending_stores.retain(|(p, t, _)| {
                                !may_alias(function, p, access_size(t), &ptr, size)
                            });
                            state.available.push((ptr, ty, Value::Inst(id)));
                        }
                    }
                }
                InstKind::Store { value, ptr } => {
                    let ty = function.value_type(&value);

                    if let Some((_, _, earlier)) = state
                        .pending_stores
                        .iter()
                        .find(|(p, t, _)| *p == ptr && *t == ty)
                    {
                        dead.push((block, *earlier));
                    }

                    forget_store_target(function, &mut state, &ptr, &ty);

                    let whole_alloca = match ptr.as_inst().map(|p| &function.inst(p).kind) {
                        Some(InstKind::Alloca { ty: allocated }) => *allocated == ty,
                        _ => false,
                    };
                    if whole_alloca && matches!(value, Value::Const(Constant::Zero(_))) {
                        if let Some(root) = ptr.as_inst() {
                            state.zeroed.insert(root, vec![]);
                        }
                    }

                    state.pending_stores.push((ptr.clone(), ty.clone(), id));
                    state.available.push((ptr, ty, value));
                }
                InstKind::Call { .. } => {
                    // the callee can only see memory whose address got out
                    let private = |p: &Value| match pointer_root(function, p) {
                        Some(root) => !escaped.contains(&root),
                        None => false,
                    };
                    state.available.retain(|(p, _, _)| private(p));
                    state.pending_stores.retain(|(p, _, _)| private(p));
                    state.zeroed.retain(|root, _| !escaped.contains(root));
                }
                InstKind::Gep { .. }
                | InstKind::Binary { .. }
                | InstKind::ICmp { .. }
                | InstKind::Cast { .. } => match state.expressions.get(&kind) {
                    Some(earlier) => {
                        replaced.insert(id, Value::Inst(*earlier));
                        dead.push((block, id));
                    }
                    None => {
                        state.expressions.insert(kind, id);
                    }
                },
                _ => {}
            }
        }
    }

    let changed = !dead.is_empty();
    for (block, id) in dead {
        function.remove_inst(block, id);
    }
    for (from, to) in replaced.iter() {
        let to = resolve(&replaced, to);
        function.replace_all_uses(*from, &to);
    }
    changed
}
