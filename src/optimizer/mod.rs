use std::collections::HashSet;

use clap::ValueEnum;
use tracing::debug;

use crate::ir::{Function, InstId, InstKind, Type, Value};

use self::{
    constant_folding::constant_folding, dead_code::dead_code, gvn::gvn, simplify_cfg::simplify_cfg,
};

pub mod constant_folding;
pub mod dead_code;
pub mod gvn;
pub mod simplify_cfg;

/// Upper bound on how many times the whole pipeline is rerun looking for a fixpoint
const MAX_ROUNDS: usize = 8;

#[derive(ValueEnum, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Optimizations {
    /// Forward stores to loads and reuse identical computations within a block
    Gvn,
    /// Fold constants and combine chained additions
    InstCombine,
    /// Drop unused computations and stores nobody reads
    DeadCode,
    /// Fold constant branches, drop unreachable blocks and merge straight-line blocks
    SimplifyCfg,
}

impl Optimizations {
    pub fn all() -> HashSet<Optimizations> {
        Optimizations::value_variants().iter().copied().collect()
    }
}

/// Runs the selected passes in pipeline order until nothing changes, returns the number of rounds taken
pub fn optimize(function: &mut Function, options: &HashSet<Optimizations>) -> usize {
    let mut rounds = 0;
    while rounds < MAX_ROUNDS {
        rounds += 1;
        let mut changed = false;

        if options.contains(&Optimizations::Gvn) {
            changed |= gvn(function);
        }
        if options.contains(&Optimizations::InstCombine) {
            changed |= constant_folding(function);
        }
        if options.contains(&Optimizations::DeadCode) {
            changed |= dead_code(function);
        }
        if options.contains(&Optimizations::SimplifyCfg) {
            changed |= simplify_cfg(function);
        }

        debug!("optimization round {} changed: {}", rounds, changed);
        if !changed {
            break;
        }
    }
    rounds
}

/// Where a pointer points: the alloca it is derived from and, when every
/// index on the way is a constant, the byte offset into that alloca
pub(crate) fn pointer_location(function: &Function, value: &Value) -> Option<(InstId, Option<i64>)> {
    let id = value.as_inst()?;
    match &function.inst(id).kind {
        InstKind::Alloca { .. } => Some((id, Some(0))),
        InstKind::Gep {
            base_ty,
            ptr,
            indices,
        } => {
            let (root, base) = pointer_location(function, ptr)?;
            let offset = base.and_then(|base| Some(base + constant_offset(base_ty, indices)?));
            Some((root, offset))
        }
        _ => None,
    }
}

fn constant_offset(base_ty: &Type, indices: &[Value]) -> Option<i64> {
    let mut ty = base_ty;
    let mut offset: i64 = 0;
    for (i, index) in indices.iter().enumerate() {
        if i > 0 {
            ty = ty.element()?;
        }
        let index = index.as_const()?.as_signed()?;
        let size = ty.store_size()? as i64;
        offset = offset.checked_add(index.checked_mul(size)?)?;
    }
    Some(offset)
}

pub(crate) fn pointer_root(function: &Function, value: &Value) -> Option<InstId> {
    pointer_location(function, value).map(|(root, _)| root)
}

/// Can an access of `a_size` bytes at `a` overlap an access of `b_size` bytes at `b`?
///
/// Two different allocas never overlap, and neither do disjoint constant offsets into the same one.
pub(crate) fn may_alias(function: &Function, a: &Value, a_size: u64, b: &Value, b_size: u64) -> bool {
    if a == b {
        return true;
    }
    match (pointer_location(function, a), pointer_location(function, b)) {
        (Some((a_root, a_offset)), Some((b_root, b_offset))) => {
            if a_root != b_root {
                return false;
            }
            match (a_offset, b_offset) {
                (Some(a_offset), Some(b_offset)) => {
                    let (a_offset, b_offset) = (a_offset as i128, b_offset as i128);
                    a_offset < b_offset + b_size as i128 && b_offset < a_offset + a_size as i128
                }
                _ => true,
            }
        }
        _ => true,
    }
}

/// Size in bytes of a load or store of `ty`
pub(crate) fn access_size(ty: &Type) -> u64 {
    ty.store_size().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{compile, CodegenOptions},
        ir::{verify_module, Module},
        parser::parse,
    };

    fn optimized(source: &str) -> Module {
        let mut module = compile(&parse(source.as_bytes()), "test", &CodegenOptions::default()).unwrap();
        let main = module.get_function("main").unwrap();
        optimize(module.function_mut(main), &Optimizations::all());
        verify_module(&module).unwrap();
        module
    }

    #[test]
    fn constant_output_collapses_to_a_single_call() {
        let module = optimized("+++.");
        let text = module.to_string();
        assert!(text.contains(
            "entry:\n  %\"putchar()\" = call i32 @putchar(i8 3)\n  ret void\n}"
        ));
    }

    #[test]
    fn program_without_io_optimizes_to_nothing() {
        let module = optimized("+>++<-");
        let main = module.function(module.get_function("main").unwrap());
        assert_eq!(main.block_order().len(), 1);
        assert_eq!(main.live_instructions().len(), 1);
    }

    #[test]
    fn leading_loop_on_fresh_tape_is_dropped() {
        // the first cell starts at zero so this group can never run
        let module = optimized("[.+]");
        let main = module.function(module.get_function("main").unwrap());
        assert!(main.find_block("group content").is_none());
        assert_eq!(main.block_order().len(), 1);
    }

    #[test]
    fn loops_that_depend_on_input_survive() {
        let module = optimized(",[.,]");
        let main = module.function(module.get_function("main").unwrap());
        assert!(main.find_block("group content").is_some());
    }

    #[test]
    fn no_passes_no_changes() {
        let mut module = compile(&parse(b"+[-]."), "test", &CodegenOptions::default()).unwrap();
        let before = module.to_string();
        let main = module.get_function("main").unwrap();
        let rounds = optimize(module.function_mut(main), &HashSet::new());
        assert_eq!(rounds, 1);
        assert_eq!(module.to_string(), before);
    }

    #[test]
    fn aliasing_follows_allocas() {
        let module = compile(&parse(b"+"), "test", &CodegenOptions::default()).unwrap();
        let main = module.function(module.get_function("main").unwrap());
        let entry = main.entry_block().unwrap();
        let ids = &main.block(entry).instructions;
        let (position, tape, gep) = (Value::Inst(ids[0]), Value::Inst(ids[2]), Value::Inst(ids[5]));

        assert_eq!(pointer_root(main, &gep), Some(ids[2]));
        assert_eq!(pointer_location(main, &tape), Some((ids[2], Some(0))));
        // the index is the loaded cursor, so the offset isn't known
        assert_eq!(pointer_location(main, &gep), Some((ids[2], None)));
        assert!(!may_alias(main, &position, 8, &tape, 0x4000));
        assert!(may_alias(main, &gep, 1, &tape, 1));
        assert!(!may_alias(main, &gep, 1, &position, 8));
    }

    #[test]
    fn constant_offsets_into_the_tape() {
        let tape = Type::array(Type::i8(), 16);
        assert_eq!(constant_offset(&tape, &[Value::int(64, 0), Value::int(64, 3)]), Some(3));
        assert_eq!(constant_offset(&tape, &[Value::int(64, 1), Value::int(64, -1)]), Some(15));
        assert_eq!(constant_offset(&tape, &[Value::int(64, 0), Value::int(64, 0), Value::int(64, 0)]), None);
        assert_eq!(access_size(&Type::i64()), 8);
    }
}
