use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    codegen::{GETCHAR, PUTCHAR},
    ir::{
        value::{mask, sign_extend},
        BinaryOp, BlockId, CastOp, Constant, Function, InstId, InstKind, IntPredicate, Module,
        Type, Value,
    },
};

use super::{Runtime, RuntimeError};

/// What a run of the IR did, beyond its output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// How often control entered each block, the entry block counts once
    pub block_entries: HashMap<BlockId, usize>,
    /// Instructions executed
    pub steps: u64,
}

impl ExecutionStats {
    pub fn entries(&self, block: BlockId) -> usize {
        self.block_entries.get(&block).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Int { bits: u32, value: u64 },
    /// An address: which alloca it points into and how far in
    Ptr { region: usize, offset: i64 },
    Void,
}

/// Runs one function of a module, with `putchar`/`getchar` wired to a `Runtime`'s streams.
///
/// Every alloca gets its own zero filled byte region; the tape the program sees
/// is the one it allocates itself, not the runtime's.
#[derive(Debug, Default)]
pub struct IrInterpreter {
    max_steps: Option<u64>,
}

struct Frame<'a> {
    module: &'a Module,
    function: &'a Function,
    values: HashMap<InstId, Slot>,
    regions: Vec<Vec<u8>>,
    stats: ExecutionStats,
}

fn malformed(what: impl Into<String>) -> RuntimeError {
    RuntimeError::Malformed { what: what.into() }
}

impl<'a> Frame<'a> {
    fn eval(&self, value: &Value) -> Result<Slot, RuntimeError> {
        match value {
            Value::Const(Constant::Int { bits, value }) => Ok(Slot::Int {
                bits: *bits,
                value: *value,
            }),
            Value::Const(Constant::Zero(Type::Int(bits))) => Ok(Slot::Int {
                bits: *bits,
                value: 0,
            }),
            Value::Const(Constant::Zero(ty)) => Err(malformed(format!("zeroinitializer of {} as a value", ty))),
            Value::Inst(id) => self
                .values
                .get(id)
                .copied()
                .ok_or_else(|| malformed(format!("use of %{} before it was computed", id.0))),
        }
    }

    fn eval_int(&self, value: &Value) -> Result<(u32, u64), RuntimeError> {
        match self.eval(value)? {
            Slot::Int { bits, value } => Ok((bits, value)),
            other => Err(malformed(format!("{:?} where an integer was expected", other))),
        }
    }

    fn eval_ptr(&self, value: &Value) -> Result<(usize, i64), RuntimeError> {
        match self.eval(value)? {
            Slot::Ptr { region, offset } => Ok((region, offset)),
            other => Err(malformed(format!("{:?} where a pointer was expected", other))),
        }
    }

    /// The bytes an access of `size` bytes at `ptr` covers
    fn access(&mut self, ptr: &Value, size: u64) -> Result<&mut [u8], RuntimeError> {
        let (region, offset) = self.eval_ptr(ptr)?;
        let memory = self
            .regions
            .get_mut(region)
            .ok_or_else(|| malformed("pointer to a region that doesn't exist"))?;
        let len = memory.len();
        let start = usize::try_from(offset).ok().filter(|start| {
            (*start as u64)
                .checked_add(size)
                .map_or(false, |end| end <= len as u64)
        });
        match start {
            Some(start) => Ok(&mut memory[start..start + size as usize]),
            None => Err(RuntimeError::OutOfBounds { index: offset, len }),
        }
    }

    fn load(&mut self, ty: &Type, ptr: &Value) -> Result<Slot, RuntimeError> {
        let bits = ty
            .int_width()
            .ok_or_else(|| malformed(format!("load of {}", ty)))?;
        let size = ty.store_size().unwrap_or(0);
        let bytes = self.access(ptr, size)?;
        let value = bytes
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
        Ok(Slot::Int {
            bits,
            value: mask(bits, value),
        })
    }

    fn store(&mut self, value: &Value, ptr: &Value) -> Result<(), RuntimeError> {
        if let Value::Const(Constant::Zero(ty)) = value {
            let size = ty
                .store_size()
                .ok_or_else(|| malformed(format!("store of {}", ty)))?;
            self.access(ptr, size)?.fill(0);
            return Ok(());
        }

        let (bits, value) = self.eval_int(value)?;
        let size = Type::Int(bits).store_size().unwrap_or(0);
        let bytes = self.access(ptr, size)?;
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (value >> (8 * i)) as u8;
        }
        Ok(())
    }

    fn gep(&self, base_ty: &Type, ptr: &Value, indices: &[Value]) -> Result<Slot, RuntimeError> {
        let (region, mut offset) = self.eval_ptr(ptr)?;
        let mut ty = base_ty;
        for (i, index) in indices.iter().enumerate() {
            if i > 0 {
                ty = ty
                    .element()
                    .ok_or_else(|| malformed(format!("index into {}", ty)))?;
            }
            let (bits, index) = self.eval_int(index)?;
            let size = ty
                .store_size()
                .ok_or_else(|| malformed(format!("index over {}", ty)))?;
            offset = offset.wrapping_add(sign_extend(bits, index).wrapping_mul(size as i64));
        }
        Ok(Slot::Ptr { region, offset })
    }

    fn call(&mut self, runtime: &mut Runtime, name: &str, args: &[Value]) -> Result<Slot, RuntimeError> {
        match name {
            PUTCHAR => {
                let (_, byte) = self.eval_int(
                    args.first()
                        .ok_or_else(|| malformed("putchar without an argument"))?,
                )?;
                runtime.write_byte(byte as u8)?;
                Ok(Slot::Int {
                    bits: 32,
                    value: byte & 0xff,
                })
            }
            GETCHAR => {
                let c = runtime.read_byte()?;
                Ok(Slot::Int {
                    bits: 32,
                    value: mask(32, c as i64 as u64),
                })
            }
            _ => Err(RuntimeError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}

impl IrInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop with an error once this many instructions have been executed
    pub fn with_step_limit(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }

    /// Executes the function called `entry` until it returns
    pub fn run(&mut self, module: &Module, entry: &str, runtime: &mut Runtime) -> Result<ExecutionStats, RuntimeError> {
        let id = module
            .get_function(entry)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: entry.to_string(),
            })?;
        let function = module.function(id);
        let mut block = function
            .entry_block()
            .ok_or_else(|| malformed(format!("@{} has no body", entry)))?;

        let mut frame = Frame {
            module,
            function,
            values: HashMap::new(),
            regions: vec![],
            stats: ExecutionStats::default(),
        };

        'blocks: loop {
            *frame.stats.block_entries.entry(block).or_insert(0) += 1;
            trace!("entering {}", function.block(block).name);

            for id in function.block(block).instructions.iter().copied() {
                frame.stats.steps += 1;
                if let Some(limit) = self.max_steps {
                    if frame.stats.steps > limit {
                        return Err(RuntimeError::StepLimitExceeded { limit });
                    }
                }

                let result = match &function.inst(id).kind {
                    InstKind::Alloca { ty } => {
                        let size = ty
                            .store_size()
                            .ok_or_else(|| malformed(format!("alloca of {}", ty)))?;
                        frame.regions.push(vec![0; size as usize]);
                        Slot::Ptr {
                            region: frame.regions.len() - 1,
                            offset: 0,
                        }
                    }
                    InstKind::Load { ty, ptr } => frame.load(ty, ptr)?,
                    InstKind::Store { value, ptr } => {
                        frame.store(value, ptr)?;
                        Slot::Void
                    }
                    InstKind::Binary { op, lhs, rhs } => {
                        let (bits, l) = frame.eval_int(lhs)?;
                        let (_, r) = frame.eval_int(rhs)?;
                        let value = match op {
                            BinaryOp::Add => l.wrapping_add(r),
                            BinaryOp::Sub => l.wrapping_sub(r),
                        };
                        Slot::Int {
                            bits,
                            value: mask(bits, value),
                        }
                    }
                    InstKind::ICmp { pred, lhs, rhs } => {
                        let (_, l) = frame.eval_int(lhs)?;
                        let (_, r) = frame.eval_int(rhs)?;
                        let result = match pred {
                            IntPredicate::Eq => l == r,
                            IntPredicate::Ne => l != r,
                        };
                        Slot::Int {
                            bits: 1,
                            value: result as u64,
                        }
                    }
                    InstKind::Gep {
                        base_ty,
                        ptr,
                        indices,
                    } => frame.gep(base_ty, ptr, indices)?,
                    InstKind::Call { callee, args } => {
                        let name = frame.module.function(*callee).name.clone();
                        frame.call(runtime, &name, args)?
                    }
                    InstKind::Cast { op, value, ty } => {
                        let (from, value) = frame.eval_int(value)?;
                        let to = ty
                            .int_width()
                            .ok_or_else(|| malformed(format!("cast to {}", ty)))?;
                        let value = match op {
                            CastOp::Trunc | CastOp::ZExt => mask(to, value),
                            CastOp::SExt => mask(to, sign_extend(from, value) as u64),
                        };
                        Slot::Int { bits: to, value }
                    }
                    InstKind::Br { target } => {
                        block = *target;
                        continue 'blocks;
                    }
                    InstKind::CondBr {
                        cond,
                        then_block,
                        else_block,
                    } => {
                        let (_, cond) = frame.eval_int(cond)?;
                        block = if cond != 0 { *then_block } else { *else_block };
                        continue 'blocks;
                    }
                    InstKind::Ret { .. } => break 'blocks,
                };
                frame.values.insert(id, result);
            }

            return Err(malformed(format!(
                "block {} ran off its end",
                function.block(block).name
            )));
        }

        runtime.flush()?;
        debug!("@{} returned after {} steps", entry, frame.stats.steps);
        Ok(frame.stats)
    }
}
