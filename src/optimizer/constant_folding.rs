use crate::ir::{
    value::{mask, sign_extend},
    BinaryOp, CastOp, Constant, Function, InstId, InstKind, IntPredicate, Value,
};

enum Fold {
    /// Every use can take this value instead, the instruction goes away
    Replace(Value),
    /// Cheaper or more canonical form of the same instruction
    Rewrite(InstKind),
}

fn int_constant(value: &Value) -> Option<(u32, u64)> {
    match value.as_const()? {
        Constant::Int { bits, value } => Some((*bits, *value)),
        Constant::Zero(ty) => ty.int_width().map(|bits| (bits, 0)),
    }
}

fn fold_binary(function: &Function, op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Fold> {
    match (op, int_constant(lhs), int_constant(rhs)) {
        (_, Some((bits, l)), Some((_, r))) => {
            let value = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
            };
            Some(Fold::Replace(Value::Const(Constant::Int {
                bits,
                value: mask(bits, value),
            })))
        }
        // constants go on the right
        (BinaryOp::Add, Some(_), None) => Some(Fold::Rewrite(InstKind::Binary {
            op,
            lhs: rhs.clone(),
            rhs: lhs.clone(),
        })),
        (_, None, Some((_, 0))) => Some(Fold::Replace(lhs.clone())),
        // x - c => x + (-c)
        (BinaryOp::Sub, None, Some((bits, c))) => Some(Fold::Rewrite(InstKind::Binary {
            op: BinaryOp::Add,
            lhs: lhs.clone(),
            rhs: Value::Const(Constant::Int {
                bits,
                value: mask(bits, c.wrapping_neg()),
            }),
        })),
        // (x + c1) + c2 => x + (c1 + c2)
        (BinaryOp::Add, None, Some((bits, c2))) => {
            let inner = lhs.as_inst()?;
            match &function.inst(inner).kind {
                InstKind::Binary {
                    op: BinaryOp::Add,
                    lhs: x,
                    rhs: c1,
                } => {
                    let (_, c1) = int_constant(c1)?;
                    Some(Fold::Rewrite(InstKind::Binary {
                        op: BinaryOp::Add,
                        lhs: x.clone(),
                        rhs: Value::Const(Constant::Int {
                            bits,
                            value: mask(bits, c1.wrapping_add(c2)),
                        }),
                    }))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn fold_icmp(pred: IntPredicate, lhs: &Value, rhs: &Value) -> Option<Fold> {
    let (_, l) = int_constant(lhs)?;
    let (_, r) = int_constant(rhs)?;
    let result = match pred {
        IntPredicate::Eq => l == r,
        IntPredicate::Ne => l != r,
    };
    Some(Fold::Replace(Value::int(1, result as i64)))
}

fn fold_cast(op: CastOp, value: &Value, to: u32) -> Option<Fold> {
    let (from, v) = int_constant(value)?;
    let result = match op {
        CastOp::Trunc | CastOp::ZExt => mask(to, v),
        CastOp::SExt => mask(to, sign_extend(from, v) as u64),
    };
    Some(Fold::Replace(Value::Const(Constant::Int {
        bits: to,
        value: result,
    })))
}

fn fold(function: &Function, id: InstId) -> Option<Fold> {
    match &function.inst(id).kind {
        InstKind::Binary { op, lhs, rhs } => fold_binary(function, *op, lhs, rhs),
        InstKind::ICmp { pred, lhs, rhs } => fold_icmp(*pred, lhs, rhs),
        InstKind::Cast { op, value, ty } => fold_cast(*op, value, ty.int_width()?),
        _ => None,
    }
}

/// Folds constant arithmetic, comparisons and casts, and combines chains of constant additions.
pub fn constant_folding(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let mut round_changed = false;
        for (block, id) in function.live_instructions() {
            match fold(function, id) {
                Some(Fold::Replace(value)) => {
                    function.replace_all_uses(id, &value);
                    function.remove_inst(block, id);
                    round_changed = true;
                }
                Some(Fold::Rewrite(kind)) => {
                    function.inst_mut(id).kind = kind;
                    round_changed = true;
                }
                None => {}
            }
        }

        if !round_changed {
            break;
        }
        changed = true;
    }
    changed
}
