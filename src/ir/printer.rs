use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Write},
};

use super::{BlockId, Constant, Function, InstId, InstKind, Module, Type, Value};

/// Hands out unique local names, blocks and values share the same namespace
#[derive(Default)]
struct Namer {
    used: HashSet<String>,
    next_unnamed: usize,
}

impl Namer {
    fn fresh(&mut self, hint: &str) -> String {
        if hint.is_empty() {
            let name = self.next_unnamed.to_string();
            self.next_unnamed += 1;
            self.used.insert(name.clone());
            return name;
        }

        if self.used.insert(hint.to_string()) {
            return hint.to_string();
        }

        let mut suffix = 1;
        loop {
            let candidate = format!("{}{}", hint, suffix);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Identifiers that need no quoting: `[-a-zA-Z$._][-a-zA-Z$._0-9]*` or a plain number
fn is_plain(name: &str) -> bool {
    let is_ident_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_');
    match name.chars().next() {
        None => false,
        Some(c) if c.is_ascii_digit() => name.chars().all(|c| c.is_ascii_digit()),
        Some(_) => name.chars().all(is_ident_char),
    }
}

fn quoted(name: &str) -> String {
    if is_plain(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    }
}

fn constant(c: &Constant) -> String {
    match c {
        Constant::Int { bits: 1, value } => {
            if *value == 0 {
                "false".to_string()
            } else {
                "true".to_string()
            }
        }
        Constant::Int { .. } => c.as_signed().unwrap_or_default().to_string(),
        Constant::Zero(ty) if ty.is_int() => "0".to_string(),
        Constant::Zero(_) => "zeroinitializer".to_string(),
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
    values: HashMap<InstId, String>,
    blocks: HashMap<BlockId, String>,
}

impl<'a> FunctionPrinter<'a> {
    fn new(module: &'a Module, function: &'a Function) -> Self {
        let mut namer = Namer::default();
        let mut values = HashMap::new();
        let mut blocks = HashMap::new();

        for block in function.block_order() {
            blocks.insert(*block, namer.fresh(&function.block(*block).name));
            for id in function.block(*block).instructions.iter() {
                let inst = function.inst(*id);
                if inst.produces_value() {
                    values.insert(*id, namer.fresh(&inst.name));
                }
            }
        }

        FunctionPrinter {
            module,
            function,
            values,
            blocks,
        }
    }

    fn value(&self, value: &Value) -> String {
        match value {
            Value::Const(c) => constant(c),
            Value::Inst(id) => match self.values.get(id) {
                Some(name) => format!("%{}", quoted(name)),
                None => "poison".to_string(),
            },
        }
    }

    fn typed(&self, value: &Value) -> String {
        format!("{} {}", self.function.value_type(value), self.value(value))
    }

    fn label(&self, block: &BlockId) -> String {
        match self.blocks.get(block) {
            Some(name) => format!("label %{}", quoted(name)),
            None => "label %<unknown>".to_string(),
        }
    }

    fn instruction(&self, id: InstId) -> String {
        let inst = self.function.inst(id);
        let body = match &inst.kind {
            InstKind::Alloca { ty } => format!("alloca {}", ty),
            InstKind::Load { ty, ptr } => format!("load {}, {}", ty, self.typed(ptr)),
            InstKind::Store { value, ptr } => {
                format!("store {}, {}", self.typed(value), self.typed(ptr))
            }
            InstKind::Binary { op, lhs, rhs } => format!(
                "{} {}, {}",
                op.mnemonic(),
                self.typed(lhs),
                self.value(rhs)
            ),
            InstKind::ICmp { pred, lhs, rhs } => format!(
                "icmp {} {}, {}",
                pred.mnemonic(),
                self.typed(lhs),
                self.value(rhs)
            ),
            InstKind::Gep {
                base_ty,
                ptr,
                indices,
            } => {
                let mut s = format!("getelementptr {}, {}", base_ty, self.typed(ptr));
                for index in indices {
                    s.push_str(", ");
                    s.push_str(&self.typed(index));
                }
                s
            }
            InstKind::Call { callee, args } => {
                let callee = self.module.function(*callee);
                let args: Vec<String> = args.iter().map(|a| self.typed(a)).collect();
                format!(
                    "call {} @{}({})",
                    callee.ty.ret,
                    quoted(&callee.name),
                    args.join(", ")
                )
            }
            InstKind::Cast { op, value, ty } => {
                format!("{} {} to {}", op.mnemonic(), self.typed(value), ty)
            }
            InstKind::Br { target } => format!("br {}", self.label(target)),
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            } => format!(
                "br {}, {}, {}",
                self.typed(cond),
                self.label(then_block),
                self.label(else_block)
            ),
            InstKind::Ret { value: None } => "ret void".to_string(),
            InstKind::Ret { value: Some(value) } => format!("ret {}", self.typed(value)),
        };

        match self.values.get(&id) {
            Some(name) => format!("%{} = {}", quoted(name), body),
            None => body,
        }
    }

    fn print(&self, f: &mut dyn Write) -> fmt::Result {
        let params: Vec<String> = self.function.ty.params.iter().map(Type::to_string).collect();
        writeln!(
            f,
            "define {} @{}({}) {{",
            self.function.ty.ret,
            quoted(&self.function.name),
            params.join(", ")
        )?;

        for block in self.function.block_order() {
            writeln!(f, "{}:", quoted(&self.blocks[block]))?;
            for id in self.function.block(*block).instructions.iter() {
                writeln!(f, "  {}", self.instruction(*id))?;
            }
        }

        writeln!(f, "}}")
    }
}

/// Textual IR for a single function, or its `declare` line when it has no body
pub fn print_function(module: &Module, function: &Function) -> String {
    let mut out = String::new();
    if function.is_declaration() {
        let params: Vec<String> = function.ty.params.iter().map(Type::to_string).collect();
        // writing into a String can't fail
        let _ = writeln!(
            out,
            "declare {} @{}({})",
            function.ty.ret,
            quoted(&function.name),
            params.join(", ")
        );
    } else {
        let _ = FunctionPrinter::new(module, function).print(&mut out);
    }
    out
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        for (_, function) in self.functions() {
            writeln!(f)?;
            f.write_str(&print_function(self, function))?;
        }
        Ok(())
    }
}
