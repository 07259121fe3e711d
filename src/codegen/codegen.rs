use tracing::trace;

use crate::{
    ir::{
        verify_function, BinaryOp, BuilderError, Function, FunctionType, IntPredicate, Type, Value,
    },
    parser::Node,
};

use super::{CodegenContext, CodegenError};

/// Emits the IR for `node` at the context's insertion point.
///
/// Lowering a `Program` opens the entry function, every other node has to be
/// generated somewhere inside one.
pub fn generate(node: &Node, ctx: &mut CodegenContext) -> Result<(), CodegenError> {
    match node {
        Node::Increment => update_cell(ctx, BinaryOp::Add, "Increment"),
        Node::Decrement => update_cell(ctx, BinaryOp::Sub, "Decrement"),
        Node::MoveLeft => move_cursor(ctx, BinaryOp::Sub, "MoveLeft"),
        Node::MoveRight => move_cursor(ctx, BinaryOp::Add, "MoveRight"),
        Node::PutChar => put_char(ctx),
        Node::GetChar => get_char(ctx),
        Node::Program(children) => program(ctx, children),
        Node::ConditionalGroup(children) => conditional_group(ctx, children),
    }
}

fn load_cursor(ctx: &mut CodegenContext, node: &'static str) -> Result<Value, CodegenError> {
    let slot = ctx.cursor_slot(node)?;
    Ok(ctx
        .builder
        .build_load(&mut ctx.module, Type::i64(), slot, "position")?)
}

/// Address of the cell under the cursor, the cursor is reloaded every time since it may have moved
fn cell_ptr(ctx: &mut CodegenContext, node: &'static str) -> Result<Value, CodegenError> {
    let tape = ctx.tape_slot(node)?;
    let position = load_cursor(ctx, node)?;
    let tape_ty = ctx.tape_type();
    Ok(ctx.builder.build_gep(
        &mut ctx.module,
        tape_ty,
        tape,
        vec![Value::int(64, 0), position],
        "tape cell ptr",
    )?)
}

/// Loads the cell under the cursor, returns its address alongside the value
fn load_cell(ctx: &mut CodegenContext, node: &'static str) -> Result<(Value, Value), CodegenError> {
    let ptr = cell_ptr(ctx, node)?;
    let cell = ctx
        .builder
        .build_load(&mut ctx.module, Type::i8(), ptr.clone(), "tape cell")?;
    Ok((ptr, cell))
}

fn cell_is_nonzero(ctx: &mut CodegenContext, node: &'static str) -> Result<Value, CodegenError> {
    let (_, cell) = load_cell(ctx, node)?;
    Ok(ctx.builder.build_icmp(
        &mut ctx.module,
        IntPredicate::Ne,
        cell,
        Value::int(8, 0),
        "cell is nonzero",
    )?)
}

// + and -, i8 arithmetic so it wraps on its own
fn update_cell(ctx: &mut CodegenContext, op: BinaryOp, node: &'static str) -> Result<(), CodegenError> {
    let (ptr, cell) = load_cell(ctx, node)?;
    let one = Value::int(8, 1);
    let new_value = match op {
        BinaryOp::Add => ctx.builder.build_add(&mut ctx.module, cell, one, "new tape value")?,
        BinaryOp::Sub => ctx.builder.build_sub(&mut ctx.module, cell, one, "new tape value")?,
    };
    ctx.builder.build_store(&mut ctx.module, new_value, ptr)?;
    Ok(())
}

// < and >
fn move_cursor(ctx: &mut CodegenContext, op: BinaryOp, node: &'static str) -> Result<(), CodegenError> {
    let slot = ctx.cursor_slot(node)?;
    let current = load_cursor(ctx, node)?;
    let one = Value::int(64, 1);
    let next = match op {
        BinaryOp::Add => ctx.builder.build_add(&mut ctx.module, current, one, "next position")?,
        BinaryOp::Sub => ctx.builder.build_sub(&mut ctx.module, current, one, "next position")?,
    };
    ctx.builder.build_store(&mut ctx.module, next, slot)?;
    Ok(())
}

fn put_char(ctx: &mut CodegenContext) -> Result<(), CodegenError> {
    let (_, cell) = load_cell(ctx, "PutChar")?;
    let putchar = ctx.putchar();
    ctx.builder
        .build_call(&mut ctx.module, putchar, vec![cell], "putchar()")?;
    Ok(())
}

fn get_char(ctx: &mut CodegenContext) -> Result<(), CodegenError> {
    // make sure there is somewhere to put the byte before reading it
    ctx.tape_slot("GetChar")?;

    let getchar = ctx.getchar();
    let c = ctx
        .builder
        .build_call(&mut ctx.module, getchar, vec![], "getchar()")?;

    // EOF comes back as -1, so this has to be a sign aware cast
    let truncated = ctx
        .builder
        .build_int_cast(&mut ctx.module, c, Type::i8(), true, "truncated char")?;

    let ptr = cell_ptr(ctx, "GetChar")?;
    ctx.builder.build_store(&mut ctx.module, truncated, ptr)?;
    Ok(())
}

fn program(ctx: &mut CodegenContext, children: &[Node]) -> Result<(), CodegenError> {
    let name = ctx.options.entry_name.clone();
    if ctx.module.get_function(&name).is_some() {
        return Err(CodegenError::EntryRedefined { name });
    }

    let main = ctx
        .module
        .add_function(Function::new(&name, FunctionType::new(Type::Void, vec![])));
    let entry = ctx.module.function_mut(main).append_block("entry");
    ctx.builder.position_at_end(main, entry);

    // the write head starts at the first cell
    let position = ctx
        .builder
        .build_alloca(&mut ctx.module, Type::i64(), "position")?;
    ctx.builder
        .build_store(&mut ctx.module, Value::int(64, 0), position.clone())?;

    let tape_ty = ctx.tape_type();
    let tape = ctx
        .builder
        .build_alloca(&mut ctx.module, tape_ty.clone(), "tape")?;
    ctx.builder
        .build_store(&mut ctx.module, Value::zero(tape_ty), tape.clone())?;

    ctx.set_storage(position, tape);

    for child in children {
        generate(child, ctx)?;
    }

    ctx.builder.build_ret(&mut ctx.module, None)?;
    ctx.builder.clear_insertion_position();

    verify_function(&ctx.module, ctx.module.function(main))?;
    Ok(())
}

// [ ... ] => while (*cell != 0) { ... }
// we more accurately translate it to this: if (*cell != 0) do { ... } while (*cell != 0);
// which needs no separate header block to jump back to.
fn conditional_group(ctx: &mut CodegenContext, children: &[Node]) -> Result<(), CodegenError> {
    let (function, _) = ctx
        .builder
        .insert_block()
        .ok_or(BuilderError::NoInsertPoint)?;

    let start_condition = cell_is_nonzero(ctx, "ConditionalGroup")?;

    let group_content = ctx.builder.append_block(&mut ctx.module, "group content")?;
    let merge = ctx.builder.append_block(&mut ctx.module, "merge")?;
    trace!("lowering group of {} nodes", children.len());

    ctx.builder
        .build_cond_br(&mut ctx.module, start_condition, group_content, merge)?;

    ctx.builder.position_at_end(function, group_content);
    for child in children {
        generate(child, ctx)?;
    }

    // nested groups may have moved the insert point, the back edge still goes to the top of the body
    let end_condition = cell_is_nonzero(ctx, "ConditionalGroup")?;
    ctx.builder
        .build_cond_br(&mut ctx.module, end_condition, group_content, merge)?;

    // siblings after the group carry on from here
    ctx.builder.position_at_end(function, merge);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{compile, CodegenOptions, ENTRY_NAME, GETCHAR, PUTCHAR},
        ir::{InstKind, Module},
        parser::parse,
    };

    fn build(source: &str) -> Module {
        compile(&parse(source.as_bytes()), "test", &CodegenOptions::default()).unwrap()
    }

    fn main_of(module: &Module) -> &Function {
        module.function(module.get_function(ENTRY_NAME).unwrap())
    }

    fn kinds(function: &Function, block: &str) -> Vec<InstKind> {
        let block = function.find_block(block).unwrap();
        function
            .block(block)
            .instructions
            .iter()
            .map(|id| function.inst(*id).kind.clone())
            .collect()
    }

    #[test]
    fn empty_program_allocates_and_returns() {
        let module = build("no code here");
        let main = main_of(&module);
        assert_eq!(main.block_order().len(), 1);

        let kinds = kinds(main, "entry");
        assert_eq!(kinds.len(), 5);
        assert_eq!(kinds[0], InstKind::Alloca { ty: Type::i64() });
        assert!(matches!(kinds[1], InstKind::Store { value: Value::Const(_), .. }));
        assert_eq!(
            kinds[2],
            InstKind::Alloca {
                ty: Type::array(Type::i8(), 0x4000)
            }
        );
        assert!(matches!(
            kinds[3],
            InstKind::Store {
                value: Value::Const(crate::ir::Constant::Zero(_)),
                ..
            }
        ));
        assert_eq!(kinds[4], InstKind::Ret { value: None });

        // nothing touched I/O so nothing got declared
        assert!(module.get_function(PUTCHAR).is_none());
        assert!(module.get_function(GETCHAR).is_none());
    }

    #[test]
    fn increment_is_load_add_store_on_the_cell() {
        let module = build("+");
        let kinds = kinds(main_of(&module), "entry");
        // 4 setup instructions, then the increment, then ret
        let body = &kinds[4..kinds.len() - 1];
        assert!(matches!(body[0], InstKind::Load { ty: Type::Int(64), .. }));
        assert!(matches!(body[1], InstKind::Gep { .. }));
        assert!(matches!(body[2], InstKind::Load { ty: Type::Int(8), .. }));
        assert!(matches!(
            &body[3],
            InstKind::Binary {
                op: BinaryOp::Add,
                rhs: Value::Const(crate::ir::Constant::Int { bits: 8, value: 1 }),
                ..
            }
        ));
        assert!(matches!(body[4], InstKind::Store { .. }));
        assert_eq!(body.len(), 5);
    }

    #[test]
    fn moves_touch_only_the_cursor() {
        let module = build("<");
        let kinds = kinds(main_of(&module), "entry");
        let body = &kinds[4..kinds.len() - 1];
        assert_eq!(body.len(), 3);
        assert!(matches!(body[0], InstKind::Load { ty: Type::Int(64), .. }));
        assert!(matches!(
            &body[1],
            InstKind::Binary {
                op: BinaryOp::Sub,
                rhs: Value::Const(crate::ir::Constant::Int { bits: 64, value: 1 }),
                ..
            }
        ));
        assert!(matches!(body[2], InstKind::Store { .. }));
    }

    #[test]
    fn group_has_entry_and_exit_tests() {
        let module = build("[-]");
        let main = main_of(&module);
        let names: Vec<&str> = main
            .block_order()
            .iter()
            .map(|b| main.block(*b).name.as_str())
            .collect();
        assert_eq!(names, vec!["entry", "group content", "merge"]);

        let content = main.find_block("group content").unwrap();
        let merge = main.find_block("merge").unwrap();
        for block in ["entry", "group content"] {
            let block = main.find_block(block).unwrap();
            assert_eq!(main.successors(block), vec![content, merge]);
        }
        assert!(matches!(
            main.terminator(merge).unwrap().kind,
            InstKind::Ret { value: None }
        ));
    }

    #[test]
    fn nested_groups_branch_back_to_their_own_body() {
        let module = build("[>[-]<]");
        let main = main_of(&module);
        assert_eq!(main.block_order().len(), 5);

        let order = main.block_order();
        let (outer_content, outer_merge) = (order[1], order[2]);
        let (inner_content, inner_merge) = (order[3], order[4]);

        assert_eq!(main.successors(outer_content), vec![inner_content, inner_merge]);
        assert_eq!(main.successors(inner_content), vec![inner_content, inner_merge]);
        // the outer exit test is emitted after the inner loop
        assert_eq!(main.successors(inner_merge), vec![outer_content, outer_merge]);
    }

    #[test]
    fn io_primitives_are_declared_once() {
        let module = build("..,,.");
        let declared: Vec<&str> = module
            .functions()
            .filter(|(_, f)| f.is_declaration())
            .map(|(_, f)| f.name.as_str())
            .collect();
        assert_eq!(declared, vec![PUTCHAR, GETCHAR]);
    }

    #[test]
    fn getchar_is_truncated_before_store() {
        let text = build(",").to_string();
        assert!(text.contains("declare i32 @getchar()"));
        assert!(text.contains("%\"getchar()\" = call i32 @getchar()"));
        assert!(text.contains("%\"truncated char\" = trunc i32 %\"getchar()\" to i8"));
    }

    #[test]
    fn leaves_need_a_program() {
        let mut ctx = CodegenContext::new("test", CodegenOptions::default());
        assert_eq!(
            generate(&Node::Increment, &mut ctx),
            Err(CodegenError::MissingState { node: "Increment" })
        );
        assert_eq!(
            generate(&Node::GetChar, &mut ctx),
            Err(CodegenError::MissingState { node: "GetChar" })
        );
        // and the failed getchar didn't leave a declaration behind
        assert!(ctx.module.get_function(GETCHAR).is_none());
    }

    #[test]
    fn entry_can_only_be_generated_once_per_module() {
        let mut ctx = CodegenContext::new("test", CodegenOptions::default());
        let program = parse(b"+");
        generate(&program, &mut ctx).unwrap();
        assert!(matches!(
            generate(&program, &mut ctx),
            Err(CodegenError::EntryRedefined { .. })
        ));
    }

    #[test]
    fn options_shape_the_output() {
        let options = CodegenOptions {
            tape_size: 8,
            entry_name: "bf_main".to_string(),
        };
        let module = compile(&parse(b"+"), "test", &options).unwrap();
        let text = module.to_string();
        assert!(text.contains("define void @bf_main()"));
        assert!(text.contains("%tape = alloca [8 x i8]"));
    }
}
