use brainfudgir::{
    codegen::{compile, CodegenOptions},
    interpreter::{AstInterpreter, ExecutionStats, IrInterpreter, Runtime, SharedBuffer},
    ir::{verify_module, InstKind, Module},
    optimizer::{optimize, Optimizations},
    parser::{parse, Node},
};

const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

fn build(source: &str) -> Module {
    compile(&parse(source.as_bytes()), "test", &CodegenOptions::default()).expect("codegen failed")
}

fn run_ir(module: &Module, input: &'static [u8]) -> (Vec<u8>, ExecutionStats) {
    let out = SharedBuffer::new();
    let mut runtime = Runtime::new(0, Box::new(input), Box::new(out.clone()));
    let stats = IrInterpreter::with_step_limit(1_000_000)
        .run(module, "main", &mut runtime)
        .expect("ir run failed");
    (out.contents(), stats)
}

fn run_ast(source: &str, input: &'static [u8]) -> Vec<u8> {
    let out = SharedBuffer::new();
    let mut runtime = Runtime::new(0x4000, Box::new(input), Box::new(out.clone()));
    AstInterpreter::with_step_limit(1_000_000)
        .interpret(&mut runtime, &parse(source.as_bytes()))
        .expect("ast run failed");
    out.contents()
}

fn optimized(source: &str) -> Module {
    let mut module = build(source);
    let main = module.get_function("main").unwrap();
    optimize(module.function_mut(main), &Optimizations::all());
    verify_module(&module).expect("optimized module failed verification");
    module
}

#[test]
fn noise_only_program_allocates_and_returns() {
    let program = parse(b"this text has no symbols at all\n");
    assert_eq!(program, Node::Program(vec![]));

    let module = compile(&program, "test", &CodegenOptions::default()).unwrap();
    assert_eq!(module.functions().count(), 1);
    let main = module.function(module.get_function("main").unwrap());
    assert_eq!(main.block_order().len(), 1);
    let kinds: Vec<_> = main
        .live_instructions()
        .iter()
        .map(|(_, id)| main.inst(*id).kind.clone())
        .collect();
    assert!(matches!(kinds[0], InstKind::Alloca { .. }));
    assert!(matches!(kinds[1], InstKind::Store { .. }));
    assert!(matches!(kinds[2], InstKind::Alloca { .. }));
    assert!(matches!(kinds[3], InstKind::Store { .. }));
    assert_eq!(kinds[4], InstKind::Ret { value: None });
    assert_eq!(kinds.len(), 5);
}

#[test]
fn put_three() {
    assert_eq!(
        parse(b"+++."),
        Node::Program(vec![Node::Increment, Node::Increment, Node::Increment, Node::PutChar])
    );
    let module = build("+++.");
    let (out, _) = run_ir(&module, b"");
    assert_eq!(out, vec![3]);
}

#[test]
fn single_decrement_loop_runs_its_body_once() {
    let module = build("+[-]");
    let main = module.function(module.get_function("main").unwrap());
    let body = main.find_block("group content").unwrap();
    let merge = main.find_block("merge").unwrap();

    let (_, stats) = run_ir(&module, b"");
    assert_eq!(stats.entries(body), 1);
    assert_eq!(stats.entries(merge), 1);
}

#[test]
fn echo_until_zero_byte() {
    assert_eq!(
        parse(b",[.,]"),
        Node::Program(vec![
            Node::GetChar,
            Node::ConditionalGroup(vec![Node::PutChar, Node::GetChar]),
        ])
    );

    let module = build(",[.,]");
    let main = module.function(module.get_function("main").unwrap());
    let body = main.find_block("group content").unwrap();

    let (out, stats) = run_ir(&module, b"abc\0never read");
    // the 0 ends the loop without being echoed
    assert_eq!(out, b"abc");
    assert_eq!(stats.entries(body), 3);
}

#[test]
fn cells_wrap_both_ways() {
    let (out, _) = run_ir(&build("-."), b"");
    assert_eq!(out, vec![255]);

    let (out, _) = run_ir(&build(&format!("{}+.", "+".repeat(255))), b"");
    assert_eq!(out, vec![0]);
}

#[test]
fn hello_world() {
    let (out, _) = run_ir(&build(HELLO_WORLD), b"");
    assert_eq!(out, b"Hello World!\n");
    assert_eq!(run_ast(HELLO_WORLD, b""), b"Hello World!\n");
}

#[test]
fn optimization_keeps_behaviour() {
    let programs: &[(&str, &'static [u8])] = &[
        (HELLO_WORLD, b""),
        (",[.,]", b"echo\0"),
        ("+++[>++<-]>[<+>-]<.", b""),
        (",>,<[->+<]>.", b"\x05\x07"),
        ("-[-[-]]+.", b""),
        (",.,.,.", b"a"),
    ];

    for &(source, input) in programs {
        let (plain, _) = run_ir(&build(source), input);
        let (fast, _) = run_ir(&optimized(source), input);
        assert_eq!(plain, fast, "{}", source);
        assert_eq!(plain, run_ast(source, input), "{}", source);
    }
}

#[test]
fn optimized_output_is_smaller() {
    let before = build(HELLO_WORLD);
    let after = optimized(HELLO_WORLD);
    let count = |m: &Module| {
        let main = m.function(m.get_function("main").unwrap());
        main.live_instructions().len()
    };
    assert!(count(&after) < count(&before));
}

#[test]
fn unbalanced_brackets_still_compile() {
    for source in ["[[+", "+]]-.", "]", "[", "[]]]["] {
        let module = build(source);
        verify_module(&module).unwrap();
    }
}

#[test]
fn printed_ir_declares_what_it_uses() {
    let text = build(",.").to_string();
    assert!(text.contains("declare i32 @getchar()"));
    assert!(text.contains("declare i32 @putchar(i8)"));
    assert!(text.contains("define void @main() {"));
    assert!(text.contains("alloca [16384 x i8]"));

    let silent = build("+>-").to_string();
    assert!(!silent.contains("declare"));
}
