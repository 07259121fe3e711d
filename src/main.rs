use std::{
    collections::HashSet,
    io::{self, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{arg, command, Parser, ValueEnum};
use colored::Colorize;
use tracing::info;

use brainfudgir::{
    codegen::{compile, CodegenOptions, TAPE_SIZE},
    interpreter::{AstInterpreter, IrInterpreter, Runtime},
    ir::verify_module,
    lexer::Lexer,
    logger::{self, LogLevel},
    optimizer::{optimize, Optimizations},
    parser::parse,
};

/// Brainf**k to LLVM IR compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The file to compile
    #[arg()]
    file: PathBuf,

    /// What to output, the IR when nothing is given
    #[arg(value_enum)]
    commands: Vec<Commands>,

    #[arg(short, long, value_enum)]
    optimizations: Vec<Optimizations>,

    #[arg(short, long)]
    all_optimizations: bool,

    /// Number of cells on the tape
    #[arg(long, default_value_t = TAPE_SIZE)]
    tape_size: u64,

    /// Give up interpreting after this many steps
    #[arg(long)]
    max_steps: Option<u64>,

    /// More logging, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Hash, PartialEq, Eq)]
enum Commands {
    /// Output the recognized symbols
    Tokens,
    /// Output the ast
    Ast,
    /// Output the (optimized) IR
    Ir,

    /// Run the AST as is
    AstInterpreter,
    /// Run the (optimized) IR
    IrInterpreter,
}

fn stdio_runtime(tape_size: u64) -> Result<Runtime> {
    let tape_size = usize::try_from(tape_size).context("tape size doesn't fit in memory")?;
    Ok(Runtime::new(
        tape_size,
        Box::new(io::stdin()),
        Box::new(io::stdout()),
    ))
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_level(LogLevel::from_verbosity(args.verbose));

    let mut commands: HashSet<Commands> = HashSet::from_iter(args.commands);
    if commands.is_empty() {
        commands.insert(Commands::Ir);
    }
    let optimizations: HashSet<Optimizations> = if args.all_optimizations {
        Optimizations::all()
    } else {
        HashSet::from_iter(args.optimizations)
    };

    info!("Compiling {}", args.file.display());
    let source = std::fs::read(&args.file)
        .with_context(|| format!("couldn't read {}", args.file.display()))?;

    if commands.contains(&Commands::Tokens) {
        let symbols: String = Lexer::new(&source).map(|s| s.as_char()).collect();
        println!("{}", symbols);
    }

    info!("{}", "Starting parsing".blue());
    let mut now = Instant::now();
    let program = parse(&source);
    info!("{} {:.2?}", "Finished parsing in".green(), now.elapsed());

    if commands.contains(&Commands::Ast) {
        println!("{:#?}", program);
    }

    if commands.contains(&Commands::AstInterpreter) {
        info!("{}", "Starting ast-interpreter".blue());
        now = Instant::now();
        let mut runtime = stdio_runtime(args.tape_size)?;
        let mut interpreter = match args.max_steps {
            Some(limit) => AstInterpreter::with_step_limit(limit),
            None => AstInterpreter::new(),
        };
        interpreter.interpret(&mut runtime, &program)?;
        info!(
            "{} {:.2?}",
            "Finished ast-interpreter in".green(),
            now.elapsed()
        );
    }

    let options = CodegenOptions {
        tape_size: args.tape_size,
        ..CodegenOptions::default()
    };
    let module_name = args
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "brainfuck".to_string());

    info!("{}", "Starting codegen".blue());
    now = Instant::now();
    let mut module = compile(&program, &module_name, &options)?;
    info!("{} {:.2?}", "Finished codegen in".green(), now.elapsed());

    info!("{} {:?}", "Starting optimizations".blue(), &optimizations);
    now = Instant::now();
    if let Some(main) = module.get_function(&options.entry_name) {
        let rounds = optimize(module.function_mut(main), &optimizations);
        info!(
            "{} in {} rounds, {:.2?}",
            "Finished optimizations".green(),
            rounds,
            now.elapsed()
        );
    }
    verify_module(&module).context("optimized module failed verification")?;

    if commands.contains(&Commands::Ir) {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", module)?;
        stdout.flush()?;
    }

    if commands.contains(&Commands::IrInterpreter) {
        info!("{}", "Starting ir-interpreter".blue());
        now = Instant::now();
        let mut runtime = stdio_runtime(args.tape_size)?;
        let mut interpreter = match args.max_steps {
            Some(limit) => IrInterpreter::with_step_limit(limit),
            None => IrInterpreter::new(),
        };
        let stats = interpreter.run(&module, &options.entry_name, &mut runtime)?;
        info!(
            "{} {} steps, {:.2?}",
            "Finished ir-interpreter in".green(),
            stats.steps,
            now.elapsed()
        );
    }

    Ok(())
}
