//! sablec - command line driver.
//!
//! Compiles a source file to a relocatable ELF object, or dumps one of the
//! intermediate stages: tokens, AST, IR before/after SSA conversion, or
//! Graphviz views of the CFG and dominator tree.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bumpalo::Bump;
use clap::{Parser, ValueEnum};

use sable::analysis::{DominanceFrontiers, Dominators};
use sable::backend;
use sable::core::CompilationSession;
use sable::frontend;
use sable::ir::{self, IrContext, PrintAnnotations};
use sable::ssa;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Token stream.
    Tokens,
    /// Abstract syntax tree.
    Ast,
    /// Graphviz DOT of the AST.
    AstDot,
    /// IR before SSA conversion.
    Ir,
    /// IR after SSA conversion, annotated with dominator information.
    Ssa,
    /// Graphviz DOT of the CFG after SSA conversion.
    CfgDot,
    /// Graphviz DOT of the dominator tree.
    DomDot,
    /// Relocatable ELF object.
    Obj,
}

#[derive(Parser)]
#[command(name = "sablec", about = "A small native-code compiler")]
struct Args {
    /// Source file to compile.
    input: PathBuf,

    /// What to produce.
    #[arg(long, value_enum, default_value = "obj")]
    emit: Emit,

    /// Output path; defaults to the input with an `.o` extension for
    /// objects, stdout otherwise.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print compilation statistics to stderr.
    #[arg(long)]
    stats: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("sablec: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let source = fs::read_to_string(&args.input)
        .map_err(|e| format!("cannot read {}: {}", args.input.display(), e))?;

    if args.emit == Emit::Tokens {
        let tokens = frontend::lexer::tokenize(&source).map_err(|e| e.to_string())?;
        let mut out = String::new();
        for token in tokens {
            out.push_str(&format!(
                "{}:{}: {:?} `{}`\n",
                token.line, token.col, token.kind, token.text
            ));
        }
        return write_text(args, &out);
    }

    let module = frontend::parse(&source).map_err(|e| e.to_string())?;
    match args.emit {
        Emit::Ast => return write_text(args, &frontend::ast::dump(&module)),
        Emit::AstDot => return write_text(args, &frontend::ast::dump_dot(&module)),
        _ => {}
    }

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut ctx = IrContext::new();
    let funcs = frontend::build_module(&mut ctx, &session, &module).map_err(|e| e.to_string())?;

    if args.emit == Emit::Ir {
        let mut out = String::new();
        for &func in &funcs {
            out.push_str(&ir::print_function(
                &mut ctx,
                &session,
                func,
                &PrintAnnotations::default(),
            ));
        }
        return write_text(args, &out);
    }

    let mut out = String::new();
    for &func in &funcs {
        let doms = Dominators::compute(&ctx, func);
        let frontiers = DominanceFrontiers::compute(&ctx, &doms);
        ssa::ssa_convert(&mut ctx, &session, func, &doms, &frontiers)
            .map_err(|e| e.to_string())?;

        match args.emit {
            Emit::Ssa => {
                let annotations = PrintAnnotations {
                    doms: Some(&doms),
                    frontiers: Some(&frontiers),
                };
                out.push_str(&ir::print_function(&mut ctx, &session, func, &annotations));
            }
            Emit::CfgDot => {
                out.push_str(&ir::dump_cfg_dot(
                    &mut ctx,
                    &session,
                    func,
                    &PrintAnnotations::default(),
                ));
            }
            Emit::DomDot => {
                out.push_str(&ir::dump_dom_tree_dot(&mut ctx, &session, &doms));
            }
            _ => {}
        }
    }

    match args.emit {
        Emit::Ssa | Emit::CfgDot | Emit::DomDot => return write_text(args, &out),
        _ => {}
    }

    let compiled = backend::compile_module(&ctx, &session).map_err(|e| e.to_string())?;
    let bytes = backend::write_object(&compiled).map_err(|e| e.to_string())?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("o"));
    fs::write(&output, bytes).map_err(|e| format!("cannot write {}: {}", output.display(), e))?;

    if args.stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}

fn write_text(args: &Args, text: &str) -> Result<(), String> {
    match &args.output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("cannot write {}: {}", path.display(), e))
        }
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}
