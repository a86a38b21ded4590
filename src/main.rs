//! bft CLI
//!
//! One binary, three backends. Optimization flags are latest-wins, as
//! in `bft run prog.b --optimize-simple-loops --optimize-all`.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bft::{
    arm64, classify, evaluate, llvm, optimize, parse, BftError, Inst, Interpreter, NoProfile,
    OptimizerConfig, Recorder,
};

#[derive(Parser)]
#[command(name = "bft")]
#[command(version)]
#[command(about = "Brainfuck toolkit: optimizing interpreter, LLVM-IR and ARM64 compilers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a program
    Run {
        /// Input source file; stdin when omitted
        file: Option<PathBuf>,

        /// Record and print per-instruction execution counts
        #[arg(short = 'p', long = "profile")]
        profile: bool,

        #[command(flatten)]
        opt: OptFlags,

        /// Fold the input-independent prefix before executing
        #[arg(long)]
        partial_eval: bool,
    },

    /// Emit a textual LLVM IR module on stdout
    Llvm {
        /// Input source file; stdin when omitted
        file: Option<PathBuf>,

        #[command(flatten)]
        opt: OptFlags,

        /// Fold the input-independent prefix into literal output calls
        #[arg(long)]
        partial_eval: bool,
    },

    /// Emit ARM64 assembly
    Arm64 {
        /// Input source file
        file: PathBuf,

        #[command(flatten)]
        opt: OptFlags,

        /// Skip compile-time partial evaluation
        #[arg(long)]
        no_partial_eval: bool,

        /// Assembly output path
        #[arg(short, long, default_value = "output.s")]
        output: PathBuf,
    },
}

/// Loop optimization switches. The last flag given wins.
#[derive(Args)]
struct OptFlags {
    /// Disable all loop optimizations
    #[arg(
        long,
        overrides_with_all = ["optimize_simple_loops", "optimize_memory_scans", "optimize_all"]
    )]
    no_optimizations: bool,

    /// Optimize simple loops only
    #[arg(
        long,
        overrides_with_all = ["no_optimizations", "optimize_memory_scans", "optimize_all"]
    )]
    optimize_simple_loops: bool,

    /// Optimize memory scans only
    #[arg(
        long,
        overrides_with_all = ["no_optimizations", "optimize_simple_loops", "optimize_all"]
    )]
    optimize_memory_scans: bool,

    /// Optimize both simple loops and memory scans (default)
    #[arg(
        long,
        overrides_with_all = ["no_optimizations", "optimize_simple_loops", "optimize_memory_scans"]
    )]
    optimize_all: bool,
}

impl OptFlags {
    fn config(&self) -> OptimizerConfig {
        if self.no_optimizations {
            OptimizerConfig::none()
        } else if self.optimize_simple_loops {
            OptimizerConfig {
                simple_loops: true,
                memory_scans: false,
            }
        } else if self.optimize_memory_scans {
            OptimizerConfig {
                simple_loops: false,
                memory_scans: true,
            }
        } else {
            OptimizerConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            file,
            profile,
            opt,
            partial_eval,
        } => cmd_run(file.as_deref(), profile, &opt.config(), partial_eval),
        Commands::Llvm {
            file,
            opt,
            partial_eval,
        } => cmd_llvm(file.as_deref(), &opt.config(), partial_eval),
        Commands::Arm64 {
            file,
            opt,
            no_partial_eval,
            output,
        } => cmd_arm64(&file, &opt.config(), !no_partial_eval, &output),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn read_source(file: Option<&Path>) -> Result<String, BftError> {
    match file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// Parse and run the shared front half of the pipeline. Returns the
/// prepared instruction tree, the compile-time output prefix, and the
/// parser's id count.
fn prepare(
    source: &str,
    config: &OptimizerConfig,
    partial_eval: bool,
) -> Result<(Vec<Inst>, Vec<u8>, usize), BftError> {
    let program = parse(source)?;
    let node_count = program.node_count;
    let (mut insts, prelude) = if partial_eval {
        let folded = evaluate(program.insts)?;
        (folded.program, folded.output)
    } else {
        (program.insts, Vec::new())
    };
    classify(&mut insts);
    if config.enabled() {
        optimize(&mut insts, config);
    }
    Ok((insts, prelude, node_count))
}

fn cmd_run(
    file: Option<&Path>,
    profile: bool,
    config: &OptimizerConfig,
    partial_eval: bool,
) -> Result<(), BftError> {
    let source = read_source(file)?;
    let (insts, prelude, node_count) = prepare(&source, config, partial_eval)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(&prelude)?;

    if profile {
        let mut interp = Interpreter::new(stdin.lock(), &mut out, Recorder::new(node_count));
        interp.run(&insts)?;
        let (_, _, recorder) = interp.into_parts();
        out.write_all(recorder.report(&insts).as_bytes())?;
    } else {
        let mut interp = Interpreter::new(stdin.lock(), &mut out, NoProfile);
        interp.run(&insts)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_llvm(
    file: Option<&Path>,
    config: &OptimizerConfig,
    partial_eval: bool,
) -> Result<(), BftError> {
    let source = read_source(file)?;
    let (insts, prelude, _) = prepare(&source, config, partial_eval)?;
    let module = llvm::emit(&insts, &prelude)?;
    io::stdout().write_all(module.as_bytes())?;
    Ok(())
}

fn cmd_arm64(
    file: &Path,
    config: &OptimizerConfig,
    partial_eval: bool,
    output: &Path,
) -> Result<(), BftError> {
    let source = read_source(Some(file))?;
    let (insts, prelude, _) = prepare(&source, config, partial_eval)?;
    let asm = arm64::emit(&insts, &prelude);
    fs::write(output, asm)?;
    Ok(())
}
