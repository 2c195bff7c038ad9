use std::path::PathBuf;

use clap::Parser;
use glslopt::{
    ir::{opt::VectorSplittingMode, print::print_program, read::read_program},
    optimize, stats, Options, Target,
};
use similar::TextDiff;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "glslopt")]
#[command(about = "Optimize a shader given in IR s-expression form")]
struct Cli {
    /// IR file to optimize
    file: PathBuf,

    /// Whole program is available (enables inlining and loop unrolling)
    #[arg(long)]
    linked: bool,

    /// glsl, glsles or metal
    #[arg(long, default_value = "glsl", value_parser = parse_target)]
    target: Target,

    /// Loops with at most this many iterations are unrolled
    #[arg(long, default_value_t = 8)]
    max_unroll: u32,

    /// Integers are emulated with floats on the target
    #[arg(long)]
    no_native_integers: bool,

    /// Allow reassociation of floating-point operators
    #[arg(long)]
    fast_math: bool,

    #[arg(long, default_value_t = 1000)]
    max_rounds: usize,

    /// Also split vectors used as loop counters
    #[arg(long)]
    split_loop_inductors: bool,

    /// Print a unified diff of the IR instead of the optimized IR
    #[arg(long)]
    diff: bool,

    /// Print instruction counts and interface variables
    #[arg(long)]
    stats: bool,

    /// Log progress of every pass
    #[arg(short, long)]
    verbose: bool,
}

fn parse_target(s: &str) -> Result<Target, String> {
    Target::from_name(s).ok_or_else(|| format!("unknown target `{s}`"))
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to read {}: {e}", cli.file.display());
            std::process::exit(1);
        }
    };
    let mut program = match read_program(&source) {
        Ok(p) => p,
        Err(e) => {
            error!("{}:{e}", cli.file.display());
            std::process::exit(1);
        }
    };

    let options = Options {
        target: cli.target,
        linked: cli.linked,
        max_unroll_iterations: cli.max_unroll,
        native_integers: !cli.no_native_integers,
        fast_math: cli.fast_math,
        max_rounds: cli.max_rounds,
        vector_splitting: if cli.split_loop_inductors {
            VectorSplittingMode::LoopInductors
        } else {
            VectorSplittingMode::OnlyUnused
        },
        ..Options::default()
    };

    let before = print_program(&program);
    if let Err(e) = optimize(&mut program, &options) {
        error!("Optimization failed: {e}");
        std::process::exit(1);
    }
    let after = print_program(&program);

    if cli.diff {
        let diff = TextDiff::from_lines(&before, &after);
        print!(
            "{}",
            diff.unified_diff()
                .context_radius(3)
                .header("before", "after")
        );
    } else {
        print!("{after}");
    }

    if cli.stats {
        let s = stats::collect_stats(&program);
        println!("; math {} texture {} flow {}", s.math, s.texture, s.flow);
        let r = stats::reflect(&program);
        for (kind, vars) in [("input", &r.inputs), ("uniform", &r.uniforms), ("texture", &r.textures)] {
            for v in vars {
                match v.precision.qualifier() {
                    Some(p) => println!("; {kind} {p} {} {}", v.type_name, v.name),
                    None => println!("; {kind} {} {}", v.type_name, v.name),
                }
            }
        }
    }
}
