use crate::{
    error::OptimizeError,
    ir::{
        loops::{analyze_loops, set_loop_controls, unroll_loops},
        opt::{self, LowerJumpsFlags, VectorSplittingMode},
        validate::validate,
        Program,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Glsl,
    GlslEs,
    Metal,
}
impl Target {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "glsl" => Some(Self::Glsl),
            "glsles" | "glsl-es" => Some(Self::GlslEs),
            "metal" => Some(Self::Metal),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_metal(self) -> bool {
        matches!(self, Self::Metal)
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub target: Target,
    /// Whole program available: enables inlining, global dead code removal,
    /// structure splitting, vectorization and the loop passes.
    pub linked: bool,
    pub max_unroll_iterations: u32,
    /// Integers are real integers on the target, not emulated with floats.
    pub native_integers: bool,
    /// Floating-point operators may be treated as associative.
    pub fast_math: bool,
    /// Globals left without precision end up `highp`.
    pub default_high_precision_globals: bool,
    pub max_rounds: usize,
    pub lower_jumps: LowerJumpsFlags,
    pub vector_splitting: VectorSplittingMode,
    pub validate: bool,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            target: Target::Glsl,
            linked: false,
            max_unroll_iterations: 8,
            native_integers: true,
            fast_math: false,
            default_high_precision_globals: true,
            max_rounds: 1000,
            lower_jumps: LowerJumpsFlags::all(),
            vector_splitting: VectorSplittingMode::OnlyUnused,
            validate: cfg!(debug_assertions),
        }
    }
}

/// One pass over the whole catalogue. Returns whether anything changed.
pub fn run_round(program: &mut Program, options: &Options) -> bool {
    let linked = options.linked;
    let mut progress = false;

    if linked {
        progress |= opt::function_inlining(program);
        progress |= opt::dead_functions(program);
        progress |= opt::structure_splitting(program);
    }
    progress |= opt::if_simplification(program);
    progress |= opt::flatten_nested_if_blocks(program);
    progress |= opt::propagate_precision(program);
    progress |= opt::copy_propagation(program);
    progress |= opt::copy_propagation_elements(program);
    if linked {
        progress |= opt::vectorize(program);
    }

    progress |= opt::dead_code(program, linked);
    progress |= opt::dead_code_local(program);
    progress |= opt::propagate_precision(program);
    progress |= opt::tree_grafting(program);
    progress |= opt::constant_propagation(program);
    progress |= opt::constant_variable(program, linked);
    progress |= opt::constant_folding(program);
    progress |= opt::cse(program);
    progress |= opt::algebraic(program, options.native_integers, options.fast_math);
    progress |= opt::minmax_prune(program);
    progress |= opt::rebalance(program, options.fast_math);

    progress |= opt::lower_jumps(program, options.lower_jumps);
    progress |= opt::vec_index_to_swizzle(program);
    progress |= opt::lower_vector_insert(program);
    progress |= opt::swizzle_swizzle(program);
    progress |= opt::noop_swizzle(program);
    progress |= opt::array_splitting(program, linked);
    progress |= opt::redundant_jumps(program);
    progress |= opt::split_vectors(program, options.vector_splitting);

    if linked {
        progress |= transform_loops(program, options.max_unroll_iterations);
    }
    progress
}

fn transform_loops(program: &mut Program, max_unroll_iterations: u32) -> bool {
    let state = analyze_loops(program);
    if state.is_empty() {
        return false;
    }
    tracing::trace!("[LoopAnalysis] {} loops", state.len());

    let mut progress = set_loop_controls(program, &state);
    // controls may have removed terminators or whole loops
    let state = if progress { analyze_loops(program) } else { state };
    progress |= unroll_loops(program, &state, max_unroll_iterations);
    progress
}

/// Runs rounds until none makes progress, then applies the one-shot
/// target lowerings. Returns whether the program changed at all.
pub fn optimize(program: &mut Program, options: &Options) -> Result<bool, OptimizeError> {
    if options.validate {
        validate(program)?;
    }

    let mut rounds = 0;
    loop {
        if rounds >= options.max_rounds {
            tracing::warn!("[Optimizer] no fixpoint after {rounds} rounds");
            return Err(OptimizeError::NonConvergence { rounds });
        }
        rounds += 1;
        tracing::debug!("[Optimizer] round {rounds}");
        if !run_round(program, options) {
            break;
        }
    }
    let mut changed = rounds > 1;

    if !options.target.is_metal() {
        if options.default_high_precision_globals {
            changed |= opt::default_high_precision(program);
        }
        changed |= opt::lower_saturate(program);
    }
    let collected = program.collect_garbage();

    if options.validate {
        validate(program)?;
    }
    tracing::info!(
        "[Optimizer] fixpoint after {rounds} rounds ({} mode), {collected} dead variables collected",
        if options.linked { "linked" } else { "unlinked" }
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    const SATURATE: &str = "(declare (uniform) float u)
         (declare (out) float o)
         (function main (signature void (parameters) (body
           (assign (x) (var_ref o) (expression float saturate (var_ref u))))))";

    #[test]
    fn metal_keeps_saturate() {
        let mut p = read_program(SATURATE).unwrap();
        let options = Options {
            target: Target::Metal,
            ..Options::default()
        };
        optimize(&mut p, &options).unwrap();
        assert!(print_program(&p).contains("saturate"));

        let mut p = read_program(SATURATE).unwrap();
        optimize(&mut p, &Options::default()).unwrap();
        assert!(print_program(&p).contains("clamp"));
    }

    #[test]
    fn round_cap_is_reported() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) (expression float + (constant float (1.0)) (constant float (2.0)))))))",
        )
        .unwrap();
        let options = Options {
            max_rounds: 1,
            ..Options::default()
        };
        assert!(matches!(
            optimize(&mut p, &options),
            Err(OptimizeError::NonConvergence { rounds: 1 })
        ));
    }

    #[test]
    fn linked_defaults_unroll_counted_loop() {
        let mut p = read_program(
            "(declare (out) (array float 4) w)
             (function main (signature void (parameters) (body
               (declare () int i)
               (assign (x) (var_ref i) (constant int (0)))
               (loop (
                 (if (expression bool >= (var_ref i) (constant int (4))) ((break)) ())
                 (assign (x) (array_ref (var_ref w) (var_ref i)) (constant float (1.0)))
                 (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1)))))))))",
        )
        .unwrap();
        let options = Options {
            linked: true,
            ..Options::default()
        };
        assert!(optimize(&mut p, &options).unwrap());
        let text = print_program(&p);
        assert!(!text.contains("(loop"), "{text}");
        assert_eq!(text.matches("(constant float (1.0))").count(), 4);

        let mut unlinked = read_program(&text).unwrap();
        optimize(&mut unlinked, &Options::default()).unwrap();
        assert!(!print_program(&unlinked).contains("(loop"));
    }

    #[test]
    fn target_names() {
        assert_eq!(Target::from_name("metal"), Some(Target::Metal));
        assert_eq!(Target::from_name("glsles"), Some(Target::GlslEs));
        assert_eq!(Target::from_name("hlsl"), None);
    }
}
