use std::collections::HashMap;

use crate::ir::{visit, Block, ExprKind, Loop, Program, Stmt};

use super::{LoopState, LoopVariableState};

/// Work allowed per permitted iteration before a loop counts as too large.
const NODES_PER_ITERATION: usize = 25;

/// Assignments and operators in `block`.
fn node_count(block: &[Stmt]) -> usize {
    let mut nodes = 0;
    visit::walk(block, &mut |s| {
        if matches!(s, Stmt::Assign(_)) {
            nodes += 1;
        }
        visit::for_each_expr(s, &mut |e| {
            e.visit(&mut |x| {
                if matches!(x.kind, ExprKind::Operation(..)) {
                    nodes += 1;
                }
            })
        });
    });
    nodes
}

/// Body of one iteration, or `None` when the loop can't be unrolled.
fn iteration_body(ls: &LoopVariableState, l: &Loop, max_iterations: u32) -> Option<(Block, u32)> {
    let iterations = ls.max_iterations?;
    if iterations > max_iterations
        || ls.contains_calls
        || ls.nested_loops
        || ls.basic_induction_variables().count() != 1
    {
        return None;
    }

    let body = match (&l.controls, ls.limiting()) {
        (Some(_), None) if ls.terminators.is_empty() && ls.jumps == 0 => l.body.clone(),
        (_, Some(t)) if t.bound.is_some() && ls.terminators.len() == 1 && ls.jumps == 1 => {
            let mut body = l.body.clone();
            if !matches!(body.get(t.index), Some(Stmt::If(i)) if i.condition == t.break_condition) {
                return None;
            }
            body.remove(t.index);
            body
        }
        _ => return None,
    };
    let budget = usize::try_from(max_iterations).ok()?.saturating_mul(NODES_PER_ITERATION);
    if node_count(&body).saturating_mul(usize::try_from(iterations).ok()?) > budget {
        return None;
    }
    Some((body, iterations))
}

fn unroll_block(program: &mut Program, state: &LoopState, max_iterations: u32, block: &mut Block) -> usize {
    let mut unrolled = 0;
    for s in core::mem::take(block) {
        let Stmt::Loop(l) = &s else {
            block.push(s);
            continue;
        };
        let Some((body, iterations)) = state.get(l.id).and_then(|ls| iteration_body(ls, l, max_iterations)) else {
            block.push(s);
            continue;
        };

        tracing::trace!("[LoopUnroll] {:?} unrolled {iterations} times", l.id);
        for _ in 0..iterations {
            block.extend(visit::clone_block_fresh(program, &body, &HashMap::new()));
        }
        unrolled += 1;
    }
    unrolled
}

/// Replaces counted loops of at most `max_iterations` iterations with that
/// many copies of their body.
pub fn unroll_loops(program: &mut Program, state: &LoopState, max_iterations: u32) -> bool {
    let mut unrolled = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = unroll_block(program, state, max_iterations, b);
            unrolled += n;
            n > 0
        })
    });

    if unrolled > 0 {
        tracing::debug!("[LoopUnroll] unrolled {unrolled} loops");
    }
    unrolled > 0
}
