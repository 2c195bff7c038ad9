use crate::ir::{visit, Block, LoopControls, Program, Stmt};

use super::{LoopState, LoopVariableState};

/// Folds computable terminators into loop controls.
///
/// Every terminator with a known iteration count is removed from the body;
/// the one that stops the loop first becomes the loop's controls. A loop
/// proven to run zero times is removed.
pub fn set_loop_controls(program: &mut Program, state: &LoopState) -> bool {
    let mut changed = 0;
    program.for_each_body(|_, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = controls_in_block(state, b);
            changed += n;
            n > 0
        })
    });

    if changed > 0 {
        tracing::debug!("[LoopControls] set controls on {changed} loops");
    }
    changed > 0
}

fn controls_in_block(state: &LoopState, block: &mut Block) -> usize {
    let mut changed = 0;
    block.retain_mut(|s| {
        let Stmt::Loop(l) = s else {
            return true;
        };
        let Some(ls) = state.get(l.id) else {
            return true;
        };
        if ls.max_iterations == Some(0) {
            tracing::trace!("[LoopControls] {:?} never runs", l.id);
            changed += 1;
            return false;
        }
        if apply(ls, &mut l.body, &mut l.controls) {
            changed += 1;
        }
        true
    });
    changed
}

fn apply(ls: &LoopVariableState, body: &mut Block, controls: &mut Option<LoopControls>) -> bool {
    let mut changed = false;
    if let Some(b) = ls.limiting().and_then(|t| t.bound.as_ref()) {
        if controls.as_ref().map_or(true, |c| b.iterations < c.iterations) {
            *controls = Some(LoopControls {
                counter: b.counter,
                from: Some(b.from.clone()),
                to: b.to.clone(),
                increment: b.increment.clone(),
                cmp: b.cmp,
                iterations: b.iterations,
            });
            changed = true;
        }
    }

    // The controls stop the loop no later than any other counted exit.
    for t in ls.terminators.iter().rev().filter(|t| t.bound.is_some()) {
        let still_there = matches!(
            body.get(t.index),
            Some(Stmt::If(i)) if i.condition == t.break_condition
        );
        if still_there && controls.is_some() {
            body.remove(t.index);
            changed = true;
        }
    }
    changed
}
