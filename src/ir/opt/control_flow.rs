use crate::{
    const_expr,
    ir::{visit, Block, Expr, If, Operation, Program, Stmt},
};

/// Replaces an `if` on a compile-time constant with the taken branch, drops
/// an `if` with two empty branches, and turns `if (c) {} else { S }` into
/// `if (!c) { S }`.
pub fn if_simplification(program: &mut Program) -> bool {
    let mut simplified = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = simplify_block(program, b);
            simplified += n;
            n > 0
        })
    });

    if simplified > 0 {
        tracing::debug!("[IfSimplification] simplified {simplified} if statements");
    }
    simplified > 0
}

fn simplify_block(program: &Program, block: &mut Block) -> usize {
    let mut simplified = 0;
    for s in core::mem::take(block) {
        let Stmt::If(mut i) = s else {
            block.push(s);
            continue;
        };

        if let Some(taken) = const_expr::evaluate(program, &i.condition).and_then(|c| c.as_bool()) {
            tracing::trace!("[IfSimplification] condition is always {taken}");
            block.extend(if taken { i.then_block } else { i.else_block });
            simplified += 1;
        } else if i.then_block.is_empty() && i.else_block.is_empty() {
            simplified += 1;
        } else if i.then_block.is_empty() {
            let precision = i.condition.precision;
            match Expr::op(Operation::LogicNot, vec![i.condition.clone()]) {
                Some(mut negated) => {
                    negated.precision = precision;
                    i.condition = negated;
                    i.then_block = core::mem::take(&mut i.else_block);
                    simplified += 1;
                }
                None => debug_assert!(false, "if condition is not a boolean"),
            }
            block.push(Stmt::If(i));
        } else {
            block.push(Stmt::If(i));
        }
    }

    simplified
}

/// `if (a) { if (b) { S } }` with no else branches becomes
/// `if (a && b) { S }`.
pub fn flatten_nested_if_blocks(program: &mut Program) -> bool {
    let mut flattened = 0;
    program.for_each_body(|_, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let mut modified = false;
            for s in b.iter_mut() {
                let Stmt::If(outer) = s else {
                    continue;
                };
                while let Some(merged) = merge_nested(outer) {
                    *outer = merged;
                    flattened += 1;
                    modified = true;
                }
            }
            modified
        })
    });

    if flattened > 0 {
        tracing::debug!("[FlattenNestedIf] merged {flattened} nested conditions");
    }
    flattened > 0
}

fn merge_nested(outer: &If) -> Option<If> {
    if !outer.else_block.is_empty() {
        return None;
    }
    let [Stmt::If(inner)] = outer.then_block.as_slice() else {
        return None;
    };
    if !inner.else_block.is_empty() || !outer.condition.ty.is_scalar() || !inner.condition.ty.is_scalar() {
        return None;
    }

    let condition = Expr::op(
        Operation::LogicAnd,
        vec![outer.condition.clone(), inner.condition.clone()],
    )?;
    Some(If {
        condition,
        then_block: inner.then_block.clone(),
        else_block: Vec::new(),
    })
}

/// Removes jumps that only restate where control flows anyway: statements
/// after an unconditional jump, a trailing `continue` of a loop body, a
/// trailing `return` of a void function, and identical `break`/`continue`
/// at the end of both branches (hoisted after the `if`).
pub fn redundant_jumps(program: &mut Program) -> bool {
    let mut removed = 0;
    program.for_each_body(|program, id, body| {
        let mut modified = visit::walk_blocks_mut(body, &mut |b| {
            let n = unreachable_tail(b) + hoist_common_jump(b);
            removed += n;
            n > 0
        });
        modified |= remove_trailing_continues(body, &mut removed);

        let returns_void = program
            .function(id)
            .is_some_and(|f| f.return_type.is_void());
        if returns_void && matches!(body.last(), Some(Stmt::Return(None))) {
            body.pop();
            removed += 1;
            modified = true;
        }
        modified
    });

    if removed > 0 {
        tracing::debug!("[RedundantJumps] removed {removed} jumps");
    }
    removed > 0
}

fn unreachable_tail(block: &mut Block) -> usize {
    match block.iter().position(Stmt::always_jumps) {
        Some(n) if n + 1 < block.len() => {
            let removed = block.len() - n - 1;
            block.truncate(n + 1);
            removed
        }
        _ => 0,
    }
}

fn hoist_common_jump(block: &mut Block) -> usize {
    let mut hoisted = 0;
    let mut n = 0;
    while n < block.len() {
        if let Stmt::If(i) = &mut block[n] {
            let common = match (i.then_block.last(), i.else_block.last()) {
                (Some(Stmt::Break), Some(Stmt::Break)) => Some(Stmt::Break),
                (Some(Stmt::Continue), Some(Stmt::Continue)) => Some(Stmt::Continue),
                _ => None,
            };
            if let Some(jump) = common {
                i.then_block.pop();
                i.else_block.pop();
                block.insert(n + 1, jump);
                hoisted += 1;
            }
        }
        n += 1;
    }
    hoisted
}

/// A `continue` that ends a loop body, possibly through the branches of a
/// trailing `if`, jumps where the body ends anyway.
fn strip_tail_continue(block: &mut Block) -> usize {
    match block.last_mut() {
        Some(Stmt::Continue) => {
            block.pop();
            1
        }
        Some(Stmt::If(i)) => strip_tail_continue(&mut i.then_block) + strip_tail_continue(&mut i.else_block),
        _ => 0,
    }
}

fn remove_trailing_continues(block: &mut Block, removed: &mut usize) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        if let Stmt::Loop(l) = s {
            let n = strip_tail_continue(&mut l.body);
            *removed += n;
            modified |= n > 0;
        }
        for b in visit::child_blocks_mut(s) {
            modified |= remove_trailing_continues(b, removed);
        }
    }
    modified
}
