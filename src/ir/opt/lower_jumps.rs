use bitflags::bitflags;

use crate::{
    concrete_type::Type,
    ir::{visit, Block, Constant, Expr, FuncId, If, Operation, Program, Stmt, VarId},
    precision::Precision,
};

bitflags! {
    /// Which jumps [`lower_jumps`] rewrites into structured control flow.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LowerJumpsFlags: u8 {
        /// Hoist a jump ending both branches of an `if` to after the `if`.
        const PULL_OUT_JUMPS = 1 << 0;
        /// Leave functions other than `main` through a single final `return`.
        const LOWER_SUB_RETURN = 1 << 1;
        const LOWER_MAIN_RETURN = 1 << 2;
        /// Replace `continue` with a flag guarding the rest of the loop body.
        const LOWER_CONTINUE = 1 << 3;
    }
}
impl Default for LowerJumpsFlags {
    fn default() -> Self {
        Self::all()
    }
}

pub fn lower_jumps(program: &mut Program, flags: LowerJumpsFlags) -> bool {
    let mut modified = false;
    if flags.contains(LowerJumpsFlags::PULL_OUT_JUMPS) {
        modified |= program.for_each_body(|_, _, body| visit::walk_blocks_mut(body, &mut pull_out_jumps));
    }
    if flags.contains(LowerJumpsFlags::LOWER_CONTINUE) {
        modified |= program.for_each_body(|program, _, body| lower_continues_in(program, body));
    }
    for id in program.function_ids() {
        let is_main = program.function(id).is_some_and(|f| f.is_main());
        let wanted = if is_main {
            LowerJumpsFlags::LOWER_MAIN_RETURN
        } else {
            LowerJumpsFlags::LOWER_SUB_RETURN
        };
        if flags.contains(wanted) {
            modified |= lower_returns(program, id);
        }
    }

    if modified {
        tracing::debug!("[LowerJumps] restructured jumps");
    }
    modified
}

/// `if (c) { ...; jump } else { ...; jump }` with the same jump at the end
/// of both branches becomes `if (c) { ... } else { ... } jump`.
fn pull_out_jumps(block: &mut Block) -> bool {
    let mut modified = false;
    let mut n = 0;
    while n < block.len() {
        let Stmt::If(i) = &mut block[n] else {
            n += 1;
            continue;
        };
        let common = match (i.then_block.last(), i.else_block.last()) {
            (Some(a), Some(b)) if a.is_jump() && a == b => true,
            _ => false,
        };
        if !common {
            n += 1;
            continue;
        }

        i.else_block.pop();
        let Some(jump) = i.then_block.pop() else {
            n += 1;
            continue;
        };
        tracing::trace!("[LowerJumps] pulled a common jump out of both branches");
        // anything after the `if` was unreachable
        block.truncate(n + 1);
        block.push(jump);
        modified = true;
        break;
    }
    modified
}

fn flag_test(program: &Program, flag: VarId, negate: bool) -> Option<Expr> {
    let test = program.var_ref(flag);
    if negate {
        Expr::op(Operation::LogicNot, vec![test])
    } else {
        Some(test)
    }
}

fn set_flag(program: &Program, flag: VarId) -> Stmt {
    Stmt::assign(program.var_ref(flag), Expr::constant(Constant::bool(true)))
}

/// Continues that belong to this loop body, other than a trailing one.
fn has_inner_continue(block: &[Stmt]) -> bool {
    fn any_continue(block: &[Stmt]) -> bool {
        block.iter().any(|s| match s {
            Stmt::Continue => true,
            Stmt::If(i) => any_continue(&i.then_block) || any_continue(&i.else_block),
            _ => false,
        })
    }
    match block.split_last() {
        Some((Stmt::Continue, init)) => any_continue(init),
        _ => any_continue(block),
    }
}

fn lower_continues_in(program: &mut Program, block: &mut Block) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        for b in visit::child_blocks_mut(s) {
            modified |= lower_continues_in(program, b);
        }
        let Stmt::Loop(l) = s else {
            continue;
        };
        if !has_inner_continue(&l.body) {
            continue;
        }

        let flag = program.new_temporary("continue_flag", Type::BOOL, Precision::Undefined);
        let body = core::mem::take(&mut l.body);
        let mut lowered = vec![
            Stmt::Declare(flag),
            Stmt::assign(program.var_ref(flag), Expr::constant(Constant::bool(false))),
        ];
        lowered.extend(guard_continues(program, flag, body));
        l.body = lowered;
        tracing::trace!("[LowerJumps] lowered continue in {:?}", l.id);
        modified = true;
    }
    modified
}

/// Replaces `continue` in `block` (nested loops excluded) by setting `flag`,
/// and guards whatever follows a statement that may have set it.
fn guard_continues(program: &Program, flag: VarId, block: Block) -> Block {
    let mut out = Vec::with_capacity(block.len());
    let mut rest = block.into_iter();
    while let Some(s) = rest.next() {
        match s {
            Stmt::Continue => {
                out.push(set_flag(program, flag));
                return out;
            }
            Stmt::If(i) => {
                let may_continue = has_inner_continue(&i.then_block) || has_inner_continue(&i.else_block)
                    || matches!(i.then_block.last(), Some(Stmt::Continue))
                    || matches!(i.else_block.last(), Some(Stmt::Continue));
                out.push(Stmt::If(If {
                    condition: i.condition,
                    then_block: guard_continues(program, flag, i.then_block),
                    else_block: guard_continues(program, flag, i.else_block),
                }));
                if may_continue {
                    let tail = guard_continues(program, flag, rest.collect());
                    if let (false, Some(condition)) = (tail.is_empty(), flag_test(program, flag, true)) {
                        out.push(Stmt::If(If {
                            condition,
                            then_block: tail,
                            else_block: Vec::new(),
                        }));
                    }
                    return out;
                }
            }
            s => out.push(s),
        }
    }
    out
}

/// Where the value and completion of a lowered `return` are kept.
struct ReturnSlots {
    flag: VarId,
    value: Option<VarId>,
}

/// Returns other than a final top-level one.
fn needs_return_lowering(body: &[Stmt]) -> bool {
    let init = match body.split_last() {
        Some((Stmt::Return(_), init)) => init,
        _ => body,
    };
    init.iter().any(Stmt::has_return)
}

fn lower_returns(program: &mut Program, id: FuncId) -> bool {
    let Some(f) = program.function(id) else {
        return false;
    };
    if !f.body.as_deref().is_some_and(needs_return_lowering) {
        return false;
    }
    let (name, return_type, return_precision) = (f.name.clone(), f.return_type.clone(), f.return_precision);

    let flag = program.new_temporary("return_flag", Type::BOOL, Precision::Undefined);
    let value = (!return_type.is_void())
        .then(|| program.new_temporary("return_value", return_type, return_precision));
    let slots = ReturnSlots { flag, value };

    let Some(body) = program.function_mut(id).and_then(|f| f.body.take()) else {
        return false;
    };
    let mut lowered = vec![
        Stmt::Declare(flag),
        Stmt::assign(program.var_ref(flag), Expr::constant(Constant::bool(false))),
    ];
    if let Some(v) = value {
        lowered.push(Stmt::Declare(v));
    }
    lowered.extend(guard_returns(program, &slots, body, false));
    if let Some(v) = value {
        lowered.push(Stmt::Return(Some(program.var_ref(v))));
    }
    if let Some(f) = program.function_mut(id) {
        f.body = Some(lowered);
    }

    tracing::trace!("[LowerJumps] lowered returns of {name}");
    true
}

fn guard_returns(program: &Program, slots: &ReturnSlots, block: Block, in_loop: bool) -> Block {
    let mut out = Vec::with_capacity(block.len());
    let mut rest = block.into_iter();
    while let Some(s) = rest.next() {
        let may_return = s.has_return();
        match s {
            Stmt::Return(v) => {
                if let (Some(v), Some(slot)) = (v, slots.value) {
                    out.push(Stmt::assign(program.var_ref(slot), v));
                }
                out.push(set_flag(program, slots.flag));
                if in_loop {
                    out.push(Stmt::Break);
                }
                return out;
            }
            Stmt::If(i) if may_return => out.push(Stmt::If(If {
                condition: i.condition,
                then_block: guard_returns(program, slots, i.then_block, in_loop),
                else_block: guard_returns(program, slots, i.else_block, in_loop),
            })),
            Stmt::Loop(mut l) if may_return => {
                l.body = guard_returns(program, slots, l.body, true);
                out.push(Stmt::Loop(l));
                if in_loop {
                    if let Some(test) = flag_test(program, slots.flag, false) {
                        out.push(Stmt::If(If {
                            condition: test,
                            then_block: vec![Stmt::Break],
                            else_block: Vec::new(),
                        }));
                    }
                }
            }
            s => {
                out.push(s);
                continue;
            }
        }

        // Inside a loop the lowered return already breaks out; at function
        // level the remaining statements run only if nothing returned.
        if !in_loop {
            let tail = guard_returns(program, slots, rest.collect(), false);
            if let (false, Some(condition)) = (tail.is_empty(), flag_test(program, slots.flag, true)) {
                out.push(Stmt::If(If {
                    condition,
                    then_block: tail,
                    else_block: Vec::new(),
                }));
            }
            return out;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program, validate::validate};

    #[test]
    fn early_return_becomes_guarded_tail() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function f (signature float (parameters (declare (param_in) float x)) (body
               (if (expression bool < (var_ref x) (constant float (0.0)))
                 ((return (constant float (0.0))))
                 ())
               (return (var_ref x)))))
             (function main (signature void (parameters) (body
               (call f (var_ref o) ((var_ref u))))))",
        )
        .unwrap();
        assert!(lower_jumps(&mut p, LowerJumpsFlags::LOWER_SUB_RETURN));
        validate(&p).unwrap();
        let f = p.function(p.find_function("f").unwrap()).unwrap();
        let body = f.body.as_ref().unwrap();
        assert!(matches!(body.last(), Some(Stmt::Return(Some(_)))));
        assert_eq!(body.iter().filter(|s| s.has_return()).count(), 1);
        let text = print_program(&p);
        assert!(text.contains("(if (expression bool ! (var_ref return_flag))"));
        assert!(!lower_jumps(&mut p, LowerJumpsFlags::LOWER_SUB_RETURN));
    }

    #[test]
    fn return_inside_loop_breaks_out() {
        let mut p = read_program(
            "(declare (uniform) bool c)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (loop ((if (var_ref c) ((return)) ())
                      (assign (x) (var_ref o) (constant float (1.0)))))
               (assign (x) (var_ref o) (constant float (2.0))))))",
        )
        .unwrap();
        assert!(lower_jumps(&mut p, LowerJumpsFlags::LOWER_MAIN_RETURN));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(!text.contains("(return)"));
        assert!(text.contains("(break)"));
        assert!(!lower_jumps(&mut p, LowerJumpsFlags::LOWER_MAIN_RETURN));
    }

    #[test]
    fn continue_guards_rest_of_body() {
        let mut p = read_program(
            "(declare (uniform) bool c)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (loop ((if (var_ref c) ((continue)) ())
                      (assign (x) (var_ref o) (constant float (1.0)))
                      (break))))))",
        )
        .unwrap();
        assert!(lower_jumps(&mut p, LowerJumpsFlags::LOWER_CONTINUE));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(!text.contains("(continue)"));
        assert!(text.contains("(if (expression bool ! (var_ref continue_flag))"));
        assert!(!lower_jumps(&mut p, LowerJumpsFlags::LOWER_CONTINUE));
    }

    #[test]
    fn common_jump_is_pulled_out() {
        let mut p = read_program(
            "(declare (uniform) bool c)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (loop ((if (var_ref c)
                        ((assign (x) (var_ref o) (constant float (1.0))) (break))
                        ((assign (x) (var_ref o) (constant float (2.0))) (break))))))))",
        )
        .unwrap();
        assert!(lower_jumps(&mut p, LowerJumpsFlags::PULL_OUT_JUMPS));
        validate(&p).unwrap();
        let main = p.function(p.main_function().unwrap()).unwrap();
        let Some(Stmt::Loop(l)) = main.body.as_ref().and_then(|b| b.first()) else {
            panic!("expected a loop");
        };
        assert_eq!(l.body.len(), 2);
        assert!(matches!(l.body.last(), Some(Stmt::Break)));
        assert!(!lower_jumps(&mut p, LowerJumpsFlags::PULL_OUT_JUMPS));
    }

    #[test]
    fn loop_exit_test_is_left_alone() {
        let mut p = read_program(
            "(declare (uniform) bool c)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (loop ((if (var_ref c) ((break)) ())
                      (assign (x) (var_ref o) (constant float (1.0))))))))",
        )
        .unwrap();
        assert!(!lower_jumps(&mut p, LowerJumpsFlags::all()));
        let main = p.function(p.main_function().unwrap()).unwrap();
        let Some(Stmt::Loop(l)) = main.body.as_ref().and_then(|b| b.first()) else {
            panic!("expected a loop");
        };
        assert_eq!(l.body.len(), 2);
    }
}
