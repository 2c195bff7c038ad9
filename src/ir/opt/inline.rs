use std::collections::HashMap;

use crate::ir::{visit, Block, Call, Function, Program, Signatures, Stmt, VariableMode};

/// Replaces calls with a copy of the callee's body.
///
/// Only callees that call nothing themselves and leave through at most one
/// final `return` are inlined; jump lowering gets other callees into that
/// shape, and leaf-first inlining empties call chains over a few rounds.
pub fn function_inlining(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut inlined = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = inline_block(program, &sigs, b);
            inlined += n;
            n > 0
        })
    });

    if inlined > 0 {
        tracing::debug!("[FunctionInlining] inlined {inlined} calls");
    }
    inlined > 0
}

fn can_inline(callee: &Function) -> bool {
    let Some(body) = &callee.body else {
        return false;
    };
    if visit::contains_call(body) {
        return false;
    }
    let init = match body.split_last() {
        Some((Stmt::Return(_), init)) => init,
        _ => body.as_slice(),
    };
    !init.iter().any(Stmt::has_return)
}

fn inline_block(program: &mut Program, sigs: &Signatures, block: &mut Block) -> usize {
    let mut inlined = 0;
    for s in core::mem::take(block) {
        let Stmt::Call(call) = s else {
            block.push(s);
            continue;
        };
        match inline_call(program, sigs, &call) {
            Some(expansion) => {
                block.extend(expansion);
                inlined += 1;
            }
            None => block.push(Stmt::Call(call)),
        }
    }
    inlined
}

fn inline_call(program: &mut Program, sigs: &Signatures, call: &Call) -> Option<Block> {
    let callee = program.function(call.callee).filter(|f| can_inline(f))?.clone();
    let body = callee.body.as_deref()?;
    if callee.params.len() != call.args.len() {
        return None;
    }

    let mut prologue = Vec::new();
    let mut epilogue = Vec::new();
    let mut map = HashMap::new();
    for (n, (&param, arg)) in callee.params.iter().zip(&call.args).enumerate() {
        let formal = program.var(param).clone();
        if formal.ty.is_sampler() {
            // Samplers can't be copied; the parameter aliases the argument.
            map.insert(param, arg.whole_variable_referenced()?);
            continue;
        }

        let mut local = formal.clone();
        local.mode = VariableMode::Auto;
        let local = program.add_variable(local);
        map.insert(param, local);
        prologue.push(Stmt::Declare(local));
        if !matches!(formal.mode, VariableMode::FunctionOut) {
            prologue.push(Stmt::assign(program.var_ref(local), arg.clone()));
        }
        if sigs.is_out_param(call.callee, n) {
            epilogue.push(Stmt::assign(arg.clone(), program.var_ref(local)));
        }
    }

    let mut expansion = prologue;
    for s in visit::clone_block_fresh(program, body, &map) {
        match s {
            Stmt::Return(Some(value)) => {
                if let Some(r) = &call.return_deref {
                    expansion.push(Stmt::assign(r.clone(), value));
                }
            }
            Stmt::Return(None) => (),
            s => expansion.push(s),
        }
    }
    expansion.extend(epilogue);

    tracing::trace!("[FunctionInlining] {} expanded into {} statements", callee.name, expansion.len());
    Some(expansion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program, validate::validate};

    #[test]
    fn leaf_function_is_expanded() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function twice (signature float (parameters (declare (param_in) float x)) (body
               (return (expression float * (var_ref x) (constant float (2.0)))))))
             (function main (signature void (parameters) (body
               (call twice (var_ref o) ((var_ref u))))))",
        )
        .unwrap();
        assert!(function_inlining(&mut p));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(!text.contains("(call twice"));
        assert!(text.contains("(assign (x) (var_ref o) (expression float * (var_ref x"));
        assert!(!function_inlining(&mut p));
    }

    #[test]
    fn out_parameters_are_copied_back() {
        let mut p = read_program(
            "(declare (out) float o)
             (function set (signature void (parameters (declare (param_out) float r)) (body
               (assign (x) (var_ref r) (constant float (1.0))))))
             (function main (signature void (parameters) (body
               (call set ((var_ref o))))))",
        )
        .unwrap();
        assert!(function_inlining(&mut p));
        validate(&p).unwrap();
        let main = p.function(p.main_function().unwrap()).unwrap();
        let body = main.body.as_ref().unwrap();
        assert!(matches!(body.last(), Some(Stmt::Assign(a)) if a.lhs.whole_variable_referenced() == p.globals.first().copied()));
    }

    #[test]
    fn early_return_is_not_inlined() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function f (signature float (parameters (declare (param_in) float x)) (body
               (if (expression bool < (var_ref x) (constant float (0.0))) ((return (constant float (0.0)))) ())
               (return (var_ref x)))))
             (function main (signature void (parameters) (body
               (call f (var_ref o) ((var_ref u))))))",
        )
        .unwrap();
        assert!(!function_inlining(&mut p));
    }
}
