use std::collections::HashMap;

use crate::{
    const_expr,
    ir::{visit, Block, Constant, Expr, ExprKind, Program, Scalar, Signatures, Stmt, VarId},
    utils::writemask_components,
};

/// Replaces every rvalue that evaluates to a constant with the constant, and
/// resolves assignments and discards whose condition is constant.
pub fn constant_folding(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut folded = 0usize;
    let modified = program.for_each_body(|program, _, body| {
        let mut modified = visit::rewrite_exprs(body, &sigs, &mut |e| {
            let Some(c) = fold(program, e) else {
                return false;
            };
            tracing::trace!(
                "[ConstantFolding] {} => {}",
                crate::ir::print::print_expr(program, e),
                crate::ir::print::print_expr(program, &Expr::constant(c.clone()))
            );
            e.kind = ExprKind::Constant(c);
            folded += 1;
            true
        });
        modified |= visit::walk_blocks_mut(body, &mut resolve_constant_conditions);
        modified
    });

    if modified {
        tracing::debug!("[ConstantFolding] folded {folded} expressions");
    }
    modified
}

fn fold(program: &Program, e: &Expr) -> Option<Constant> {
    match &e.kind {
        ExprKind::Constant(_) => None,
        // operands are visited first, so anything foldable below is already a constant
        ExprKind::Operation(_, xs) if !xs.iter().all(Expr::is_constant) => None,
        _ => const_expr::evaluate(program, e).filter(|c| c.ty == e.ty),
    }
}

fn resolve_constant_conditions(block: &mut Block) -> bool {
    let mut modified = false;
    for s in core::mem::take(block) {
        match s {
            Stmt::Assign(mut a) => match a.condition.as_ref().and_then(constant_bool) {
                Some(true) => {
                    a.condition = None;
                    block.push(Stmt::Assign(a));
                    modified = true;
                }
                Some(false) => modified = true,
                None => block.push(Stmt::Assign(a)),
            },
            Stmt::Discard(Some(c)) => match constant_bool(&c) {
                Some(true) => {
                    block.push(Stmt::Discard(None));
                    modified = true;
                }
                Some(false) => modified = true,
                None => block.push(Stmt::Discard(Some(c))),
            },
            s => block.push(s),
        }
    }

    modified
}

fn constant_bool(e: &Expr) -> Option<bool> {
    e.as_constant().and_then(Constant::as_bool)
}

/// Known constant components of scalar and vector variables.
type Acp = HashMap<VarId, [Option<Scalar>; 4]>;

/// Replaces reads of variables whose components are known to hold constants
/// (from earlier assignments in the same or an enclosing block).
pub fn constant_propagation(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let modified = program.for_each_body(|program, _, body| {
        propagate_block(program, &sigs, body, &mut Acp::new())
    });

    if modified {
        tracing::debug!("[ConstantPropagation] substituted constant reads");
    }
    modified
}

fn propagate_block(program: &Program, sigs: &Signatures, block: &mut Block, acp: &mut Acp) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        visit::for_each_rvalue_mut(s, sigs, &mut |e| {
            modified |= e.rewrite_post(&mut |x| substitute(acp, x));
        });

        match s {
            Stmt::Assign(a) => {
                let Some(v) = a.lhs.variable_referenced() else {
                    continue;
                };
                let lhs_ty = &program.var(v).ty;
                if a.condition.is_some()
                    || a.lhs.whole_variable_referenced() != Some(v)
                    || !(lhs_ty.is_scalar() || lhs_ty.is_vector())
                {
                    acp.remove(&v);
                    continue;
                }

                let values = a.rhs.as_constant().and_then(Constant::components);
                let entry = acp.entry(v).or_insert([None; 4]);
                for (k, ch) in writemask_components(a.write_mask).enumerate() {
                    entry[ch as usize] = values.and_then(|c| c.get(k).copied());
                }
            }
            Stmt::Call(_) => acp.clear(),
            Stmt::If(i) => {
                let mut then_acp = acp.clone();
                modified |= propagate_block(program, sigs, &mut i.then_block, &mut then_acp);
                let mut else_acp = acp.clone();
                modified |= propagate_block(program, sigs, &mut i.else_block, &mut else_acp);
                kill_written(acp, sigs, &i.then_block);
                kill_written(acp, sigs, &i.else_block);
            }
            Stmt::Loop(l) => {
                kill_written(acp, sigs, &l.body);
                let mut body_acp = acp.clone();
                modified |= propagate_block(program, sigs, &mut l.body, &mut body_acp);
            }
            _ => (),
        }
    }

    modified
}

fn kill_written(acp: &mut Acp, sigs: &Signatures, block: &[Stmt]) {
    if visit::contains_call(block) {
        acp.clear();
        return;
    }
    visit::for_each_var_write(block, sigs, &mut |v| {
        acp.remove(&v);
    });
}

fn substitute(acp: &Acp, e: &mut Expr) -> bool {
    let (v, channels): (VarId, Vec<u8>) = match &e.kind {
        ExprKind::Var(v) if e.ty.is_scalar() || e.ty.is_vector() => {
            (*v, (0..e.ty.vector_elements()).collect())
        }
        ExprKind::Swizzle { value, mask } => match value.kind {
            ExprKind::Var(v) => (v, mask.as_slice().to_vec()),
            _ => return false,
        },
        _ => return false,
    };
    let Some(known) = acp.get(&v) else {
        return false;
    };
    let Some(values) = channels
        .iter()
        .map(|&c| known[c as usize])
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };

    tracing::trace!("[ConstantPropagation] {v:?} => {values:?}");
    e.kind = ExprKind::Constant(Constant::from_components(e.ty.clone(), values));
    true
}

#[derive(Default)]
struct AssignmentEntry {
    count: usize,
    value: Option<Constant>,
}

/// Records the value of every variable whose only assignment stores a
/// constant, so that reads of it fold. Unlinked, only function locals are
/// considered since other compilation units may write the globals.
pub fn constant_variable(program: &mut Program, linked: bool) -> bool {
    let sigs = program.signatures();
    let mut entries = HashMap::<VarId, AssignmentEntry>::new();
    for f in program.functions.iter().flatten() {
        let Some(body) = &f.body else {
            continue;
        };
        visit::walk(body, &mut |s| match s {
            Stmt::Assign(a) => {
                let Some(v) = a.lhs.variable_referenced() else {
                    return;
                };
                let entry = entries.entry(v).or_default();
                entry.count += 1;
                entry.value = a
                    .whole_variable_written()
                    .and_then(|_| a.rhs.as_constant().cloned());
            }
            Stmt::Call(c) => {
                let outs = c
                    .args
                    .iter()
                    .enumerate()
                    .filter(|(n, _)| sigs.is_out_param(c.callee, *n))
                    .map(|(_, a)| a)
                    .chain(c.return_deref.iter());
                for a in outs {
                    if let Some(v) = a.variable_referenced() {
                        let entry = entries.entry(v).or_default();
                        entry.count += 1;
                        entry.value = None;
                    }
                }
            }
            _ => (),
        });
    }

    let mut marked = 0;
    for (v, entry) in entries {
        let (true, Some(value)) = (entry.count == 1, entry.value) else {
            continue;
        };
        if !linked && program.is_global(v) {
            continue;
        }
        let var = program.var_mut(v);
        if var.constant_value.is_some() || var.mode.is_externally_defined() || value.ty != var.ty {
            continue;
        }

        tracing::trace!("[ConstantVariable] {} is constant", var.name);
        var.constant_value = Some(value);
        marked += 1;
    }

    if marked > 0 {
        tracing::debug!(
            "[ConstantVariable{}] marked {marked} variables",
            if linked { "" } else { "Unlinked" }
        );
    }
    marked > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    #[test]
    fn folds_nested_arithmetic() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) (expression float + (constant float (2.0))
                 (expression float * (constant float (3.0)) (constant float (1.0))))))))",
        )
        .unwrap();
        assert!(constant_folding(&mut p));
        assert!(print_program(&p).contains("(assign (x) (var_ref o) (constant float (5.0)))"));
        assert!(!constant_folding(&mut p));
    }

    #[test]
    fn drops_never_taken_conditional_assignment() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (constant bool (false)) (x) (var_ref o) (constant float (1.0)))
               (assign (constant bool (true)) (x) (var_ref o) (constant float (2.0))))))",
        )
        .unwrap();
        assert!(constant_folding(&mut p));
        let body = p.function(p.main_function().unwrap()).unwrap().body.clone().unwrap();
        assert_eq!(body.len(), 1);
        assert!(matches!(&body[0], Stmt::Assign(a) if a.condition.is_none()));
    }

    #[test]
    fn propagates_known_components_through_swizzles() {
        let mut p = read_program(
            "(declare (out) vec2 o)
             (function main (signature void (parameters) (body
               (declare () vec4 v)
               (assign (xy) (var_ref v) (constant vec2 (1.0 2.0)))
               (assign (xy) (var_ref o) (swiz yx (var_ref v))))))",
        )
        .unwrap();
        assert!(constant_propagation(&mut p));
        assert!(print_program(&p).contains("(var_ref o) (constant vec2 (2.0 1.0))"));
    }

    #[test]
    fn loop_writes_block_propagation() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float i)
               (assign (x) (var_ref i) (constant float (0.0)))
               (loop (
                 (assign (x) (var_ref o) (var_ref i))
                 (assign (x) (var_ref i) (expression float + (var_ref i) (constant float (1.0)))))))))",
        )
        .unwrap();
        assert!(!constant_propagation(&mut p));
    }

    #[test]
    fn single_constant_assignment_marks_local() {
        let src = "(declare (uniform) float u)
             (function main (signature void (parameters) (body
               (declare () float k)
               (declare () float m)
               (assign (x) (var_ref k) (constant float (3.0)))
               (assign (x) (var_ref m) (constant float (1.0)))
               (assign (x) (var_ref m) (var_ref u)))))";
        let mut p = read_program(src).unwrap();
        assert!(constant_variable(&mut p, false));
        let k = p.variables.iter().find(|v| v.name == "k").unwrap();
        assert_eq!(k.constant_value, Some(Constant::float(3.0)));
        let m = p.variables.iter().find(|v| v.name == "m").unwrap();
        assert!(m.constant_value.is_none());
        assert!(!constant_variable(&mut p, false));
    }
}
