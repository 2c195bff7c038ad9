use crate::{
    concrete_type::Type,
    const_expr::evaluate_operation,
    ir::{visit, Constant, Expr, ExprKind, Operation, Program, Scalar},
};

use super::broadcast_to;

/// Identity-based simplification: `x*1`, `x+0`, `!!x`, `-(a-b)`, `!(a<b)`
/// and friends.
///
/// Without native integers, integer arithmetic may be emulated in floating
/// point, so the identities that rely on exact integer results are left
/// alone. Constant reassociation (`(x+1)+2` to `x+3`) applies to integers
/// always and to floats only with `fast_math`.
pub fn algebraic(program: &mut Program, native_integers: bool, fast_math: bool) -> bool {
    let sigs = program.signatures();
    let mut rewrites = 0;
    program.for_each_body(|program, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let mut modified = false;
            while let Some(mut r) = simplify(e, native_integers, fast_math) {
                tracing::trace!(
                    "[Algebraic] {} => {}",
                    crate::ir::print::print_expr(program, e),
                    crate::ir::print::print_expr(program, &r)
                );
                r.precision = e.precision;
                *e = r;
                rewrites += 1;
                modified = true;
            }
            modified
        })
    });

    if rewrites > 0 {
        tracing::debug!("[Algebraic] applied {rewrites} identities");
    }
    rewrites > 0
}

fn constant_scalar(e: &Expr) -> Option<Scalar> {
    let c = e.as_constant()?;
    let first = c.component(0)?;
    c.components()?.iter().all(|&s| s == first).then_some(first)
}

fn is_integer_unsafe(ty: &Type, native_integers: bool) -> bool {
    ty.is_integer() && !native_integers
}

fn simplify(e: &Expr, native_integers: bool, fast_math: bool) -> Option<Expr> {
    let (op, xs) = e.as_operation()?;
    if e.ty.is_matrix() || xs.iter().any(|x| x.ty.is_matrix()) {
        return None;
    }

    match (op, xs) {
        (Operation::LogicNot, [x]) => match x.as_operation()? {
            (Operation::LogicNot, [y]) => Some(y.clone()),
            (cmp, [a, b]) => {
                let negated = cmp.negated_comparison()?;
                Expr::op(negated, vec![a.clone(), b.clone()]).filter(|r| r.ty == e.ty)
            }
            _ => None,
        },
        (Operation::Neg, [x]) => match x.as_operation()? {
            (Operation::Neg, [y]) => Some(y.clone()),
            (Operation::Sub, [a, b]) if !is_integer_unsafe(&e.ty, native_integers) => {
                Expr::op(Operation::Sub, vec![b.clone(), a.clone()]).filter(|r| r.ty == e.ty)
            }
            _ => None,
        },
        (Operation::Rcp, [x]) => match x.as_operation()? {
            (Operation::Rcp, [y]) => Some(y.clone()),
            (Operation::Sqrt, [y]) => Expr::op(Operation::Rsq, vec![y.clone()]),
            (Operation::Rsq, [y]) => Expr::op(Operation::Sqrt, vec![y.clone()]),
            _ => None,
        },
        (Operation::Add, [a, b]) => {
            if b.is_zero() {
                return broadcast_to(a.clone(), &e.ty);
            }
            if a.is_zero() {
                return broadcast_to(b.clone(), &e.ty);
            }
            reassociate(e, op, a, b, fast_math)
        }
        (Operation::Sub, [a, b]) => {
            if b.is_zero() {
                return broadcast_to(a.clone(), &e.ty);
            }
            if a.is_zero() && !is_integer_unsafe(&e.ty, native_integers) {
                let x = broadcast_to(b.clone(), &e.ty)?;
                return Expr::op(Operation::Neg, vec![x]);
            }
            None
        }
        (Operation::Mul, [a, b]) => {
            for (x, c) in [(a, b), (b, a)] {
                if c.is_one() {
                    return broadcast_to(x.clone(), &e.ty);
                }
                if c.is_zero() && !is_integer_unsafe(&e.ty, native_integers) {
                    return Constant::zero(e.ty.clone()).map(Expr::constant);
                }
                if c.is_negative_one() && !is_integer_unsafe(&e.ty, native_integers) {
                    let x = broadcast_to(x.clone(), &e.ty)?;
                    return Expr::op(Operation::Neg, vec![x]);
                }
            }
            reassociate(e, op, a, b, fast_math)
        }
        (Operation::Div, [a, b]) => {
            if b.is_one() && !is_integer_unsafe(&e.ty, native_integers) {
                return broadcast_to(a.clone(), &e.ty);
            }
            if a.is_one() && e.ty.is_float() {
                let x = broadcast_to(b.clone(), &e.ty)?;
                return Expr::op(Operation::Rcp, vec![x]);
            }
            None
        }
        (Operation::LogicAnd | Operation::LogicOr | Operation::LogicXor, [a, b]) => {
            for (x, c) in [(a, b), (b, a)] {
                let Some(Scalar::Bool(k)) = constant_scalar(c) else {
                    continue;
                };
                return match (op, k) {
                    (Operation::LogicAnd, true)
                    | (Operation::LogicOr, false)
                    | (Operation::LogicXor, false) => Some(x.clone()),
                    (Operation::LogicAnd, false) | (Operation::LogicOr, true) => {
                        Some(Expr::constant(Constant::bool(k)))
                    }
                    _ => Expr::op(Operation::LogicNot, vec![x.clone()]),
                };
            }
            None
        }
        _ => None,
    }
}

/// `(x op c1) op c2` becomes `x op (c1 op c2)` for `+` and `*`.
fn reassociate(e: &Expr, op: Operation, a: &Expr, b: &Expr, fast_math: bool) -> Option<Expr> {
    if e.ty.is_float() && !fast_math {
        return None;
    }

    let (inner, outer_c) = match (a.as_constant(), b.as_constant()) {
        (None, Some(c)) => (a, c),
        (Some(c), None) => (b, c),
        _ => return None,
    };
    let (inner_op, inner_xs) = inner.as_operation()?;
    if inner_op != op {
        return None;
    }
    let (x, inner_c) = match inner_xs {
        [x, c] if !x.is_constant() => (x, c.as_constant()?),
        [c, x] if !x.is_constant() => (x, c.as_constant()?),
        _ => return None,
    };

    let folded_ty = op.result_type(&[&inner_c.ty, &outer_c.ty])?;
    let folded = evaluate_operation(op, &folded_ty, &[inner_c.clone(), outer_c.clone()])?;
    let r = Expr::op(op, vec![x.clone(), Expr::constant(folded)])?;
    (r.ty == e.ty && !matches!(r.kind, ExprKind::Constant(_))).then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    fn run(body: &str, native_integers: bool, fast_math: bool) -> (bool, String) {
        let src = format!(
            "(declare (uniform) float u)
             (declare (uniform) vec2 v)
             (declare (uniform) int i)
             (declare (uniform) bool b)
             (declare (out) float o)
             (declare (out) vec2 ov)
             (declare (out) int oi)
             (declare (out) bool ob)
             (function main (signature void (parameters) (body {body})))"
        );
        let mut p = read_program(&src).unwrap();
        let modified = algebraic(&mut p, native_integers, fast_math);
        (modified, print_program(&p))
    }

    #[test]
    fn multiplicative_and_additive_identities() {
        let (m, text) = run(
            "(assign (x) (var_ref o) (expression float + (expression float * (var_ref u) (constant float (1.0))) (constant float (0.0))))",
            true,
            false,
        );
        assert!(m);
        assert!(text.contains("(assign (x) (var_ref o) (var_ref u))"));
    }

    #[test]
    fn scalar_identity_operand_is_broadcast() {
        let (m, text) = run(
            "(assign (xy) (var_ref ov) (expression vec2 * (constant float (1.0)) (var_ref v)))",
            true,
            false,
        );
        assert!(m);
        assert!(text.contains("(assign (xy) (var_ref ov) (var_ref v))"));

        let (m, text) = run(
            "(assign (xy) (var_ref ov) (expression vec2 + (var_ref u) (constant vec2 (0.0 0.0))))",
            true,
            false,
        );
        assert!(m);
        assert!(text.contains("(swiz xx (var_ref u))"));
    }

    #[test]
    fn negated_comparison() {
        let (m, text) = run(
            "(assign (x) (var_ref ob) (expression bool ! (expression bool < (var_ref u) (constant float (2.0)))))",
            true,
            false,
        );
        assert!(m);
        assert!(text.contains("(expression bool >= (var_ref u) (constant float (2.0)))"));
    }

    #[test]
    fn integer_zero_product_needs_native_integers() {
        let body = "(assign (x) (var_ref oi) (expression int * (var_ref i) (constant int (0))))";
        let (m, _) = run(body, false, false);
        assert!(!m);
        let (m, text) = run(body, true, false);
        assert!(m);
        assert!(text.contains("(assign (x) (var_ref oi) (constant int (0)))"));
    }

    #[test]
    fn reassociation_of_floats_needs_fast_math() {
        let body = "(assign (x) (var_ref o) (expression float + (expression float + (var_ref u) (constant float (1.0))) (constant float (2.0))))";
        assert!(!run(body, true, false).0);
        let (m, text) = run(body, true, true);
        assert!(m);
        assert!(text.contains("(expression float + (var_ref u) (constant float (3.0)))"));

        let (m, text) = run(
            "(assign (x) (var_ref oi) (expression int * (expression int * (constant int (2)) (var_ref i)) (constant int (3))))",
            true,
            false,
        );
        assert!(m);
        assert!(text.contains("(expression int * (var_ref i) (constant int (6)))"));
    }

    #[test]
    fn boolean_constants() {
        let (_, text) = run(
            "(assign (x) (var_ref ob) (expression bool && (var_ref b) (constant bool (1))))",
            true,
            false,
        );
        assert!(text.contains("(assign (x) (var_ref ob) (var_ref b))"));
        let (_, text) = run(
            "(assign (x) (var_ref ob) (expression bool ^^ (constant bool (1)) (var_ref b)))",
            true,
            false,
        );
        assert!(text.contains("(expression bool ! (var_ref b))"));
    }
}
