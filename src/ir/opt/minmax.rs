use crate::ir::{visit, Expr, Operation, Program};

use super::broadcast_to;

/// Value of a constant whose components are all equal.
fn uniform_value(e: &Expr) -> Option<f64> {
    let c = e.as_constant()?;
    let v = c.component(0)?.as_f64();
    c.is_uniform_value(v).then_some(v)
}

/// `(x, c)` for a min/max with exactly one uniform constant operand.
fn with_bound(xs: &[Expr]) -> Option<(&Expr, &Expr, f64)> {
    match xs {
        [x, c] | [c, x] if uniform_value(x).is_none() => uniform_value(c).map(|v| (x, c, v)),
        _ => None,
    }
}

const fn is_bound_op(op: Operation) -> bool {
    matches!(op, Operation::Min | Operation::Max)
}

/// Rewrites one min/max node whose operand is another min/max against a
/// constant bound.
fn prune(e: &Expr) -> Option<Expr> {
    let (outer, xs) = e.as_operation().filter(|(op, _)| is_bound_op(*op))?;
    let (inner_expr, c2, v2) = with_bound(xs)?;
    let (inner, ys) = inner_expr.as_operation().filter(|(op, _)| is_bound_op(*op))?;
    let (x, c1, v1) = with_bound(ys)?;

    let mut pruned = if inner == outer {
        // The tighter bound subsumes the looser one.
        let tighter = match outer {
            Operation::Min if v1 <= v2 => c1,
            Operation::Max if v1 >= v2 => c1,
            _ => c2,
        };
        Expr::op(outer, vec![x.clone(), tighter.clone()])?
    } else {
        // min(max(x, lo), hi) with lo >= hi is hi; max(min(x, hi), lo) with
        // hi <= lo is lo.
        let dominated = match outer {
            Operation::Min => v1 >= v2,
            _ => v1 <= v2,
        };
        if !dominated {
            return None;
        }
        broadcast_to(c2.clone(), &e.ty)?
    };
    if pruned.ty != e.ty {
        return None;
    }
    pruned.precision = e.precision;
    Some(pruned)
}

/// Drops min/max bounds that a nested min/max against a constant makes
/// redundant.
pub fn minmax_prune(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut pruned = 0;
    program.for_each_body(|_, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let Some(r) = prune(e) else {
                return false;
            };
            *e = r;
            pruned += 1;
            true
        })
    });

    if pruned > 0 {
        tracing::debug!("[MinMaxPrune] pruned {pruned} bounds");
    }
    pruned > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    fn read(rhs: &str) -> Program {
        read_program(&format!(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) {rhs}))))"
        ))
        .unwrap()
    }

    #[test]
    fn nested_min_keeps_tighter_bound() {
        let mut p = read(
            "(expression float min (expression float min (var_ref u) (constant float (2.0))) (constant float (1.0)))",
        );
        assert!(minmax_prune(&mut p));
        assert!(print_program(&p)
            .contains("(assign (x) (var_ref o) (expression float min (var_ref u) (constant float (1.0))))"));
        assert!(!minmax_prune(&mut p));
    }

    #[test]
    fn disjoint_clamp_is_constant() {
        let mut p = read(
            "(expression float min (expression float max (var_ref u) (constant float (3.0))) (constant float (1.0)))",
        );
        assert!(minmax_prune(&mut p));
        assert!(print_program(&p).contains("(assign (x) (var_ref o) (constant float (1.0)))"));
    }

    #[test]
    fn real_clamp_stays() {
        let mut p = read(
            "(expression float min (expression float max (var_ref u) (constant float (0.0))) (constant float (1.0)))",
        );
        assert!(!minmax_prune(&mut p));
    }
}
