use crate::{
    concrete_type::Type,
    ir::{visit, Expr, Operation, Program},
};

/// Operands of a chain of `op` nodes that all have type `ty`, in order.
fn flatten<'e>(e: &'e Expr, op: Operation, ty: &Type, leaves: &mut Vec<&'e Expr>) -> usize {
    match e.as_operation() {
        Some((o, [a, b])) if o == op && e.ty == *ty => {
            let depth = flatten(a, op, ty, leaves).max(flatten(b, op, ty, leaves));
            depth + 1
        }
        _ => {
            leaves.push(e);
            0
        }
    }
}

fn build(op: Operation, leaves: &[&Expr]) -> Option<Expr> {
    match leaves {
        [] => None,
        [x] => Some((*x).clone()),
        _ => {
            let (l, r) = leaves.split_at(leaves.len() / 2);
            Expr::op(op, vec![build(op, l)?, build(op, r)?])
        }
    }
}

/// Smallest depth a binary tree over `n` leaves can have.
const fn balanced_depth(n: usize) -> usize {
    if n < 2 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

fn rebalance_node(e: &Expr, fast_math: bool) -> Option<Expr> {
    let (op, _) = e.as_operation()?;
    if !op.is_associative() || e.ty.is_matrix() || (e.ty.is_float() && !fast_math) {
        return None;
    }

    let mut leaves = Vec::new();
    let depth = flatten(e, op, &e.ty, &mut leaves);
    if leaves.len() < 3 || depth <= balanced_depth(leaves.len()) || leaves.iter().any(|l| l.ty != e.ty) {
        return None;
    }
    let mut balanced = build(op, &leaves)?;
    if balanced.ty != e.ty {
        return None;
    }
    balanced.precision = e.precision;
    Some(balanced)
}

/// Reshapes long chains of one associative operator into balanced trees,
/// keeping operand order. Float chains are only touched with `fast_math`.
pub fn rebalance(program: &mut Program, fast_math: bool) -> bool {
    let sigs = program.signatures();
    let mut balanced = 0;
    program.for_each_body(|_, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let Some(r) = rebalance_node(e, fast_math) else {
                return false;
            };
            *e = r;
            balanced += 1;
            true
        })
    });

    if balanced > 0 {
        tracing::debug!("[RebalanceTree] rebalanced {balanced} trees");
    }
    balanced > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    fn read(ty: &str, op: &str) -> Program {
        read_program(&format!(
            "(declare (uniform) {ty} a)
             (declare (uniform) {ty} b)
             (declare (uniform) {ty} c)
             (declare (uniform) {ty} d)
             (declare (out) {ty} o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o)
                 (expression {ty} {op} (expression {ty} {op} (expression {ty} {op} (var_ref a) (var_ref b)) (var_ref c)) (var_ref d))))))"
        ))
        .unwrap()
    }

    #[test]
    fn integer_chain_is_balanced() {
        let mut p = read("int", "+");
        assert!(rebalance(&mut p, false));
        assert!(print_program(&p).contains(
            "(expression int + (expression int + (var_ref a) (var_ref b)) (expression int + (var_ref c) (var_ref d)))"
        ));
        assert!(!rebalance(&mut p, false));
    }

    #[test]
    fn float_chain_needs_fast_math() {
        let mut p = read("float", "*");
        assert!(!rebalance(&mut p, false));
        assert!(rebalance(&mut p, true));
        assert!(print_program(&p).contains(
            "(expression float * (expression float * (var_ref a) (var_ref b)) (expression float * (var_ref c) (var_ref d)))"
        ));
    }

    #[test]
    fn depth() {
        assert_eq!(balanced_depth(2), 1);
        assert_eq!(balanced_depth(4), 2);
        assert_eq!(balanced_depth(5), 3);
    }
}
