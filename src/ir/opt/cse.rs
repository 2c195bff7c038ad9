use crate::ir::{visit, Block, Expr, ExprKind, Program, Signatures, Stmt, VarId, VariableMode};

/// An expression whose value is available at a point of a block.
struct Available {
    expr: Expr,
    /// statement that computes it
    stmt: usize,
    /// variable still holding the value, when the whole statement is
    /// `holder = expr`
    holder: Option<VarId>,
}

struct Duplicate {
    expr: Expr,
    first: usize,
    holder: Option<VarId>,
    at: usize,
}

/// Common subexpression elimination within a block: a pure expression
/// computed again while its operands are unchanged reads the first result
/// instead. The first value is kept in a `cse` temporary unless it already
/// lands in a local variable.
pub fn cse(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut eliminated = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let mut modified = false;
            while let Some(d) = find_duplicate(program, &sigs, b) {
                eliminate(program, &sigs, b, d);
                eliminated += 1;
                modified = true;
            }
            modified
        })
    });

    if eliminated > 0 {
        tracing::debug!("[CSE] eliminated {eliminated} subexpressions");
    }
    eliminated > 0
}

fn is_candidate(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Operation(..) | ExprKind::Texture(_) => !e.any(&mut |x| {
            matches!(x.as_operation(), Some((op, _)) if op.is_nondeterministic())
        }),
        _ => false,
    }
}

/// Candidate subexpressions, outermost first.
fn collect_candidates(e: &Expr, out: &mut Vec<Expr>) {
    e.visit(&mut |x| {
        if is_candidate(x) {
            out.push(x.clone());
        }
    });
}

fn kill(available: &mut Vec<Available>, v: VarId, stmt: usize) {
    available.retain(|a| !a.expr.reads_var(v));
    for a in available.iter_mut() {
        if a.holder == Some(v) && a.stmt != stmt {
            a.holder = None;
        }
    }
}

fn find_duplicate(program: &Program, sigs: &Signatures, block: &[Stmt]) -> Option<Duplicate> {
    let mut available = Vec::<Available>::new();
    for (n, s) in block.iter().enumerate() {
        let mut candidates = Vec::new();
        visit::for_each_rvalue(s, sigs, &mut |e| collect_candidates(e, &mut candidates));
        for (k, c) in candidates.iter().enumerate() {
            if let Some(a) = available.iter().find(|a| a.expr == *c) {
                return Some(Duplicate {
                    expr: c.clone(),
                    first: a.stmt,
                    holder: a.holder,
                    at: n,
                });
            }
            if candidates[..k].contains(c) {
                return Some(Duplicate {
                    expr: c.clone(),
                    first: n,
                    holder: None,
                    at: n,
                });
            }
        }

        let holder = match s {
            Stmt::Assign(a) => a.whole_variable_written().filter(|&x| {
                matches!(
                    program.var(x).mode,
                    VariableMode::Auto | VariableMode::Temporary
                ) && !program.is_global(x)
            }),
            _ => None,
        };
        for c in candidates {
            let holder = match s {
                Stmt::Assign(a) if a.rhs == c => holder,
                _ => None,
            };
            available.push(Available {
                expr: c,
                stmt: n,
                holder,
            });
        }

        match s {
            Stmt::Declare(v) => kill(&mut available, *v, n),
            Stmt::Assign(a) => {
                if let Some(v) = a.lhs.variable_referenced() {
                    kill(&mut available, v, n);
                }
            }
            Stmt::If(_) | Stmt::Loop(_) => {
                let nested = visit::child_blocks(s);
                if nested.iter().any(|b| visit::contains_call(b)) {
                    available.clear();
                } else {
                    for b in nested {
                        visit::for_each_var_write(b, sigs, &mut |v| kill(&mut available, v, n));
                    }
                }
            }
            _ => available.clear(),
        }
    }

    None
}

fn replace_all(e: &mut Expr, target: &Expr, with: &Expr) {
    if e == target {
        let precision = e.precision;
        *e = with.clone();
        e.precision = precision;
        return;
    }
    e.for_each_child_mut(|c| replace_all(c, target, with));
}

fn eliminate(program: &mut Program, sigs: &Signatures, block: &mut Block, d: Duplicate) {
    let (holder, start, at) = match d.holder {
        Some(x) => (x, d.first + 1, d.at),
        None => {
            let t = program.new_temporary("cse", d.expr.ty.clone(), d.expr.precision);
            block.insert(d.first, Stmt::Declare(t));
            block.insert(d.first + 1, Stmt::assign(program.var_ref(t), d.expr.clone()));
            (t, d.first + 2, d.at + 2)
        }
    };

    tracing::trace!(
        "[CSE] {} held by {}",
        crate::ir::print::print_expr(program, &d.expr),
        program.var(holder).name
    );
    let with = program.var_ref(holder);
    for s in &mut block[start..=at] {
        visit::for_each_rvalue_mut(s, sigs, &mut |e| replace_all(e, &d.expr, &with));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    const TWICE: &str = "(declare (uniform) vec4 a)
         (declare (uniform) vec4 b)
         (declare (uniform) vec4 c)
         (declare (out) vec4 o1)
         (declare (out) vec4 o2)
         (function main (signature void (parameters) (body
           (assign (xyzw) (var_ref o1) (expression vec4 + (expression vec4 * (var_ref a) (var_ref b)) (var_ref c)))
           (assign (xyzw) (var_ref o2) (expression vec4 + (expression vec4 * (var_ref a) (var_ref b)) (var_ref c))))))";

    #[test]
    fn second_occurrence_reads_the_first() {
        let mut p = read_program(TWICE).unwrap();
        assert!(cse(&mut p));
        let text = print_program(&p);
        assert_eq!(text.matches("expression vec4 +").count(), 1);
        assert!(text.contains("(assign (xyzw) (var_ref o1) (var_ref cse))"));
        assert!(text.contains("(assign (xyzw) (var_ref o2) (var_ref cse))"));
        assert!(!cse(&mut p));
    }

    #[test]
    fn write_between_occurrences_prevents_reuse() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o1)
             (declare (out) float o2)
             (function main (signature void (parameters) (body
               (declare () float a)
               (assign (x) (var_ref a) (var_ref u))
               (assign (x) (var_ref o1) (expression float * (var_ref a) (var_ref a)))
               (assign (x) (var_ref a) (constant float (2.0)))
               (assign (x) (var_ref o2) (expression float * (var_ref a) (var_ref a))))))",
        )
        .unwrap();
        assert!(!cse(&mut p));
    }

    #[test]
    fn local_holding_the_value_is_reused() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float t)
               (assign (x) (var_ref t) (expression float sqrt (var_ref u)))
               (assign (x) (var_ref o) (expression float + (var_ref t) (expression float sqrt (var_ref u)))))))",
        )
        .unwrap();
        assert!(cse(&mut p));
        let text = print_program(&p);
        assert!(!text.contains("cse"));
        assert!(text.contains("(expression float + (var_ref t) (var_ref t))"));
    }
}
