use std::collections::{HashMap, HashSet};

use crate::ir::{visit, Block, ExprKind, Program, Signatures, Stmt, VarId, VariableMode};

/// Moves the value of a temporary that is assigned once and read once into
/// its single use later in the same block, when nothing in between writes
/// what the value reads.
pub fn tree_grafting(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut grafted = 0;
    program.for_each_body(|program, _, body| {
        let mut reads = HashMap::new();
        visit::count_var_reads(body, &mut reads);
        let mut writes = HashMap::<VarId, usize>::new();
        visit::for_each_var_write(body, &sigs, &mut |v| *writes.entry(v).or_default() += 1);

        visit::walk_blocks_mut(body, &mut |b| {
            let n = graft_block(program, &sigs, b, &reads, &writes);
            grafted += n;
            n > 0
        })
    });

    if grafted > 0 {
        tracing::debug!("[TreeGrafting] grafted {grafted} expressions");
    }
    grafted > 0
}

fn graft_block(
    program: &Program,
    sigs: &Signatures,
    block: &mut Block,
    reads: &HashMap<VarId, usize>,
    writes: &HashMap<VarId, usize>,
) -> usize {
    let mut grafted = 0;
    let mut i = 0;
    while i < block.len() {
        let Some((t, j)) = graft_target(program, sigs, block, i, reads, writes) else {
            i += 1;
            continue;
        };
        let removed = block.remove(i);
        let Stmt::Assign(a) = removed else {
            block.insert(i, removed);
            i += 1;
            continue;
        };

        let mut value = Some(a.rhs);
        visit::for_each_rvalue_mut(&mut block[j - 1], sigs, &mut |e| {
            e.rewrite_post(&mut |x| match (&x.kind, value.is_some()) {
                (ExprKind::Var(v), true) if *v == t => {
                    if let Some(v) = value.take() {
                        *x = v;
                    }
                    true
                }
                _ => false,
            });
        });
        debug_assert!(value.is_none(), "graft target lost its read");

        tracing::trace!("[TreeGrafting] {} into statement {}", program.var(t).name, j - 1);
        grafted += 1;
    }

    grafted
}

/// Grafted variable and the index of the statement that reads it.
fn graft_target(
    program: &Program,
    sigs: &Signatures,
    block: &[Stmt],
    i: usize,
    reads: &HashMap<VarId, usize>,
    writes: &HashMap<VarId, usize>,
) -> Option<(VarId, usize)> {
    let Stmt::Assign(a) = &block[i] else {
        return None;
    };
    let t = a.whole_variable_written()?;
    let var = program.var(t);
    if !matches!(var.mode, VariableMode::Auto | VariableMode::Temporary)
        || program.is_global(t)
        || !(var.ty.is_scalar() || var.ty.is_vector() || var.ty.is_matrix())
        || reads.get(&t) != Some(&1)
        || writes.get(&t) != Some(&1)
    {
        return None;
    }

    let mut deps = HashSet::new();
    a.rhs.collect_vars(&mut deps);
    for (j, s) in block.iter().enumerate().skip(i + 1) {
        let mut uses = false;
        visit::for_each_rvalue(s, sigs, &mut |e| uses |= e.reads_var(t));
        if uses {
            return Some((t, j));
        }

        match s {
            Stmt::Declare(_) => (),
            Stmt::Assign(next) => {
                if next.lhs.variable_referenced().is_some_and(|v| deps.contains(&v)) {
                    return None;
                }
            }
            _ => return None,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    #[test]
    fn grafts_single_use_temporary() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare (temporary) float t)
               (assign (x) (var_ref t) (expression float * (var_ref u) (constant float (2.0))))
               (assign (x) (var_ref o) (expression float + (var_ref t) (constant float (1.0)))))))",
        )
        .unwrap();
        assert!(tree_grafting(&mut p));
        assert!(print_program(&p).contains(
            "(assign (x) (var_ref o) (expression float + (expression float * (var_ref u) (constant float (2.0))) (constant float (1.0))))"
        ));
        assert!(!tree_grafting(&mut p));
    }

    #[test]
    fn intervening_write_blocks_graft() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float a)
               (declare () float t)
               (assign (x) (var_ref a) (var_ref u))
               (assign (x) (var_ref t) (expression float neg (var_ref a)))
               (assign (x) (var_ref a) (constant float (3.0)))
               (assign (x) (var_ref o) (expression float + (var_ref t) (var_ref a))))))",
        )
        .unwrap();
        assert!(!tree_grafting(&mut p));
    }
}
