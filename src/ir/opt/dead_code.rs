use std::collections::{HashMap, HashSet};

use crate::{
    concrete_type::Type,
    ir::{
        block::full_write_mask, visit, Block, FuncId, Program, Signatures, Stmt, VarId,
        VariableMode,
    },
};

/// Removes variables that are never read, with every assignment to them.
///
/// Unlinked, only function locals are candidates. Linked, globals are too,
/// and unreferenced shader inputs, uniforms and outputs lose their
/// declarations.
pub fn dead_code(program: &mut Program, linked: bool) -> bool {
    let mut reads = HashMap::new();
    let mut referenced = HashSet::new();
    let mut written_by_calls = HashSet::new();
    for f in program.functions.iter().flatten() {
        let Some(body) = &f.body else {
            continue;
        };
        visit::count_var_reads(body, &mut reads);
        visit::collect_block_vars(body, &mut referenced);
        visit::walk(body, &mut |s| {
            if let Stmt::Call(c) = s {
                written_by_calls.extend(
                    c.args
                        .iter()
                        .chain(c.return_deref.iter())
                        .filter_map(|a| a.variable_referenced()),
                );
            }
        });
    }

    let mut locals = HashSet::new();
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            visit::walk(body, &mut |s| {
                if let Stmt::Declare(v) = s {
                    locals.insert(*v);
                }
            });
        }
    }

    let is_dead = |v: VarId| {
        if reads.get(&v).copied().unwrap_or(0) > 0 || written_by_calls.contains(&v) {
            return false;
        }
        let var = program.var(v);
        if var.mode.is_function_param() {
            return false;
        }
        if locals.contains(&v) {
            return true;
        }
        if !linked || !program.is_global(v) {
            return false;
        }
        match var.mode {
            VariableMode::Auto | VariableMode::Temporary => true,
            VariableMode::Uniform => !referenced.contains(&v) && var.constant_value.is_none(),
            _ => !referenced.contains(&v),
        }
    };
    let dead = locals
        .iter()
        .chain(program.globals.iter())
        .copied()
        .filter(|&v| is_dead(v))
        .collect::<HashSet<_>>();
    if dead.is_empty() {
        return false;
    }

    for &v in &dead {
        tracing::trace!("[DeadCode] removing {}", program.var(v).name);
    }
    program.globals.retain(|g| !dead.contains(g));
    program.for_each_body(|_, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let before = b.len();
            b.retain(|s| match s {
                Stmt::Declare(v) => !dead.contains(v),
                Stmt::Assign(a) => !a.lhs.variable_referenced().is_some_and(|v| dead.contains(&v)),
                _ => true,
            });
            b.len() != before
        })
    });

    tracing::debug!(
        "[DeadCode{}] removed {} variables",
        if linked { "" } else { "Unlinked" },
        dead.len()
    );
    true
}

/// Assignment still waiting for a read of its destination.
struct Pending {
    index: usize,
    var: VarId,
    mask: u8,
}

/// Components covered by an assignment, with non-vector types treated as a
/// single component.
fn coverage(ty: &Type, write_mask: u8) -> u8 {
    match full_write_mask(ty) {
        0 => 1,
        _ => write_mask,
    }
}

/// Within straight-line code, removes assignments whose every component is
/// overwritten before being read.
pub fn dead_code_local(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut removed = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = local_block(program, &sigs, b);
            removed += n;
            n > 0
        })
    });

    if removed > 0 {
        tracing::debug!("[DeadCodeLocal] removed {removed} overwritten assignments");
    }
    removed > 0
}

fn local_block(program: &Program, sigs: &Signatures, block: &mut Block) -> usize {
    let mut pending = Vec::<Pending>::new();
    let mut dead = HashSet::new();
    for (n, s) in block.iter().enumerate() {
        let Stmt::Assign(a) = s else {
            if !matches!(s, Stmt::Declare(_)) {
                pending.clear();
            }
            continue;
        };

        let mut read = HashSet::new();
        visit::for_each_rvalue(s, sigs, &mut |e| e.collect_vars(&mut read));
        pending.retain(|p| !read.contains(&p.var));

        let Some(v) = a.lhs.whole_variable_referenced() else {
            continue;
        };
        let mask = coverage(&program.var(v).ty, a.write_mask);
        if a.condition.is_none() {
            for p in pending.iter_mut().filter(|p| p.var == v) {
                p.mask &= !mask;
                if p.mask == 0 {
                    dead.insert(p.index);
                }
            }
            pending.retain(|p| p.mask != 0);
        }
        pending.push(Pending { index: n, var: v, mask });
    }

    if dead.is_empty() {
        return 0;
    }
    let mut n = 0;
    block.retain(|_| {
        n += 1;
        !dead.contains(&(n - 1))
    });
    dead.len()
}

/// Removes functions other than `main` that no remaining function calls.
pub fn dead_functions(program: &mut Program) -> bool {
    if program.main_function().is_none() {
        return false;
    }

    let mut removed = Vec::new();
    loop {
        let mut called = HashSet::<FuncId>::new();
        for f in program.functions.iter().flatten() {
            if let Some(body) = &f.body {
                visit::walk(body, &mut |s| {
                    if let Stmt::Call(c) = s {
                        called.insert(c.callee);
                    }
                });
            }
        }

        let unused = program
            .function_ids()
            .into_iter()
            .filter(|id| {
                !called.contains(id) && program.function(*id).is_some_and(|f| !f.is_main())
            })
            .collect::<Vec<_>>();
        if unused.is_empty() {
            break;
        }
        for id in unused {
            if let Some(f) = program.remove_function(id) {
                tracing::trace!("[DeadFunctions] removing {}", f.name);
                removed.push(f.name);
            }
        }
    }

    if !removed.is_empty() {
        tracing::debug!("[DeadFunctions] removed {}", removed.join(", "));
    }
    !removed.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    #[test]
    fn removes_write_only_locals() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float t)
               (assign (x) (var_ref t) (var_ref u))
               (assign (x) (var_ref o) (var_ref u)))))",
        )
        .unwrap();
        assert!(dead_code(&mut p, false));
        let text = print_program(&p);
        assert!(!text.contains("var_ref t"));
        assert!(text.contains("(assign (x) (var_ref o) (var_ref u))"));
        assert!(!dead_code(&mut p, false));
    }

    #[test]
    fn linked_drops_unused_uniforms_only() {
        let src = "(declare (uniform) float unused)
             (declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) (var_ref u)))))";
        let mut p = read_program(src).unwrap();
        assert!(!dead_code(&mut p, false));
        assert!(dead_code(&mut p, true));
        let names = p.globals.iter().map(|&g| p.var(g).name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["u", "o"]);
    }

    #[test]
    fn overwritten_components_are_dead() {
        let mut p = read_program(
            "(declare (uniform) vec4 u)
             (declare (out) vec4 o)
             (function main (signature void (parameters) (body
               (assign (xy) (var_ref o) (swiz xy (var_ref u)))
               (assign (x) (var_ref o) (swiz z (var_ref u)))
               (assign (y) (var_ref o) (swiz w (var_ref u)))
               (assign (zw) (var_ref o) (swiz zw (var_ref u))))))",
        )
        .unwrap();
        assert!(dead_code_local(&mut p));
        let body = p.function(p.main_function().unwrap()).unwrap().body.clone().unwrap();
        assert_eq!(body.len(), 3);
        assert!(!dead_code_local(&mut p));
    }

    #[test]
    fn read_keeps_earlier_assignment() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) (var_ref u))
               (assign (x) (var_ref o) (expression float + (var_ref o) (var_ref u))))))",
        )
        .unwrap();
        assert!(!dead_code_local(&mut p));
    }

    #[test]
    fn uncalled_functions_are_removed() {
        let mut p = read_program(
            "(function helper (signature float (parameters) (body (return (constant float (1.0))))))
             (function main (signature void (parameters) (body)))",
        )
        .unwrap();
        assert!(dead_functions(&mut p));
        assert!(p.find_function("helper").is_none());
        assert!(!dead_functions(&mut p));
    }
}
