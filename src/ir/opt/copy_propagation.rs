use std::collections::HashMap;

use crate::{
    ir::{visit, Block, Expr, ExprKind, Program, Signatures, Stmt, Swizzle, VarId},
    utils::writemask_components,
};

/// Whole-variable copies in effect: destination to source.
type Copies = HashMap<VarId, VarId>;

/// Replaces reads of a variable that currently holds a copy of another
/// variable (`a = b; ... a ...`) with reads of the source.
pub fn copy_propagation(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let modified = program.for_each_body(|program, _, body| {
        copy_block(program, &sigs, body, &mut Copies::new())
    });

    if modified {
        tracing::debug!("[CopyPropagation] replaced copies");
    }
    modified
}

fn kill_copy(acp: &mut Copies, v: VarId) {
    acp.remove(&v);
    acp.retain(|_, src| *src != v);
}

fn kill_written_copies(acp: &mut Copies, sigs: &Signatures, block: &[Stmt]) {
    if visit::contains_call(block) {
        acp.clear();
        return;
    }
    visit::for_each_var_write(block, sigs, &mut |v| kill_copy(acp, v));
}

fn copy_block(program: &Program, sigs: &Signatures, block: &mut Block, acp: &mut Copies) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        visit::for_each_rvalue_mut(s, sigs, &mut |e| {
            modified |= e.rewrite_post(&mut |x| match &mut x.kind {
                ExprKind::Var(v) => match acp.get(v) {
                    Some(&src) => {
                        tracing::trace!("[CopyPropagation] {v:?} => {src:?}");
                        *v = src;
                        true
                    }
                    None => false,
                },
                _ => false,
            });
        });

        match s {
            Stmt::Assign(a) => {
                if let Some(v) = a.lhs.variable_referenced() {
                    kill_copy(acp, v);
                }
                let (Some(dst), Some(src)) =
                    (a.whole_variable_written(), a.rhs.whole_variable_referenced())
                else {
                    continue;
                };
                if dst != src && program.var(dst).ty == program.var(src).ty {
                    acp.insert(dst, src);
                }
            }
            Stmt::Call(_) => acp.clear(),
            Stmt::If(i) => {
                modified |= copy_block(program, sigs, &mut i.then_block, &mut acp.clone());
                modified |= copy_block(program, sigs, &mut i.else_block, &mut acp.clone());
                kill_written_copies(acp, sigs, &i.then_block);
                kill_written_copies(acp, sigs, &i.else_block);
            }
            Stmt::Loop(l) => {
                kill_written_copies(acp, sigs, &l.body);
                modified |= copy_block(program, sigs, &mut l.body, &mut acp.clone());
            }
            _ => (),
        }
    }

    modified
}

/// Per-channel copies in effect: each destination channel maps to a source
/// variable and channel.
type ElementCopies = HashMap<VarId, [Option<(VarId, u8)>; 4]>;

/// Channel-wise copy propagation: `a.xy = b.zw; ... a.yx ...` reads
/// `b.wz` instead.
pub fn copy_propagation_elements(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let modified = program.for_each_body(|program, _, body| {
        element_block(program, &sigs, body, &mut ElementCopies::new())
    });

    if modified {
        tracing::debug!("[CopyPropagationElements] replaced channel copies");
    }
    modified
}

fn kill_source(acp: &mut ElementCopies, v: VarId) {
    for channels in acp.values_mut() {
        for c in channels.iter_mut() {
            if c.is_some_and(|(src, _)| src == v) {
                *c = None;
            }
        }
    }
    acp.retain(|_, channels| channels.iter().any(Option::is_some));
}

fn kill_written_elements(acp: &mut ElementCopies, sigs: &Signatures, block: &[Stmt]) {
    if visit::contains_call(block) {
        acp.clear();
        return;
    }
    visit::for_each_var_write(block, sigs, &mut |v| {
        acp.remove(&v);
        kill_source(acp, v);
    });
}

/// Source variable and channels a copied read can be redirected to.
fn lookup_channels(acp: &ElementCopies, v: VarId, channels: &[u8]) -> Option<(VarId, Vec<u8>)> {
    let known = acp.get(&v)?;
    let mut source = None;
    let mut out = Vec::with_capacity(channels.len());
    for &c in channels {
        let (src, sc) = known[c as usize]?;
        if source.is_some_and(|s| s != src) {
            return None;
        }
        source = Some(src);
        out.push(sc);
    }

    Some((source?, out))
}

fn redirect(program: &Program, acp: &ElementCopies, x: &mut Expr) -> bool {
    let (v, channels) = match &x.kind {
        ExprKind::Var(v) if x.ty.is_scalar() || x.ty.is_vector() => {
            (*v, (0..x.ty.vector_elements()).collect::<Vec<_>>())
        }
        ExprKind::Swizzle { value, mask } => match value.kind {
            ExprKind::Var(v) => (v, mask.as_slice().to_vec()),
            _ => return false,
        },
        _ => return false,
    };
    let Some((src, source_channels)) = lookup_channels(acp, v, &channels) else {
        return false;
    };

    let source = program.var_ref(src);
    let width = source.ty.vector_elements();
    let replacement = if source.ty == x.ty && Swizzle::new(&source_channels).is_some_and(|s| s.is_identity_for(width)) {
        Some(source)
    } else {
        Swizzle::new(&source_channels).and_then(|m| Expr::swizzle(source, m))
    };
    let Some(mut replacement) = replacement.filter(|r| r.ty == x.ty) else {
        return false;
    };

    tracing::trace!("[CopyPropagationElements] {v:?}{channels:?} => {src:?}{source_channels:?}");
    replacement.precision = x.precision;
    *x = replacement;
    true
}

/// Outermost matches first, so a swizzle of a copy composes into one swizzle
/// of the source.
fn redirect_tree(program: &Program, acp: &ElementCopies, e: &mut Expr) -> bool {
    if redirect(program, acp, e) {
        return true;
    }
    let mut modified = false;
    e.for_each_child_mut(|c| modified |= redirect_tree(program, acp, c));
    modified
}

fn element_block(
    program: &Program,
    sigs: &Signatures,
    block: &mut Block,
    acp: &mut ElementCopies,
) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        visit::for_each_rvalue_mut(s, sigs, &mut |e| {
            modified |= redirect_tree(program, acp, e);
        });

        match s {
            Stmt::Assign(a) => {
                let Some(dst) = a.lhs.variable_referenced() else {
                    continue;
                };
                kill_source(acp, dst);
                let dst_ty = &program.var(dst).ty;
                if a.condition.is_some()
                    || a.lhs.whole_variable_referenced() != Some(dst)
                    || !(dst_ty.is_scalar() || dst_ty.is_vector())
                {
                    acp.remove(&dst);
                    continue;
                }
                if let Some(channels) = acp.get_mut(&dst) {
                    for ch in writemask_components(a.write_mask) {
                        channels[ch as usize] = None;
                    }
                }

                let (src, source_channels): (VarId, Vec<u8>) = match &a.rhs.kind {
                    ExprKind::Var(src) => (*src, (0..a.rhs.ty.vector_elements()).collect()),
                    ExprKind::Swizzle { value, mask } => match value.kind {
                        ExprKind::Var(src) => (src, mask.as_slice().to_vec()),
                        _ => continue,
                    },
                    _ => continue,
                };
                if src == dst || !(a.rhs.ty.is_scalar() || a.rhs.ty.is_vector()) {
                    continue;
                }
                let channels = acp.entry(dst).or_insert([None; 4]);
                for (k, ch) in writemask_components(a.write_mask).enumerate() {
                    channels[ch as usize] = source_channels.get(k).map(|&sc| (src, sc));
                }
            }
            Stmt::Call(_) => acp.clear(),
            Stmt::If(i) => {
                modified |= element_block(program, sigs, &mut i.then_block, &mut acp.clone());
                modified |= element_block(program, sigs, &mut i.else_block, &mut acp.clone());
                kill_written_elements(acp, sigs, &i.then_block);
                kill_written_elements(acp, sigs, &i.else_block);
            }
            Stmt::Loop(l) => {
                kill_written_elements(acp, sigs, &l.body);
                modified |= element_block(program, sigs, &mut l.body, &mut acp.clone());
            }
            _ => (),
        }
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    #[test]
    fn whole_copy_is_forwarded_until_source_changes() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float t)
               (assign (x) (var_ref t) (var_ref u))
               (assign (x) (var_ref o) (expression float + (var_ref t) (var_ref t))))))",
        )
        .unwrap();
        assert!(copy_propagation(&mut p));
        assert!(print_program(&p).contains("(expression float + (var_ref u) (var_ref u))"));
        assert!(!copy_propagation(&mut p));
    }

    #[test]
    fn copy_killed_by_write_to_source() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float a)
               (declare () float b)
               (assign (x) (var_ref b) (constant float (1.0)))
               (assign (x) (var_ref a) (var_ref b))
               (assign (x) (var_ref b) (constant float (2.0)))
               (assign (x) (var_ref o) (var_ref a)))))",
        )
        .unwrap();
        assert!(!copy_propagation(&mut p));
    }

    #[test]
    fn channel_copies_compose_with_swizzles() {
        let mut p = read_program(
            "(declare (uniform) vec4 u)
             (declare (out) vec2 o)
             (function main (signature void (parameters) (body
               (declare () vec2 t)
               (assign (xy) (var_ref t) (swiz zw (var_ref u)))
               (assign (xy) (var_ref o) (swiz yx (var_ref t))))))",
        )
        .unwrap();
        assert!(copy_propagation_elements(&mut p));
        assert!(print_program(&p).contains("(assign (xy) (var_ref o) (swiz wz (var_ref u)))"));
    }
}
