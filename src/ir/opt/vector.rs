use std::collections::{HashMap, HashSet};

use crate::{
    concrete_type::Type,
    ir::{visit, Assignment, Block, Constant, Expr, ExprKind, Operation, Program, Stmt, Swizzle, VarId, VariableMode},
    precision::higher_precision,
    utils::{swizzle_char, writemask_components},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorSplittingMode {
    Disabled,
    /// Split only vectors with a written component nothing reads.
    #[default]
    OnlyUnused,
    /// Split every vector accessed one component at a time.
    LoopInductors,
}

#[derive(Default, Clone, Copy)]
struct Usage {
    read: u8,
    written: u8,
}

/// Component `i` of the rhs of a multi-component store.
fn rhs_component(rhs: &Expr, i: usize) -> Option<Expr> {
    match &rhs.kind {
        ExprKind::Constant(c) => Some(Expr::constant(Constant::scalar(c.component(i)?))),
        ExprKind::Swizzle { value, mask } if value.is_dereference() => {
            Expr::swizzle((**value).clone(), Swizzle::new(&[*mask.as_slice().get(i)?])?)
        }
        ExprKind::Operation(Operation::Vector, xs) => xs.get(i).cloned(),
        _ if rhs.is_dereference() && rhs.ty.is_vector() => {
            Expr::swizzle(rhs.clone(), Swizzle::new(&[u8::try_from(i).ok()?])?)
        }
        _ => None,
    }
}

fn scan_reads(e: &Expr, usage: &mut HashMap<VarId, Usage>, rejected: &mut HashSet<VarId>) {
    if let ExprKind::Swizzle { value, mask } = &e.kind {
        if let Some(v) = value.whole_variable_referenced() {
            if let Some(u) = usage.get_mut(&v) {
                u.read |= mask.as_slice().iter().fold(0u8, |m, &c| m | (1 << c));
            }
            return;
        }
    }
    if let ExprKind::Var(v) = e.kind {
        rejected.insert(v);
    }
    e.for_each_child(|c| scan_reads(c, usage, rejected));
}

fn scan(block: &[Stmt], usage: &mut HashMap<VarId, Usage>, rejected: &mut HashSet<VarId>) {
    visit::walk(block, &mut |s| match s {
        Stmt::Assign(a) if a.lhs.whole_variable_referenced().is_some_and(|v| usage.contains_key(&v)) => {
            let Some(v) = a.lhs.whole_variable_referenced() else {
                return;
            };
            // each split store re-evaluates the rhs and the condition
            let reads_self = a.rhs.reads_var(v) || a.condition.as_ref().is_some_and(|c| c.reads_var(v));
            if a.write_mask.count_ones() > 1 && (rhs_component(&a.rhs, 0).is_none() || reads_self) {
                rejected.insert(v);
            }
            if let Some(u) = usage.get_mut(&v) {
                u.written |= a.write_mask;
            }
            scan_reads(&a.rhs, usage, rejected);
            if let Some(c) = &a.condition {
                scan_reads(c, usage, rejected);
            }
        }
        Stmt::Loop(l) => {
            if let Some(c) = &l.controls {
                rejected.insert(c.counter);
            }
        }
        s => visit::for_each_expr(s, &mut |e| scan_reads(e, usage, rejected)),
    });
}

struct Splitter {
    parts: HashMap<VarId, Vec<Option<VarId>>>,
}
impl Splitter {
    fn part(&self, v: VarId, c: u8) -> Option<VarId> {
        self.parts.get(&v)?.get(usize::from(c)).copied().flatten()
    }

    fn rewrite_reads(&self, program: &Program, e: &mut Expr) {
        if let ExprKind::Swizzle { value, mask } = &e.kind {
            if let Some(v) = value.whole_variable_referenced().filter(|v| self.parts.contains_key(v)) {
                let scalars = mask
                    .as_slice()
                    .iter()
                    .map(|&c| self.part(v, c).map(|p| program.var_ref(p)))
                    .collect::<Option<Vec<_>>>();
                let replacement = match scalars {
                    Some(mut xs) if xs.len() == 1 => xs.pop(),
                    Some(xs) => Expr::op(Operation::Vector, xs),
                    None => None,
                };
                if let Some(mut r) = replacement {
                    if !r.precision.is_defined() {
                        r.precision = e.precision;
                    }
                    *e = r;
                }
                return;
            }
        }
        e.for_each_child_mut(|c| self.rewrite_reads(program, c));
    }

    fn split_store(&self, program: &Program, a: &Assignment, v: VarId) -> Option<Block> {
        let single = a.write_mask.count_ones() == 1;
        writemask_components(a.write_mask)
            .enumerate()
            .map(|(i, c)| {
                let rhs = if single { a.rhs.clone() } else { rhs_component(&a.rhs, i)? };
                let mut store = Assignment::new(program.var_ref(self.part(v, c)?), rhs);
                store.condition = a.condition.clone();
                Some(Stmt::Assign(store))
            })
            .collect()
    }

    fn rewrite(&self, program: &Program, block: &mut Block) {
        for s in core::mem::take(block) {
            match s {
                Stmt::Declare(v) if self.parts.contains_key(&v) => {
                    block.extend(self.parts[&v].iter().flatten().map(|&p| Stmt::Declare(p)));
                }
                Stmt::Assign(a) if a.lhs.whole_variable_referenced().is_some_and(|v| self.parts.contains_key(&v)) => {
                    let stores = a
                        .lhs
                        .whole_variable_referenced()
                        .and_then(|v| self.split_store(program, &a, v));
                    match stores {
                        Some(mut stores) => {
                            for s in stores.iter_mut() {
                                if let Stmt::Assign(x) = s {
                                    self.rewrite_reads(program, &mut x.rhs);
                                    if let Some(c) = &mut x.condition {
                                        self.rewrite_reads(program, c);
                                    }
                                }
                            }
                            block.extend(stores);
                        }
                        None => {
                            debug_assert!(false, "unsplittable vector store");
                            block.push(Stmt::Assign(a));
                        }
                    }
                }
                mut s => {
                    visit::for_each_expr_mut(&mut s, &mut |e| self.rewrite_reads(program, e));
                    for b in visit::child_blocks_mut(&mut s) {
                        self.rewrite(program, b);
                    }
                    block.push(s);
                }
            }
        }
    }
}

/// Splits local vectors that are only accessed component by component into
/// one scalar per component.
pub fn split_vectors(program: &mut Program, mode: VectorSplittingMode) -> bool {
    if mode == VectorSplittingMode::Disabled {
        return false;
    }

    let mut usage = HashMap::new();
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            visit::walk(body, &mut |s| {
                if let Stmt::Declare(v) = s {
                    usage.insert(*v, Usage::default());
                }
            });
        }
    }
    usage.retain(|&v, _| {
        let var = program.var(v);
        var.ty.is_vector()
            && matches!(var.mode, VariableMode::Auto | VariableMode::Temporary)
            && var.constant_value.is_none()
    });
    let mut rejected = HashSet::new();
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            scan(body, &mut usage, &mut rejected);
        }
    }

    let mut chosen = usage
        .into_iter()
        .filter(|(v, u)| {
            !rejected.contains(v)
                && match mode {
                    VectorSplittingMode::OnlyUnused => u.written & !u.read != 0,
                    _ => true,
                }
        })
        .collect::<Vec<_>>();
    if chosen.is_empty() {
        return false;
    }
    chosen.sort_by_key(|(v, _)| *v);

    let mut parts = HashMap::new();
    for (v, u) in chosen {
        let var = program.var(v).clone();
        let scalar = var.ty.scalar_type().unwrap_or(Type::FLOAT);
        let used = u.read | u.written;
        let ids = (0..var.ty.vector_elements())
            .map(|c| {
                (used & (1 << c) != 0).then(|| {
                    let mut part = var.clone();
                    part.name = format!("{}_{}", var.name, swizzle_char(c));
                    part.ty = scalar.clone();
                    program.add_variable(part)
                })
            })
            .collect::<Vec<_>>();
        tracing::trace!("[VectorSplitting] {} into {} scalars", var.name, ids.iter().flatten().count());
        parts.insert(v, ids);
    }

    let count = parts.len();
    let splitter = Splitter { parts };
    program.for_each_body(|program, _, body| {
        splitter.rewrite(program, body);
        true
    });

    tracing::debug!("[VectorSplitting] split {count} vectors");
    true
}

const fn is_componentwise(op: Operation) -> bool {
    use Operation::*;

    matches!(
        op,
        BitNot
            | Neg
            | Abs
            | Sign
            | Rcp
            | Rsq
            | Sqrt
            | Exp
            | Log
            | Exp2
            | Log2
            | F2I
            | F2U
            | I2F
            | U2F
            | I2U
            | U2I
            | Trunc
            | Ceil
            | Floor
            | Fract
            | RoundEven
            | Sin
            | Cos
            | Saturate
            | Add
            | Sub
            | Mul
            | Div
            | Mod
            | Min
            | Max
            | Pow
            | BitAnd
            | BitXor
            | BitOr
            | Fma
            | Clamp
            | Lrp
    )
}

/// Vector value whose components are the scalar `parts`, built from trees of
/// the same shape. Leaves are single-component swizzles of one variable or
/// scalar constants.
fn combine(parts: &[&Expr]) -> Option<Expr> {
    let first = *parts.first()?;
    if !first.ty.is_scalar() || parts.iter().any(|p| p.ty != first.ty) {
        return None;
    }
    let base = first.ty.base_type()?;
    let width = u8::try_from(parts.len()).ok()?;

    let mut combined = match &first.kind {
        ExprKind::Constant(_) => {
            let scalars = parts
                .iter()
                .map(|p| p.as_constant()?.as_scalar())
                .collect::<Option<Vec<_>>>()?;
            Expr::constant(Constant::from_components(Type::vec(base, width), scalars))
        }
        ExprKind::Swizzle { value, .. } if value.whole_variable_referenced().is_some() => {
            let channels = parts
                .iter()
                .map(|p| match &p.kind {
                    ExprKind::Swizzle { value: v, mask } if v == value && mask.len() == 1 => {
                        mask.as_slice().first().copied()
                    }
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Expr::swizzle((**value).clone(), Swizzle::new(&channels)?)?
        }
        ExprKind::Operation(op, xs) if is_componentwise(*op) => {
            let operands = parts
                .iter()
                .map(|p| match p.as_operation() {
                    Some((o, ys)) if o == *op && ys.len() == xs.len() => Some(ys),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            let combined = (0..xs.len())
                .map(|k| combine(&operands.iter().map(|ys| &ys[k]).collect::<Vec<_>>()))
                .collect::<Option<Vec<_>>>()?;
            Expr::op(*op, combined)?
        }
        _ => return None,
    };
    if combined.ty != Type::vec(base, width) {
        return None;
    }
    combined.precision = parts
        .iter()
        .fold(combined.precision, |p, x| higher_precision(p, x.precision));
    Some(combined)
}

/// Unconditional single-component store that doesn't read its destination.
fn channel_store(s: &Stmt) -> Option<(VarId, u8, &Expr)> {
    let Stmt::Assign(a) = s else {
        return None;
    };
    let v = a.lhs.whole_variable_referenced()?;
    if a.condition.is_some() || !a.lhs.ty.is_vector() || a.write_mask.count_ones() != 1 || a.rhs.reads_var(v) {
        return None;
    }
    Some((v, a.write_mask.trailing_zeros() as u8, &a.rhs))
}

fn vectorize_block(program: &Program, block: &mut Block) -> usize {
    let mut fused = 0;
    let mut n = 0;
    while n < block.len() {
        let Some((v, _, _)) = channel_store(&block[n]) else {
            n += 1;
            continue;
        };
        let mut mask = 0u8;
        let mut run = Vec::new();
        for s in &block[n..] {
            match channel_store(s) {
                Some((w, c, rhs)) if w == v && mask & (1 << c) == 0 => {
                    mask |= 1 << c;
                    run.push((c, rhs));
                }
                _ => break,
            }
        }
        let len = run.len();
        if len < 2 {
            n += 1;
            continue;
        }

        run.sort_by_key(|(c, _)| *c);
        let rhs = combine(&run.iter().map(|(_, e)| *e).collect::<Vec<_>>());
        match rhs {
            Some(rhs) => {
                tracing::trace!("[Vectorize] fused {len} stores to {}", program.var(v).name);
                let store = Assignment::masked(program.var_ref(v), rhs, mask);
                block.splice(n..n + len, [Stmt::Assign(store)]);
                fused += 1;
                n += 1;
            }
            None => n += len,
        }
    }
    fused
}

/// Fuses runs of single-component stores to one vector into one store of a
/// vector-valued computation.
pub fn vectorize(program: &mut Program) -> bool {
    let mut fused = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = vectorize_block(program, b);
            fused += n;
            n > 0
        })
    });

    if fused > 0 {
        tracing::debug!("[Vectorize] fused {fused} store runs");
    }
    fused > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program, validate::validate};

    const GLOBALS: &str = "(declare (uniform) vec2 uv)
         (declare (uniform) vec4 a)
         (declare (uniform) vec4 b)
         (declare (out) vec4 o4)
         (declare (out) float o)";

    fn read(body: &str) -> Program {
        read_program(&format!(
            "{GLOBALS} (function main (signature void (parameters) (body {body})))"
        ))
        .unwrap()
    }

    #[test]
    fn unused_component_splits() {
        let mut p = read(
            "(declare () vec4 t)
             (assign (xy) (var_ref t) (var_ref uv))
             (assign (x) (var_ref o) (swiz x (var_ref t)))",
        );
        assert!(split_vectors(&mut p, VectorSplittingMode::OnlyUnused));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(text.contains("(assign (x) (var_ref t_x) (swiz x (var_ref uv)))"));
        assert!(text.contains("(assign (x) (var_ref t_y) (swiz y (var_ref uv)))"));
        assert!(text.contains("(assign (x) (var_ref o) (var_ref t_x))"));
        assert!(!split_vectors(&mut p, VectorSplittingMode::OnlyUnused));
    }

    #[test]
    fn fully_read_vector_splits_only_for_inductors() {
        let body = "(declare () vec2 t)
             (assign (xy) (var_ref t) (var_ref uv))
             (assign (x) (var_ref o) (expression float + (swiz x (var_ref t)) (swiz y (var_ref t))))";
        let mut p = read(body);
        assert!(!split_vectors(&mut p, VectorSplittingMode::OnlyUnused));
        assert!(!split_vectors(&mut p, VectorSplittingMode::Disabled));
        assert!(split_vectors(&mut p, VectorSplittingMode::LoopInductors));
        validate(&p).unwrap();
        assert!(print_program(&p).contains("(expression float + (var_ref t_x) (var_ref t_y))"));
    }

    #[test]
    fn store_guarded_by_own_component_stays_whole() {
        let body = |cond: &str| {
            format!(
                "(declare () vec2 t)
                 (assign (x) (var_ref t) (constant float (0.0)))
                 (assign {cond} (xy) (var_ref t) (var_ref uv))
                 (assign (x) (var_ref o) (expression float + (swiz x (var_ref t)) (swiz y (var_ref t))))"
            )
        };

        let mut p = read(&body("(expression bool < (swiz x (var_ref t)) (constant float (0.5)))"));
        assert!(!split_vectors(&mut p, VectorSplittingMode::LoopInductors));

        let mut p = read(&body("(expression bool < (swiz x (var_ref uv)) (constant float (0.5)))"));
        assert!(split_vectors(&mut p, VectorSplittingMode::LoopInductors));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(text.contains(
            "(assign (expression bool < (swiz x (var_ref uv)) (constant float (0.5))) (x) (var_ref t_y) (swiz y (var_ref uv)))"
        ));
    }

    #[test]
    fn whole_reads_keep_vector() {
        let mut p = read(
            "(declare () vec4 t)
             (assign (xy) (var_ref t) (var_ref uv))
             (assign (xyzw) (var_ref o4) (var_ref t))",
        );
        assert!(!split_vectors(&mut p, VectorSplittingMode::LoopInductors));
    }

    #[test]
    fn channel_stores_fuse() {
        let mut p = read(
            "(assign (x) (var_ref o4) (expression float + (swiz x (var_ref a)) (swiz x (var_ref b))))
             (assign (y) (var_ref o4) (expression float + (swiz y (var_ref a)) (swiz y (var_ref b))))",
        );
        assert!(vectorize(&mut p));
        validate(&p).unwrap();
        assert!(print_program(&p)
            .contains("(assign (xy) (var_ref o4) (expression vec2 + (swiz xy (var_ref a)) (swiz xy (var_ref b))))"));
        assert!(!vectorize(&mut p));
    }

    #[test]
    fn different_shapes_stay_apart() {
        let mut p = read(
            "(assign (x) (var_ref o4) (expression float + (swiz x (var_ref a)) (swiz x (var_ref b))))
             (assign (y) (var_ref o4) (expression float * (swiz y (var_ref a)) (swiz y (var_ref b))))",
        );
        assert!(!vectorize(&mut p));
    }
}
