//! Traversal and in-place rewrite helpers over statements and expressions.

use std::collections::{HashMap, HashSet};

use crate::ir::{Block, Expr, ExprKind, Loop, LoopId, Program, Signatures, Stmt, VarId};

impl Expr {
    pub fn for_each_child(&self, mut f: impl FnMut(&Expr)) {
        match &self.kind {
            ExprKind::Var(_) | ExprKind::Constant(_) => (),
            ExprKind::Index { array, index } => {
                f(array);
                f(index);
            }
            ExprKind::Field { record, .. } => f(record),
            ExprKind::Swizzle { value, .. } => f(value),
            ExprKind::Operation(_, xs) => xs.iter().for_each(f),
            ExprKind::Texture(t) => {
                f(&t.sampler);
                f(&t.coordinate);
                if let Some(l) = &t.lod {
                    f(l);
                }
            }
        }
    }

    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Var(_) | ExprKind::Constant(_) => (),
            ExprKind::Index { array, index } => {
                f(array);
                f(index);
            }
            ExprKind::Field { record, .. } => f(record),
            ExprKind::Swizzle { value, .. } => f(value),
            ExprKind::Operation(_, xs) => xs.iter_mut().for_each(f),
            ExprKind::Texture(t) => {
                f(&mut t.sampler);
                f(&mut t.coordinate);
                if let Some(l) = &mut t.lod {
                    f(l);
                }
            }
        }
    }

    /// Pre-order visit of every node.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        self.for_each_child(|c| c.visit(f));
    }

    /// Post-order rewrite: children first, then the node itself.
    pub fn rewrite_post(&mut self, f: &mut impl FnMut(&mut Expr) -> bool) -> bool {
        let mut modified = false;
        self.for_each_child_mut(|c| modified |= c.rewrite_post(f));
        modified | f(self)
    }

    pub fn any(&self, pred: &mut impl FnMut(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(|c| found = found || c.any(pred));
        found
    }

    pub fn reads_var(&self, v: VarId) -> bool {
        self.any(&mut |e| matches!(e.kind, ExprKind::Var(x) if x == v))
    }

    pub fn collect_vars(&self, out: &mut HashSet<VarId>) {
        self.visit(&mut |e| {
            if let ExprKind::Var(v) = e.kind {
                out.insert(v);
            }
        });
    }

    pub fn has_texture(&self) -> bool {
        self.any(&mut |e| matches!(e.kind, ExprKind::Texture(_)))
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        let mut n = 0;
        self.visit(&mut |_| n += 1);
        n
    }
}

/// Index expressions along an lvalue dereference chain (the values an
/// assignment reads to locate its destination).
pub fn for_each_lvalue_index_mut(lhs: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    match &mut lhs.kind {
        ExprKind::Index { array, index } => {
            for_each_lvalue_index_mut(array, f);
            f(index);
        }
        ExprKind::Field { record, .. } => for_each_lvalue_index_mut(record, f),
        ExprKind::Swizzle { value, .. } => for_each_lvalue_index_mut(value, f),
        _ => (),
    }
}

pub fn for_each_lvalue_index(lhs: &Expr, f: &mut impl FnMut(&Expr)) {
    match &lhs.kind {
        ExprKind::Index { array, index } => {
            for_each_lvalue_index(array, f);
            f(index);
        }
        ExprKind::Field { record, .. } => for_each_lvalue_index(record, f),
        ExprKind::Swizzle { value, .. } => for_each_lvalue_index(value, f),
        _ => (),
    }
}

/// Calls `f` on every value the statement itself evaluates (nested blocks
/// excluded). Destinations are skipped but their index expressions are
/// visited; `out`/`inout` call arguments count as destinations.
pub fn for_each_rvalue_mut(stmt: &mut Stmt, sigs: &Signatures, f: &mut impl FnMut(&mut Expr)) {
    match stmt {
        Stmt::Assign(a) => {
            if let Some(c) = &mut a.condition {
                f(c);
            }
            f(&mut a.rhs);
            for_each_lvalue_index_mut(&mut a.lhs, f);
        }
        Stmt::Call(c) => {
            for (n, a) in c.args.iter_mut().enumerate() {
                if sigs.is_out_param(c.callee, n) {
                    for_each_lvalue_index_mut(a, f);
                } else {
                    f(a);
                }
            }
            if let Some(r) = &mut c.return_deref {
                for_each_lvalue_index_mut(r, f);
            }
        }
        Stmt::If(i) => f(&mut i.condition),
        Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => f(e),
        Stmt::Declare(_)
        | Stmt::Loop(_)
        | Stmt::Break
        | Stmt::Continue
        | Stmt::Return(None)
        | Stmt::Discard(None) => (),
    }
}

pub fn for_each_rvalue(stmt: &Stmt, sigs: &Signatures, f: &mut impl FnMut(&Expr)) {
    match stmt {
        Stmt::Assign(a) => {
            if let Some(c) = &a.condition {
                f(c);
            }
            f(&a.rhs);
            for_each_lvalue_index(&a.lhs, f);
        }
        Stmt::Call(c) => {
            for (n, a) in c.args.iter().enumerate() {
                if sigs.is_out_param(c.callee, n) {
                    for_each_lvalue_index(a, f);
                } else {
                    f(a);
                }
            }
            if let Some(r) = &c.return_deref {
                for_each_lvalue_index(r, f);
            }
        }
        Stmt::If(i) => f(&i.condition),
        Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => f(e),
        _ => (),
    }
}

/// Every expression a statement holds, destinations included (nested
/// blocks excluded).
pub fn for_each_expr(s: &Stmt, f: &mut impl FnMut(&Expr)) {
    match s {
        Stmt::Assign(a) => {
            f(&a.lhs);
            f(&a.rhs);
            if let Some(c) = &a.condition {
                f(c);
            }
        }
        Stmt::Call(c) => {
            c.args.iter().for_each(&mut *f);
            if let Some(r) = &c.return_deref {
                f(r);
            }
        }
        Stmt::If(i) => f(&i.condition),
        Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => f(e),
        _ => (),
    }
}

pub fn for_each_expr_mut(s: &mut Stmt, f: &mut impl FnMut(&mut Expr)) {
    match s {
        Stmt::Assign(a) => {
            f(&mut a.lhs);
            f(&mut a.rhs);
            if let Some(c) = &mut a.condition {
                f(c);
            }
        }
        Stmt::Call(c) => {
            c.args.iter_mut().for_each(&mut *f);
            if let Some(r) = &mut c.return_deref {
                f(r);
            }
        }
        Stmt::If(i) => f(&mut i.condition),
        Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => f(e),
        _ => (),
    }
}

/// Nested statement lists of a statement.
pub fn child_blocks_mut(stmt: &mut Stmt) -> Vec<&mut Block> {
    match stmt {
        Stmt::If(i) => vec![&mut i.then_block, &mut i.else_block],
        Stmt::Loop(l) => vec![&mut l.body],
        _ => Vec::new(),
    }
}

pub fn child_blocks(stmt: &Stmt) -> Vec<&Block> {
    match stmt {
        Stmt::If(i) => vec![&i.then_block, &i.else_block],
        Stmt::Loop(l) => vec![&l.body],
        _ => Vec::new(),
    }
}

/// Pre-order walk of every statement at any depth.
pub fn walk(block: &[Stmt], f: &mut impl FnMut(&Stmt)) {
    for s in block {
        f(s);
        for b in child_blocks(s) {
            walk(b, f);
        }
    }
}

/// Any call statement at any depth.
pub fn contains_call(block: &[Stmt]) -> bool {
    let mut found = false;
    walk(block, &mut |s| found |= matches!(s, Stmt::Call(_)));
    found
}

/// Runs `f` on every statement list, innermost first, then on `block`.
pub fn walk_blocks_mut(block: &mut Block, f: &mut impl FnMut(&mut Block) -> bool) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        for b in child_blocks_mut(s) {
            modified |= walk_blocks_mut(b, f);
        }
    }

    modified | f(block)
}

/// Post-order rewrite of every node of every rvalue at any depth.
pub fn rewrite_exprs(
    block: &mut Block,
    sigs: &Signatures,
    f: &mut impl FnMut(&mut Expr) -> bool,
) -> bool {
    let mut modified = false;
    for s in block.iter_mut() {
        for_each_rvalue_mut(s, sigs, &mut |e| modified |= e.rewrite_post(f));
        for b in child_blocks_mut(s) {
            modified |= rewrite_exprs(b, sigs, f);
        }
    }

    modified
}

/// Values evaluated by one statement, conservatively: every call argument is
/// included whatever its direction.
fn for_each_read_expr(s: &Stmt, f: &mut impl FnMut(&Expr)) {
    match s {
        Stmt::Assign(a) => {
            if let Some(c) = &a.condition {
                f(c);
            }
            f(&a.rhs);
            for_each_lvalue_index(&a.lhs, f);
        }
        Stmt::Call(c) => {
            c.args.iter().for_each(&mut *f);
            if let Some(r) = &c.return_deref {
                for_each_lvalue_index(r, f);
            }
        }
        Stmt::If(i) => f(&i.condition),
        Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => f(e),
        _ => (),
    }
}

/// Every variable read anywhere in `block`. Call arguments are counted as
/// reads whatever their direction, and a loop counter is read by its exit test.
pub fn for_each_var_read(block: &[Stmt], f: &mut impl FnMut(VarId)) {
    walk(block, &mut |s| {
        if let Stmt::Loop(Loop {
            controls: Some(c), ..
        }) = s
        {
            f(c.counter);
        }
        for_each_read_expr(s, &mut |e| {
            e.visit(&mut |x| {
                if let ExprKind::Var(v) = x.kind {
                    f(v);
                }
            })
        });
    });
}

/// Number of reads of each variable in `block`.
pub fn count_var_reads(block: &[Stmt], counts: &mut HashMap<VarId, usize>) {
    for_each_var_read(block, &mut |v| *counts.entry(v).or_default() += 1);
}

/// Root variables written anywhere in `block`.
pub fn for_each_var_write(block: &[Stmt], sigs: &Signatures, f: &mut impl FnMut(VarId)) {
    walk(block, &mut |s| match s {
        Stmt::Assign(a) => {
            if let Some(v) = a.lhs.variable_referenced() {
                f(v);
            }
        }
        Stmt::Call(c) => {
            for (n, a) in c.args.iter().enumerate() {
                if sigs.is_out_param(c.callee, n) {
                    if let Some(v) = a.variable_referenced() {
                        f(v);
                    }
                }
            }
            if let Some(v) = c.return_deref.as_ref().and_then(Expr::variable_referenced) {
                f(v);
            }
        }
        _ => (),
    });
}

pub fn written_vars(block: &[Stmt], sigs: &Signatures) -> HashSet<VarId> {
    let mut out = HashSet::new();
    for_each_var_write(block, sigs, &mut |v| {
        out.insert(v);
    });
    out
}

/// Every variable mentioned in `block`, declarations included.
pub fn collect_block_vars(block: &[Stmt], out: &mut HashSet<VarId>) {
    for_each_var_read(block, &mut |v| {
        out.insert(v);
    });
    walk(block, &mut |s| match s {
        Stmt::Declare(v) => {
            out.insert(*v);
        }
        Stmt::Assign(a) => a.lhs.collect_vars(out),
        Stmt::Call(c) => {
            if let Some(r) = &c.return_deref {
                r.collect_vars(out);
            }
        }
        _ => (),
    });
}

fn remap_expr_vars(e: &mut Expr, map: &HashMap<VarId, VarId>) {
    e.rewrite_post(&mut |x| {
        if let ExprKind::Var(v) = &mut x.kind {
            if let Some(&n) = map.get(v) {
                *v = n;
            }
        }
        false
    });
}

/// Replaces every occurrence of a mapped variable (declarations, values,
/// destinations and loop counters).
pub fn remap_block_vars(block: &mut Block, map: &HashMap<VarId, VarId>) {
    for s in block.iter_mut() {
        match s {
            Stmt::Declare(v) => {
                if let Some(&n) = map.get(v) {
                    *v = n;
                }
            }
            Stmt::Assign(a) => {
                remap_expr_vars(&mut a.lhs, map);
                remap_expr_vars(&mut a.rhs, map);
                if let Some(c) = &mut a.condition {
                    remap_expr_vars(c, map);
                }
            }
            Stmt::Call(c) => {
                c.args.iter_mut().for_each(|a| remap_expr_vars(a, map));
                if let Some(r) = &mut c.return_deref {
                    remap_expr_vars(r, map);
                }
            }
            Stmt::If(i) => {
                remap_expr_vars(&mut i.condition, map);
                remap_block_vars(&mut i.then_block, map);
                remap_block_vars(&mut i.else_block, map);
            }
            Stmt::Loop(l) => {
                if let Some(c) = &mut l.controls {
                    if let Some(&n) = map.get(&c.counter) {
                        c.counter = n;
                    }
                }
                remap_block_vars(&mut l.body, map);
            }
            Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => remap_expr_vars(e, map),
            Stmt::Break | Stmt::Continue | Stmt::Return(None) | Stmt::Discard(None) => (),
        }
    }
}

/// Highest loop id used in `block`, plus one.
pub fn loop_id_bound(block: &[Stmt]) -> usize {
    let mut bound = 0;
    walk(block, &mut |s| {
        if let Stmt::Loop(l) = s {
            bound = bound.max(l.id.0 + 1);
        }
    });
    bound
}

fn renumber_loops(program: &mut Program, block: &mut Block) {
    for s in block.iter_mut() {
        if let Stmt::Loop(l) = s {
            l.id = program.fresh_loop_id();
        }
        for b in child_blocks_mut(s) {
            renumber_loops(program, b);
        }
    }
}

/// Copy of `block` in which every locally declared variable is replaced by a
/// fresh copy and every loop gets a new id. `extra` maps further variables
/// (e.g. callee parameters to their inlined temporaries).
pub fn clone_block_fresh(
    program: &mut Program,
    block: &[Stmt],
    extra: &HashMap<VarId, VarId>,
) -> Block {
    let mut map = extra.clone();
    walk(block, &mut |s| {
        if let Stmt::Declare(v) = s {
            map.entry(*v).or_insert(*v);
        }
    });
    for (from, to) in map.iter_mut() {
        if from == to {
            let fresh = program.var(*from).clone();
            *to = program.add_variable(fresh);
        }
    }

    let mut cloned = block.to_vec();
    remap_block_vars(&mut cloned, &map);
    renumber_loops(program, &mut cloned);
    cloned
}

/// Loop ids of `block` at any depth.
pub fn loop_ids(block: &[Stmt]) -> Vec<LoopId> {
    let mut ids = Vec::new();
    walk(block, &mut |s| {
        if let Stmt::Loop(l) = s {
            ids.push(l.id);
        }
    });
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        concrete_type::Type,
        ir::{Constant, Operation, Variable, VariableMode},
    };

    #[test]
    fn fresh_clone_renames_locals_only() {
        let mut p = Program::new();
        let u = p.add_global(Variable::new("u", Type::FLOAT, VariableMode::Uniform));
        let t = p.add_variable(Variable::new("t", Type::FLOAT, VariableMode::Auto));
        let id = p.fresh_loop_id();
        let body = vec![
            Stmt::Declare(t),
            Stmt::assign(p.var_ref(t), p.var_ref(u)),
            Stmt::Loop(Loop {
                id,
                body: vec![Stmt::Break],
                controls: None,
            }),
        ];

        let cloned = clone_block_fresh(&mut p, &body, &HashMap::new());
        let mut vars = HashSet::new();
        collect_block_vars(&cloned, &mut vars);
        assert!(vars.contains(&u));
        assert!(!vars.contains(&t));
        assert_eq!(vars.len(), 2);
        assert_ne!(loop_ids(&cloned), loop_ids(&body));
    }

    #[test]
    fn rewrite_is_post_order() {
        let c = |x| Expr::constant(Constant::float(x));
        let mut e = Expr::op(Operation::Add, vec![c(1.0), c(2.0)]).unwrap();
        let mut order = Vec::new();
        e.rewrite_post(&mut |x| {
            order.push(x.is_constant());
            false
        });
        assert_eq!(order, vec![true, true, false]);
        assert_eq!(e.size(), 3);
    }
}
