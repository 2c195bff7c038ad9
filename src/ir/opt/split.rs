//! Splitting of aggregate variables into one variable per part, so the
//! scalar passes can see each field or element on its own.

use std::collections::{HashMap, HashSet};

use crate::{
    concrete_type::Type,
    ir::{visit, Assignment, Block, Constant, Expr, ExprKind, Program, Stmt, VarId, Variable, VariableMode},
    precision::Precision,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Struct,
    Array,
}
impl Aggregate {
    const fn tag(self) -> &'static str {
        match self {
            Self::Struct => "StructureSplitting",
            Self::Array => "ArraySplitting",
        }
    }

    fn matches(self, ty: &Type) -> bool {
        match self {
            Self::Struct => ty.is_struct(),
            Self::Array => ty.is_array(),
        }
    }
}

/// Replaces local struct variables that are only accessed field by field
/// (or copied whole) with one variable per field.
pub fn structure_splitting(program: &mut Program) -> bool {
    split(program, Aggregate::Struct, false)
}

/// Replaces arrays only ever indexed by constants with one variable per
/// element. Linked, non-interface globals are candidates too.
pub fn array_splitting(program: &mut Program, linked: bool) -> bool {
    split(program, Aggregate::Array, linked)
}

/// Variable and part index of a constant-index element or field access.
fn part_of(kind: Aggregate, e: &Expr) -> Option<(VarId, usize)> {
    match (kind, &e.kind) {
        (Aggregate::Struct, ExprKind::Field { record, field }) => {
            Some((record.whole_variable_referenced()?, *field))
        }
        (Aggregate::Array, ExprKind::Index { array, index }) => {
            let v = array.whole_variable_referenced()?;
            let i = index.as_constant()?.as_index()?;
            let n = array.ty.array_length()?;
            (0..i64::from(n)).contains(&i).then_some((v, i as usize))
        }
        _ => None,
    }
}

/// Name suffix, type and precision of each part.
fn parts_of(program: &Program, v: &Variable) -> Vec<(String, Type, Precision)> {
    match &v.ty {
        Type::Struct(s) => program
            .structs
            .get(s.0)
            .map(|d| {
                d.fields
                    .iter()
                    .map(|f| {
                        let p = if f.precision.is_defined() { f.precision } else { v.precision };
                        (f.name.clone(), f.ty.clone(), p)
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Type::Array(e, n) => (0..*n).map(|i| (i.to_string(), (**e).clone(), v.precision)).collect(),
        _ => Vec::new(),
    }
}

/// Part `i` of an aggregate value that is not itself being split.
fn part_expr(program: &Program, kind: Aggregate, value: &Expr, i: usize) -> Option<Expr> {
    if let Some(c) = value.as_constant() {
        return c.element(i).map(Expr::constant);
    }
    match kind {
        Aggregate::Struct => {
            let Type::Struct(s) = &value.ty else {
                return None;
            };
            let f = program.structs.get(s.0)?.fields.get(i)?;
            Some(Expr::field(value.clone(), i, f.ty.clone(), f.precision))
        }
        Aggregate::Array => Expr::index(value.clone(), Expr::constant(Constant::int(i32::try_from(i).ok()?))),
    }
}

fn whole_candidate(e: &Expr, candidates: &HashSet<VarId>) -> Option<VarId> {
    e.whole_variable_referenced().filter(|v| candidates.contains(v))
}

/// Drops every candidate used other than through a constant part access.
fn disqualify(kind: Aggregate, e: &Expr, candidates: &mut HashSet<VarId>) {
    if part_of(kind, e).is_some() {
        return;
    }
    if let ExprKind::Var(v) = e.kind {
        candidates.remove(&v);
    }
    e.for_each_child(|c| disqualify(kind, c, candidates));
}

/// Whole-aggregate copy that can be expanded part by part.
fn is_splittable_copy(a: &Assignment, candidates: &HashSet<VarId>) -> bool {
    a.lhs.ty == a.rhs.ty
        && a.lhs.is_dereference()
        && (a.rhs.is_dereference() || a.rhs.is_constant())
        && (whole_candidate(&a.lhs, candidates).is_some() || whole_candidate(&a.rhs, candidates).is_some())
}

fn scan(kind: Aggregate, block: &[Stmt], candidates: &mut HashSet<VarId>) {
    visit::walk(block, &mut |s| match s {
        Stmt::Assign(a) if is_splittable_copy(a, candidates) => {
            let snapshot = candidates.clone();
            if whole_candidate(&a.lhs, &snapshot).is_none() {
                disqualify(kind, &a.lhs, candidates);
            }
            if whole_candidate(&a.rhs, &snapshot).is_none() {
                disqualify(kind, &a.rhs, candidates);
            }
            if let Some(c) = &a.condition {
                // every part copy re-evaluates the condition
                if a.lhs.variable_referenced().is_some_and(|v| c.reads_var(v)) {
                    for v in [&a.lhs, &a.rhs].iter().filter_map(|e| e.whole_variable_referenced()) {
                        candidates.remove(&v);
                    }
                }
                disqualify(kind, c, candidates);
            }
        }
        Stmt::Loop(l) => {
            if let Some(c) = &l.controls {
                candidates.remove(&c.counter);
            }
        }
        s => visit::for_each_expr(s, &mut |e| disqualify(kind, e, candidates)),
    });
}

struct Splitter<'a> {
    kind: Aggregate,
    parts: &'a HashMap<VarId, Vec<VarId>>,
}
impl Splitter<'_> {
    fn replace_parts(&self, program: &Program, e: &mut Expr) {
        if let Some((v, i)) = part_of(self.kind, e) {
            if let Some(&part) = self.parts.get(&v).and_then(|ps| ps.get(i)) {
                let precision = e.precision;
                *e = program.var_ref(part);
                if !e.precision.is_defined() {
                    e.precision = precision;
                }
                return;
            }
        }
        e.for_each_child_mut(|c| self.replace_parts(program, c));
    }

    fn split_part(&self, program: &Program, e: &Expr, i: usize) -> Option<Expr> {
        match e.whole_variable_referenced().and_then(|v| self.parts.get(&v)) {
            Some(ps) => ps.get(i).map(|&p| program.var_ref(p)),
            None => part_expr(program, self.kind, e, i),
        }
    }

    /// Per-part copies replacing a whole-aggregate copy.
    fn expand_copy(&self, program: &Program, a: &Assignment) -> Option<Block> {
        let count = [&a.lhs, &a.rhs]
            .iter()
            .find_map(|e| e.whole_variable_referenced().and_then(|v| self.parts.get(&v)))?
            .len();
        (0..count)
            .map(|i| {
                let mut part = Assignment::new(
                    self.split_part(program, &a.lhs, i)?,
                    self.split_part(program, &a.rhs, i)?,
                );
                part.condition = a.condition.clone();
                Some(Stmt::Assign(part))
            })
            .collect()
    }

    fn rewrite(&self, program: &Program, block: &mut Block) {
        for s in core::mem::take(block) {
            match s {
                Stmt::Declare(v) if self.parts.contains_key(&v) => {
                    block.extend(self.parts[&v].iter().map(|&p| Stmt::Declare(p)));
                }
                Stmt::Assign(a)
                    if [&a.lhs, &a.rhs].iter().any(|e| {
                        e.whole_variable_referenced().is_some_and(|v| self.parts.contains_key(&v))
                    }) =>
                {
                    match self.expand_copy(program, &a) {
                        Some(mut copies) => {
                            for c in copies.iter_mut() {
                                visit::for_each_expr_mut(c, &mut |e| self.replace_parts(program, e));
                            }
                            block.extend(copies);
                        }
                        None => {
                            debug_assert!(false, "unsplittable aggregate copy");
                            block.push(Stmt::Assign(a));
                        }
                    }
                }
                mut s => {
                    visit::for_each_expr_mut(&mut s, &mut |e| self.replace_parts(program, e));
                    for b in visit::child_blocks_mut(&mut s) {
                        self.rewrite(program, b);
                    }
                    block.push(s);
                }
            }
        }
    }
}

fn split(program: &mut Program, kind: Aggregate, include_globals: bool) -> bool {
    let mut candidates = HashSet::new();
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            visit::walk(body, &mut |s| {
                if let Stmt::Declare(v) = s {
                    candidates.insert(*v);
                }
            });
        }
    }
    if include_globals {
        candidates.extend(program.globals.iter().copied());
    }
    candidates.retain(|&v| {
        let var = program.var(v);
        kind.matches(&var.ty)
            && matches!(var.mode, VariableMode::Auto | VariableMode::Temporary)
            && var.constant_value.is_none()
    });
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            scan(kind, body, &mut candidates);
        }
    }
    if candidates.is_empty() {
        return false;
    }

    let mut parts = HashMap::new();
    let mut ordered = candidates.into_iter().collect::<Vec<_>>();
    ordered.sort();
    for v in ordered {
        let var = program.var(v).clone();
        let ids = parts_of(program, &var)
            .into_iter()
            .map(|(suffix, ty, precision)| {
                program.add_variable(Variable {
                    name: format!("{}_{suffix}", var.name),
                    ty,
                    mode: var.mode,
                    precision,
                    flags: var.flags,
                    constant_value: None,
                })
            })
            .collect::<Vec<_>>();
        tracing::trace!("[{}] {} into {} parts", kind.tag(), var.name, ids.len());
        parts.insert(v, ids);
    }

    let globals = core::mem::take(&mut program.globals);
    for g in globals {
        match parts.get(&g) {
            Some(ps) => program.globals.extend(ps.iter().copied()),
            None => program.globals.push(g),
        }
    }
    let splitter = Splitter { kind, parts: &parts };
    program.for_each_body(|program, _, body| {
        splitter.rewrite(program, body);
        true
    });

    tracing::debug!("[{}] split {} variables", kind.tag(), parts.len());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program, validate::validate};

    #[test]
    fn struct_fields_become_variables() {
        let mut p = read_program(
            "(struct S (fields (float a) (vec2 b)))
             (declare (uniform) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () S s)
               (assign (x) (record_ref (var_ref s) a) (var_ref u))
               (assign (x) (var_ref o) (record_ref (var_ref s) a)))))",
        )
        .unwrap();
        assert!(structure_splitting(&mut p));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(!text.contains("record_ref"));
        assert!(text.contains("(assign (x) (var_ref s_a) (var_ref u))"));
        assert!(text.contains("(declare () vec2 s_b)"));
        assert!(!structure_splitting(&mut p));
    }

    #[test]
    fn struct_passed_whole_stays() {
        let mut p = read_program(
            "(struct S (fields (float a)))
             (function use (signature void (parameters (declare (param_in) S x)) (body)))
             (function main (signature void (parameters) (body
               (declare () S s)
               (assign (x) (record_ref (var_ref s) a) (constant float (1.0)))
               (call use ((var_ref s))))))",
        )
        .unwrap();
        assert!(!structure_splitting(&mut p));
    }

    #[test]
    fn constant_indexed_array_is_split() {
        let mut p = read_program(
            "(declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () (array float 2) a)
               (assign (x) (array_ref (var_ref a) (constant int (0))) (constant float (1.0)))
               (assign (x) (array_ref (var_ref a) (constant int (1))) (constant float (2.0)))
               (assign (x) (var_ref o) (expression float + (array_ref (var_ref a) (constant int (0))) (array_ref (var_ref a) (constant int (1))))))))",
        )
        .unwrap();
        assert!(array_splitting(&mut p, false));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(text.contains("(expression float + (var_ref a_0) (var_ref a_1))"));
        assert!(!array_splitting(&mut p, false));
    }

    #[test]
    fn copy_guarded_by_destination_stays_whole() {
        let source = |cond: &str| {
            format!(
                "(declare (uniform) (array float 2) u)
                 (declare (uniform) float k)
                 (declare (out) float o)
                 (function main (signature void (parameters) (body
                   (declare () (array float 2) a)
                   (assign (x) (array_ref (var_ref a) (constant int (0))) (constant float (0.0)))
                   (assign (x) (array_ref (var_ref a) (constant int (1))) (constant float (0.0)))
                   (assign {cond} () (var_ref a) (var_ref u))
                   (assign (x) (var_ref o) (expression float + (array_ref (var_ref a) (constant int (0))) (array_ref (var_ref a) (constant int (1))))))))"
            )
        };

        let mut p = read_program(&source(
            "(expression bool < (array_ref (var_ref a) (constant int (0))) (constant float (0.5)))",
        ))
        .unwrap();
        assert!(!array_splitting(&mut p, false));

        let mut p = read_program(&source("(expression bool < (var_ref k) (constant float (0.5)))")).unwrap();
        assert!(array_splitting(&mut p, false));
        validate(&p).unwrap();
        assert!(print_program(&p).contains(
            "(assign (expression bool < (var_ref k) (constant float (0.5))) (x) (var_ref a_1) (array_ref (var_ref u) (constant int (1))))"
        ));
    }

    #[test]
    fn variable_index_keeps_array() {
        let mut p = read_program(
            "(declare (uniform) int i)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () (array float 2) a)
               (assign (x) (array_ref (var_ref a) (constant int (0))) (constant float (1.0)))
               (assign (x) (var_ref o) (array_ref (var_ref a) (var_ref i))))))",
        )
        .unwrap();
        assert!(!array_splitting(&mut p, false));
    }
}
