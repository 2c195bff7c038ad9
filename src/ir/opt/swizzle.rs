use crate::{
    concrete_type::Type,
    ir::{
        visit, Assignment, Block, Constant, Expr, ExprKind, Operation, Program, Scalar,
        Signatures, Stmt, Swizzle,
    },
};

/// Component selected by a constant index into an `n`-vector. Out-of-range
/// indices clamp to the nearest component.
fn clamped_component(index: &Expr, n: u8) -> Option<u8> {
    let i = index.as_constant()?.as_index()?;
    Some(i.clamp(0, i64::from(n) - 1) as u8)
}

/// Vector element reads with a constant index become single-component
/// swizzles: `v[2]` is `v.z`. An element store `v[2] = x` becomes a
/// writemasked store to `v`.
pub fn vec_index_to_swizzle(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut converted = 0;
    program.for_each_body(|_, _, body| {
        let mut modified = visit::rewrite_exprs(body, &sigs, &mut |e| {
            let replacement = match &e.kind {
                ExprKind::Index { array, index } if array.ty.is_vector() => {
                    clamped_component(index, array.ty.vector_elements())
                        .and_then(|c| Expr::swizzle((**array).clone(), Swizzle::new(&[c])?))
                }
                ExprKind::Operation(Operation::VectorExtract, xs) => match xs.as_slice() {
                    [v, index] => clamped_component(index, v.ty.vector_elements())
                        .and_then(|c| Expr::swizzle(v.clone(), Swizzle::new(&[c])?)),
                    _ => None,
                },
                _ => None,
            };
            let Some(mut r) = replacement else {
                return false;
            };
            r.precision = e.precision;
            *e = r;
            converted += 1;
            true
        });

        modified |= visit::walk_blocks_mut(body, &mut |b| {
            let mut modified = false;
            for s in b.iter_mut() {
                if let Stmt::Assign(a) = s {
                    if element_store_to_writemask(a) {
                        converted += 1;
                        modified = true;
                    }
                }
            }
            modified
        });
        modified
    });

    if converted > 0 {
        tracing::debug!("[VecIndexToSwizzle] converted {converted} vector indexings");
    }
    converted > 0
}

fn element_store_to_writemask(a: &mut Assignment) -> bool {
    let ExprKind::Index { array, index } = &a.lhs.kind else {
        return false;
    };
    if !array.ty.is_vector() || !array.is_dereference() || a.write_mask != 1 {
        return false;
    }
    let Some(c) = clamped_component(index, array.ty.vector_elements()) else {
        return false;
    };

    a.lhs = (**array).clone();
    a.write_mask = 1 << c;
    true
}

/// `v.xyzw.zy` becomes `v.zy`.
pub fn swizzle_swizzle(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut merged = 0;
    program.for_each_body(|_, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let ExprKind::Swizzle { value, mask } = &mut e.kind else {
                return false;
            };
            let ExprKind::Swizzle {
                value: inner_value,
                mask: inner_mask,
            } = &mut value.kind
            else {
                return false;
            };
            let Some(composed) = mask.after(*inner_mask) else {
                return false;
            };

            let source = core::mem::replace(&mut **inner_value, Expr::constant(Constant::bool(false)));
            *value = Box::new(source);
            *mask = composed;
            merged += 1;
            true
        })
    });

    if merged > 0 {
        tracing::debug!("[SwizzleSwizzle] merged {merged} swizzles");
    }
    merged > 0
}

/// Drops swizzles that select every component in order.
pub fn noop_swizzle(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut removed = 0;
    program.for_each_body(|_, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let ExprKind::Swizzle { value, mask } = &mut e.kind else {
                return false;
            };
            if value.ty != e.ty || !mask.is_identity_for(value.ty.vector_elements()) {
                return false;
            }

            let precision = e.precision;
            let mut source = core::mem::replace(&mut **value, Expr::constant(Constant::bool(false)));
            if !source.precision.is_defined() {
                source.precision = precision;
            }
            *e = source;
            removed += 1;
            true
        })
    });

    if removed > 0 {
        tracing::debug!("[NoopSwizzle] removed {removed} swizzles");
    }
    removed > 0
}

/// Replaces `vector_insert(v, x, i)` with a temporary holding `v` whose
/// component `i` is overwritten with `x`. A non-constant index turns into one
/// conditional store per component.
pub fn lower_vector_insert(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut lowered = 0;
    program.for_each_body(|program, _, body| {
        visit::walk_blocks_mut(body, &mut |b| {
            let n = lower_block(program, &sigs, b);
            lowered += n;
            n > 0
        })
    });

    if lowered > 0 {
        tracing::debug!("[LowerVectorInsert] lowered {lowered} inserts");
    }
    lowered > 0
}

fn take_insert(stmt: &mut Stmt, sigs: &Signatures) -> Option<Expr> {
    let mut found = None;
    visit::for_each_rvalue_mut(stmt, sigs, &mut |e| {
        if found.is_some() {
            return;
        }
        e.rewrite_post(&mut |x| {
            if found.is_some() || !matches!(x.as_operation(), Some((Operation::VectorInsert, _))) {
                return false;
            }
            found = Some(x.clone());
            true
        });
    });
    found
}

fn lower_block(program: &mut Program, sigs: &Signatures, block: &mut Block) -> usize {
    let mut lowered = 0;
    let mut n = 0;
    while n < block.len() {
        let Some(insert) = take_insert(&mut block[n], sigs) else {
            n += 1;
            continue;
        };
        let Some((_, [vector, value, index])) = insert.as_operation() else {
            n += 1;
            continue;
        };

        let t = program.new_temporary("vec_insert", insert.ty.clone(), insert.precision);
        let mut prologue = vec![Stmt::Declare(t), Stmt::assign(program.var_ref(t), vector.clone())];
        let width = insert.ty.vector_elements();
        match clamped_component(index, width) {
            Some(c) => prologue.push(Stmt::Assign(Assignment::masked(
                program.var_ref(t),
                value.clone(),
                1 << c,
            ))),
            None => {
                let (value, index) = (
                    spill(program, &mut prologue, value, "vec_insert_value"),
                    spill(program, &mut prologue, index, "vec_insert_index"),
                );
                for c in 0..width {
                    let k = match index.ty {
                        Type::Scalar(b) => Constant::scalar(Scalar::Int(i32::from(c)).convert(b)),
                        _ => continue,
                    };
                    let Some(condition) = Expr::op(Operation::Equal, vec![index.clone(), Expr::constant(k)]) else {
                        continue;
                    };
                    prologue.push(Stmt::Assign(Assignment {
                        lhs: program.var_ref(t),
                        rhs: value.clone(),
                        write_mask: 1 << c,
                        condition: Some(condition),
                    }));
                }
            }
        }

        let target = insert.clone();
        let holder = program.var_ref(t);
        visit::for_each_rvalue_mut(&mut block[n], sigs, &mut |e| {
            e.rewrite_post(&mut |x| {
                if *x != target {
                    return false;
                }
                *x = holder.clone();
                true
            });
        });

        let added = prologue.len();
        block.splice(n..n, prologue);
        n += added;
        lowered += 1;
    }
    lowered
}

/// Leaves constants and variable reads in place; anything else is evaluated
/// once into a temporary.
fn spill(program: &mut Program, prologue: &mut Vec<Stmt>, e: &Expr, name: &str) -> Expr {
    if e.is_leaf() {
        return e.clone();
    }
    let t = program.new_temporary(name, e.ty.clone(), e.precision);
    prologue.push(Stmt::Declare(t));
    prologue.push(Stmt::assign(program.var_ref(t), e.clone()));
    program.var_ref(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program, validate::validate};

    const GLOBALS: &str = "(declare (uniform) vec4 v)
         (declare (uniform) float u)
         (declare (uniform) int i)
         (declare (out) vec4 o)
         (declare (out) float f)";

    fn read(body: &str) -> Program {
        read_program(&format!(
            "{GLOBALS} (function main (signature void (parameters) (body {body})))"
        ))
        .unwrap()
    }

    #[test]
    fn constant_index_becomes_swizzle() {
        let mut p = read(
            "(assign (x) (var_ref f) (array_ref (var_ref v) (constant int (2))))
             (assign (x) (array_ref (var_ref o) (constant int (1))) (var_ref u))",
        );
        assert!(vec_index_to_swizzle(&mut p));
        let text = print_program(&p);
        assert!(text.contains("(assign (x) (var_ref f) (swiz z (var_ref v)))"));
        assert!(text.contains("(assign (y) (var_ref o) (var_ref u))"));
        validate(&p).unwrap();
        assert!(!vec_index_to_swizzle(&mut p));
    }

    #[test]
    fn out_of_range_index_clamps() {
        let mut p = read("(assign (x) (var_ref f) (array_ref (var_ref v) (constant int (7))))");
        assert!(vec_index_to_swizzle(&mut p));
        assert!(print_program(&p).contains("(swiz w (var_ref v))"));
    }

    #[test]
    fn nested_swizzles_compose_and_identity_drops() {
        let mut p = read("(assign (xyzw) (var_ref o) (swiz xyzw (swiz wzyx (swiz wzyx (var_ref v)))))");
        assert!(swizzle_swizzle(&mut p));
        assert!(print_program(&p).contains("(swiz xyzw (var_ref v))"));
        assert!(noop_swizzle(&mut p));
        assert!(print_program(&p).contains("(assign (xyzw) (var_ref o) (var_ref v))"));
        assert!(!swizzle_swizzle(&mut p));
        assert!(!noop_swizzle(&mut p));
    }

    #[test]
    fn insert_with_variable_index_uses_conditional_stores() {
        let mut p = read(
            "(assign (xyzw) (var_ref o) (expression vec4 vector_insert (var_ref v) (var_ref u) (var_ref i)))",
        );
        assert!(lower_vector_insert(&mut p));
        validate(&p).unwrap();
        let text = print_program(&p);
        assert!(!text.contains("vector_insert"));
        assert_eq!(text.matches("(expression bool == (var_ref i)").count(), 4);
        assert!(text.contains("(assign (xyzw) (var_ref o) (var_ref vec_insert))"));
        assert!(!lower_vector_insert(&mut p));
    }
}
