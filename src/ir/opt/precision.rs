use crate::{
    concrete_type::Type,
    ir::{Block, Expr, ExprKind, Program, Stmt},
    precision::{higher_precision, Precision},
};

/// Fills in undefined precisions from the values they are computed from,
/// sweeping every function until a sweep changes nothing.
///
/// A dereference takes its variable's (or array's, or field's) precision, a
/// swizzle its source's, an operation the join of its operands'. An
/// assignment gives its destination, and the destination variable, the
/// precision of the assigned value; a call result gets the join of the
/// callee's parameter precisions.
pub fn propagate_precision(program: &mut Program) -> bool {
    let mut changes = 0;
    loop {
        let mut sweep = 0;
        program.for_each_body(|program, _, body| {
            sweep += sweep_block(program, body);
            false
        });
        if sweep == 0 {
            break;
        }
        changes += sweep;
    }

    if changes > 0 {
        tracing::debug!("[PrecisionPropagation] defined {changes} precisions");
    }
    changes > 0
}

fn inferred(program: &Program, e: &Expr) -> Precision {
    match &e.kind {
        ExprKind::Var(v) => program.var(*v).precision,
        ExprKind::Index { array, .. } => array.precision,
        ExprKind::Swizzle { value, .. } => value.precision,
        ExprKind::Field { record, field } => match &record.ty {
            Type::Struct(s) => program
                .structs
                .get(s.0)
                .and_then(|d| d.fields.get(*field))
                .map_or(Precision::Undefined, |f| f.precision),
            _ => Precision::Undefined,
        },
        ExprKind::Operation(_, xs) => xs
            .iter()
            .fold(Precision::Undefined, |p, x| higher_precision(p, x.precision)),
        ExprKind::Texture(t) => t.sampler.precision,
        ExprKind::Constant(_) => Precision::Undefined,
    }
}

fn fill(program: &Program, e: &mut Expr) -> usize {
    let mut n = 0;
    e.rewrite_post(&mut |x| {
        if x.precision.is_defined() || !x.ty.is_precision_applicable() {
            return false;
        }
        let p = inferred(program, x);
        if p.is_defined() {
            x.precision = p;
            n += 1;
        }
        p.is_defined()
    });
    n
}

/// Defines the destination of a store from the stored value's precision.
fn store_precision(program: &mut Program, lhs: &mut Expr, p: Precision) -> usize {
    if lhs.precision.is_defined() || !p.is_defined() || !lhs.ty.is_precision_applicable() {
        return 0;
    }
    lhs.precision = p;
    let mut n = 1;
    if let Some(v) = lhs.variable_referenced() {
        let var = program.var_mut(v);
        if !var.precision.is_defined() && var.ty.is_precision_applicable() {
            tracing::trace!("[PrecisionPropagation] {} gets {p:?}", var.name);
            var.precision = p;
            n += 1;
        }
    }
    n
}

fn sweep_block(program: &mut Program, block: &mut Block) -> usize {
    let mut n = 0;
    for s in block.iter_mut() {
        match s {
            Stmt::Assign(a) => {
                if let Some(c) = &mut a.condition {
                    n += fill(program, c);
                }
                n += fill(program, &mut a.rhs);
                n += fill(program, &mut a.lhs);
                n += store_precision(program, &mut a.lhs, a.rhs.precision);
            }
            Stmt::Call(c) => {
                for a in c.args.iter_mut() {
                    n += fill(program, a);
                }
                let Some(r) = &mut c.return_deref else {
                    continue;
                };
                n += fill(program, r);
                let Some(callee) = program.function(c.callee) else {
                    continue;
                };
                let joined = callee
                    .params
                    .iter()
                    .zip(c.args.iter())
                    .fold(Precision::Undefined, |p, (&formal, actual)| {
                        let declared = program.var(formal).precision;
                        let q = if declared.is_defined() {
                            declared
                        } else {
                            actual.precision
                        };
                        higher_precision(p, q)
                    });
                n += store_precision(program, r, joined);
            }
            Stmt::If(i) => {
                n += fill(program, &mut i.condition);
                n += sweep_block(program, &mut i.then_block);
                n += sweep_block(program, &mut i.else_block);
            }
            Stmt::Loop(l) => n += sweep_block(program, &mut l.body),
            Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => n += fill(program, e),
            Stmt::Declare(_) | Stmt::Break | Stmt::Continue | Stmt::Return(None) | Stmt::Discard(None) => (),
        }
    }
    n
}

/// Gives every global with no precision `highp`.
pub fn default_high_precision(program: &mut Program) -> bool {
    let mut defaulted = 0;
    for &g in &program.globals {
        let var = &mut program.variables[g.0];
        if !var.precision.is_defined() && var.ty.is_precision_applicable() {
            var.precision = Precision::High;
            defaulted += 1;
        }
    }

    if defaulted > 0 {
        tracing::debug!("[DefaultPrecision] {defaulted} globals default to highp");
    }
    defaulted > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{print::print_program, read::read_program};

    #[test]
    fn assignment_defines_destination() {
        let mut p = read_program(
            "(declare (uniform mediump) float u)
             (declare (out) float o)
             (function main (signature void (parameters) (body
               (declare () float t)
               (assign (x) (var_ref t) (expression float * (var_ref u) (var_ref u)))
               (assign (x) (var_ref o) (var_ref t)))))",
        )
        .unwrap();
        assert!(propagate_precision(&mut p));
        let t = p.variables.iter().find(|v| v.name == "t").unwrap();
        assert_eq!(t.precision, Precision::Medium);
        let o = p.variables.iter().find(|v| v.name == "o").unwrap();
        assert_eq!(o.precision, Precision::Medium);
        assert!(print_program(&p).contains("(expression float mediump *"));
        assert!(!propagate_precision(&mut p));
    }

    #[test]
    fn call_result_joins_parameters() {
        let mut p = read_program(
            "(declare (uniform lowp) float a)
             (declare (uniform highp) float b)
             (declare (out) float o)
             (function f (signature float (parameters
                 (declare (param_in) float x)
                 (declare (param_in) float y))
               (body (return (var_ref x)))))
             (function main (signature void (parameters) (body
               (call f (var_ref o) ((var_ref a) (var_ref b))))))",
        )
        .unwrap();
        assert!(propagate_precision(&mut p));
        let o = p.variables.iter().find(|v| v.name == "o").unwrap();
        assert_eq!(o.precision, Precision::High);
    }

    #[test]
    fn booleans_stay_undefined() {
        let mut p = read_program(
            "(declare (uniform highp) float u)
             (declare (out) bool o)
             (function main (signature void (parameters) (body
               (assign (x) (var_ref o) (expression bool < (var_ref u) (constant float (1.0)))))))",
        )
        .unwrap();
        // the float operand picks up highp, the comparison and `o` do not
        assert!(propagate_precision(&mut p));
        let o = p.variables.iter().find(|v| v.name == "o").unwrap();
        assert_eq!(o.precision, Precision::Undefined);
        let text = print_program(&p);
        assert!(text.contains("(expression bool < (var_ref u highp)"));
        assert!(!propagate_precision(&mut p));
    }

    #[test]
    fn globals_default_to_high() {
        let mut p = read_program(
            "(declare (uniform) float u)
             (declare (uniform) bool flag)
             (function main (signature void (parameters) (body)))",
        )
        .unwrap();
        assert!(default_high_precision(&mut p));
        assert_eq!(p.variables[p.globals[0].0].precision, Precision::High);
        assert_eq!(p.variables[p.globals[1].0].precision, Precision::Undefined);
        assert!(!default_high_precision(&mut p));
    }
}
