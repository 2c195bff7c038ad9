use std::collections::HashSet;

use crate::{
    concrete_type::Type,
    error::ValidationError,
    ir::{Expr, ExprKind, Function, LoopId, Program, Stmt, VarId},
    utils::BoolToErrorHelper,
};

/// Structural and type checks over the whole program.
pub fn validate(program: &Program) -> Result<(), ValidationError> {
    let mut loops = HashSet::new();
    for f in program.functions.iter().flatten() {
        let Some(body) = &f.body else {
            continue;
        };

        let mut v = Validator {
            program,
            function: f,
            scopes: vec![program
                .globals
                .iter()
                .chain(f.params.iter())
                .copied()
                .collect()],
            declared: HashSet::new(),
            loops: &mut loops,
            loop_depth: 0,
        };
        for &p in &f.params {
            v.check_handle(p)?;
        }
        v.block(body)?;
    }

    Ok(())
}

struct Validator<'p> {
    program: &'p Program,
    function: &'p Function,
    scopes: Vec<HashSet<VarId>>,
    declared: HashSet<VarId>,
    loops: &'p mut HashSet<LoopId>,
    loop_depth: usize,
}
impl Validator<'_> {
    fn fname(&self) -> String {
        self.function.name.clone()
    }

    fn type_name(&self, ty: &Type) -> String {
        super::print::type_name(self.program, ty)
    }

    fn check_handle(&self, v: VarId) -> Result<(), ValidationError> {
        (v.0 < self.program.variables.len()).or_err(|| ValidationError::DanglingVariable {
            function: self.fname(),
            var: v,
        })
    }

    fn check_visible(&self, v: VarId) -> Result<(), ValidationError> {
        self.check_handle(v)?;
        self.scopes
            .iter()
            .any(|s| s.contains(&v))
            .or_err(|| ValidationError::Undeclared {
                function: self.fname(),
                name: self.program.var(v).name.clone(),
            })
    }

    fn expect_type(&self, expected: &Type, got: &Type) -> Result<(), ValidationError> {
        (expected == got).or_err(|| ValidationError::TypeMismatch {
            function: self.fname(),
            expected: self.type_name(expected),
            got: self.type_name(got),
        })
    }

    fn block(&mut self, block: &[Stmt]) -> Result<(), ValidationError> {
        self.scopes.push(HashSet::new());
        for s in block {
            self.stmt(s)?;
        }
        self.scopes.pop();

        Ok(())
    }

    fn stmt(&mut self, s: &Stmt) -> Result<(), ValidationError> {
        match s {
            Stmt::Declare(v) => {
                self.check_handle(*v)?;
                self.declared
                    .insert(*v)
                    .or_err(|| ValidationError::Redeclared {
                        function: self.fname(),
                        name: self.program.var(*v).name.clone(),
                    })?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(*v);
                }
            }
            Stmt::Assign(a) => {
                self.expr(&a.lhs)?;
                self.expr(&a.rhs)?;
                if let Some(c) = &a.condition {
                    self.expr(c)?;
                    self.expect_type(&Type::BOOL, &c.ty)?;
                }
                a.lhs.is_dereference().or_err(|| ValidationError::NotAnLvalue {
                    function: self.fname(),
                })?;

                let (lhs, rhs) = (&a.lhs.ty, &a.rhs.ty);
                let fits = match lhs {
                    Type::Vector(b, n) => {
                        a.write_mask != 0
                            && a.write_mask >> n == 0
                            && rhs.base_type() == Some(*b)
                            && (rhs.is_scalar() || rhs.is_vector())
                            && rhs.vector_elements() as u32 == a.write_mask.count_ones()
                    }
                    Type::Scalar(_) => a.write_mask == 1 && lhs == rhs,
                    _ => a.write_mask == 0 && lhs == rhs,
                };
                fits.or_err(|| ValidationError::WriteMask {
                    function: self.fname(),
                    mask: a.write_mask,
                    lhs: self.type_name(lhs),
                    rhs: self.type_name(rhs),
                })?;
            }
            Stmt::Call(c) => {
                let callee = self.program.function(c.callee).ok_or_else(|| {
                    ValidationError::DanglingFunction {
                        function: self.fname(),
                        callee: c.callee,
                    }
                })?;
                (callee.params.len() == c.args.len()).or_err(|| ValidationError::ArgumentCount {
                    function: self.fname(),
                    callee: callee.name.clone(),
                    expected: callee.params.len(),
                    got: c.args.len(),
                })?;
                for (&p, a) in callee.params.iter().zip(&c.args) {
                    self.expr(a)?;
                    self.expect_type(&self.program.var(p).ty, &a.ty)?;
                }
                if let Some(r) = &c.return_deref {
                    self.expr(r)?;
                    self.expect_type(&callee.return_type, &r.ty)?;
                }
            }
            Stmt::If(i) => {
                self.expr(&i.condition)?;
                self.expect_type(&Type::BOOL, &i.condition.ty)?;
                self.block(&i.then_block)?;
                self.block(&i.else_block)?;
            }
            Stmt::Loop(l) => {
                self.loops
                    .insert(l.id)
                    .or_err(|| ValidationError::DuplicateLoop {
                        function: self.fname(),
                        id: l.id,
                    })?;
                if let Some(c) = &l.controls {
                    self.check_visible(c.counter)?;
                }
                self.loop_depth += 1;
                self.block(&l.body)?;
                self.loop_depth -= 1;
            }
            Stmt::Break | Stmt::Continue => {
                (self.loop_depth > 0).or_err(|| ValidationError::JumpOutsideLoop {
                    function: self.fname(),
                    jump: if matches!(s, Stmt::Break) {
                        "break"
                    } else {
                        "continue"
                    },
                })?;
            }
            Stmt::Return(v) => {
                let got = v.as_ref().map_or(Type::Void, |e| e.ty.clone());
                if let Some(e) = v {
                    self.expr(e)?;
                }
                self.expect_type(&self.function.return_type, &got)?;
            }
            Stmt::Discard(c) => {
                if let Some(c) = c {
                    self.expr(c)?;
                    self.expect_type(&Type::BOOL, &c.ty)?;
                }
            }
        }

        Ok(())
    }

    fn expr(&self, e: &Expr) -> Result<(), ValidationError> {
        let mut children = Ok(());
        e.for_each_child(|c| {
            if children.is_ok() {
                children = self.expr(c);
            }
        });
        children?;

        match &e.kind {
            ExprKind::Var(v) => {
                self.check_visible(*v)?;
                self.expect_type(&self.program.var(*v).ty, &e.ty)
            }
            ExprKind::Constant(c) => self.expect_type(&c.ty, &e.ty),
            ExprKind::Index { array, index } => {
                (index.ty.is_integer() && index.ty.is_scalar()).or_err(|| {
                    ValidationError::TypeMismatch {
                        function: self.fname(),
                        expected: String::from("int"),
                        got: self.type_name(&index.ty),
                    }
                })?;
                match array.ty.index_result() {
                    Some(t) => self.expect_type(&t, &e.ty),
                    None => Err(ValidationError::TypeMismatch {
                        function: self.fname(),
                        expected: String::from("an array, matrix or vector"),
                        got: self.type_name(&array.ty),
                    }),
                }
            }
            ExprKind::Field { record, field } => {
                let f = match &record.ty {
                    Type::Struct(s) => self.program.structs.get(s.0).and_then(|d| d.fields.get(*field)),
                    _ => None,
                };
                match f {
                    Some(f) => self.expect_type(&f.ty, &e.ty),
                    None => Err(ValidationError::TypeMismatch {
                        function: self.fname(),
                        expected: format!("a struct with field #{field}"),
                        got: self.type_name(&record.ty),
                    }),
                }
            }
            ExprKind::Swizzle { value, mask } => {
                let expected = Expr::swizzle((**value).clone(), *mask).map(|x| x.ty);
                match expected {
                    Some(t) => self.expect_type(&t, &e.ty),
                    None => Err(ValidationError::TypeMismatch {
                        function: self.fname(),
                        expected: format!("a vector with components {mask:?}"),
                        got: self.type_name(&value.ty),
                    }),
                }
            }
            ExprKind::Operation(op, operands) => {
                op.accepts_operand_count(operands.len())
                    .or_err(|| ValidationError::OperandCount {
                        function: self.fname(),
                        op: op.name(),
                        expected: op.arity(),
                        got: operands.len(),
                    })?;
                let tys = operands.iter().map(|o| &o.ty).collect::<Vec<_>>();
                match op.result_type(&tys) {
                    Some(t) => self.expect_type(&t, &e.ty),
                    None => Err(ValidationError::OperandTypes {
                        function: self.fname(),
                        op: op.name(),
                        operands: tys
                            .iter()
                            .map(|t| self.type_name(t))
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
            ExprKind::Texture(t) => {
                t.sampler.ty.is_sampler().or_err(|| ValidationError::TypeMismatch {
                    function: self.fname(),
                    expected: String::from("a sampler"),
                    got: self.type_name(&t.sampler.ty),
                })?;
                (t.kind.takes_lod() == t.lod.is_some()).or_err(|| ValidationError::OperandCount {
                    function: self.fname(),
                    op: t.kind.name(),
                    expected: 2 + t.kind.takes_lod() as usize,
                    got: 2 + t.lod.is_some() as usize,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::read::read_program;

    fn check(src: &str) -> Result<(), ValidationError> {
        validate(&read_program(src).unwrap())
    }

    #[test]
    fn accepts_well_formed_program() {
        check(
            "(declare (uniform) vec4 u)
             (function main (signature void (parameters) (body
               (declare () vec4 v)
               (assign (xy) (var_ref v) (swiz zw (var_ref u)))
               (loop ((if (expression bool < (swiz x (var_ref v)) (constant float (0.0))) ((break)) ()))))))",
        )
        .unwrap();
    }

    #[test]
    fn rejects_bad_writemask() {
        let err = check(
            "(function main (signature void (parameters) (body
               (declare () vec4 v)
               (assign (xyz) (var_ref v) (constant vec2 (1.0 2.0))))))",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::WriteMask { mask: 0b0111, .. }));
    }

    #[test]
    fn rejects_ill_typed_operation() {
        let err = check(
            "(function main (signature void (parameters) (body
               (declare () float f)
               (assign (x) (var_ref f) (expression float + (constant int (1)) (constant float (1.0)))))))",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::OperandTypes { op: "+", .. }));
    }

    #[test]
    fn rejects_break_outside_loop_and_use_before_declaration() {
        assert!(matches!(
            check("(function main (signature void (parameters) (body (break))))"),
            Err(ValidationError::JumpOutsideLoop { jump: "break", .. })
        ));
        assert!(matches!(
            check(
                "(function main (signature void (parameters) (body
                   (if (constant bool (true)) ((declare () float x)) ())
                   (declare () float y)
                   (assign (x) (var_ref y) (constant float (1.0))))))"
            ),
            Ok(())
        ));
    }
}
