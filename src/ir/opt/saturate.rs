use crate::ir::{visit, Constant, Expr, Operation, Program};

/// `saturate(x)` becomes `clamp(x, 0.0, 1.0)` for targets without the builtin.
pub fn lower_saturate(program: &mut Program) -> bool {
    let sigs = program.signatures();
    let mut lowered = 0;
    program.for_each_body(|_, _, body| {
        visit::rewrite_exprs(body, &sigs, &mut |e| {
            let Some((Operation::Saturate, [x])) = e.as_operation() else {
                return false;
            };
            let bounds = vec![
                x.clone(),
                Expr::constant(Constant::float(0.0)),
                Expr::constant(Constant::float(1.0)),
            ];
            let Some(mut clamp) = Expr::op(Operation::Clamp, bounds) else {
                return false;
            };
            clamp.precision = e.precision;
            *e = clamp;
            lowered += 1;
            true
        })
    });

    if lowered > 0 {
        tracing::debug!("[LowerSaturate] lowered {lowered} saturates");
    }
    lowered > 0
}
