use std::cmp::Ordering;

use crate::{
    concrete_type::{BaseType, Type},
    ir::{Constant, ConstantData, Expr, ExprKind, Operation, Program, Scalar},
};

/// Evaluates `expr` to a constant, or `None` as soon as any part of it is not
/// known at compile time.
pub fn evaluate(program: &Program, expr: &Expr) -> Option<Constant> {
    match &expr.kind {
        ExprKind::Constant(c) => Some(c.clone()),
        ExprKind::Var(v) => program.var(*v).constant_value.clone(),
        ExprKind::Index { array, index } => {
            let a = evaluate(program, array)?;
            let i = evaluate(program, index)?.as_index()?;
            a.element(usize::try_from(i).ok()?)
        }
        ExprKind::Field { record, field } => evaluate(program, record)?.element(*field),
        ExprKind::Swizzle { value, mask } => {
            let v = evaluate(program, value)?;
            swizzle_constant(&v, mask.as_slice())
        }
        ExprKind::Operation(op, operands) => {
            let xs = operands
                .iter()
                .map(|x| evaluate(program, x))
                .collect::<Option<Vec<_>>>()?;
            evaluate_operation(*op, &expr.ty, &xs)
        }
        ExprKind::Texture(_) => None,
    }
}

pub fn swizzle_constant(value: &Constant, components: &[u8]) -> Option<Constant> {
    let base = value.ty.base_type()?;
    if value.ty.is_matrix() {
        return None;
    }
    let xs = components
        .iter()
        .map(|&c| value.component(c as usize))
        .collect::<Option<Vec<_>>>()?;

    Some(Constant::from_components(Type::vec(base, xs.len() as u8), xs))
}

/// Operand component with scalar broadcast.
#[inline]
fn lane(c: &[Scalar], i: usize) -> Option<Scalar> {
    if c.len() == 1 {
        c.first().copied()
    } else {
        c.get(i).copied()
    }
}

fn map1(ty: &Type, a: &Constant, f: impl Fn(Scalar) -> Option<Scalar>) -> Option<Constant> {
    let a = a.components()?;
    let xs = (0..ty.components())
        .map(|i| f(lane(a, i)?))
        .collect::<Option<Vec<_>>>()?;
    Some(Constant::from_components(ty.clone(), xs))
}

fn map2(
    ty: &Type,
    a: &Constant,
    b: &Constant,
    f: impl Fn(Scalar, Scalar) -> Option<Scalar>,
) -> Option<Constant> {
    let (a, b) = (a.components()?, b.components()?);
    let xs = (0..ty.components())
        .map(|i| f(lane(a, i)?, lane(b, i)?))
        .collect::<Option<Vec<_>>>()?;
    Some(Constant::from_components(ty.clone(), xs))
}

fn map3(
    ty: &Type,
    a: &Constant,
    b: &Constant,
    c: &Constant,
    f: impl Fn(Scalar, Scalar, Scalar) -> Option<Scalar>,
) -> Option<Constant> {
    let (a, b, c) = (a.components()?, b.components()?, c.components()?);
    let xs = (0..ty.components())
        .map(|i| f(lane(a, i)?, lane(b, i)?, lane(c, i)?))
        .collect::<Option<Vec<_>>>()?;
    Some(Constant::from_components(ty.clone(), xs))
}

fn float1(f: impl Fn(f32) -> f32) -> impl Fn(Scalar) -> Option<Scalar> {
    move |x| match x {
        Scalar::Float(x) => Some(Scalar::Float(f(x))),
        _ => None,
    }
}

/// Evaluates one operator over constant operands. `ty` is the result type of
/// the operator node.
pub fn evaluate_operation(op: Operation, ty: &Type, operands: &[Constant]) -> Option<Constant> {
    use Operation as O;

    if !op.accepts_operand_count(operands.len()) {
        return None;
    }

    match op {
        O::BitNot => map1(ty, &operands[0], |x| match x {
            Scalar::Int(x) => Some(Scalar::Int(!x)),
            Scalar::UInt(x) => Some(Scalar::UInt(!x)),
            _ => None,
        }),
        O::LogicNot => map1(ty, &operands[0], |x| match x {
            Scalar::Bool(x) => Some(Scalar::Bool(!x)),
            _ => None,
        }),
        O::Neg => map1(ty, &operands[0], Scalar::try_neg),
        O::Abs => map1(ty, &operands[0], |x| match x {
            Scalar::Int(x) => Some(Scalar::Int(x.wrapping_abs())),
            Scalar::UInt(x) => Some(Scalar::UInt(x)),
            Scalar::Float(x) => Some(Scalar::Float(x.abs())),
            Scalar::Bool(_) => None,
        }),
        O::Sign => map1(ty, &operands[0], |x| match x {
            Scalar::Int(x) => Some(Scalar::Int(x.signum())),
            Scalar::UInt(x) => Some(Scalar::UInt((x > 0) as u32)),
            Scalar::Float(x) => Some(Scalar::Float(if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            })),
            Scalar::Bool(_) => None,
        }),
        O::Rcp => map1(ty, &operands[0], float1(|x| 1.0 / x)),
        O::Rsq => map1(ty, &operands[0], float1(|x| 1.0 / x.sqrt())),
        O::Sqrt => map1(ty, &operands[0], float1(f32::sqrt)),
        O::Exp => map1(ty, &operands[0], float1(f32::exp)),
        O::Log => map1(ty, &operands[0], float1(f32::ln)),
        O::Exp2 => map1(ty, &operands[0], float1(f32::exp2)),
        O::Log2 => map1(ty, &operands[0], float1(f32::log2)),
        O::Trunc => map1(ty, &operands[0], float1(f32::trunc)),
        O::Ceil => map1(ty, &operands[0], float1(f32::ceil)),
        O::Floor => map1(ty, &operands[0], float1(f32::floor)),
        O::Fract => map1(ty, &operands[0], float1(|x| x - x.floor())),
        O::RoundEven => map1(ty, &operands[0], float1(f32::round_ties_even)),
        O::Sin => map1(ty, &operands[0], float1(f32::sin)),
        O::Cos => map1(ty, &operands[0], float1(f32::cos)),
        O::Dfdx | O::Dfdy => map1(ty, &operands[0], float1(|_| 0.0)),
        O::Saturate => map1(ty, &operands[0], float1(|x| x.max(0.0).min(1.0))),
        O::Noise => None,
        O::F2I | O::F2U | O::I2F | O::F2B | O::B2F | O::I2B | O::B2I | O::U2F | O::I2U
        | O::U2I => {
            let to = ty.base_type()?;
            map1(ty, &operands[0], |x| match (op, x) {
                (O::I2U, Scalar::Int(v)) => Some(Scalar::UInt(v as u32)),
                (O::U2I, Scalar::UInt(v)) => Some(Scalar::Int(v as i32)),
                _ => Some(x.convert(to)),
            })
        }
        O::Any => {
            let xs = operands[0].components()?;
            Some(Constant::bool(xs.iter().any(|x| x.as_bool())))
        }

        O::Mul if ty.is_matrix() || operands.iter().any(|o| o.ty.is_matrix()) => {
            if operands[0].ty.is_scalar() || operands[1].ty.is_scalar() {
                map2(ty, &operands[0], &operands[1], Scalar::try_mul)
            } else {
                matrix_product(ty, &operands[0], &operands[1])
            }
        }
        O::Add => map2(ty, &operands[0], &operands[1], Scalar::try_add),
        O::Sub => map2(ty, &operands[0], &operands[1], Scalar::try_sub),
        O::Mul => map2(ty, &operands[0], &operands[1], Scalar::try_mul),
        O::Div => map2(ty, &operands[0], &operands[1], Scalar::try_div),
        O::Mod => map2(ty, &operands[0], &operands[1], Scalar::try_mod),
        O::Min => map2(ty, &operands[0], &operands[1], |a, b| {
            Some(if compare(a, b)? == Ordering::Less { a } else { b })
        }),
        O::Max => map2(ty, &operands[0], &operands[1], |a, b| {
            Some(if compare(a, b)? == Ordering::Greater { a } else { b })
        }),
        O::Pow => map2(ty, &operands[0], &operands[1], |a, b| match (a, b) {
            (Scalar::Float(a), Scalar::Float(b)) => Some(Scalar::Float(a.powf(b))),
            _ => None,
        }),
        O::Less | O::Greater | O::LessEqual | O::GreaterEqual => {
            map2(ty, &operands[0], &operands[1], |a, b| {
                let r = match compare(a, b) {
                    None => false,
                    Some(o) => match op {
                        O::Less => o == Ordering::Less,
                        O::Greater => o == Ordering::Greater,
                        O::LessEqual => o != Ordering::Greater,
                        _ => o != Ordering::Less,
                    },
                };
                Some(Scalar::Bool(r))
            })
        }
        O::Equal => map2(ty, &operands[0], &operands[1], |a, b| {
            Some(Scalar::Bool(numeric_eq(a, b)))
        }),
        O::NotEqual => map2(ty, &operands[0], &operands[1], |a, b| {
            Some(Scalar::Bool(!numeric_eq(a, b)))
        }),
        O::AllEqual => Some(Constant::bool(constants_equal(&operands[0], &operands[1])?)),
        O::AnyNotEqual => Some(Constant::bool(!constants_equal(&operands[0], &operands[1])?)),
        O::LShift | O::RShift => map2(ty, &operands[0], &operands[1], |a, b| {
            let amount = match b {
                Scalar::Int(s) if (0..32).contains(&s) => s as u32,
                Scalar::UInt(s) if s < 32 => s,
                _ => return None,
            };
            match (op, a) {
                (O::LShift, Scalar::Int(a)) => Some(Scalar::Int(a.wrapping_shl(amount))),
                (O::LShift, Scalar::UInt(a)) => Some(Scalar::UInt(a.wrapping_shl(amount))),
                (_, Scalar::Int(a)) => Some(Scalar::Int(a >> amount)),
                (_, Scalar::UInt(a)) => Some(Scalar::UInt(a >> amount)),
                _ => None,
            }
        }),
        O::BitAnd | O::BitXor | O::BitOr => map2(ty, &operands[0], &operands[1], |a, b| {
            let f = |x: u32, y: u32| match op {
                O::BitAnd => x & y,
                O::BitXor => x ^ y,
                _ => x | y,
            };
            match (a, b) {
                (Scalar::Int(x), Scalar::Int(y)) => Some(Scalar::Int(f(x as u32, y as u32) as i32)),
                (Scalar::UInt(x), Scalar::UInt(y)) => Some(Scalar::UInt(f(x, y))),
                _ => None,
            }
        }),
        O::LogicAnd | O::LogicXor | O::LogicOr => {
            map2(ty, &operands[0], &operands[1], |a, b| match (a, b) {
                (Scalar::Bool(x), Scalar::Bool(y)) => Some(Scalar::Bool(match op {
                    O::LogicAnd => x && y,
                    O::LogicXor => x != y,
                    _ => x || y,
                })),
                _ => None,
            })
        }
        O::Dot => {
            let (a, b) = (operands[0].components()?, operands[1].components()?);
            if a.len() != b.len() {
                return None;
            }
            let mut sum = 0.0f32;
            for (x, y) in a.iter().zip(b) {
                sum += x.as_f32() * y.as_f32();
            }
            Some(Constant::float(sum))
        }
        O::VectorExtract => {
            let v = operands[0].components()?;
            if v.is_empty() {
                return None;
            }
            let i = operands[1].as_index()?;
            let i = i.clamp(0, v.len() as i64 - 1) as usize;
            Some(Constant::scalar(*v.get(i)?))
        }

        O::Fma => map3(ty, &operands[0], &operands[1], &operands[2], |a, b, c| {
            Some(Scalar::Float(a.as_f32() * b.as_f32() + c.as_f32()))
        }),
        O::Clamp => map3(ty, &operands[0], &operands[1], &operands[2], |x, lo, hi| {
            let x = if compare(x, lo)? == Ordering::Greater { x } else { lo };
            Some(if compare(x, hi)? == Ordering::Less { x } else { hi })
        }),
        O::Lrp => map3(ty, &operands[0], &operands[1], &operands[2], |x, y, t| {
            let (x, y, t) = (x.as_f32(), y.as_f32(), t.as_f32());
            Some(Scalar::Float(x * (1.0 - t) + y * t))
        }),
        O::Csel => map3(ty, &operands[0], &operands[1], &operands[2], |c, a, b| {
            Some(if c.as_bool() { a } else { b })
        }),
        O::VectorInsert => {
            let mut v = operands[0].components()?.to_vec();
            let x = operands[1].as_scalar()?;
            let i = usize::try_from(operands[2].as_index()?).ok()?;
            *v.get_mut(i)? = x;
            Some(Constant::from_components(ty.clone(), v))
        }
        O::Vector => {
            let xs = operands
                .iter()
                .map(Constant::as_scalar)
                .collect::<Option<Vec<_>>>()?;
            Some(Constant::from_components(ty.clone(), xs))
        }
    }
}

fn matrix_product(ty: &Type, a: &Constant, b: &Constant) -> Option<Constant> {
    let (ca, cb) = (a.components()?, b.components()?);
    // operands as (columns, rows); vectors are a single column (rhs) or row (lhs)
    let (a_cols, a_rows) = match a.ty {
        Type::Matrix { columns, rows } => (columns as usize, rows as usize),
        Type::Vector(_, n) => (n as usize, 1),
        _ => return None,
    };
    let (b_cols, b_rows) = match b.ty {
        Type::Matrix { columns, rows } => (columns as usize, rows as usize),
        Type::Vector(_, n) => (1, n as usize),
        _ => return None,
    };
    if a_cols != b_rows {
        return None;
    }

    let mut out = vec![Scalar::Float(0.0); a_rows * b_cols];
    for c in 0..b_cols {
        for r in 0..a_rows {
            let mut sum = 0.0f32;
            for k in 0..a_cols {
                sum += ca[k * a_rows + r].as_f32() * cb[c * b_rows + k].as_f32();
            }
            out[c * a_rows + r] = Scalar::Float(sum);
        }
    }
    if out.len() != ty.components() {
        return None;
    }

    Some(Constant::from_components(ty.clone(), out))
}

/// Ordering between two scalars of the same base type; `None` for unordered
/// floats and for bools.
fn compare(a: Scalar, b: Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(&b)),
        (Scalar::UInt(a), Scalar::UInt(b)) => Some(a.cmp(&b)),
        (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(&b),
        _ => None,
    }
}

fn numeric_eq(a: Scalar, b: Scalar) -> bool {
    match (a, b) {
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        (Scalar::Float(a), Scalar::Float(b)) => a == b,
        _ => compare(a, b) == Some(Ordering::Equal),
    }
}

/// Deep equality with float semantics (`NaN != NaN`).
fn constants_equal(a: &Constant, b: &Constant) -> Option<bool> {
    match (&a.data, &b.data) {
        (ConstantData::Components(x), ConstantData::Components(y)) => {
            (x.len() == y.len()).then(|| x.iter().zip(y).all(|(&p, &q)| numeric_eq(p, q)))
        }
        (ConstantData::Aggregate(x), ConstantData::Aggregate(y)) => {
            if x.len() != y.len() {
                return None;
            }
            let mut all = true;
            for (p, q) in x.iter().zip(y) {
                all &= constants_equal(p, q)?;
            }
            Some(all)
        }
        _ => None,
    }
}

impl Scalar {
    pub fn try_neg(self) -> Option<Self> {
        match self {
            Self::Int(x) => Some(Self::Int(x.wrapping_neg())),
            Self::UInt(x) => Some(Self::UInt(x.wrapping_neg())),
            Self::Float(x) => Some(Self::Float(-x)),
            Self::Bool(_) => None,
        }
    }

    pub fn try_add(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_add(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_add(b))),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + b)),
            _ => None,
        }
    }

    pub fn try_sub(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_sub(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_sub(b))),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a - b)),
            _ => None,
        }
    }

    pub fn try_mul(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_mul(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_mul(b))),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a * b)),
            _ => None,
        }
    }

    /// Integer division by zero is undefined and is left unfolded.
    pub fn try_div(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(_), Self::Int(0)) | (Self::UInt(_), Self::UInt(0)) => None,
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_div(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a / b)),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a / b)),
            _ => None,
        }
    }

    /// GLSL `mod`: `a - b * floor(a / b)` for floats, remainder for integers.
    pub fn try_mod(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(_), Self::Int(0)) | (Self::UInt(_), Self::UInt(0)) => None,
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_rem(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a % b)),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a - b * (a / b).floor())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(op: Operation, operands: &[Constant]) -> Option<Constant> {
        let tys = operands.iter().map(|c| &c.ty).collect::<Vec<_>>();
        let ty = op.result_type(&tys)?;
        evaluate_operation(op, &ty, operands)
    }

    fn vec(xs: &[f32]) -> Constant {
        Constant::from_components(
            Type::vec(BaseType::Float, xs.len() as u8),
            xs.iter().copied().map(Scalar::Float).collect(),
        )
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            fold(Operation::Add, &[Constant::int(i32::MAX), Constant::int(1)]),
            Some(Constant::int(i32::MIN))
        );
        assert_eq!(
            fold(Operation::Sub, &[Constant::uint(0), Constant::uint(1)]),
            Some(Constant::uint(u32::MAX))
        );
        assert_eq!(
            fold(Operation::Mul, &[Constant::int(0x10000), Constant::int(0x10000)]),
            Some(Constant::int(0))
        );
        assert_eq!(fold(Operation::Div, &[Constant::int(1), Constant::int(0)]), None);
    }

    #[test]
    fn float_follows_ieee() {
        let inf = fold(Operation::Div, &[Constant::float(1.0), Constant::float(0.0)]).unwrap();
        assert_eq!(inf, Constant::float(f32::INFINITY));
        let nan = fold(Operation::Sub, &[inf.clone(), inf]).unwrap();
        assert!(nan.component(0).unwrap().as_f32().is_nan());
        assert_eq!(
            fold(Operation::Equal, &[nan.clone(), nan]),
            Some(Constant::bool(false))
        );
    }

    #[test]
    fn matches_native_arithmetic_bit_for_bit() {
        let samples = [
            0.0f32, -0.0, 1.0, -1.5, 3.25, 1e-7, 7.0e12, -123.456, f32::MAX, f32::MIN_POSITIVE,
        ];
        for &a in &samples {
            for &b in &samples {
                let ops: [(Operation, fn(f32, f32) -> f32); 4] = [
                    (Operation::Add, |a, b| a + b),
                    (Operation::Sub, |a, b| a - b),
                    (Operation::Mul, |a, b| a * b),
                    (Operation::Div, |a, b| a / b),
                ];
                for (op, reference) in ops {
                    let got = fold(op, &[Constant::float(a), Constant::float(b)]).unwrap();
                    assert_eq!(
                        got.component(0).unwrap().as_f32().to_bits(),
                        reference(a, b).to_bits(),
                        "{op:?} {a} {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn broadcasts_scalar_operands() {
        assert_eq!(
            fold(Operation::Mul, &[vec(&[1.0, 2.0, 3.0]), Constant::float(2.0)]),
            Some(vec(&[2.0, 4.0, 6.0]))
        );
        assert_eq!(
            fold(Operation::Dot, &[vec(&[1.0, 2.0]), vec(&[3.0, 4.0])]),
            Some(Constant::float(11.0))
        );
    }

    #[test]
    fn matrix_times_vector() {
        // columns (1,2) and (3,4)
        let m = Constant::from_components(
            Type::mat(2, 2),
            [1.0, 2.0, 3.0, 4.0].map(Scalar::Float).to_vec(),
        );
        assert_eq!(
            fold(Operation::Mul, &[m.clone(), vec(&[1.0, 1.0])]),
            Some(vec(&[4.0, 6.0]))
        );
        assert_eq!(fold(Operation::Mul, &[vec(&[1.0, 1.0]), m]), Some(vec(&[3.0, 7.0])));
    }

    #[test]
    fn logic_and_select() {
        assert_eq!(
            fold(Operation::LogicXor, &[Constant::bool(true), Constant::bool(true)]),
            Some(Constant::bool(false))
        );
        assert_eq!(
            fold(
                Operation::Csel,
                &[Constant::bool(false), Constant::float(1.0), Constant::float(2.0)]
            ),
            Some(Constant::float(2.0))
        );
        assert_eq!(
            fold(
                Operation::Clamp,
                &[Constant::float(7.0), Constant::float(0.0), Constant::float(1.0)]
            ),
            Some(Constant::float(1.0))
        );
    }

    #[test]
    fn shifts_reject_out_of_range_amounts() {
        assert_eq!(
            fold(Operation::LShift, &[Constant::int(1), Constant::int(4)]),
            Some(Constant::int(16))
        );
        assert_eq!(
            fold(Operation::RShift, &[Constant::int(-16), Constant::int(2)]),
            Some(Constant::int(-4))
        );
        assert_eq!(fold(Operation::LShift, &[Constant::int(1), Constant::int(32)]), None);
    }

    #[test]
    fn vector_extract_clamps() {
        assert_eq!(
            fold(Operation::VectorExtract, &[vec(&[1.0, 2.0, 3.0]), Constant::int(9)]),
            Some(Constant::float(3.0))
        );
    }
}
