use crate::{
    concrete_type::{BaseType, Type},
    ir::{Constant, VarId},
    precision::{higher_precision, Precision},
    utils::{swizzle_char, swizzle_indices},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    BitNot,
    LogicNot,
    Neg,
    Abs,
    Sign,
    Rcp,
    Rsq,
    Sqrt,
    Exp,
    Log,
    Exp2,
    Log2,
    F2I,
    F2U,
    I2F,
    F2B,
    B2F,
    I2B,
    B2I,
    U2F,
    I2U,
    U2I,
    Any,
    Trunc,
    Ceil,
    Floor,
    Fract,
    RoundEven,
    Sin,
    Cos,
    Dfdx,
    Dfdy,
    Saturate,
    Noise,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    AllEqual,
    AnyNotEqual,
    LShift,
    RShift,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicXor,
    LogicOr,
    Dot,
    Min,
    Max,
    Pow,
    VectorExtract,

    Fma,
    Clamp,
    Lrp,
    Csel,
    VectorInsert,

    /// Builds a vector from 2 to 4 scalars.
    Vector,
}
impl Operation {
    pub const ALL: [Operation; 66] = {
        use Operation::*;
        [
            BitNot, LogicNot, Neg, Abs, Sign, Rcp, Rsq, Sqrt, Exp, Log, Exp2, Log2, F2I, F2U, I2F,
            F2B, B2F, I2B, B2I, U2F, I2U, U2I, Any, Trunc, Ceil, Floor, Fract, RoundEven, Sin, Cos,
            Dfdx, Dfdy, Saturate, Noise, Add, Sub, Mul, Div, Mod, Less, Greater, LessEqual,
            GreaterEqual, Equal, NotEqual, AllEqual, AnyNotEqual, LShift, RShift, BitAnd, BitXor,
            BitOr, LogicAnd, LogicXor, LogicOr, Dot, Min, Max, Pow, VectorExtract, Fma, Clamp, Lrp,
            Csel, VectorInsert, Vector,
        ]
    };

    pub const fn name(self) -> &'static str {
        match self {
            Self::BitNot => "~",
            Self::LogicNot => "!",
            Self::Neg => "neg",
            Self::Abs => "abs",
            Self::Sign => "sign",
            Self::Rcp => "rcp",
            Self::Rsq => "rsq",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Exp2 => "exp2",
            Self::Log2 => "log2",
            Self::F2I => "f2i",
            Self::F2U => "f2u",
            Self::I2F => "i2f",
            Self::F2B => "f2b",
            Self::B2F => "b2f",
            Self::I2B => "i2b",
            Self::B2I => "b2i",
            Self::U2F => "u2f",
            Self::I2U => "i2u",
            Self::U2I => "u2i",
            Self::Any => "any",
            Self::Trunc => "trunc",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Fract => "fract",
            Self::RoundEven => "round_even",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Dfdx => "dFdx",
            Self::Dfdy => "dFdy",
            Self::Saturate => "saturate",
            Self::Noise => "noise",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::AllEqual => "all_equal",
            Self::AnyNotEqual => "any_nequal",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::LogicAnd => "&&",
            Self::LogicXor => "^^",
            Self::LogicOr => "||",
            Self::Dot => "dot",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pow => "pow",
            Self::VectorExtract => "vector_extract",
            Self::Fma => "fma",
            Self::Clamp => "clamp",
            Self::Lrp => "lrp",
            Self::Csel => "csel",
            Self::VectorInsert => "vector_insert",
            Self::Vector => "vector",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }

    pub fn accepts_operand_count(self, n: usize) -> bool {
        match self {
            Self::Vector => (2..=4).contains(&n),
            _ => self.arity() == n,
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            Self::BitNot
            | Self::LogicNot
            | Self::Neg
            | Self::Abs
            | Self::Sign
            | Self::Rcp
            | Self::Rsq
            | Self::Sqrt
            | Self::Exp
            | Self::Log
            | Self::Exp2
            | Self::Log2
            | Self::F2I
            | Self::F2U
            | Self::I2F
            | Self::F2B
            | Self::B2F
            | Self::I2B
            | Self::B2I
            | Self::U2F
            | Self::I2U
            | Self::U2I
            | Self::Any
            | Self::Trunc
            | Self::Ceil
            | Self::Floor
            | Self::Fract
            | Self::RoundEven
            | Self::Sin
            | Self::Cos
            | Self::Dfdx
            | Self::Dfdy
            | Self::Saturate
            | Self::Noise => 1,
            Self::Fma | Self::Clamp | Self::Lrp | Self::Csel | Self::VectorInsert => 3,
            Self::Vector => 4,
            _ => 2,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Greater
                | Self::LessEqual
                | Self::GreaterEqual
                | Self::Equal
                | Self::NotEqual
                | Self::AllEqual
                | Self::AnyNotEqual
        )
    }

    /// `a op b == b op a` (for `Mul`, only when neither side is a matrix)
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::Equal
                | Self::NotEqual
                | Self::AllEqual
                | Self::AnyNotEqual
                | Self::BitAnd
                | Self::BitXor
                | Self::BitOr
                | Self::LogicAnd
                | Self::LogicXor
                | Self::LogicOr
                | Self::Min
                | Self::Max
                | Self::Dot
        )
    }

    /// `(a op b) op c == a op (b op c)` over exact arithmetic (same matrix caveat).
    pub const fn is_associative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::BitAnd
                | Self::BitXor
                | Self::BitOr
                | Self::LogicAnd
                | Self::LogicXor
                | Self::LogicOr
                | Self::Min
                | Self::Max
        )
    }

    /// Result differs between two evaluations with the same operands.
    pub const fn is_nondeterministic(self) -> bool {
        matches!(self, Self::Noise)
    }

    /// Depends on neighbouring fragments: cannot be moved across control flow.
    pub const fn is_derivative(self) -> bool {
        matches!(self, Self::Dfdx | Self::Dfdy)
    }

    /// `!(a op b) == (a op' b)` for the ordered comparisons.
    pub const fn negated_comparison(self) -> Option<Self> {
        match self {
            Self::Less => Some(Self::GreaterEqual),
            Self::GreaterEqual => Some(Self::Less),
            Self::Greater => Some(Self::LessEqual),
            Self::LessEqual => Some(Self::Greater),
            Self::Equal => Some(Self::NotEqual),
            Self::NotEqual => Some(Self::Equal),
            Self::AllEqual => Some(Self::AnyNotEqual),
            Self::AnyNotEqual => Some(Self::AllEqual),
            _ => None,
        }
    }

    /// `(a op b) == (b op' a)`
    pub const fn swapped_comparison(self) -> Option<Self> {
        match self {
            Self::Less => Some(Self::Greater),
            Self::Greater => Some(Self::Less),
            Self::LessEqual => Some(Self::GreaterEqual),
            Self::GreaterEqual => Some(Self::LessEqual),
            Self::Equal | Self::NotEqual | Self::AllEqual | Self::AnyNotEqual => Some(self),
            _ => None,
        }
    }

    /// Result type for the given operand types, or `None` when the operator
    /// does not accept them.
    pub fn result_type(self, operands: &[&Type]) -> Option<Type> {
        if !self.accepts_operand_count(operands.len()) {
            return None;
        }

        let base = |t: &Type| t.base_type();
        match self {
            Self::BitNot => operands[0].is_integer().then(|| operands[0].clone()),
            Self::LogicNot => operands[0].is_boolean().then(|| operands[0].clone()),
            Self::Neg | Self::Abs | Self::Sign => {
                (base(operands[0])?.is_numeric()).then(|| operands[0].clone())
            }
            Self::Rcp
            | Self::Rsq
            | Self::Sqrt
            | Self::Exp
            | Self::Log
            | Self::Exp2
            | Self::Log2
            | Self::Trunc
            | Self::Ceil
            | Self::Floor
            | Self::Fract
            | Self::RoundEven
            | Self::Sin
            | Self::Cos
            | Self::Dfdx
            | Self::Dfdy
            | Self::Saturate => operands[0].is_float().then(|| operands[0].clone()),
            Self::Noise => operands[0].is_float().then_some(Type::FLOAT),
            Self::F2I | Self::F2U | Self::F2B => {
                let to = match self {
                    Self::F2I => BaseType::Int,
                    Self::F2U => BaseType::UInt,
                    _ => BaseType::Bool,
                };
                conversion(operands[0], BaseType::Float, to)
            }
            Self::I2F => conversion(operands[0], BaseType::Int, BaseType::Float),
            Self::U2F => conversion(operands[0], BaseType::UInt, BaseType::Float),
            Self::B2F => conversion(operands[0], BaseType::Bool, BaseType::Float),
            Self::B2I => conversion(operands[0], BaseType::Bool, BaseType::Int),
            Self::I2U => conversion(operands[0], BaseType::Int, BaseType::UInt),
            Self::U2I => conversion(operands[0], BaseType::UInt, BaseType::Int),
            Self::I2B => {
                (operands[0].is_integer() && !operands[0].is_matrix())
                    .then(|| operands[0].with_base_type(BaseType::Bool))
            }
            Self::Any => {
                (operands[0].is_vector() && operands[0].is_boolean()).then_some(Type::BOOL)
            }
            Self::Mul => match (operands[0], operands[1]) {
                (Type::Matrix { columns: c1, rows: r1 }, Type::Matrix { columns: c2, rows: r2 }) => {
                    (c1 == r2).then_some(Type::mat(*c2, *r1))
                }
                (Type::Matrix { columns, rows }, Type::Vector(BaseType::Float, n)) => {
                    (columns == n).then_some(Type::vec(BaseType::Float, *rows))
                }
                (Type::Vector(BaseType::Float, n), Type::Matrix { columns, rows }) => {
                    (rows == n).then_some(Type::vec(BaseType::Float, *columns))
                }
                (a, b) => broadcast(a, b).filter(|t| t.base_type().is_some_and(BaseType::is_numeric)),
            },
            Self::Add | Self::Sub | Self::Div | Self::Mod | Self::Min | Self::Max | Self::Pow => {
                broadcast(operands[0], operands[1])
                    .filter(|t| t.base_type().is_some_and(BaseType::is_numeric))
            }
            Self::BitAnd | Self::BitXor | Self::BitOr => {
                broadcast(operands[0], operands[1]).filter(Type::is_integer)
            }
            Self::LShift | Self::RShift => {
                let (a, b) = (operands[0], operands[1]);
                (a.is_integer()
                    && b.is_integer()
                    && !a.is_matrix()
                    && (b.is_scalar() || a.vector_elements() == b.vector_elements()))
                .then(|| a.clone())
            }
            Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual => {
                let (a, b) = (operands[0], operands[1]);
                (a == b && (a.is_scalar() || a.is_vector()) && base(a)?.is_numeric())
                    .then(|| a.with_base_type(BaseType::Bool))
            }
            Self::Equal | Self::NotEqual => {
                let (a, b) = (operands[0], operands[1]);
                (a == b && (a.is_scalar() || a.is_vector()))
                    .then(|| a.with_base_type(BaseType::Bool))
            }
            Self::AllEqual | Self::AnyNotEqual => {
                (operands[0] == operands[1] && !operands[0].is_sampler()).then_some(Type::BOOL)
            }
            Self::LogicAnd | Self::LogicXor | Self::LogicOr => {
                (operands[0] == operands[1] && operands[0].is_boolean() && operands[0].is_scalar())
                    .then_some(Type::BOOL)
            }
            Self::Dot => (operands[0] == operands[1]
                && operands[0].is_float()
                && !operands[0].is_matrix())
            .then_some(Type::FLOAT),
            Self::VectorExtract => (operands[0].is_vector()
                && operands[1].is_integer()
                && operands[1].is_scalar())
            .then(|| operands[0].scalar_type())
            .flatten(),
            Self::Fma => (operands[0] == operands[1]
                && operands[1] == operands[2]
                && operands[0].is_float())
            .then(|| operands[0].clone()),
            Self::Clamp => {
                let t = operands[0];
                let fits = |o: &Type| o == t || (o.is_scalar() && o.base_type() == t.base_type());
                (base(t)?.is_numeric() && fits(operands[1]) && fits(operands[2])).then(|| t.clone())
            }
            Self::Lrp => {
                let t = operands[0];
                (t.is_float()
                    && operands[1] == t
                    && (operands[2] == t || *operands[2] == Type::FLOAT))
                    .then(|| t.clone())
            }
            Self::Csel => {
                let (c, t) = (operands[0], operands[1]);
                (c.is_boolean()
                    && operands[2] == t
                    && (c.is_scalar() || c.vector_elements() == t.vector_elements()))
                .then(|| t.clone())
            }
            Self::VectorInsert => {
                let t = operands[0];
                (t.is_vector()
                    && Some(operands[1].clone()) == t.scalar_type()
                    && operands[2].is_integer()
                    && operands[2].is_scalar())
                .then(|| t.clone())
            }
            Self::Vector => {
                let b = base(operands[0])?;
                operands
                    .iter()
                    .all(|o| o.is_scalar() && o.base_type() == Some(b))
                    .then(|| Type::vec(b, operands.len() as u8))
            }
        }
    }
}

fn conversion(t: &Type, from: BaseType, to: BaseType) -> Option<Type> {
    (t.base_type() == Some(from) && !t.is_matrix()).then(|| t.with_base_type(to))
}

/// Component-wise binary operand rule: equal types, or a scalar mixed with a
/// vector/matrix of the same base.
fn broadcast(a: &Type, b: &Type) -> Option<Type> {
    if a.base_type().is_none() || a.base_type() != b.base_type() {
        return None;
    }

    if a == b {
        Some(a.clone())
    } else if a.is_scalar() {
        Some(b.clone())
    } else if b.is_scalar() {
        Some(a.clone())
    } else {
        None
    }
}

/// Component selection of 1 to 4 components out of a source vector.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    components: [u8; 4],
    len: u8,
}
impl Swizzle {
    pub fn new(components: &[u8]) -> Option<Self> {
        if components.is_empty() || components.len() > 4 || components.iter().any(|&c| c > 3) {
            return None;
        }
        let mut xs = [0; 4];
        xs[..components.len()].copy_from_slice(components);

        Some(Self {
            components: xs,
            len: components.len() as u8,
        })
    }

    /// `.x`, `.xy`, ... selecting the first `n` components in order.
    pub fn identity(n: u8) -> Self {
        Self {
            components: [0, 1, 2, 3],
            len: n.clamp(1, 4),
        }
    }

    /// Parses a mask like `xzy`/`rgba` against a source with `source_components`.
    pub fn parse(mask: &str, source_components: u8) -> Option<Self> {
        let indices = swizzle_indices(mask, source_components)?;
        let mut xs = Vec::with_capacity(4);
        for i in indices.into_iter().take(mask.len()) {
            xs.push(i? as u8);
        }

        Self::new(&xs)
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.components[..self.len as usize]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Selects every component of a `source_components`-wide value in order.
    pub fn is_identity_for(&self, source_components: u8) -> bool {
        self.len == source_components && self.as_slice().iter().enumerate().all(|(n, &c)| n == c as usize)
    }

    /// Swizzle equivalent to applying `inner` first and then `self`.
    pub fn after(self, inner: Swizzle) -> Option<Self> {
        let xs = self
            .as_slice()
            .iter()
            .map(|&c| inner.as_slice().get(c as usize).copied())
            .collect::<Option<Vec<_>>>()?;

        Self::new(&xs)
    }

    pub fn mask_string(&self) -> String {
        self.as_slice().iter().map(|&c| swizzle_char(c)).collect()
    }
}
impl core::fmt::Debug for Swizzle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, ".{}", self.mask_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Tex,
    /// with lod bias
    Txb,
    /// explicit lod
    Txl,
    /// texel fetch
    Txf,
}
impl TextureKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tex => "tex",
            Self::Txb => "txb",
            Self::Txl => "txl",
            Self::Txf => "txf",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "tex" => Some(Self::Tex),
            "txb" => Some(Self::Txb),
            "txl" => Some(Self::Txl),
            "txf" => Some(Self::Txf),
            _ => None,
        }
    }

    pub const fn takes_lod(self) -> bool {
        !matches!(self, Self::Tex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureOp {
    pub kind: TextureKind,
    pub sampler: Expr,
    pub coordinate: Expr,
    /// bias for `Txb`, level for `Txl`/`Txf`
    pub lod: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Var(VarId),
    Index { array: Box<Expr>, index: Box<Expr> },
    Field { record: Box<Expr>, field: usize },
    Constant(Constant),
    Swizzle { value: Box<Expr>, mask: Swizzle },
    Operation(Operation, Vec<Expr>),
    Texture(Box<TextureOp>),
}

/// Typed value tree. Equality is structural and includes precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub precision: Precision,
}
impl Expr {
    pub fn constant(c: Constant) -> Self {
        Self {
            ty: c.ty.clone(),
            kind: ExprKind::Constant(c),
            precision: Precision::Undefined,
        }
    }

    /// Typed operator node. Precision is the join of the operands'.
    pub fn op(op: Operation, operands: Vec<Expr>) -> Option<Self> {
        let ty = op.result_type(&operands.iter().map(|o| &o.ty).collect::<Vec<_>>())?;
        let precision = operands
            .iter()
            .fold(Precision::Undefined, |p, o| higher_precision(p, o.precision));

        Some(Self {
            kind: ExprKind::Operation(op, operands),
            ty,
            precision,
        })
    }

    pub fn swizzle(value: Expr, mask: Swizzle) -> Option<Self> {
        let b = value.ty.base_type()?;
        if value.ty.is_matrix()
            || mask
                .as_slice()
                .iter()
                .any(|&c| c >= value.ty.vector_elements())
        {
            return None;
        }

        Some(Self {
            ty: Type::vec(b, mask.len() as u8),
            precision: value.precision,
            kind: ExprKind::Swizzle {
                value: Box::new(value),
                mask,
            },
        })
    }

    pub fn index(array: Expr, index: Expr) -> Option<Self> {
        let ty = array.ty.index_result()?;
        Some(Self {
            ty,
            precision: array.precision,
            kind: ExprKind::Index {
                array: Box::new(array),
                index: Box::new(index),
            },
        })
    }

    pub fn field(record: Expr, field: usize, ty: Type, precision: Precision) -> Self {
        Self {
            ty,
            precision,
            kind: ExprKind::Field {
                record: Box::new(record),
                field,
            },
        }
    }

    #[inline]
    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(_))
    }

    #[inline]
    pub fn as_operation(&self) -> Option<(Operation, &[Expr])> {
        match &self.kind {
            ExprKind::Operation(op, xs) => Some((*op, xs)),
            _ => None,
        }
    }

    /// Variable of a whole-variable dereference.
    #[inline]
    pub fn whole_variable_referenced(&self) -> Option<VarId> {
        match self.kind {
            ExprKind::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Root variable of a dereference chain (`a[i].f` -> `a`).
    pub fn variable_referenced(&self) -> Option<VarId> {
        match &self.kind {
            ExprKind::Var(v) => Some(*v),
            ExprKind::Index { array, .. } => array.variable_referenced(),
            ExprKind::Field { record, .. } => record.variable_referenced(),
            ExprKind::Swizzle { value, .. } => value.variable_referenced(),
            _ => None,
        }
    }

    /// Variable, array element or struct field access.
    pub fn is_dereference(&self) -> bool {
        match &self.kind {
            ExprKind::Var(_) => true,
            ExprKind::Index { array, .. } => array.is_dereference(),
            ExprKind::Field { record, .. } => record.is_dereference(),
            _ => false,
        }
    }

    /// Leaf value cheap enough to duplicate freely.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ExprKind::Var(_) | ExprKind::Constant(_))
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant().is_some_and(Constant::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant().is_some_and(Constant::is_one)
    }

    pub fn is_negative_one(&self) -> bool {
        self.as_constant().is_some_and(Constant::is_negative_one)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec(n: u8) -> Type {
        Type::vec(BaseType::Float, n)
    }

    #[test]
    fn operator_names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn arithmetic_broadcasts_scalars() {
        assert_eq!(Operation::Add.result_type(&[&Type::FLOAT, &vec(3)]), Some(vec(3)));
        assert_eq!(Operation::Add.result_type(&[&vec(2), &vec(3)]), None);
        assert_eq!(Operation::Add.result_type(&[&Type::INT, &Type::FLOAT]), None);
        assert_eq!(Operation::BitAnd.result_type(&[&Type::FLOAT, &Type::FLOAT]), None);
    }

    #[test]
    fn matrix_products() {
        let m = Type::mat(3, 2);
        assert_eq!(Operation::Mul.result_type(&[&m, &vec(3)]), Some(vec(2)));
        assert_eq!(Operation::Mul.result_type(&[&vec(2), &m]), Some(vec(3)));
        assert_eq!(
            Operation::Mul.result_type(&[&Type::mat(2, 3), &Type::mat(3, 2)]),
            Some(Type::mat(3, 3))
        );
    }

    #[test]
    fn comparisons_are_componentwise() {
        assert_eq!(
            Operation::Less.result_type(&[&vec(2), &vec(2)]),
            Some(Type::Vector(BaseType::Bool, 2))
        );
        assert_eq!(Operation::AllEqual.result_type(&[&vec(4), &vec(4)]), Some(Type::BOOL));
        assert_eq!(Operation::Less.negated_comparison(), Some(Operation::GreaterEqual));
        assert_eq!(Operation::LessEqual.swapped_comparison(), Some(Operation::GreaterEqual));
    }

    #[test]
    fn swizzle_composition() {
        let inner = Swizzle::parse("wzyx", 4).unwrap();
        let outer = Swizzle::parse("xy", 4).unwrap();
        assert_eq!(outer.after(inner).unwrap().mask_string(), "wz");
        assert!(Swizzle::parse("xyzw", 4).unwrap().is_identity_for(4));
        assert!(!Swizzle::parse("xyz", 4).unwrap().is_identity_for(4));
        assert!(Swizzle::parse("z", 2).is_none());
    }
}
