use crate::concrete_type::{BaseType, Type};

/// Single component of a constant.
///
/// Floats compare and hash by bit pattern so that constants can key hash maps
/// (`-0.0 != 0.0`, `NaN == NaN` with the same payload).
#[derive(Debug, Clone, Copy)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
}
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}
impl Eq for Scalar {}
impl core::hash::Hash for Scalar {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(x) => x.hash(state),
            Self::Int(x) => x.hash(state),
            Self::UInt(x) => x.hash(state),
            Self::Float(x) => x.to_bits().hash(state),
        }
    }
}
impl Scalar {
    pub const fn base_type(self) -> BaseType {
        match self {
            Self::Bool(_) => BaseType::Bool,
            Self::Int(_) => BaseType::Int,
            Self::UInt(_) => BaseType::UInt,
            Self::Float(_) => BaseType::Float,
        }
    }

    pub const fn zero(base: BaseType) -> Self {
        match base {
            BaseType::Bool => Self::Bool(false),
            BaseType::Int => Self::Int(0),
            BaseType::UInt => Self::UInt(0),
            BaseType::Float => Self::Float(0.0),
        }
    }

    pub const fn one(base: BaseType) -> Self {
        match base {
            BaseType::Bool => Self::Bool(true),
            BaseType::Int => Self::Int(1),
            BaseType::UInt => Self::UInt(1),
            BaseType::Float => Self::Float(1.0),
        }
    }

    /// Value converted to `base` with GLSL constructor semantics.
    pub fn convert(self, base: BaseType) -> Self {
        match base {
            BaseType::Bool => Self::Bool(self.as_bool()),
            BaseType::Int => Self::Int(self.as_i32()),
            BaseType::UInt => Self::UInt(self.as_u32()),
            BaseType::Float => Self::Float(self.as_f32()),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(x) => x,
            Self::Int(x) => x != 0,
            Self::UInt(x) => x != 0,
            Self::Float(x) => x != 0.0,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Bool(x) => x as i32,
            Self::Int(x) => x,
            Self::UInt(x) => x as i32,
            Self::Float(x) => x as i32,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Bool(x) => x as u32,
            Self::Int(x) => x as u32,
            Self::UInt(x) => x,
            Self::Float(x) => x as u32,
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Self::Bool(x) => {
                if x {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int(x) => x as f32,
            Self::UInt(x) => x as f32,
            Self::Float(x) => x,
        }
    }

    /// Numeric value widened to f64 for comparisons across base types.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(x) => x as f64,
            Self::UInt(x) => x as f64,
            s => s.as_f32() as f64,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Self::Bool(x) => !x,
            Self::Int(x) => x == 0,
            Self::UInt(x) => x == 0,
            Self::Float(x) => x == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Self::Bool(x) => x,
            Self::Int(x) => x == 1,
            Self::UInt(x) => x == 1,
            Self::Float(x) => x == 1.0,
        }
    }

    pub fn is_negative_one(self) -> bool {
        match self {
            Self::Int(x) => x == -1,
            Self::Float(x) => x == -1.0,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantData {
    /// scalar, vector or matrix (column-major)
    Components(Vec<Scalar>),
    /// array elements or struct fields
    Aggregate(Vec<Constant>),
}

/// Immutable typed literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub ty: Type,
    pub data: ConstantData,
}
impl Constant {
    pub fn scalar(s: Scalar) -> Self {
        Self {
            ty: Type::Scalar(s.base_type()),
            data: ConstantData::Components(vec![s]),
        }
    }

    pub fn bool(x: bool) -> Self {
        Self::scalar(Scalar::Bool(x))
    }

    pub fn int(x: i32) -> Self {
        Self::scalar(Scalar::Int(x))
    }

    pub fn uint(x: u32) -> Self {
        Self::scalar(Scalar::UInt(x))
    }

    pub fn float(x: f32) -> Self {
        Self::scalar(Scalar::Float(x))
    }

    /// Scalar/vector/matrix constant from its components. Component count
    /// must match `ty`.
    pub fn from_components(ty: Type, components: Vec<Scalar>) -> Self {
        debug_assert_eq!(ty.components(), components.len());
        Self {
            ty,
            data: ConstantData::Components(components),
        }
    }

    /// Every component set to `value` (converted to the type's base).
    pub fn splat(ty: Type, value: Scalar) -> Option<Self> {
        let base = ty.base_type()?;
        let n = ty.components();
        Some(Self::from_components(ty, vec![value.convert(base); n]))
    }

    pub fn zero(ty: Type) -> Option<Self> {
        let base = ty.base_type()?;
        Self::splat(ty, Scalar::zero(base))
    }

    pub fn aggregate(ty: Type, elements: Vec<Constant>) -> Self {
        Self {
            ty,
            data: ConstantData::Aggregate(elements),
        }
    }

    #[inline]
    pub fn components(&self) -> Option<&[Scalar]> {
        match &self.data {
            ConstantData::Components(c) => Some(c),
            ConstantData::Aggregate(_) => None,
        }
    }

    #[inline]
    pub fn component(&self, index: usize) -> Option<Scalar> {
        self.components()?.get(index).copied()
    }

    /// The single value of a scalar constant.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self.components()? {
            [s] => Some(*s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_scalar()? {
            Scalar::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Integer value of a scalar int/uint constant.
    pub fn as_index(&self) -> Option<i64> {
        match self.as_scalar()? {
            Scalar::Int(x) => Some(x as i64),
            Scalar::UInt(x) => Some(x as i64),
            _ => None,
        }
    }

    /// Array element, struct field, or matrix column.
    pub fn element(&self, index: usize) -> Option<Constant> {
        match (&self.ty, &self.data) {
            (_, ConstantData::Aggregate(xs)) => xs.get(index).cloned(),
            (Type::Matrix { columns, rows }, ConstantData::Components(c)) => {
                if index >= *columns as usize {
                    return None;
                }
                let r = *rows as usize;
                Some(Self::from_components(
                    Type::vec(BaseType::Float, *rows),
                    c[index * r..(index + 1) * r].to_vec(),
                ))
            }
            (Type::Vector(b, _), ConstantData::Components(c)) => c
                .get(index)
                .map(|s| Self::scalar(s.convert(*b))),
            _ => None,
        }
    }

    fn all_components(&self, pred: impl Fn(Scalar) -> bool + Copy) -> bool {
        match &self.data {
            ConstantData::Components(c) => !c.is_empty() && c.iter().all(|&s| pred(s)),
            ConstantData::Aggregate(_) => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.all_components(Scalar::is_zero)
    }

    /// Every component is one. Matrices qualify only as identity, so they are
    /// excluded here.
    pub fn is_one(&self) -> bool {
        !self.ty.is_matrix() && self.all_components(Scalar::is_one)
    }

    pub fn is_negative_one(&self) -> bool {
        !self.ty.is_matrix() && self.all_components(Scalar::is_negative_one)
    }

    /// All components equal to `value`, compared numerically.
    pub fn is_uniform_value(&self, value: f64) -> bool {
        self.all_components(|s| s.as_f64() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Constant::float(f32::NAN), Constant::float(f32::NAN));
        assert_ne!(Constant::float(0.0), Constant::float(-0.0));
    }

    #[test]
    fn matrix_column_element() {
        let m = Constant::from_components(
            Type::mat(2, 2),
            [1.0, 2.0, 3.0, 4.0].map(Scalar::Float).to_vec(),
        );
        let col = m.element(1).unwrap();
        assert_eq!(col.components().unwrap(), &[Scalar::Float(3.0), Scalar::Float(4.0)]);
        assert!(m.element(2).is_none());
        assert!(!Constant::splat(Type::mat(2, 2), Scalar::Float(1.0)).unwrap().is_one());
    }

    #[test]
    fn splat_converts_base() {
        let v = Constant::splat(Type::Vector(BaseType::Int, 3), Scalar::Float(2.5)).unwrap();
        assert_eq!(v.components().unwrap(), &[Scalar::Int(2); 3]);
        assert!(Constant::zero(Type::Vector(BaseType::Float, 2)).unwrap().is_zero());
    }
}
