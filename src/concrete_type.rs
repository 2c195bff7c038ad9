use crate::{ir::StructId, precision::Precision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Bool,
    Int,
    UInt,
    Float,
}
impl BaseType {
    #[inline(always)]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }

    #[inline(always)]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }

    pub const fn vector_prefix(self) -> &'static str {
        match self {
            Self::Bool => "b",
            Self::Int => "i",
            Self::UInt => "u",
            Self::Float => "",
        }
    }

    pub const fn scalar_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerDim {
    Dim2D,
    Dim3D,
    Cube,
    Dim2DShadow,
    External,
}
impl SamplerDim {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dim2D => "sampler2D",
            Self::Dim3D => "sampler3D",
            Self::Cube => "samplerCube",
            Self::Dim2DShadow => "sampler2DShadow",
            Self::External => "samplerExternalOES",
        }
    }

    pub const fn coordinate_components(self) -> u8 {
        match self {
            Self::Dim2D | Self::External => 2,
            Self::Dim3D | Self::Cube | Self::Dim2DShadow => 3,
        }
    }
}

/// Semantic type of a variable or an expression.
///
/// Matrices are always float, column-major: `Matrix { columns, rows }` holds
/// `columns` vectors of `rows` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Scalar(BaseType),
    Vector(BaseType, u8),
    Matrix { columns: u8, rows: u8 },
    Array(Box<Type>, u32),
    Struct(StructId),
    Sampler(SamplerDim),
}
impl Type {
    pub const BOOL: Type = Type::Scalar(BaseType::Bool);
    pub const INT: Type = Type::Scalar(BaseType::Int);
    pub const UINT: Type = Type::Scalar(BaseType::UInt);
    pub const FLOAT: Type = Type::Scalar(BaseType::Float);

    /// scalar for 1 component, vector otherwise
    pub const fn vec(base: BaseType, components: u8) -> Type {
        if components == 1 {
            Type::Scalar(base)
        } else {
            Type::Vector(base, components)
        }
    }

    pub const fn mat(columns: u8, rows: u8) -> Type {
        Type::Matrix { columns, rows }
    }

    pub fn array(element: Type, length: u32) -> Type {
        Type::Array(Box::new(element), length)
    }

    pub const fn base_type(&self) -> Option<BaseType> {
        match self {
            Self::Scalar(b) | Self::Vector(b, _) => Some(*b),
            Self::Matrix { .. } => Some(BaseType::Float),
            _ => None,
        }
    }

    /// Scalar type with the same base type.
    pub fn scalar_type(&self) -> Option<Type> {
        self.base_type().map(Type::Scalar)
    }

    /// Number of rows for a matrix, components for a vector, 1 for a scalar.
    pub const fn vector_elements(&self) -> u8 {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(_, n) => *n,
            Self::Matrix { rows, .. } => *rows,
            _ => 0,
        }
    }

    pub const fn matrix_columns(&self) -> u8 {
        match self {
            Self::Matrix { columns, .. } => *columns,
            Self::Scalar(_) | Self::Vector(_, _) => 1,
            _ => 0,
        }
    }

    /// Total scalar components of a scalar/vector/matrix type.
    pub const fn components(&self) -> usize {
        self.vector_elements() as usize * self.matrix_columns() as usize
    }

    #[inline(always)]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    #[inline(always)]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_, _))
    }

    #[inline(always)]
    pub const fn is_matrix(&self) -> bool {
        matches!(self, Self::Matrix { .. })
    }

    #[inline(always)]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_, _))
    }

    #[inline(always)]
    pub const fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(_))
    }

    #[inline(always)]
    pub const fn is_sampler(&self) -> bool {
        matches!(self, Self::Sampler(_))
    }

    #[inline(always)]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// scalar, vector or matrix
    pub const fn is_numeric_or_bool(&self) -> bool {
        matches!(
            self,
            Self::Scalar(_) | Self::Vector(_, _) | Self::Matrix { .. }
        )
    }

    pub const fn is_float(&self) -> bool {
        matches!(self.base_type(), Some(BaseType::Float))
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self.base_type(), Some(BaseType::Int | BaseType::UInt))
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self.base_type(), Some(BaseType::Bool))
    }

    /// Precision qualifiers apply to numeric (non-bool) values and samplers.
    pub fn is_precision_applicable(&self) -> bool {
        match self {
            Self::Array(e, _) => e.is_precision_applicable(),
            Self::Sampler(_) => true,
            t => matches!(
                t.base_type(),
                Some(BaseType::Int | BaseType::UInt | BaseType::Float)
            ),
        }
    }

    /// Type produced by indexing into this type: array element, matrix
    /// column, or vector component.
    pub fn index_result(&self) -> Option<Type> {
        match self {
            Self::Array(e, _) => Some((**e).clone()),
            Self::Matrix { rows, .. } => Some(Type::vec(BaseType::Float, *rows)),
            Self::Vector(b, _) => Some(Type::Scalar(*b)),
            _ => None,
        }
    }

    pub fn array_length(&self) -> Option<u32> {
        match self {
            Self::Array(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Same shape with a different base type (used by conversion operators).
    pub fn with_base_type(&self, base: BaseType) -> Type {
        match self {
            Self::Scalar(_) => Type::Scalar(base),
            Self::Vector(_, n) => Type::Vector(base, *n),
            t => t.clone(),
        }
    }

    pub fn display_name(&self, structs: &[StructDef]) -> String {
        match self {
            Self::Void => String::from("void"),
            Self::Scalar(b) => String::from(b.scalar_name()),
            Self::Vector(b, n) => format!("{}vec{n}", b.vector_prefix()),
            Self::Matrix { columns, rows } if columns == rows => format!("mat{columns}"),
            Self::Matrix { columns, rows } => format!("mat{columns}x{rows}"),
            Self::Array(e, n) => format!("(array {} {n})", e.display_name(structs)),
            Self::Struct(id) => structs
                .get(id.0)
                .map_or_else(|| format!("struct#{}", id.0), |s| s.name.clone()),
            Self::Sampler(d) => String::from(d.name()),
        }
    }

    /// Parses a non-aggregate type name (`vec3`, `mat2x4`, `sampler2D`, ...).
    pub fn from_name(name: &str) -> Option<Type> {
        let ty = match name {
            "void" => Type::Void,
            "bool" => Type::BOOL,
            "int" => Type::INT,
            "uint" => Type::UINT,
            "float" => Type::FLOAT,
            "sampler2D" => Type::Sampler(SamplerDim::Dim2D),
            "sampler3D" => Type::Sampler(SamplerDim::Dim3D),
            "samplerCube" => Type::Sampler(SamplerDim::Cube),
            "sampler2DShadow" => Type::Sampler(SamplerDim::Dim2DShadow),
            "samplerExternalOES" => Type::Sampler(SamplerDim::External),
            _ => {
                if let Some(dims) = name.strip_prefix("mat") {
                    let (c, r) = match dims.as_bytes() {
                        [c] => (*c, *c),
                        [c, b'x', r] => (*c, *r),
                        _ => return None,
                    };
                    let (c, r) = (c.wrapping_sub(b'0'), r.wrapping_sub(b'0'));
                    if !(2..=4).contains(&c) || !(2..=4).contains(&r) {
                        return None;
                    }
                    return Some(Type::mat(c, r));
                }

                let (base, rest) = match name.as_bytes().first() {
                    Some(b'b') => (BaseType::Bool, &name[1..]),
                    Some(b'i') => (BaseType::Int, &name[1..]),
                    Some(b'u') => (BaseType::UInt, &name[1..]),
                    _ => (BaseType::Float, name),
                };
                let n = rest.strip_prefix("vec")?.parse::<u8>().ok()?;
                if !(2..=4).contains(&n) {
                    return None;
                }
                Type::Vector(base, n)
            }
        };

        Some(ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub precision: Precision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
}
impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_names() {
        assert_eq!(Type::from_name("vec3"), Some(Type::Vector(BaseType::Float, 3)));
        assert_eq!(Type::from_name("ivec2"), Some(Type::Vector(BaseType::Int, 2)));
        assert_eq!(Type::from_name("bvec4"), Some(Type::Vector(BaseType::Bool, 4)));
        assert_eq!(Type::from_name("mat3"), Some(Type::mat(3, 3)));
        assert_eq!(Type::from_name("mat2x4"), Some(Type::mat(2, 4)));
        assert_eq!(Type::from_name("vec5"), None);
        assert_eq!(Type::from_name("mat5"), None);
    }

    #[test]
    fn matrix_shape() {
        let m = Type::mat(3, 2);
        assert_eq!(m.vector_elements(), 2);
        assert_eq!(m.matrix_columns(), 3);
        assert_eq!(m.components(), 6);
        assert_eq!(m.index_result(), Some(Type::vec(BaseType::Float, 2)));
        assert_eq!(m.display_name(&[]), "mat3x2");
    }
}
