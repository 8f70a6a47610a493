//! Tensor types, shapes and attribute values.

use std::collections::HashMap;
use std::fmt;

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::ir::Symbol;
use crate::refs::TypeRef;

// ============================================================================
// Element type
// ============================================================================

/// Scalar element type of a tensor value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Boolean,
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Boolean => "bool",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Static or unknown tensor shape.
///
/// A `Static` shape with no dimensions is a scalar. `Dynamic` means the
/// rank or dimensions are not known before execution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Static(SmallVec<[usize; 4]>),
    Dynamic,
}

impl Shape {
    /// Build a static shape from dimensions.
    pub fn fixed(dims: impl IntoIterator<Item = usize>) -> Self {
        Shape::Static(dims.into_iter().collect())
    }

    /// Static rank-0 shape.
    pub fn scalar() -> Self {
        Shape::Static(SmallVec::new())
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Shape::Static(_))
    }

    /// True only for a statically known rank-0 shape.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Static(dims) if dims.is_empty())
    }

    pub fn rank(&self) -> Option<usize> {
        match self {
            Shape::Static(dims) => Some(dims.len()),
            Shape::Dynamic => None,
        }
    }

    /// Insert a new dimension of size 1 at `axis`.
    ///
    /// Unknown shapes stay unknown; the caller cannot place an axis in a
    /// shape it cannot see.
    pub fn unsqueeze(&self, axis: usize) -> Shape {
        match self {
            Shape::Static(dims) => {
                let mut dims = dims.clone();
                dims.insert(axis, 1);
                Shape::Static(dims)
            }
            Shape::Dynamic => Shape::Dynamic,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Static(dims) => {
                f.write_str("[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str("x")?;
                    }
                    write!(f, "{d}")?;
                }
                f.write_str("]")
            }
            Shape::Dynamic => f.write_str("[?]"),
        }
    }
}

// ============================================================================
// TensorType
// ============================================================================

/// Interned tensor type: element type plus (possibly unknown) shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub element: ElementType,
    pub shape: Shape,
}

impl TensorType {
    pub fn new(element: ElementType, shape: Shape) -> Self {
        Self { element, shape }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.element, self.shape)
    }
}

// ============================================================================
// TypeInterner
// ============================================================================

/// Deduplicating type interner. The same `TensorType` always yields the
/// same `TypeRef`.
pub struct TypeInterner {
    types: PrimaryMap<TypeRef, TensorType>,
    dedup: HashMap<TensorType, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            types: PrimaryMap::new(),
            dedup: HashMap::new(),
        }
    }

    /// Intern a type, returning the existing ref if the data matches.
    pub fn intern(&mut self, data: TensorType) -> TypeRef {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.types.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    /// Look up type data by reference.
    pub fn get(&self, r: TypeRef) -> &TensorType {
        &self.types[r]
    }

    /// Intern `element` with a static shape.
    pub fn tensor(&mut self, element: ElementType, dims: impl IntoIterator<Item = usize>) -> TypeRef {
        self.intern(TensorType::new(element, Shape::fixed(dims)))
    }

    /// Intern a rank-0 `element` tensor.
    pub fn scalar(&mut self, element: ElementType) -> TypeRef {
        self.intern(TensorType::new(element, Shape::scalar()))
    }

    /// Intern `element` with unknown shape.
    pub fn dynamic(&mut self, element: ElementType) -> TypeRef {
        self.intern(TensorType::new(element, Shape::Dynamic))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// Node attribute values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Bool(bool),
    Int(i64),
    Ints(SmallVec<[i64; 4]>),
    Symbol(Symbol),
    Type(TypeRef),
    List(Vec<Attribute>),
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::Int(value)
    }
}

impl From<Symbol> for Attribute {
    fn from(value: Symbol) -> Self {
        Attribute::Symbol(value)
    }
}

impl From<TypeRef> for Attribute {
    fn from(value: TypeRef) -> Self {
        Attribute::Type(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

impl Attribute {
    /// Build an `Ints` attribute from i64 values.
    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Attribute::Ints(values.into_iter().collect())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Attribute::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Attribute::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Attribute]> {
        match self {
            Attribute::List(v) => Some(v),
            _ => None,
        }
    }
}
