//! Semantic AST consumed by the wrapper engine.
//!
//! These nodes come out of semantic analysis fully resolved: every argument,
//! result and variable carries its final [`ValueType`], rank and storage
//! order. The wrapper never mutates them.
//! Declaration order is preserved everywhere; it fixes wrapper naming and
//! the nesting of optional-argument branches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// Primitive kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl ScalarKind {
    /// The integer kind used for shapes, strides and loop counters.
    pub const INDEX: ScalarKind = ScalarKind::Int64;

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::Int8 | ScalarKind::Int16 | ScalarKind::Int32 | ScalarKind::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Float32 | ScalarKind::Float64)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Float64 => "float64",
            ScalarKind::Complex64 => "complex64",
            ScalarKind::Complex128 => "complex128",
        };
        write!(f, "{name}")
    }
}

/// Which array index varies fastest in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOrder {
    /// Last index fastest (C order).
    RowMajor,
    /// First index fastest (Fortran order).
    ColumnMajor,
}

/// Fully resolved type of an argument, result, attribute or variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Scalar(ScalarKind),
    Array {
        element: ScalarKind,
        rank: usize,
        order: StorageOrder,
    },
    /// Instance of a user-defined class.
    Class(String),
    /// `tuple[T, ...]`; `length` is known when the tuple is materialized as an array.
    HomogeneousTuple {
        element: Box<ValueType>,
        length: Option<usize>,
    },
    /// `tuple[A, B, ...]` with heterogeneous elements.
    Tuple(Vec<ValueType>),
    List(Box<ValueType>),
    Set(Box<ValueType>),
    /// A function passed by address.
    FunctionRef,
}

impl ValueType {
    pub fn array(element: ScalarKind, rank: usize, order: StorageOrder) -> Self {
        ValueType::Array {
            element,
            rank,
            order,
        }
    }

    /// Number of dimensions carried across the boundary.
    pub fn rank(&self) -> usize {
        match self {
            ValueType::Array { rank, .. } => *rank,
            ValueType::HomogeneousTuple { .. } | ValueType::List(_) | ValueType::Set(_) => 1,
            ValueType::Tuple(_) => 1,
            ValueType::Scalar(_) | ValueType::Class(_) | ValueType::FunctionRef => 0,
        }
    }

    /// Storage order of the value; rank-1 collections are order-agnostic and
    /// report row-major.
    pub fn order(&self) -> StorageOrder {
        match self {
            ValueType::Array { order, .. } => *order,
            _ => StorageOrder::RowMajor,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ValueType::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self, ValueType::Class(_))
    }

    /// Homogeneous one-dimensional containers (`tuple[T, ...]`, `list[T]`, `set[T]`).
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            ValueType::HomogeneousTuple { .. } | ValueType::List(_) | ValueType::Set(_)
        )
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, ValueType::Tuple(_) | ValueType::HomogeneousTuple { .. })
    }

    /// Element type of a container, or the scalar kind of an array.
    pub fn element(&self) -> Option<ValueType> {
        match self {
            ValueType::Array { element, .. } => Some(ValueType::Scalar(*element)),
            ValueType::HomogeneousTuple { element, .. }
            | ValueType::List(element)
            | ValueType::Set(element) => Some((**element).clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(kind) => write!(f, "{kind}"),
            ValueType::Array {
                element,
                rank,
                order,
            } => {
                let order = match order {
                    StorageOrder::RowMajor => "C",
                    StorageOrder::ColumnMajor => "F",
                };
                write!(f, "{element}[{}](order={order})", ":,".repeat(*rank).trim_end_matches(','))
            }
            ValueType::Class(name) => write!(f, "{name}"),
            ValueType::HomogeneousTuple { element, length } => match length {
                Some(n) => write!(f, "tuple[{element}; {n}]"),
                None => write!(f, "tuple[{element}, ...]"),
            },
            ValueType::Tuple(elements) => {
                write!(f, "tuple[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            ValueType::List(element) => write!(f, "list[{element}]"),
            ValueType::Set(element) => write!(f, "set[{element}]"),
            ValueType::FunctionRef => write!(f, "function"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Default-value expressions
// ══════════════════════════════════════════════════════════════════════════════

/// Literal default of an optional argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

/// One declared argument of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArgument {
    pub name: String,
    pub ty: ValueType,
    #[serde(default)]
    pub optional: bool,
    /// Receiver (`self`) of a method.
    #[serde(default)]
    pub bound: bool,
    #[serde(default)]
    pub default: Option<Literal>,
    #[serde(default)]
    pub kwonly: bool,
    /// The callee requires contiguous data for this array.
    #[serde(default)]
    pub contiguous: bool,
}

impl FunctionArgument {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            bound: false,
            default: None,
            kwonly: false,
            contiguous: false,
        }
    }

    /// Mark the argument optional with the given default.
    pub fn optional(mut self, default: Literal) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Mark the argument as the bound receiver of a method.
    pub fn bound(mut self) -> Self {
        self.bound = true;
        self
    }

    pub fn contiguous(mut self) -> Self {
        self.contiguous = true;
        self
    }
}

/// One declared result of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub name: String,
    pub ty: ValueType,
    /// The result is one of the arguments, modified in place.
    #[serde(default)]
    pub is_argument: bool,
    /// The result is a reference rather than an owned value.
    #[serde(default)]
    pub is_alias: bool,
}

impl FunctionResult {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_argument: false,
            is_alias: false,
        }
    }

    pub fn alias(mut self) -> Self {
        self.is_alias = true;
        self
    }

    pub fn in_place(mut self) -> Self {
        self.is_argument = true;
        self
    }
}

/// Where a function runs (GPU dialects distinguish host, kernel and device code).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    #[default]
    Host,
    /// Launched on the device from the host (`__global__`).
    Kernel,
    /// Only callable from device code (`__device__`).
    Device,
}

/// Declared role of a function inside a class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodRole {
    #[default]
    Plain,
    /// Decorated as a property accessor.
    Property,
    /// Destructor (`__del__`).
    Destructor,
}

/// A semantically analysed function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub arguments: Vec<FunctionArgument>,
    #[serde(default)]
    pub results: Vec<FunctionResult>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub role: MethodRole,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl FunctionDef {
    pub fn new(
        name: impl Into<String>,
        arguments: Vec<FunctionArgument>,
        results: Vec<FunctionResult>,
    ) -> Self {
        Self {
            name: name.into(),
            arguments,
            results,
            is_private: false,
            is_inline: false,
            kind: FunctionKind::Host,
            role: MethodRole::Plain,
            docstring: None,
            span: Span::default(),
        }
    }

    /// The receiver argument, if this is a method.
    pub fn bound_argument(&self) -> Option<&FunctionArgument> {
        self.arguments.first().filter(|a| a.bound)
    }

    /// Callable from host code across a foreign-call boundary.
    pub fn is_host_callable(&self) -> bool {
        self.kind == FunctionKind::Host
    }
}

/// A named overload set.
///
/// Overloads are referenced by name among the functions of the enclosing
/// module or class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub functions: Vec<String>,
    #[serde(default)]
    pub is_inline: bool,
}

// ══════════════════════════════════════════════════════════════════════════════
// Classes
// ══════════════════════════════════════════════════════════════════════════════

/// A data member of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ty: ValueType,
    #[serde(default)]
    pub is_private: bool,
    /// The attribute holds a reference (pointer member).
    #[serde(default)]
    pub is_alias: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_private: false,
            is_alias: false,
        }
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<FunctionDef>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            interfaces: Vec::new(),
            attributes: Vec::new(),
            docstring: None,
            span: Span::default(),
        }
    }

    /// The type of `self` for this class.
    pub fn class_type(&self) -> ValueType {
        ValueType::Class(self.name.clone())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Modules
// ══════════════════════════════════════════════════════════════════════════════

/// A module-level (global) variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: ValueType,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub span: Span,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_private: false,
            span: Span::default(),
        }
    }
}

/// A semantically analysed module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    /// Name of the function that initialises module state, if any.
    #[serde(default)]
    pub init_func: Option<String>,
    /// Name of the function that releases module state, if any.
    #[serde(default)]
    pub free_func: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            functions: Vec::new(),
            interfaces: Vec::new(),
            classes: Vec::new(),
            init_func: None,
            free_func: None,
            span: Span::default(),
        }
    }

    /// Every top-level symbol the module already uses.
    pub fn used_symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = vec![self.name.as_str()];
        symbols.extend(self.variables.iter().map(|v| v.name.as_str()));
        symbols.extend(self.functions.iter().map(|f| f.name.as_str()));
        symbols.extend(self.interfaces.iter().map(|i| i.name.as_str()));
        symbols.extend(self.classes.iter().map(|c| c.name.as_str()));
        symbols
    }
}
