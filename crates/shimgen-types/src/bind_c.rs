//! Bind-C wrapper AST produced by the wrapper engine.
//!
//! Every public symbol of a [`BindCModule`] uses only scalars and opaque
//! pointers at its boundary. Arrays travel as one pointer plus shape and
//! stride scalars; optionals, class instances and homogeneous collections
//! travel as a (possibly null) pointer.
//!
//! Nodes are built once by a single wrapping pass and consumed by a printer.

use serde::Serialize;
use std::fmt;

use crate::ast::{FunctionArgument, FunctionResult, ScalarKind, ValueType};
use crate::Target;

// ══════════════════════════════════════════════════════════════════════════════
// Locals
// ══════════════════════════════════════════════════════════════════════════════

/// Index of a scope in the wrapper's scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScopeId(pub usize);

/// Type of a wrapper local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalType {
    /// Opaque pointer with no shape or type information.
    Pointer,
    Value {
        ty: ValueType,
        /// Aliases memory owned elsewhere.
        alias: bool,
    },
}

/// A variable declared inside a wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Local {
    pub name: String,
    pub ty: LocalType,
}

impl Local {
    pub fn pointer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: LocalType::Pointer,
        }
    }

    pub fn owned(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty: LocalType::Value { ty, alias: false },
        }
    }

    pub fn alias(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty: LocalType::Value { ty, alias: true },
        }
    }

    /// An integer local used for shapes, strides and counters.
    pub fn index(name: impl Into<String>) -> Self {
        Self::owned(name, ValueType::Scalar(ScalarKind::INDEX))
    }

    pub fn value_type(&self) -> Option<&ValueType> {
        match &self.ty {
            LocalType::Value { ty, .. } => Some(ty),
            LocalType::Pointer => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.ty, LocalType::Pointer)
    }

    pub fn var(&self) -> Expr {
        Expr::Var(self.name.clone())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions & statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexExpr {
    /// `start:stop:step`; an absent `stop` runs to the end of the dimension.
    Slice {
        start: Expr,
        stop: Option<Expr>,
        step: Expr,
    },
    Element(Expr),
}

/// A keyword-or-positional argument of a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallArgument {
    pub keyword: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Var(String),
    Int(i64),
    Bool(bool),
    Null,
    /// Presence check of an optional argument's pointer.
    IsNotNull(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    /// Extent of dimension `dim` (0-based) of an array or length of a collection.
    Shape { var: String, dim: usize },
    Index { base: String, indices: Vec<IndexExpr> },
    Attribute { base: Box<Expr>, name: String },
    Call {
        function: String,
        args: Vec<CallArgument>,
    },
    /// Target list of a multi-result assignment.
    Tuple(Vec<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Expr::IsNotNull(Box::new(expr))
    }

    pub fn attribute(base: Expr, name: impl Into<String>) -> Self {
        Expr::Attribute {
            base: Box::new(base),
            name: name.into(),
        }
    }

    /// A reinterpreted array viewed through a strided slice.
    pub fn is_strided_view(&self) -> bool {
        matches!(self, Expr::Index { indices, .. }
            if indices.iter().any(|i| matches!(i, IndexExpr::Slice { .. })))
    }

    /// The variable an expression is rooted at, if any.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Expr::Var(name) | Expr::Index { base: name, .. } | Expr::Shape { var: name, .. } => {
                Some(name)
            }
            Expr::Attribute { base, .. } => base.base_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    /// Reinterpret `ptr` as the native local `target`, with the given extents
    /// (empty for scalars and class instances).
    CFPointer {
        ptr: String,
        target: String,
        sizes: Vec<Expr>,
    },
    If {
        condition: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Assign { lhs: Expr, rhs: Expr },
    AliasAssign { lhs: Expr, rhs: Expr },
    Allocate { var: String, shape: Vec<Expr> },
    /// Iterate over the elements of a list or set. When `counter` is set the
    /// loop maintains it as the 0-based position of `element`.
    For {
        element: String,
        iterable: String,
        counter: Option<String>,
        body: Vec<Stmt>,
    },
    /// Bind the address of `source` to the opaque pointer `ptr`.
    CLoc { source: String, ptr: String },
    Deallocate { var: String },
    Expr(Expr),
}

impl Stmt {
    pub fn is_conditional(&self) -> bool {
        matches!(self, Stmt::If { .. })
    }
}

/// Number of `If` nodes anywhere in `stmts`.
pub fn count_conditionals(stmts: &[Stmt]) -> usize {
    stmts
        .iter()
        .map(|s| match s {
            Stmt::If { body, orelse, .. } => 1 + count_conditionals(body) + count_conditionals(orelse),
            Stmt::For { body, .. } => count_conditionals(body),
            _ => 0,
        })
        .sum()
}

/// Straight-line blocks at the leaves of the optional-presence tree.
///
/// A block containing a conditional is split into its branches; a block
/// without one is a leaf.
pub fn leaf_blocks(stmts: &[Stmt]) -> Vec<&[Stmt]> {
    let branches: Vec<&Stmt> = stmts.iter().filter(|s| s.is_conditional()).collect();
    if branches.is_empty() {
        return vec![stmts];
    }
    let mut leaves = Vec::new();
    for stmt in branches {
        if let Stmt::If { body, orelse, .. } = stmt {
            leaves.extend(leaf_blocks(body));
            leaves.extend(leaf_blocks(orelse));
        }
    }
    leaves
}

// ══════════════════════════════════════════════════════════════════════════════
// ABI surface
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiType {
    Scalar(ScalarKind),
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamDirection {
    In,
    Out,
}

/// One parameter of the flattened foreign-call signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbiParam {
    pub name: String,
    pub ty: AbiType,
    pub direction: ParamDirection,
}

impl AbiParam {
    fn input(name: &str, ty: AbiType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            direction: ParamDirection::In,
        }
    }

    fn output(name: &str, ty: AbiType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            direction: ParamDirection::Out,
        }
    }
}

/// What the foreign-call function itself returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSlot {
    Void,
    /// The single result, returned by value.
    Direct { name: String, ty: AbiType },
    /// Several results: every one is an output parameter and the function
    /// returns the number of results written.
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbiSignature {
    pub name: String,
    pub params: Vec<AbiParam>,
    pub returns: ReturnSlot,
}

impl AbiSignature {
    pub fn inputs(&self) -> impl Iterator<Item = &AbiParam> {
        self.params.iter().filter(|p| p.direction == ParamDirection::In)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &AbiParam> {
        self.params.iter().filter(|p| p.direction == ParamDirection::Out)
    }

    /// Results returned by value (0 or 1).
    pub fn direct_returns(&self) -> usize {
        usize::from(matches!(self.returns, ReturnSlot::Direct { .. }))
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Scalar(kind) => write!(f, "{kind}"),
            AbiType::Pointer => write!(f, "void*"),
        }
    }
}

impl fmt::Display for AbiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = match &self.returns {
            ReturnSlot::Void => "void".to_string(),
            ReturnSlot::Direct { ty, .. } => ty.to_string(),
            ReturnSlot::Status => "int32".to_string(),
        };
        write!(f, "{ret} {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p.direction {
                ParamDirection::In => write!(f, "{} {}", p.ty, p.name)?,
                ParamDirection::Out => write!(f, "{}* {}", p.ty, p.name)?,
            }
        }
        write!(f, ")")
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Arguments & results
// ══════════════════════════════════════════════════════════════════════════════

/// How an argument crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentAbi {
    /// Scalar passed by value; the wrapper local is the parameter itself.
    Direct,
    /// Opaque pointer plus, for arrays and sequences, shape (and for arrays
    /// stride) scalars in declaration order.
    Pointer {
        ptr: String,
        shape: Vec<String>,
        strides: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCArgument {
    pub original: FunctionArgument,
    /// Native local holding the reconstructed value.
    pub local: Local,
    pub abi: ArgumentAbi,
    /// Expression passed to the wrapped callable.
    pub call_value: Expr,
}

impl BindCArgument {
    pub fn is_optional(&self) -> bool {
        self.original.optional
    }

    pub fn is_bound(&self) -> bool {
        self.original.bound
    }

    pub fn pointer(&self) -> Option<&str> {
        match &self.abi {
            ArgumentAbi::Pointer { ptr, .. } => Some(ptr),
            ArgumentAbi::Direct => None,
        }
    }

    pub fn abi_params(&self) -> Vec<AbiParam> {
        match &self.abi {
            ArgumentAbi::Direct => {
                let kind = match &self.original.ty {
                    ValueType::Scalar(kind) => *kind,
                    _ => ScalarKind::INDEX,
                };
                vec![AbiParam::input(&self.local.name, AbiType::Scalar(kind))]
            }
            ArgumentAbi::Pointer {
                ptr,
                shape,
                strides,
            } => {
                let mut params = vec![AbiParam::input(ptr, AbiType::Pointer)];
                params.extend(
                    shape
                        .iter()
                        .chain(strides)
                        .map(|n| AbiParam::input(n, AbiType::Scalar(ScalarKind::INDEX))),
                );
                params
            }
        }
    }
}

/// How a result crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultAbi {
    /// Scalar returned (or written) by value from the local.
    Direct,
    /// Opaque pointer plus shape outputs, one per dimension.
    Pointer { ptr: String, shape: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCResult {
    pub original: FunctionResult,
    /// Local receiving the value computed by the wrapped callable.
    pub local: Local,
    pub abi: ResultAbi,
}

impl BindCResult {
    fn value_param(&self) -> (String, AbiType) {
        match &self.abi {
            ResultAbi::Direct => {
                let kind = match &self.original.ty {
                    ValueType::Scalar(kind) => *kind,
                    _ => ScalarKind::INDEX,
                };
                (self.local.name.clone(), AbiType::Scalar(kind))
            }
            ResultAbi::Pointer { ptr, .. } => (ptr.clone(), AbiType::Pointer),
        }
    }

    fn shape_params(&self) -> Vec<AbiParam> {
        match &self.abi {
            ResultAbi::Direct => Vec::new(),
            ResultAbi::Pointer { shape, .. } => shape
                .iter()
                .map(|n| AbiParam::output(n, AbiType::Scalar(ScalarKind::INDEX)))
                .collect(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

/// Class member identity; never a concatenated string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MemberKey {
    pub class: String,
    pub member: String,
}

impl MemberKey {
    pub fn new(class: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            member: member.into(),
        }
    }
}

/// What a wrapper function exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Function(String),
    Method(MemberKey),
    Getter(MemberKey),
    Setter(MemberKey),
    /// Parameterless constructor of a class handle.
    Allocator(String),
    /// Parameterless accessor of a module array variable.
    VariableAccessor(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCFunction {
    pub name: String,
    pub origin: Origin,
    pub arguments: Vec<BindCArgument>,
    pub results: Vec<BindCResult>,
    pub body: Vec<Stmt>,
    /// Every local declared in the wrapper's scope and its inner blocks,
    /// excluding the ABI parameters of direct arguments.
    pub locals: Vec<Local>,
    pub scope: ScopeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl BindCFunction {
    /// The flattened foreign-call signature.
    ///
    /// A single result is returned directly; with two or more results every
    /// result becomes an output parameter and the function returns a status.
    pub fn abi_signature(&self) -> AbiSignature {
        let mut params: Vec<AbiParam> =
            self.arguments.iter().flat_map(|a| a.abi_params()).collect();
        let returns = match self.results.as_slice() {
            [] => ReturnSlot::Void,
            [single] => {
                let (name, ty) = single.value_param();
                params.extend(single.shape_params());
                ReturnSlot::Direct { name, ty }
            }
            many => {
                for r in many {
                    let (name, ty) = r.value_param();
                    params.push(AbiParam::output(&name, ty));
                    params.extend(r.shape_params());
                }
                ReturnSlot::Status
            }
        };
        AbiSignature {
            name: self.name.clone(),
            params,
            returns,
        }
    }

    pub fn local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().find(|l| l.name == name).or_else(|| {
            self.arguments
                .iter()
                .map(|a| &a.local)
                .find(|l| l.name == name)
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Module-level nodes
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindCVariable {
    /// Scalar globals are already interoperable and pass through unchanged.
    Scalar { name: String, kind: ScalarKind },
    /// Array globals are exposed through a parameterless accessor.
    Array {
        name: String,
        ty: ValueType,
        accessor: BindCFunction,
    },
}

impl BindCVariable {
    pub fn name(&self) -> &str {
        match self {
            BindCVariable::Scalar { name, .. } | BindCVariable::Array { name, .. } => name,
        }
    }

    pub fn accessor(&self) -> Option<&BindCFunction> {
        match self {
            BindCVariable::Array { accessor, .. } => Some(accessor),
            BindCVariable::Scalar { .. } => None,
        }
    }
}

/// An overload set restricted to successfully wrapped overloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindCInterface {
    pub name: String,
    /// Wrapper names of the surviving overloads, in declaration order.
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCClassProperty {
    pub key: MemberKey,
    pub getter: BindCFunction,
    pub setter: Option<BindCFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCClass {
    pub name: String,
    pub allocator: BindCFunction,
    pub methods: Vec<BindCFunction>,
    pub interfaces: Vec<BindCInterface>,
    pub properties: Vec<BindCClassProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl BindCClass {
    pub fn property(&self, member: &str) -> Option<&BindCClassProperty> {
        self.properties.iter().find(|p| p.key.member == member)
    }

    pub fn functions(&self) -> impl Iterator<Item = &BindCFunction> {
        std::iter::once(&self.allocator)
            .chain(self.methods.iter())
            .chain(
                self.properties
                    .iter()
                    .flat_map(|p| std::iter::once(&p.getter).chain(p.setter.iter())),
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindCModule {
    pub name: String,
    /// Name of the wrapped module.
    pub original: String,
    pub target: Target,
    pub variables: Vec<BindCVariable>,
    pub functions: Vec<BindCFunction>,
    /// Wrapper name of the module initialiser, if any.
    pub init_func: Option<String>,
    /// Wrapper name of the module finaliser, if any.
    pub free_func: Option<String>,
    pub interfaces: Vec<BindCInterface>,
    pub classes: Vec<BindCClass>,
    /// Original names of functions dropped because they could not be wrapped.
    pub removed_functions: Vec<String>,
}

impl BindCModule {
    pub fn variable_accessors(&self) -> impl Iterator<Item = &BindCFunction> {
        self.variables.iter().filter_map(BindCVariable::accessor)
    }

    /// Every wrapper function of the module, in emission order.
    pub fn all_functions(&self) -> impl Iterator<Item = &BindCFunction> {
        self.functions
            .iter()
            .chain(self.variable_accessors())
            .chain(self.classes.iter().flat_map(BindCClass::functions))
    }

    pub fn function(&self, name: &str) -> Option<&BindCFunction> {
        self.all_functions().find(|f| f.name == name)
    }

    /// Wrapper of a given origin.
    pub fn wrapper_of(&self, origin: &Origin) -> Option<&BindCFunction> {
        self.all_functions().find(|f| &f.origin == origin)
    }

    pub fn class(&self, name: &str) -> Option<&BindCClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}
