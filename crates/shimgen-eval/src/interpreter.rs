//! Statement and expression evaluation of wrapper bodies.

use serde::Serialize;
use std::collections::BTreeMap;

use shimgen_types::ast::ValueType;
use shimgen_types::bind_c::{
    BindCFunction, BindCModule, CallArgument, Expr, IndexExpr, Local, Origin, ReturnSlot, Stmt,
};
use shimgen_types::Target;
use tracing::{debug, trace};

use crate::error::{EvalError, EvalResult};
use crate::heap::Heap;
use crate::value::{ArrayView, Handle, Value};

/// Host implementation of a wrapped callable.
///
/// Receives the heap and the arguments of the call; returns the callable's
/// results in declaration order (empty when it returns nothing).
pub type HostFn = Box<dyn Fn(&mut Heap, &CallArgs) -> EvalResult<Vec<Value>>>;

/// Arguments of a call to a host callable, in call order.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Absent optionals are not passed at all.
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Like [`CallArgs::get`] but an error when the argument is missing.
    pub fn require(&self, name: &str) -> EvalResult<&Value> {
        self.get(name)
            .ok_or_else(|| EvalError::Host(format!("missing argument {name}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// ABI-level result of a wrapper call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    /// Value of the return slot; `None` for a void wrapper.
    pub returned: Option<Value>,
    /// Output parameters in signature order.
    pub outputs: Vec<Value>,
}

impl CallOutcome {
    /// The returned pointer, if the wrapper returns a non-null one.
    pub fn pointer(&self) -> Option<Handle> {
        match &self.returned {
            Some(Value::Ptr(handle)) => *handle,
            _ => None,
        }
    }
}

/// Locals of one wrapper activation.
struct Frame<'m> {
    function: &'m BindCFunction,
    locals: BTreeMap<String, Value>,
}

impl Frame<'_> {
    fn declared_type(&self, name: &str) -> Option<&ValueType> {
        self.function.local(name).and_then(Local::value_type)
    }
}

/// Executes the wrapper functions of one module.
pub struct Interpreter<'m> {
    module: &'m BindCModule,
    target: Target,
    heap: Heap,
    globals: BTreeMap<String, Value>,
    hosts: BTreeMap<String, HostFn>,
    methods: BTreeMap<(String, String), HostFn>,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m BindCModule, target: Target) -> Self {
        Self {
            module,
            target,
            heap: Heap::new(),
            globals: BTreeMap::new(),
            hosts: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Provide the implementation of a module-level callable (function or
    /// interface) by its original name.
    pub fn register(
        &mut self,
        name: &str,
        host: impl Fn(&mut Heap, &CallArgs) -> EvalResult<Vec<Value>> + 'static,
    ) {
        self.hosts.insert(name.to_string(), Box::new(host));
    }

    /// Provide the implementation of a method of `class`. Takes precedence
    /// over a module-level callable of the same name inside method wrappers.
    pub fn register_method(
        &mut self,
        class: &str,
        name: &str,
        host: impl Fn(&mut Heap, &CallArgs) -> EvalResult<Vec<Value>> + 'static,
    ) {
        self.methods
            .insert((class.to_string(), name.to_string()), Box::new(host));
    }

    /// Bind a module variable of the wrapped module.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Call a wrapper with its ABI inputs, in signature order.
    pub fn call(&mut self, wrapper: &str, args: &[Value]) -> EvalResult<CallOutcome> {
        let module = self.module;
        let function = module
            .function(wrapper)
            .ok_or_else(|| EvalError::UnknownWrapper(wrapper.to_string()))?;
        let signature = function.abi_signature();

        let inputs: Vec<_> = signature.inputs().collect();
        if inputs.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                wrapper: wrapper.to_string(),
                expected: inputs.len(),
                found: args.len(),
            });
        }
        let mut frame = Frame {
            function,
            locals: inputs
                .iter()
                .zip(args)
                .map(|(p, v)| (p.name.clone(), v.clone()))
                .collect(),
        };
        trace!(wrapper, inputs = args.len(), "calling wrapper");

        self.exec_block(&mut frame, &function.body)?;

        let outputs = signature
            .outputs()
            .map(|p| self.lookup(&frame, &p.name))
            .collect::<EvalResult<Vec<_>>>()?;
        let returned = match &signature.returns {
            ReturnSlot::Void => None,
            ReturnSlot::Direct { name, .. } => Some(self.lookup(&frame, name)?),
            ReturnSlot::Status => Some(Value::Int(function.results.len() as i64)),
        };
        debug!(wrapper, outputs = outputs.len(), "wrapper returned");
        Ok(CallOutcome { returned, outputs })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn exec_block(&mut self, frame: &mut Frame<'m>, stmts: &[Stmt]) -> EvalResult<()> {
        for stmt in stmts {
            self.exec(frame, stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, frame: &mut Frame<'m>, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::CFPointer { ptr, target, sizes } => {
                let handle = self
                    .lookup(frame, ptr)?
                    .as_handle()
                    .ok_or_else(|| EvalError::NullPointer(ptr.clone()))?;
                let extents = self.eval_extents(frame, sizes)?;
                let value = self.reinterpret(frame, target, handle, extents)?;
                frame.locals.insert(target.clone(), value);
            }
            Stmt::If {
                condition,
                body,
                orelse,
            } => {
                let taken = match self.eval(frame, condition)? {
                    Value::Bool(b) => b,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "condition evaluated to {}",
                            other.type_name()
                        )))
                    }
                };
                self.exec_block(frame, if taken { body } else { orelse })?;
            }
            Stmt::Assign { lhs, rhs } => {
                let value = self.eval(frame, rhs)?;
                self.assign(frame, lhs, value, true)?;
            }
            Stmt::AliasAssign { lhs, rhs } => {
                let value = self.eval(frame, rhs)?;
                self.assign(frame, lhs, value, false)?;
            }
            Stmt::Allocate { var, shape } => {
                let extents = self.eval_extents(frame, shape)?;
                let value = match frame.declared_type(var) {
                    Some(ValueType::Class(class)) => Value::Object(self.heap.alloc_object(class)),
                    _ => Value::Array(self.heap.new_array(extents, self.target.storage_order())),
                };
                frame.locals.insert(var.clone(), value);
            }
            Stmt::For {
                element,
                iterable,
                counter,
                body,
            } => {
                let items = match self.lookup(frame, iterable)? {
                    Value::Array(view) => self.heap.elements(&view)?,
                    other => other.items().map(<[Value]>::to_vec).ok_or_else(|| {
                        EvalError::TypeMismatch(format!("cannot iterate over {}", other.type_name()))
                    })?,
                };
                for (position, item) in items.into_iter().enumerate() {
                    if let Some(counter) = counter {
                        frame
                            .locals
                            .insert(counter.clone(), Value::Int(position as i64));
                    }
                    frame.locals.insert(element.clone(), item);
                    self.exec_block(frame, body)?;
                }
            }
            Stmt::CLoc { source, ptr } => {
                // An optional that was never reconstructed has no address.
                let address = match self.lookup(frame, source) {
                    Ok(value) => Some(self.address_of(&value)?),
                    Err(EvalError::UndefinedVariable(_)) => None,
                    Err(err) => return Err(err),
                };
                frame.locals.insert(ptr.clone(), Value::Ptr(address));
            }
            Stmt::Deallocate { var } => match self.lookup(frame, var)? {
                Value::Object(handle) => self.heap.free(handle)?,
                Value::Array(view) => self.heap.free(view.buffer)?,
                other => {
                    return Err(EvalError::TypeMismatch(format!(
                        "cannot deallocate {}",
                        other.type_name()
                    )))
                }
            },
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
            }
        }
        Ok(())
    }

    /// Rebuild a native value from the buffer or object behind `handle`.
    fn reinterpret(
        &self,
        frame: &Frame<'m>,
        target: &str,
        handle: Handle,
        extents: Vec<usize>,
    ) -> EvalResult<Value> {
        if self.heap.is_object(handle) {
            return Ok(Value::Object(handle));
        }
        let data = self.heap.buffer(handle)?;
        let needed: usize = extents.iter().product();
        if data.len() < needed {
            return Err(EvalError::OutOfBounds {
                index: vec![needed as i64],
                extents: vec![data.len()],
            });
        }
        let head = || data[..needed].to_vec();
        Ok(match frame.declared_type(target) {
            Some(ValueType::List(_)) => Value::List(head()),
            Some(ValueType::Set(_)) => Value::Set(head()),
            Some(ValueType::HomogeneousTuple { .. }) => Value::Tuple(head()),
            Some(ValueType::Scalar(_)) => data
                .first()
                .cloned()
                .ok_or_else(|| EvalError::NullPointer(target.to_string()))?,
            _ => Value::Array(ArrayView::contiguous(
                handle,
                extents,
                self.target.storage_order(),
            )),
        })
    }

    /// Address handed back across the ABI for a native value.
    fn address_of(&mut self, value: &Value) -> EvalResult<Handle> {
        let order = self.target.storage_order();
        match value {
            Value::Object(handle) | Value::Ptr(Some(handle)) => Ok(*handle),
            Value::Array(view) => {
                if view.covers(self.heap.buffer(view.buffer)?.len(), order) {
                    return Ok(view.buffer);
                }
                let dense = self.heap.new_array(view.extents.clone(), order);
                self.heap.copy_into(&dense, value)?;
                Ok(dense.buffer)
            }
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                Ok(self.heap.alloc_buffer(items.clone()))
            }
            Value::Ptr(None) | Value::None => Err(EvalError::NullPointer(value.to_string())),
            scalar => Ok(self.heap.alloc_buffer(vec![scalar.clone()])),
        }
    }

    fn assign(&mut self, frame: &mut Frame<'m>, lhs: &Expr, value: Value, copy: bool) -> EvalResult<()> {
        match lhs {
            Expr::Var(name) => {
                // Assigning into allocated storage copies; anything else rebinds.
                match (frame.locals.get(name).cloned(), copy) {
                    (Some(Value::Array(dest)), true) if !matches!(value, Value::Ptr(_)) => {
                        self.heap.copy_into(&dest, &value)?;
                    }
                    (Some(Value::Object(dest)), true) => {
                        let fields = match &value {
                            Value::Object(src) => self.heap.object(*src)?.fields.clone(),
                            other => {
                                return Err(EvalError::TypeMismatch(format!(
                                    "cannot copy {} into an object",
                                    other.type_name()
                                )))
                            }
                        };
                        self.heap.object_mut(dest)?.fields = fields;
                    }
                    _ => {
                        frame.locals.insert(name.clone(), value);
                    }
                }
                Ok(())
            }
            Expr::Tuple(targets) => {
                let items = match value {
                    Value::Tuple(items) if items.len() == targets.len() => items,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot unpack {} into {} targets",
                            other.type_name(),
                            targets.len()
                        )))
                    }
                };
                for (target, item) in targets.iter().zip(items) {
                    self.assign(frame, target, item, copy)?;
                }
                Ok(())
            }
            Expr::Index { base, indices } => {
                let view = match self.lookup(frame, base)? {
                    Value::Array(view) => view,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot index into {}",
                            other.type_name()
                        )))
                    }
                };
                let position = self.element_position(frame, indices)?;
                self.heap.set_element(&view, &position, value)
            }
            Expr::Attribute { base, name } => {
                let handle = match self.eval(frame, base)? {
                    Value::Object(handle) => handle,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "{} has no attributes",
                            other.type_name()
                        )))
                    }
                };
                let stored = match value {
                    Value::Array(view) if copy => {
                        let dense = self
                            .heap
                            .new_array(view.extents.clone(), self.target.storage_order());
                        self.heap.copy_into(&dense, &Value::Array(view))?;
                        Value::Array(dense)
                    }
                    other => other,
                };
                self.heap
                    .object_mut(handle)?
                    .fields
                    .insert(name.clone(), stored);
                Ok(())
            }
            other => Err(EvalError::TypeMismatch(format!(
                "cannot assign to {other:?}"
            ))),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn lookup(&self, frame: &Frame<'m>, name: &str) -> EvalResult<Value> {
        frame
            .locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn eval_extents(&mut self, frame: &Frame<'m>, sizes: &[Expr]) -> EvalResult<Vec<usize>> {
        sizes
            .iter()
            .map(|e| self.eval(frame, e)?.as_extent())
            .collect()
    }

    /// 0-based position of an element index.
    fn element_position(&mut self, frame: &Frame<'m>, indices: &[IndexExpr]) -> EvalResult<Vec<usize>> {
        let base = self.target.index_base();
        indices
            .iter()
            .map(|i| match i {
                IndexExpr::Element(e) => {
                    let n = self.eval(frame, e)?.as_int()? - base;
                    usize::try_from(n).map_err(|_| EvalError::OutOfBounds {
                        index: vec![n + base],
                        extents: Vec::new(),
                    })
                }
                IndexExpr::Slice { .. } => Err(EvalError::TypeMismatch(
                    "slice used as an element index".to_string(),
                )),
            })
            .collect()
    }

    fn eval(&mut self, frame: &Frame<'m>, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Var(name) => self.lookup(frame, name),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Ptr(None)),
            Expr::IsNotNull(inner) => Ok(Value::Bool(!self.eval(frame, inner)?.is_null())),
            Expr::Add(a, b) => {
                let (a, b) = (self.eval(frame, a)?.as_int()?, self.eval(frame, b)?.as_int()?);
                Ok(Value::Int(a + b))
            }
            Expr::Mul(a, b) => {
                let (a, b) = (self.eval(frame, a)?.as_int()?, self.eval(frame, b)?.as_int()?);
                Ok(Value::Int(a * b))
            }
            Expr::Shape { var, dim } => {
                let extent = match self.lookup(frame, var)? {
                    Value::Array(view) => view.extents.get(*dim).copied(),
                    other => other.items().map(<[Value]>::len).filter(|_| *dim == 0),
                };
                extent
                    .map(|n| Value::Int(n as i64))
                    .ok_or_else(|| EvalError::TypeMismatch(format!("{var} has no dimension {dim}")))
            }
            Expr::Index { base, indices } => {
                let view = match self.lookup(frame, base)? {
                    Value::Array(view) => view,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot index into {}",
                            other.type_name()
                        )))
                    }
                };
                if indices.iter().all(|i| matches!(i, IndexExpr::Element(_))) {
                    let position = self.element_position(frame, indices)?;
                    return self.heap.element(&view, &position);
                }
                self.eval_slice(frame, view, indices).map(Value::Array)
            }
            Expr::Attribute { base, name } => match self.eval(frame, base)? {
                Value::Object(handle) => {
                    let object = self.heap.object(handle)?;
                    object
                        .fields
                        .get(name)
                        .cloned()
                        .ok_or_else(|| EvalError::MissingAttribute {
                            class: object.class.clone(),
                            attribute: name.clone(),
                        })
                }
                other => Err(EvalError::TypeMismatch(format!(
                    "{} has no attribute {name}",
                    other.type_name()
                ))),
            },
            Expr::Call { function, args } => self.eval_call(frame, function, args),
            Expr::Tuple(items) => items
                .iter()
                .map(|e| self.eval(frame, e))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Tuple),
        }
    }

    fn eval_slice(
        &mut self,
        frame: &Frame<'m>,
        view: ArrayView,
        indices: &[IndexExpr],
    ) -> EvalResult<ArrayView> {
        if indices.len() != view.rank() {
            return Err(EvalError::TypeMismatch(format!(
                "{} indices for an array of rank {}",
                indices.len(),
                view.rank()
            )));
        }
        let base = self.target.index_base();
        let mut out = view;
        for (dim, index) in indices.iter().enumerate() {
            let IndexExpr::Slice { start, stop, step } = index else {
                return Err(EvalError::TypeMismatch(
                    "element index mixed with slices".to_string(),
                ));
            };
            let start = self.eval(frame, start)?.as_int()? - base;
            let stop = match stop {
                Some(e) => Some(self.eval(frame, e)?.as_int()? - base + 1),
                None => None,
            };
            let step = self.eval(frame, step)?.as_extent()?;
            let as_position = |n: i64| {
                usize::try_from(n).map_err(|_| EvalError::OutOfBounds {
                    index: vec![n + base],
                    extents: out.extents.clone(),
                })
            };
            let start = as_position(start)?;
            let stop = stop.map(as_position).transpose()?;
            out = out.slice(dim, start, stop, step);
        }
        Ok(out)
    }

    fn eval_call(&mut self, frame: &Frame<'m>, function: &str, args: &[CallArgument]) -> EvalResult<Value> {
        let mut call_args = CallArgs::default();
        for (position, arg) in args.iter().enumerate() {
            let name = arg
                .keyword
                .clone()
                .unwrap_or_else(|| format!("#{position}"));
            let value = self.eval(frame, &arg.value)?;
            call_args.values.push((name, value));
        }

        let method_key = match &frame.function.origin {
            Origin::Method(key) => Some((key.class.clone(), function.to_string())),
            _ => None,
        };
        let host = method_key
            .and_then(|key| self.methods.get(&key))
            .or_else(|| self.hosts.get(function))
            .ok_or_else(|| EvalError::UnknownCallable(function.to_string()))?;
        trace!(callable = function, args = call_args.len(), "calling host");

        let mut results = host(&mut self.heap, &call_args)?;
        Ok(match results.len() {
            0 => Value::None,
            1 => results.remove(0),
            _ => Value::Tuple(results),
        })
    }
}
