//! Runtime values.

use serde::Serialize;
use std::fmt;

use shimgen_types::ast::StorageOrder;
use shimgen_types::layout::ArrayLayout;

use crate::error::{EvalError, EvalResult};

/// Address of a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Handle(pub usize);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A strided window onto a heap buffer.
///
/// Indices are 0-based and logical; `strides` are in elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayView {
    pub buffer: Handle,
    pub offset: usize,
    pub extents: Vec<usize>,
    pub strides: Vec<usize>,
}

impl ArrayView {
    /// A dense view of `buffer` laid out in `order`.
    pub fn contiguous(buffer: Handle, extents: Vec<usize>, order: StorageOrder) -> Self {
        let strides = ArrayLayout::new(extents.clone(), order).strides();
        Self {
            buffer,
            offset: 0,
            extents,
            strides,
        }
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat buffer position of a logical index.
    pub fn flat_index(&self, index: &[usize]) -> EvalResult<usize> {
        let in_bounds = index.len() == self.extents.len()
            && index.iter().zip(&self.extents).all(|(i, e)| i < e);
        if !in_bounds {
            return Err(EvalError::OutOfBounds {
                index: index.iter().map(|&i| i as i64).collect(),
                extents: self.extents.clone(),
            });
        }
        Ok(self.offset
            + index
                .iter()
                .zip(&self.strides)
                .map(|(i, s)| i * s)
                .sum::<usize>())
    }

    /// Restrict dimension `dim` to `start..stop` taking every `step`-th element.
    pub fn slice(&self, dim: usize, start: usize, stop: Option<usize>, step: usize) -> Self {
        let mut view = self.clone();
        let end = stop.map_or(self.extents[dim], |s| s.min(self.extents[dim]));
        let step = step.max(1);
        view.extents[dim] = if start < end {
            (end - start).div_ceil(step)
        } else {
            0
        };
        view.offset += start * self.strides[dim];
        view.strides[dim] *= step;
        view
    }

    /// True when the view is exactly a dense `order` layout of a buffer of
    /// `buffer_len` elements.
    pub fn covers(&self, buffer_len: usize, order: StorageOrder) -> bool {
        self.offset == 0
            && self.len() == buffer_len
            && self.strides == ArrayLayout::new(self.extents.clone(), order).strides()
    }
}

/// Every logical index of an array with `extents`, last index fastest.
pub(crate) fn logical_indices(extents: &[usize]) -> Vec<Vec<usize>> {
    let total: usize = extents.iter().product();
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return out;
    }
    let mut index = vec![0; extents.len()];
    for _ in 0..total {
        out.push(index.clone());
        for d in (0..extents.len()).rev() {
            index[d] += 1;
            if index[d] < extents[d] {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Opaque ABI pointer; `None` is null.
    Ptr(Option<Handle>),
    Array(ArrayView),
    /// Reference to a class instance on the heap.
    Object(Handle),
    List(Vec<Value>),
    /// Elements in iteration order.
    Set(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Ptr(_) => "pointer",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Ptr(None) | Value::None)
    }

    pub fn as_int(&self) -> EvalResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(EvalError::TypeMismatch(format!(
                "expected int, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_float(&self) -> EvalResult<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            Value::Int(n) => Ok(*n as f64),
            other => Err(EvalError::TypeMismatch(format!(
                "expected float, got {}",
                other.type_name()
            ))),
        }
    }

    /// A non-negative extent or position.
    pub fn as_extent(&self) -> EvalResult<usize> {
        let n = self.as_int()?;
        usize::try_from(n)
            .map_err(|_| EvalError::TypeMismatch(format!("negative extent {n}")))
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Ptr(Some(h)) | Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    /// Elements of a one-dimensional collection value.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Ptr(None) => write!(f, "null"),
            Value::Ptr(Some(h)) => write!(f, "ptr {h}"),
            Value::Array(view) => write!(f, "array {} {:?}", view.buffer, view.extents),
            Value::Object(h) => write!(f, "object {h}"),
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                let (open, close) = match self {
                    Value::List(_) => ("[", "]"),
                    Value::Set(_) => ("{", "}"),
                    _ => ("(", ")"),
                };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
        }
    }
}
