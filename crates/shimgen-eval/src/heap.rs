//! Heap of flat buffers and class instances.

use serde::Serialize;
use std::collections::BTreeMap;

use shimgen_types::ast::StorageOrder;

use crate::error::{EvalError, EvalResult};
use crate::value::{logical_indices, ArrayView, Handle, Value};

/// A class instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Object {
    pub class: String,
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Buffer(Vec<Value>),
    Object(Object),
    Freed,
}

/// Handles are never reused, so a freed handle stays dangling.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    cells: Vec<Cell>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, cell: Cell) -> Handle {
        self.cells.push(cell);
        Handle(self.cells.len() - 1)
    }

    pub fn alloc_buffer(&mut self, data: Vec<Value>) -> Handle {
        self.push(Cell::Buffer(data))
    }

    pub fn alloc_object(&mut self, class: &str) -> Handle {
        self.push(Cell::Object(Object {
            class: class.to_string(),
            fields: BTreeMap::new(),
        }))
    }

    /// A zero-filled dense array.
    pub fn new_array(&mut self, extents: Vec<usize>, order: StorageOrder) -> ArrayView {
        let len = extents.iter().product();
        let buffer = self.alloc_buffer(vec![Value::Int(0); len]);
        ArrayView::contiguous(buffer, extents, order)
    }

    pub fn is_object(&self, handle: Handle) -> bool {
        matches!(self.cells.get(handle.0), Some(Cell::Object(_)))
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        matches!(
            self.cells.get(handle.0),
            Some(Cell::Buffer(_) | Cell::Object(_))
        )
    }

    pub fn buffer(&self, handle: Handle) -> EvalResult<&[Value]> {
        match self.cells.get(handle.0) {
            Some(Cell::Buffer(data)) => Ok(data),
            Some(Cell::Object(o)) => Err(EvalError::TypeMismatch(format!(
                "{handle} is a {} instance, not a buffer",
                o.class
            ))),
            _ => Err(EvalError::DanglingHandle(handle.0)),
        }
    }

    fn buffer_mut(&mut self, handle: Handle) -> EvalResult<&mut Vec<Value>> {
        match self.cells.get_mut(handle.0) {
            Some(Cell::Buffer(data)) => Ok(data),
            Some(Cell::Object(_)) => Err(EvalError::TypeMismatch(format!(
                "{handle} is an object, not a buffer"
            ))),
            _ => Err(EvalError::DanglingHandle(handle.0)),
        }
    }

    pub fn object(&self, handle: Handle) -> EvalResult<&Object> {
        match self.cells.get(handle.0) {
            Some(Cell::Object(o)) => Ok(o),
            Some(Cell::Buffer(_)) => Err(EvalError::TypeMismatch(format!(
                "{handle} is a buffer, not an object"
            ))),
            _ => Err(EvalError::DanglingHandle(handle.0)),
        }
    }

    pub fn object_mut(&mut self, handle: Handle) -> EvalResult<&mut Object> {
        match self.cells.get_mut(handle.0) {
            Some(Cell::Object(o)) => Ok(o),
            Some(Cell::Buffer(_)) => Err(EvalError::TypeMismatch(format!(
                "{handle} is a buffer, not an object"
            ))),
            _ => Err(EvalError::DanglingHandle(handle.0)),
        }
    }

    pub fn free(&mut self, handle: Handle) -> EvalResult<()> {
        match self.cells.get_mut(handle.0) {
            Some(cell) if !matches!(cell, Cell::Freed) => {
                *cell = Cell::Freed;
                Ok(())
            }
            _ => Err(EvalError::DanglingHandle(handle.0)),
        }
    }

    // ── Array access ──

    pub fn element(&self, view: &ArrayView, index: &[usize]) -> EvalResult<Value> {
        let flat = view.flat_index(index)?;
        self.buffer(view.buffer)?
            .get(flat)
            .cloned()
            .ok_or_else(|| EvalError::OutOfBounds {
                index: index.iter().map(|&i| i as i64).collect(),
                extents: view.extents.clone(),
            })
    }

    pub fn set_element(&mut self, view: &ArrayView, index: &[usize], value: Value) -> EvalResult<()> {
        let flat = view.flat_index(index)?;
        let data = self.buffer_mut(view.buffer)?;
        match data.get_mut(flat) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EvalError::OutOfBounds {
                index: index.iter().map(|&i| i as i64).collect(),
                extents: view.extents.clone(),
            }),
        }
    }

    /// Elements of `view` in logical order, last index fastest.
    pub fn elements(&self, view: &ArrayView) -> EvalResult<Vec<Value>> {
        logical_indices(&view.extents)
            .iter()
            .map(|index| self.element(view, index))
            .collect()
    }

    /// Copy `source` element by element into `dest`; the lengths must agree.
    pub fn copy_into(&mut self, dest: &ArrayView, source: &Value) -> EvalResult<()> {
        let items = match source {
            Value::Array(view) => self.elements(view)?,
            other => match other.items() {
                Some(items) => items.to_vec(),
                None => vec![other.clone()],
            },
        };
        let indices = logical_indices(&dest.extents);
        if indices.len() != items.len() {
            return Err(EvalError::TypeMismatch(format!(
                "cannot copy {} elements into an array of extents {:?}",
                items.len(),
                dest.extents
            )));
        }
        for (index, item) in indices.iter().zip(items) {
            self.set_element(dest, index, item)?;
        }
        Ok(())
    }
}
