//! Storage-order translation and logical-to-flat index mapping.
//!
//! [`for_target`] is the only place a per-dimension list (shape, strides) is
//! translated between storage orders. A row-major `3×4` buffer seen from a
//! column-major consumer is a `4×3` array whose element `(j, i)` is the
//! producer's `(i, j)`.

use crate::ast::StorageOrder;

impl StorageOrder {
    /// True when data in `self` order is consumed in `target` order.
    pub fn crosses(self, target: StorageOrder) -> bool {
        self != target
    }
}

/// Reorder a per-dimension list declared in `from` order for a consumer in
/// `to` order: the list is reversed iff the orders differ.
pub fn for_target<T: Clone>(dims: &[T], from: StorageOrder, to: StorageOrder) -> Vec<T> {
    if from.crosses(to) {
        dims.iter().rev().cloned().collect()
    } else {
        dims.to_vec()
    }
}

/// Extents of a dense array together with its storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLayout {
    pub extents: Vec<usize>,
    pub order: StorageOrder,
}

impl ArrayLayout {
    pub fn new(extents: Vec<usize>, order: StorageOrder) -> Self {
        Self { extents, order }
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

    /// Element strides (in elements, not bytes) of a contiguous array.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![0; self.extents.len()];
        let mut acc = 1;
        match self.order {
            StorageOrder::ColumnMajor => {
                for (i, extent) in self.extents.iter().enumerate() {
                    strides[i] = acc;
                    acc *= extent;
                }
            }
            StorageOrder::RowMajor => {
                for (i, extent) in self.extents.iter().enumerate().rev() {
                    strides[i] = acc;
                    acc *= extent;
                }
            }
        }
        strides
    }

    /// Flat offset of a 0-based logical index, or `None` when out of bounds.
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.extents.len() {
            return None;
        }
        if index.iter().zip(&self.extents).any(|(i, e)| i >= e) {
            return None;
        }
        Some(index.iter().zip(self.strides()).map(|(i, s)| i * s).sum())
    }

    /// The same buffer described for a consumer in `order`.
    pub fn reinterpret(&self, order: StorageOrder) -> ArrayLayout {
        ArrayLayout::new(for_target(&self.extents, self.order, order), order)
    }
}
