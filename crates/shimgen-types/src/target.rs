use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::StorageOrder;

/// Native language the wrapped module was compiled to.
///
/// The target fixes the native storage order, the index base used when
/// slicing reinterpreted arrays, and which module features can be exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Fortran,
    Cuda,
}

impl Target {
    pub fn storage_order(self) -> StorageOrder {
        match self {
            Target::Fortran => StorageOrder::ColumnMajor,
            Target::Cuda => StorageOrder::RowMajor,
        }
    }

    /// First valid index of a native array.
    pub fn index_base(self) -> i64 {
        match self {
            Target::Fortran => 1,
            Target::Cuda => 0,
        }
    }

    pub fn supports_interfaces(self) -> bool {
        matches!(self, Target::Fortran)
    }

    pub fn supports_classes(self) -> bool {
        matches!(self, Target::Fortran)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Fortran => write!(f, "fortran"),
            Target::Cuda => write!(f, "cuda"),
        }
    }
}
