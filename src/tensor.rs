use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnalysisError;

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F16,
    #[default]
    F32,
    F64,
    I8,
    I32,
    I64,
    U8,
    U32,
}

impl DataType {
    /// Bytes occupied by a single element of this type.
    pub fn byte_width(&self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 => 8,
        }
    }
}

/// Immutable descriptor of one named tensor: shape, element type and the
/// byte size derived from both. `size_bytes` is computed once here and
/// never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    pub dims: Vec<usize>,
    pub dtype: DataType,
    pub size_bytes: usize,
}

impl TensorInfo {
    pub fn new(
        name: impl Into<String>,
        dims: Vec<usize>,
        dtype: DataType,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if dims.is_empty() || dims.contains(&0) {
            return Err(AnalysisError::InvalidShape {
                name,
                dims: dims.iter().map(|&d| d as i64).collect(),
            });
        }
        let size_bytes = dims.iter().product::<usize>() * dtype.byte_width();
        Ok(Self {
            name,
            dims,
            dtype,
            size_bytes,
        })
    }

    /// Builds a descriptor from the document's signed dimension values
    /// (initializer records and declared I/O use i64 on the wire).
    pub fn from_document(
        name: impl Into<String>,
        dims: &[i64],
        dtype: DataType,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if dims.is_empty() || dims.iter().any(|&d| d <= 0) {
            return Err(AnalysisError::InvalidShape {
                name,
                dims: dims.to_vec(),
            });
        }
        Self::new(name, dims.iter().map(|&d| d as usize).collect(), dtype)
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

impl fmt::Display for TensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor '{}', shape: {:?}, size: {} bytes",
            self.name, self.dims, self.size_bytes
        )
    }
}
