//! Array-valued parameter storage
//!
//! The engine and the host disagree on axis order: the engine's `dims[0]`
//! is its fast-varying dimension, which for a row-major host array is the
//! number of columns. A host array of shape `(rows, cols)` is therefore
//! described to the engine as `dims = [cols, rows]`, and an engine array of
//! dims `[d0, d1]` is received into a host array of shape `(d1, d0)`.
//!
//! Storage is always owned by the host. Headers pointing into it are built
//! per call and borrow the array, so they cannot outlive it.

use std::marker::PhantomData;

use ndarray::{Array2, ArrayBase, ArrayD, ArrayView2, ArrayViewMut2, Data, Ix2};
use serde::{Deserialize, Serialize};

use crate::engine::abi::CParamArray;
use crate::error::{OptixError, Result};

/// Largest integer magnitude an `f64` represents exactly.
const F64_EXACT_INT: u64 = 1 << 53;

/// Host-owned 2-D `f64` array installed in a [`Parameter`](super::Parameter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamArray {
    data: Array2<f64>,
}

impl ParamArray {
    /// Wrap an owned array, converting it to contiguous row-major layout if needed
    pub fn from_array(data: Array2<f64>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    /// Build from a numeric 2-D array, widening every element to `f64`
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use optix_rs::parameters::ParamArray;
    ///
    /// let limits = ParamArray::widen(&array![[-10i32, 10], [-5, 5]]);
    /// assert_eq!(limits.dims(), [2, 2]);
    /// assert_eq!(limits.as_slice()[1], 10.0);
    /// ```
    pub fn widen<A, S>(array: &ArrayBase<S, Ix2>) -> Self
    where
        A: Copy + Into<f64>,
        S: Data<Elem = A>,
    {
        Self::from_array(array.mapv(|v| v.into()))
    }

    /// Build from row-major values
    pub fn from_shape_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| OptixError::TypeMismatch(format!("array shape: {}", e)))?;
        Ok(Self { data })
    }

    /// Zero-filled storage sized for engine dims `[d0, d1]`
    pub fn zeros_for_dims(dims: [i64; 2]) -> Result<Self> {
        let (d0, d1) = match (usize::try_from(dims[0]), usize::try_from(dims[1])) {
            (Ok(d0), Ok(d1)) if d0.checked_mul(d1).is_some() => (d0, d1),
            _ => {
                return Err(OptixError::InvalidState(format!(
                    "cannot size an array buffer for dims {:?}",
                    dims
                )))
            }
        };
        Ok(Self {
            data: Array2::zeros((d1, d0)),
        })
    }

    /// Engine dims: `[cols, rows]`
    pub fn dims(&self) -> [i64; 2] {
        [self.cols() as i64, self.rows() as i64]
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Host view, shape `(rows, cols)`
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Mutable host view; the shape stays fixed
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    /// Values in engine memory order
    pub fn as_slice(&self) -> &[f64] {
        // Standard layout is maintained by every constructor
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }

    /// Header over this storage for a call in which the engine only reads it
    pub(crate) fn header(&self) -> ArrayHeader<'_> {
        ArrayHeader {
            raw: CParamArray {
                dims: self.dims(),
                data: self.data.as_ptr() as *mut f64,
            },
            _storage: PhantomData,
        }
    }

    /// Header over this storage for a call in which the engine writes into it
    pub(crate) fn header_mut(&mut self) -> ArrayHeader<'_> {
        let dims = self.dims();
        ArrayHeader {
            raw: CParamArray {
                dims,
                data: self.data.as_mut_ptr(),
            },
            _storage: PhantomData,
        }
    }
}

impl From<Array2<f64>> for ParamArray {
    fn from(data: Array2<f64>) -> Self {
        Self::from_array(data)
    }
}

/// A raw array header that borrows the storage it describes
pub(crate) struct ArrayHeader<'a> {
    raw: CParamArray,
    _storage: PhantomData<&'a mut [f64]>,
}

impl ArrayHeader<'_> {
    pub(crate) fn as_mut_ptr(&mut self) -> *mut CParamArray {
        &mut self.raw
    }

    /// Dims as last written by the engine
    pub(crate) fn dims(&self) -> [i64; 2] {
        self.raw.dims
    }
}

/// Receive buffer for the array read path
///
/// A buffer starts `Unsized`; it can only receive data once it has been
/// sized from a dimension query.
#[derive(Debug, Default)]
pub enum ArrayBuffer {
    #[default]
    Unsized,
    Sized(ParamArray),
}

impl ArrayBuffer {
    /// Allocate storage for an array of engine dims `[d0, d1]`
    pub fn with_dims(dims: [i64; 2]) -> Result<Self> {
        Ok(ArrayBuffer::Sized(ParamArray::zeros_for_dims(dims)?))
    }

    pub fn is_sized(&self) -> bool {
        matches!(self, ArrayBuffer::Sized(_))
    }

    /// Number of values the buffer can receive
    pub fn capacity(&self) -> usize {
        match self {
            ArrayBuffer::Unsized => 0,
            ArrayBuffer::Sized(array) => array.len(),
        }
    }

    pub fn take(&mut self) -> Option<ParamArray> {
        match std::mem::take(self) {
            ArrayBuffer::Unsized => None,
            ArrayBuffer::Sized(array) => Some(array),
        }
    }

    pub(crate) fn sized_mut(&mut self) -> Result<&mut ParamArray> {
        match self {
            ArrayBuffer::Sized(array) => Ok(array),
            ArrayBuffer::Unsized => Err(OptixError::InvalidState(
                "array copy requested before the receive buffer was sized".to_string(),
            )),
        }
    }
}

/// A dynamically typed value handed over by a scripting host
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Number(f64),
    Bool(bool),
    Text(String),
    F64Array(ArrayD<f64>),
    F32Array(ArrayD<f32>),
    I32Array(ArrayD<i32>),
    I64Array(ArrayD<i64>),
}

impl HostValue {
    /// Name of the value kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Number(_) => "number",
            HostValue::Bool(_) => "bool",
            HostValue::Text(_) => "text",
            HostValue::F64Array(_) => "float64 array",
            HostValue::F32Array(_) => "float32 array",
            HostValue::I32Array(_) => "int32 array",
            HostValue::I64Array(_) => "int64 array",
        }
    }
}

fn to_matrix<A: Clone>(array: &ArrayD<A>, kind: &str) -> Result<Array2<A>> {
    array
        .clone()
        .into_dimensionality::<Ix2>()
        .map_err(|_| {
            OptixError::TypeMismatch(format!(
                "a 2-D array was expected, but the {} has {} dimension(s)",
                kind,
                array.ndim()
            ))
        })
}

impl TryFrom<&HostValue> for ParamArray {
    type Error = OptixError;

    fn try_from(value: &HostValue) -> Result<Self> {
        let kind = value.kind();
        match value {
            HostValue::F64Array(a) => Ok(ParamArray::from_array(to_matrix(a, kind)?)),
            HostValue::F32Array(a) => Ok(ParamArray::widen(&to_matrix(a, kind)?)),
            HostValue::I32Array(a) => Ok(ParamArray::widen(&to_matrix(a, kind)?)),
            HostValue::I64Array(a) => {
                let matrix = to_matrix(a, kind)?;
                if let Some(v) = matrix.iter().find(|v| v.unsigned_abs() > F64_EXACT_INT) {
                    return Err(OptixError::TypeMismatch(format!(
                        "int64 value {} cannot be converted to float64 without loss",
                        v
                    )));
                }
                Ok(ParamArray::from_array(matrix.mapv(|v| v as f64)))
            }
            HostValue::Number(_) | HostValue::Bool(_) | HostValue::Text(_) => {
                Err(OptixError::TypeMismatch(format!(
                    "an array argument was expected, but the received argument is a {}",
                    kind
                )))
            }
        }
    }
}
