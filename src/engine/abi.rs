//! `#[repr(C)]` records exchanged with the engine.
//!
//! These mirror the engine's C declarations byte for byte:
//!
//! ```c
//! struct ArrayParameter { int64_t dims[2]; double* data; };
//! struct Parameter {
//!     union { double value; ArrayParameter* paramArray; };
//!     double bounds[2];
//!     double multiplier;
//!     int32_t type;
//!     int32_t group;
//!     uint32_t flags;
//! };
//! ```
//!
//! Nothing here owns memory. Pointers inside these records are only valid
//! for the duration of the call they were built for.

use std::fmt;

use ndarray::Array2;

use crate::error::{OptixError, Result};
use crate::parameters::parameter::ParameterFlags;

/// Engine handle as passed across the ABI; 0 is the null handle.
pub type RawHandle = usize;

/// Header describing a 2-D `f64` array.
///
/// `dims[0]` is the fast-varying dimension, i.e. the number of columns of
/// the row-major host view.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CParamArray {
    pub dims: [i64; 2],
    pub data: *mut f64,
}

impl CParamArray {
    /// Header with no storage.
    pub fn null() -> Self {
        Self {
            dims: [0, 0],
            data: std::ptr::null_mut(),
        }
    }

    /// Number of elements described, or `None` for negative or overflowing dims.
    pub fn len(&self) -> Option<usize> {
        let d0 = usize::try_from(self.dims[0]).ok()?;
        let d1 = usize::try_from(self.dims[1]).ok()?;
        d0.checked_mul(d1)
    }

    /// Copy the described array into host-owned storage of shape `(dims[1], dims[0])`.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `dims[0] * dims[1]` values for the
    /// duration of this call.
    pub unsafe fn copy_to_owned(&self) -> Result<Array2<f64>> {
        let len = self.len().ok_or_else(|| {
            OptixError::InvalidState(format!("engine reported invalid array dims {:?}", self.dims))
        })?;
        let shape = (self.dims[1] as usize, self.dims[0] as usize);
        if len == 0 {
            return Ok(Array2::zeros(shape));
        }
        if self.data.is_null() {
            return Err(OptixError::InvalidState(
                "engine reported an array with no storage".to_string(),
            ));
        }

        let values = std::slice::from_raw_parts(self.data as *const f64, len).to_vec();
        Array2::from_shape_vec(shape, values)
            .map_err(|e| OptixError::InvalidState(format!("array shape: {}", e)))
    }
}

/// Payload union: the active member is selected by the `ARRAY_DATA` flag bit.
#[repr(C)]
#[derive(Clone, Copy)]
pub union CParamData {
    pub value: f64,
    pub p_array: *mut CParamArray,
}

/// Parameter record as laid out by the engine.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CParameter {
    pub data: CParamData,
    pub bounds: [f64; 2],
    pub multiplier: f64,
    pub unit_type: i32,
    pub group: i32,
    pub flags: u32,
}

impl CParameter {
    /// A scalar record with the engine's default field values.
    pub fn new() -> Self {
        Self {
            data: CParamData { value: 0.0 },
            bounds: [0.0, 0.0],
            multiplier: 1.0,
            unit_type: 0,
            group: 0,
            flags: 0,
        }
    }

    /// Whether the record claims the array member is active.
    pub fn is_array(&self) -> bool {
        self.flags & ParameterFlags::ARRAY_DATA.bits() != 0
    }

    /// Scalar payload, if the scalar member is active.
    pub fn value(&self) -> Option<f64> {
        if self.is_array() {
            None
        } else {
            // SAFETY: the flag says `value` is the active member, and every
            // bit pattern is a valid f64.
            Some(unsafe { self.data.value })
        }
    }

    /// Array header pointer, if the array member is active and non-null.
    pub fn array_ptr(&self) -> Option<*mut CParamArray> {
        if !self.is_array() {
            return None;
        }
        // SAFETY: the flag says `p_array` is the active member.
        let ptr = unsafe { self.data.p_array };
        if ptr.is_null() {
            None
        } else {
            Some(ptr)
        }
    }
}

impl Default for CParameter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CParameter");
        match self.value() {
            Some(value) => s.field("value", &value),
            None => s.field("p_array", &self.array_ptr()),
        };
        s.field("bounds", &self.bounds)
            .field("multiplier", &self.multiplier)
            .field("unit_type", &self.unit_type)
            .field("group", &self.group)
            .field("flags", &format_args!("{:#x}", self.flags))
            .finish()
    }
}
