//! The engine boundary.
//!
//! [`Engine`] is the foreign ABI as one trait: every method corresponds to
//! one exported engine function, takes and returns raw values, and reports
//! failure by returning `false` (or a null handle). No method interprets
//! failures; that is the job of [`Channel`](crate::Channel), which fetches
//! the last-error text right after a failing call.
//!
//! Two implementations are provided:
//!
//! - [`NativeEngine`] calls into the engine shared library (feature `native`)
//! - [`SimulatedEngine`] keeps elements in process and honors the same
//!   contract, including call-scoped validity of returned arrays

pub mod abi;
#[cfg(feature = "native")]
pub mod native;
pub mod simulated;

use std::ffi::CStr;

pub use abi::{CParamArray, CParamData, CParameter, RawHandle};
#[cfg(feature = "native")]
pub use native::NativeEngine;
pub use simulated::SimulatedEngine;

/// The engine's exported functions.
///
/// Name buffers follow C conventions: the engine writes a NUL-terminated
/// string of at most `buf.len()` bytes and fails when the name does not fit.
pub trait Engine {
    /// Instantiate an element of class `element_type`; 0 on failure.
    fn create_element(&mut self, element_type: &CStr, name: &CStr) -> RawHandle;

    fn delete_element(&mut self, element: RawHandle) -> bool;

    /// Handle of the element called `name`; 0 if there is none.
    fn find_element(&mut self, name: &CStr) -> RawHandle;

    fn is_element_valid(&mut self, element: RawHandle) -> bool;

    /// Downstream neighbour in the element chain, 0 at the end of the chain.
    fn next_element(&mut self, element: RawHandle, next: &mut RawHandle) -> bool;

    /// Upstream neighbour in the element chain, 0 at the start of the chain.
    fn previous_element(&mut self, element: RawHandle, previous: &mut RawHandle) -> bool;

    /// Link `next` downstream of `previous`.
    fn chain_elements(&mut self, previous: RawHandle, next: RawHandle) -> bool;

    fn element_name(&mut self, element: RawHandle, buf: &mut [u8]) -> bool;

    fn element_type(&mut self, element: RawHandle, buf: &mut [u8]) -> bool;

    /// One step of element enumeration. `cursor` is 0 on the first call and
    /// is reset to 0 by the engine after the last element.
    fn enumerate_elements(
        &mut self,
        cursor: &mut RawHandle,
        element: &mut RawHandle,
        buf: &mut [u8],
    ) -> bool;

    fn release_element_enum(&mut self, cursor: RawHandle) -> bool;

    fn parameter_flags(&mut self, element: RawHandle, name: &CStr, flags: &mut u32) -> bool;

    /// Dims of an array parameter; `dims[0]` is the fast-varying dimension.
    fn parameter_array_dims(&mut self, element: RawHandle, name: &CStr, dims: &mut [i64; 2])
        -> bool;

    /// Fetch a scalar parameter. Only the scalar member of `out` is written.
    fn get_parameter(&mut self, element: RawHandle, name: &CStr, out: &mut CParameter) -> bool;

    /// Copy an array parameter into caller storage.
    ///
    /// # Safety
    ///
    /// `out` must have `ARRAY_DATA` set and its array member must point to a
    /// header whose `data` is valid for writes of `max_size` values.
    unsafe fn get_array_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        out: &mut CParameter,
        max_size: usize,
    ) -> bool;

    /// Store a parameter.
    ///
    /// # Safety
    ///
    /// If `param` has `ARRAY_DATA` set, its array member must point to a
    /// header whose `data` is valid for reads of `dims[0] * dims[1]` values.
    unsafe fn set_parameter(&mut self, element: RawHandle, name: &CStr, param: CParameter)
        -> bool;

    /// One step of parameter enumeration.
    ///
    /// `out` must not carry `ARRAY_DATA` on the first step. When a step
    /// returns an array, its array member points to engine memory that the
    /// engine frees when the same record is handed back, either to the next
    /// step or to [`Engine::release_parameter_enum`].
    fn enumerate_parameters(
        &mut self,
        element: RawHandle,
        cursor: &mut RawHandle,
        buf: &mut [u8],
        out: &mut CParameter,
    ) -> bool;

    /// Release an enumeration cursor and the array held by `record`, if any
    ///
    /// `cursor` may be 0 when only the record needs clearing; the return
    /// value is then `false`.
    fn release_parameter_enum(&mut self, cursor: RawHandle, record: Option<&mut CParameter>) -> bool;

    /// Copy the pending error message into `buf`; `false` when no error is pending.
    fn last_error(&mut self, buf: &mut [u8]) -> bool;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn create_element(&mut self, element_type: &CStr, name: &CStr) -> RawHandle {
        (**self).create_element(element_type, name)
    }

    fn delete_element(&mut self, element: RawHandle) -> bool {
        (**self).delete_element(element)
    }

    fn find_element(&mut self, name: &CStr) -> RawHandle {
        (**self).find_element(name)
    }

    fn is_element_valid(&mut self, element: RawHandle) -> bool {
        (**self).is_element_valid(element)
    }

    fn next_element(&mut self, element: RawHandle, next: &mut RawHandle) -> bool {
        (**self).next_element(element, next)
    }

    fn previous_element(&mut self, element: RawHandle, previous: &mut RawHandle) -> bool {
        (**self).previous_element(element, previous)
    }

    fn chain_elements(&mut self, previous: RawHandle, next: RawHandle) -> bool {
        (**self).chain_elements(previous, next)
    }

    fn element_name(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        (**self).element_name(element, buf)
    }

    fn element_type(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        (**self).element_type(element, buf)
    }

    fn enumerate_elements(
        &mut self,
        cursor: &mut RawHandle,
        element: &mut RawHandle,
        buf: &mut [u8],
    ) -> bool {
        (**self).enumerate_elements(cursor, element, buf)
    }

    fn release_element_enum(&mut self, cursor: RawHandle) -> bool {
        (**self).release_element_enum(cursor)
    }

    fn parameter_flags(&mut self, element: RawHandle, name: &CStr, flags: &mut u32) -> bool {
        (**self).parameter_flags(element, name, flags)
    }

    fn parameter_array_dims(
        &mut self,
        element: RawHandle,
        name: &CStr,
        dims: &mut [i64; 2],
    ) -> bool {
        (**self).parameter_array_dims(element, name, dims)
    }

    fn get_parameter(&mut self, element: RawHandle, name: &CStr, out: &mut CParameter) -> bool {
        (**self).get_parameter(element, name, out)
    }

    unsafe fn get_array_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        out: &mut CParameter,
        max_size: usize,
    ) -> bool {
        (**self).get_array_parameter(element, name, out, max_size)
    }

    unsafe fn set_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        param: CParameter,
    ) -> bool {
        (**self).set_parameter(element, name, param)
    }

    fn enumerate_parameters(
        &mut self,
        element: RawHandle,
        cursor: &mut RawHandle,
        buf: &mut [u8],
        out: &mut CParameter,
    ) -> bool {
        (**self).enumerate_parameters(element, cursor, buf, out)
    }

    fn release_parameter_enum(&mut self, cursor: RawHandle, record: Option<&mut CParameter>) -> bool {
        (**self).release_parameter_enum(cursor, record)
    }

    fn last_error(&mut self, buf: &mut [u8]) -> bool {
        (**self).last_error(buf)
    }
}
