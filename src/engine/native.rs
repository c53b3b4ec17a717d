//! The engine shared library, loaded at runtime.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::Path;

use libloading::Library;
use log::debug;

use super::abi::{CParameter, RawHandle};
use super::Engine;
use crate::error::{OptixError, Result};

type CreateElementFn = unsafe extern "C" fn(*const c_char, *const c_char, *mut usize) -> bool;
type HandleFn = unsafe extern "C" fn(usize) -> bool;
type FindElementFn = unsafe extern "C" fn(*const c_char, *mut usize) -> bool;
type IsElementValidFn = unsafe extern "C" fn(usize, *mut bool) -> bool;
type NeighbourFn = unsafe extern "C" fn(usize, *mut usize) -> bool;
type ChainFn = unsafe extern "C" fn(usize, usize) -> bool;
type ElementStringFn = unsafe extern "C" fn(usize, *mut c_char, c_int) -> bool;
type EnumerateElementsFn = unsafe extern "C" fn(*mut usize, *mut usize, *mut c_char, c_int) -> bool;
type FlagsFn = unsafe extern "C" fn(usize, *const c_char, *mut u32) -> bool;
type DimsFn = unsafe extern "C" fn(usize, *const c_char, *mut [i64; 2]) -> bool;
type GetParameterFn = unsafe extern "C" fn(usize, *const c_char, *mut CParameter) -> bool;
type GetArrayParameterFn =
    unsafe extern "C" fn(usize, *const c_char, *mut CParameter, usize) -> bool;
type SetParameterFn = unsafe extern "C" fn(usize, *const c_char, CParameter) -> bool;
type EnumerateParametersFn =
    unsafe extern "C" fn(usize, *mut usize, *mut c_char, c_int, *mut CParameter) -> bool;
type ReleaseParameterEnumFn = unsafe extern "C" fn(usize, *mut CParameter) -> bool;
type LastErrorFn = unsafe extern "C" fn(*mut c_char, c_int) -> bool;

/// Exported functions, resolved once when the library is loaded
struct Symbols {
    create_element: CreateElementFn,
    delete_element: HandleFn,
    find_element: FindElementFn,
    is_element_valid: IsElementValidFn,
    next_element: NeighbourFn,
    previous_element: NeighbourFn,
    chain_elements: ChainFn,
    element_name: ElementStringFn,
    element_type: ElementStringFn,
    enumerate_elements: EnumerateElementsFn,
    release_element_enum: HandleFn,
    parameter_flags: FlagsFn,
    parameter_array_dims: DimsFn,
    get_parameter: GetParameterFn,
    get_array_parameter: GetArrayParameterFn,
    set_parameter: SetParameterFn,
    enumerate_parameters: EnumerateParametersFn,
    release_parameter_enum: ReleaseParameterEnumFn,
    last_error: LastErrorFn,
}

/// Resolve `$name` from `$lib` as a copied function pointer.
macro_rules! resolve {
    ($lib:expr, $path:expr, $name:literal, $ty:ty) => {{
        let symbol = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }.map_err(|e| {
            OptixError::Library(format!("function '{}' not found in '{}': {}", $name, $path, e))
        })?;
        *symbol
    }};
}

/// The OptiX engine loaded from a shared library
///
/// The function pointers stay valid for as long as the library is loaded,
/// i.e. for the lifetime of this value.
pub struct NativeEngine {
    symbols: Symbols,
    path: String,
    _library: Library,
}

impl NativeEngine {
    /// Load the engine from a path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        // Loading runs the library's initialisers
        let library = unsafe { Library::new(path) }.map_err(|e| {
            OptixError::Library(format!("Failed to load library '{}': {}", display, e))
        })?;
        Self::from_library(library, display)
    }

    /// Load a library by name, searching standard paths.
    ///
    /// The name should be the base name without extension (e.g., "OptiX").
    pub fn load_by_name(name: &str) -> Result<Self> {
        let lib_name = Self::platform_lib_name(name);

        let library = unsafe { Library::new(&lib_name) }.map_err(|e| {
            OptixError::Library(format!(
                "Failed to load library '{}' (tried '{}'): {}",
                name, lib_name, e
            ))
        })?;
        Self::from_library(library, lib_name)
    }

    fn from_library(library: Library, path: String) -> Result<Self> {
        let symbols = Symbols {
            create_element: resolve!(library, path, "CreateElement", CreateElementFn),
            delete_element: resolve!(library, path, "DeleteElement_byID", HandleFn),
            find_element: resolve!(library, path, "FindElementID", FindElementFn),
            is_element_valid: resolve!(library, path, "IsElementValid", IsElementValidFn),
            next_element: resolve!(library, path, "GetNextElement", NeighbourFn),
            previous_element: resolve!(library, path, "GetPreviousElement", NeighbourFn),
            chain_elements: resolve!(library, path, "ChainElement_byID", ChainFn),
            element_name: resolve!(library, path, "GetElementName", ElementStringFn),
            element_type: resolve!(library, path, "GetElementType", ElementStringFn),
            enumerate_elements: resolve!(library, path, "EnumerateElements", EnumerateElementsFn),
            release_element_enum: resolve!(library, path, "ReleaseElementEnumHandle", HandleFn),
            parameter_flags: resolve!(library, path, "GetParameterFlags", FlagsFn),
            parameter_array_dims: resolve!(library, path, "GetParameterArrayDims", DimsFn),
            get_parameter: resolve!(library, path, "GetParameter", GetParameterFn),
            get_array_parameter: resolve!(library, path, "GetArrayParameter", GetArrayParameterFn),
            set_parameter: resolve!(library, path, "SetParameter", SetParameterFn),
            enumerate_parameters: resolve!(library, path, "EnumerateParameters", EnumerateParametersFn),
            release_parameter_enum: resolve!(library, path, "ReleaseParameterEnumHandle", ReleaseParameterEnumFn),
            last_error: resolve!(library, path, "GetOptiXLastError", LastErrorFn),
        };
        debug!("loaded engine library '{}'", path);

        Ok(Self {
            symbols,
            path,
            _library: library,
        })
    }

    /// Get the platform-specific library filename.
    fn platform_lib_name(name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            format!("{}.dll", name)
        }
        #[cfg(target_os = "macos")]
        {
            format!("lib{}.dylib", name)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            format!("lib{}.so", name)
        }
    }

    /// Get the path of this library.
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn buf_len(buf: &[u8]) -> c_int {
    buf.len().min(c_int::MAX as usize) as c_int
}

// Every call below passes pointers that are valid for the duration of the
// call: C strings borrowed from `&CStr`, out-parameters borrowed from
// `&mut`, and buffers whose advertised size is their real length.
impl Engine for NativeEngine {
    fn create_element(&mut self, element_type: &CStr, name: &CStr) -> RawHandle {
        let mut id: usize = 0;
        let ok = unsafe { (self.symbols.create_element)(element_type.as_ptr(), name.as_ptr(), &mut id) };
        if ok {
            id
        } else {
            0
        }
    }

    fn delete_element(&mut self, element: RawHandle) -> bool {
        unsafe { (self.symbols.delete_element)(element) }
    }

    fn find_element(&mut self, name: &CStr) -> RawHandle {
        let mut id: usize = 0;
        if unsafe { (self.symbols.find_element)(name.as_ptr(), &mut id) } {
            id
        } else {
            0
        }
    }

    fn is_element_valid(&mut self, element: RawHandle) -> bool {
        let mut valid = false;
        unsafe { (self.symbols.is_element_valid)(element, &mut valid) && valid }
    }

    fn next_element(&mut self, element: RawHandle, next: &mut RawHandle) -> bool {
        unsafe { (self.symbols.next_element)(element, next) }
    }

    fn previous_element(&mut self, element: RawHandle, previous: &mut RawHandle) -> bool {
        unsafe { (self.symbols.previous_element)(element, previous) }
    }

    fn chain_elements(&mut self, previous: RawHandle, next: RawHandle) -> bool {
        unsafe { (self.symbols.chain_elements)(previous, next) }
    }

    fn element_name(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        unsafe { (self.symbols.element_name)(element, buf.as_mut_ptr().cast(), buf_len(buf)) }
    }

    fn element_type(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        unsafe { (self.symbols.element_type)(element, buf.as_mut_ptr().cast(), buf_len(buf)) }
    }

    fn enumerate_elements(
        &mut self,
        cursor: &mut RawHandle,
        element: &mut RawHandle,
        buf: &mut [u8],
    ) -> bool {
        let len = buf_len(buf);
        unsafe { (self.symbols.enumerate_elements)(cursor, element, buf.as_mut_ptr().cast(), len) }
    }

    fn release_element_enum(&mut self, cursor: RawHandle) -> bool {
        unsafe { (self.symbols.release_element_enum)(cursor) }
    }

    fn parameter_flags(&mut self, element: RawHandle, name: &CStr, flags: &mut u32) -> bool {
        unsafe { (self.symbols.parameter_flags)(element, name.as_ptr(), flags) }
    }

    fn parameter_array_dims(
        &mut self,
        element: RawHandle,
        name: &CStr,
        dims: &mut [i64; 2],
    ) -> bool {
        unsafe { (self.symbols.parameter_array_dims)(element, name.as_ptr(), dims) }
    }

    fn get_parameter(&mut self, element: RawHandle, name: &CStr, out: &mut CParameter) -> bool {
        unsafe { (self.symbols.get_parameter)(element, name.as_ptr(), out) }
    }

    unsafe fn get_array_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        out: &mut CParameter,
        max_size: usize,
    ) -> bool {
        (self.symbols.get_array_parameter)(element, name.as_ptr(), out, max_size)
    }

    unsafe fn set_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        param: CParameter,
    ) -> bool {
        (self.symbols.set_parameter)(element, name.as_ptr(), param)
    }

    fn enumerate_parameters(
        &mut self,
        element: RawHandle,
        cursor: &mut RawHandle,
        buf: &mut [u8],
        out: &mut CParameter,
    ) -> bool {
        let len = buf_len(buf);
        unsafe {
            (self.symbols.enumerate_parameters)(element, cursor, buf.as_mut_ptr().cast(), len, out)
        }
    }

    fn release_parameter_enum(&mut self, cursor: RawHandle, record: Option<&mut CParameter>) -> bool {
        let record = record.map_or(std::ptr::null_mut(), |r| r as *mut CParameter);
        unsafe { (self.symbols.release_parameter_enum)(cursor, record) }
    }

    fn last_error(&mut self, buf: &mut [u8]) -> bool {
        unsafe { (self.symbols.last_error)(buf.as_mut_ptr().cast(), buf_len(buf)) }
    }
}
