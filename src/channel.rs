//! Parameter exchange over a locked engine.
//!
//! A [`Channel`] is the only way to talk to the engine. It turns the raw
//! ABI of [`Engine`] into typed operations:
//!
//! - names are encoded as C strings before any foreign call
//! - array reads follow the dimension query, sizing, copy sequence
//! - array writes lend the engine a header that borrows host storage
//! - every failing call is followed, under the same lock, by a fetch of the
//!   engine's last error, whose text ends up in the returned [`OptixError`]

use std::ffi::{CStr, CString};
use std::sync::MutexGuard;

use log::{debug, warn};

use crate::config::SessionConfig;
use crate::engine::{CParameter, Engine};
use crate::enumerate::{ElementIter, ParameterIter};
use crate::error::{OptixError, Result};
use crate::parameters::{ArrayBuffer, ParamArray, Parameter, ParameterFlags, Parameters};
use crate::session::ElementId;

/// Placeholder text when a call failed without leaving a message.
const NO_DIAGNOSTIC: &str = "no diagnostic available";

/// Exclusive access to the engine of a [`Session`](crate::Session)
pub struct Channel<'a, E: Engine> {
    pub(crate) engine: MutexGuard<'a, E>,
    pub(crate) config: &'a SessionConfig,
}

/// Encode a name for the engine
pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|e| {
        OptixError::InvalidName(format!(
            "{:?} contains a NUL byte at position {}",
            name,
            e.nul_position()
        ))
    })
}

/// Decode a NUL-terminated name written by the engine
pub(crate) fn decode_name(buf: &[u8]) -> String {
    match CStr::from_bytes_until_nul(buf) {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(buf).into_owned(),
    }
}

impl<'a, E: Engine> Channel<'a, E> {
    pub(crate) fn new(engine: MutexGuard<'a, E>, config: &'a SessionConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &SessionConfig {
        self.config
    }

    /// Direct access to the engine, bypassing the protocol layer
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Fetch and clear the engine's pending error message
    ///
    /// Returns `None` when the engine reports that no error is pending.
    /// Messages longer than the configured error buffer are truncated.
    pub fn last_error(&mut self) -> Option<String> {
        let mut buf = vec![0u8; self.config.error_buffer_capacity];
        if self.engine.last_error(&mut buf) {
            Some(decode_name(&buf))
        } else {
            None
        }
    }

    /// Build the error for a failed engine call
    pub(crate) fn failure(&mut self, operation: &'static str) -> OptixError {
        let message = self
            .last_error()
            .unwrap_or_else(|| NO_DIAGNOSTIC.to_string());
        debug!("{} failed: {}", operation, message);
        OptixError::Engine { operation, message }
    }

    /// Classify a failed parameter lookup as a stale element or an unknown name
    ///
    /// The diagnostic is read before the validity check, which would
    /// otherwise clear it.
    fn lookup_failure(&mut self, element: ElementId, name: &str) -> OptixError {
        let message = self
            .last_error()
            .unwrap_or_else(|| NO_DIAGNOSTIC.to_string());
        debug!("lookup of '{}' on element {} failed: {}", name, element, message);
        if self.engine.is_element_valid(element.raw()) {
            OptixError::UnknownParameter {
                name: name.to_string(),
                message,
            }
        } else {
            OptixError::InvalidHandle { message }
        }
    }

    /// Flags word of a parameter
    pub fn get_flags(&mut self, element: ElementId, name: &str) -> Result<ParameterFlags> {
        let c = c_name(name)?;
        let mut flags = 0u32;
        if self.engine.parameter_flags(element.raw(), &c, &mut flags) {
            Ok(ParameterFlags::from_bits(flags))
        } else {
            Err(self.lookup_failure(element, name))
        }
    }

    /// Dims of an array parameter, `dims[0]` being the fast-varying dimension
    pub fn array_dims(&mut self, element: ElementId, name: &str) -> Result<[i64; 2]> {
        let c = c_name(name)?;
        let mut dims = [0i64; 2];
        if self.engine.parameter_array_dims(element.raw(), &c, &mut dims) {
            Ok(dims)
        } else {
            Err(self.failure("GetParameterArrayDims"))
        }
    }

    /// Number of values of an array parameter
    pub fn array_size(&mut self, element: ElementId, name: &str) -> Result<usize> {
        let dims = self.array_dims(element, name)?;
        match (usize::try_from(dims[0]), usize::try_from(dims[1])) {
            (Ok(d0), Ok(d1)) => d0.checked_mul(d1).ok_or_else(|| {
                OptixError::InvalidState(format!("array dims {:?} overflow", dims))
            }),
            _ => Err(OptixError::InvalidState(format!(
                "engine reported negative array dims {:?}",
                dims
            ))),
        }
    }

    /// Fetch a parameter into a new record
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::{Session, SimulatedEngine};
    ///
    /// let session = Session::new(SimulatedEngine::new());
    /// let mut channel = session.lock().unwrap();
    /// let mirror = channel.create_element("NaturalPolynomialMirror", "NP").unwrap().unwrap();
    ///
    /// let limits = channel.get_parameter(mirror, "surfaceLimits").unwrap();
    /// assert_eq!(limits.array().unwrap().dims(), [2, 2]);
    /// let theta = channel.get_parameter(mirror, "theta").unwrap();
    /// assert_eq!(theta.value(), Some(0.0));
    /// ```
    pub fn get_parameter(&mut self, element: ElementId, name: &str) -> Result<Parameter> {
        let mut param = Parameter::new();
        self.get_parameter_into(element, name, &mut param)?;
        Ok(param)
    }

    /// Fetch a parameter into an existing record
    ///
    /// The flags word selects the path. Arrays are read by querying their
    /// dims, sizing a receive buffer, and copying into it; the record is
    /// only replaced once the copy succeeded. Scalars reset the record to
    /// an empty scalar first, so a failed fetch leaves no stale value.
    pub fn get_parameter_into(
        &mut self,
        element: ElementId,
        name: &str,
        param: &mut Parameter,
    ) -> Result<()> {
        let flags = self.get_flags(element, name)?;
        let c = c_name(name)?;

        if flags.contains(ParameterFlags::ARRAY_DATA) {
            let dims = self.array_dims(element, name)?;
            let mut buffer = ArrayBuffer::with_dims(dims)?;
            let raw = self.fetch_array(element, &c, buffer.sized_mut()?)?;
            let array = buffer.take().ok_or_else(|| {
                OptixError::InvalidState("receive buffer lost its storage".to_string())
            })?;
            param.apply_metadata(&raw);
            param.set_param_array(array);
        } else {
            param.reset_scalar();
            let mut raw = CParameter::new();
            if !self.engine.get_parameter(element.raw(), &c, &mut raw) {
                return Err(self.failure("GetParameter"));
            }
            let value = raw.value().ok_or_else(|| {
                OptixError::InvalidState(format!(
                    "engine returned an array record for scalar parameter '{}'",
                    name
                ))
            })?;
            param.apply_metadata(&raw);
            param.set_value(value);
        }
        Ok(())
    }

    /// Copy an array parameter into a sized receive buffer
    ///
    /// This is the copy step of the array read sequence, for callers that
    /// size the buffer themselves from [`array_dims`](Self::array_dims).
    /// An `Unsized` buffer is rejected before the engine is called.
    pub fn copy_array_parameter(
        &mut self,
        element: ElementId,
        name: &str,
        buffer: &mut ArrayBuffer,
    ) -> Result<()> {
        let c = c_name(name)?;
        let array = buffer.sized_mut()?;
        self.fetch_array(element, &c, array)?;
        Ok(())
    }

    fn fetch_array(
        &mut self,
        element: ElementId,
        name: &CStr,
        array: &mut ParamArray,
    ) -> Result<CParameter> {
        let expected = array.dims();
        let max_size = array.len();
        let mut raw = CParameter::new();
        raw.flags = ParameterFlags::ARRAY_DATA.bits();

        let mut header = array.header_mut();
        raw.data.p_array = header.as_mut_ptr();
        // SAFETY: the header points at `max_size` writable values owned by
        // `array`, which stays mutably borrowed until the header is dropped.
        let ok = unsafe {
            self.engine
                .get_array_parameter(element.raw(), name, &mut raw, max_size)
        };
        let written = header.dims();
        drop(header);

        if !ok {
            return Err(self.failure("GetArrayParameter"));
        }
        if written != expected {
            return Err(OptixError::InvalidState(format!(
                "engine wrote an array of dims {:?} into a buffer sized for {:?}",
                written, expected
            )));
        }
        Ok(raw)
    }

    /// Store a parameter
    ///
    /// Bounds are not checked here; the engine decides what it accepts.
    pub fn set_parameter(&mut self, element: ElementId, name: &str, param: &Parameter) -> Result<()> {
        let c = c_name(name)?;
        let mut raw = param.to_raw();

        let ok = match param.array() {
            Some(array) => {
                let mut header = array.header();
                raw.data.p_array = header.as_mut_ptr();
                // SAFETY: the header describes `array.len()` readable values
                // borrowed from `param` for the duration of the call.
                unsafe { self.engine.set_parameter(element.raw(), &c, raw) }
            }
            // SAFETY: a scalar record carries no pointer.
            None => unsafe { self.engine.set_parameter(element.raw(), &c, raw) },
        };

        if ok {
            debug!("stored '{}' on element {}", name, element);
            Ok(())
        } else {
            Err(self.failure("SetParameter"))
        }
    }

    /// Instantiate an element
    ///
    /// An engine refusal is not an error: it yields `None`, and the
    /// engine's diagnostic is logged.
    pub fn create_element(&mut self, element_type: &str, name: &str) -> Result<Option<ElementId>> {
        let c_type = c_name(element_type)?;
        let c = c_name(name)?;
        let id = ElementId::from_raw(self.engine.create_element(&c_type, &c));
        match id {
            Some(id) => debug!("created {} '{}' as {}", element_type, name, id),
            None => {
                let message = self
                    .last_error()
                    .unwrap_or_else(|| NO_DIAGNOSTIC.to_string());
                warn!(
                    "engine returned a null handle for {} '{}': {}",
                    element_type, name, message
                );
            }
        }
        Ok(id)
    }

    pub fn find_element(&mut self, name: &str) -> Result<Option<ElementId>> {
        let c = c_name(name)?;
        Ok(ElementId::from_raw(self.engine.find_element(&c)))
    }

    pub fn is_element_valid(&mut self, element: ElementId) -> bool {
        self.engine.is_element_valid(element.raw())
    }

    pub fn delete_element(&mut self, element: ElementId) -> Result<()> {
        if self.engine.delete_element(element.raw()) {
            debug!("deleted element {}", element);
            Ok(())
        } else {
            Err(self.failure("DeleteElement"))
        }
    }

    /// Downstream neighbour, `None` at the end of the chain
    pub fn next_element(&mut self, element: ElementId) -> Result<Option<ElementId>> {
        let mut next = 0;
        if self.engine.next_element(element.raw(), &mut next) {
            Ok(ElementId::from_raw(next))
        } else {
            Err(self.failure("GetNextElement"))
        }
    }

    /// Upstream neighbour, `None` at the start of the chain
    pub fn previous_element(&mut self, element: ElementId) -> Result<Option<ElementId>> {
        let mut previous = 0;
        if self.engine.previous_element(element.raw(), &mut previous) {
            Ok(ElementId::from_raw(previous))
        } else {
            Err(self.failure("GetPreviousElement"))
        }
    }

    /// Link `next` downstream of `previous`
    pub fn chain_elements(&mut self, previous: ElementId, next: ElementId) -> Result<()> {
        if self.engine.chain_elements(previous.raw(), next.raw()) {
            Ok(())
        } else {
            Err(self.failure("ChainElement"))
        }
    }

    pub fn element_name(&mut self, element: ElementId) -> Result<String> {
        let mut buf = vec![0u8; self.config.element_name_capacity];
        if self.engine.element_name(element.raw(), &mut buf) {
            Ok(decode_name(&buf))
        } else {
            Err(self.failure("GetElementName"))
        }
    }

    /// Class name of an element
    pub fn element_type(&mut self, element: ElementId) -> Result<String> {
        let mut buf = vec![0u8; self.config.element_name_capacity];
        if self.engine.element_type(element.raw(), &mut buf) {
            Ok(decode_name(&buf))
        } else {
            Err(self.failure("GetElementType"))
        }
    }

    /// Iterate over the parameters of an element, in engine order
    pub fn parameters(&mut self, element: ElementId) -> ParameterIter<'_, 'a, E> {
        ParameterIter::new(self, element)
    }

    /// Iterate over the elements of the system, in engine order
    pub fn elements(&mut self) -> ElementIter<'_, 'a, E> {
        ElementIter::new(self)
    }

    /// All parameters of an element, as owned copies
    pub fn snapshot(&mut self, element: ElementId) -> Result<Parameters> {
        self.parameters(element).collect()
    }

    /// Store every entry of `params` back into an element
    ///
    /// Stops at the first entry the engine rejects; earlier entries stay
    /// stored.
    pub fn restore(&mut self, element: ElementId, params: &Parameters) -> Result<()> {
        for (name, param) in params.iter() {
            self.set_parameter(element, name, param)?;
        }
        Ok(())
    }
}
