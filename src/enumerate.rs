//! Cursor-driven enumeration.
//!
//! The engine enumerates with an opaque cursor: the first call passes 0,
//! every call hands back the cursor for the next one, and the engine resets
//! it to 0 after the last item. A cursor that is abandoned early must be
//! released or the engine keeps its enumerator alive.
//!
//! [`ParameterIter`] and [`ElementIter`] wrap that protocol. They borrow the
//! [`Channel`] mutably, so no other engine call can run between two steps,
//! and they release an unfinished cursor when dropped. An iterator cannot be
//! restarted; a new one starts again from a null cursor.
//!
//! Parameter enumeration reuses one record for every step. The engine
//! allocates the array of an array parameter into that record and frees it
//! when the record is passed back, so the iterator hands the record to the
//! final release as well.

use log::{debug, trace};

use crate::channel::{decode_name, Channel};
use crate::engine::{CParameter, Engine, RawHandle};
use crate::error::{OptixError, Result};
use crate::parameters::{ParamArray, Parameter};
use crate::session::ElementId;

/// Copy an enumerated engine record into an owned parameter
///
/// Array payloads point into engine memory that is freed once the record
/// is handed back, so they are copied here.
fn owned_parameter(raw: &CParameter) -> Result<Parameter> {
    let mut param = Parameter::new();
    param.apply_metadata(raw);
    if raw.is_array() {
        let header = raw.array_ptr().ok_or_else(|| {
            OptixError::InvalidState("engine enumerated an array parameter without data".to_string())
        })?;
        // SAFETY: the engine keeps the header and its data alive until the
        // record is handed back, which happens after the copy completes.
        let data = unsafe { (*header).copy_to_owned()? };
        param.set_param_array(ParamArray::from_array(data));
    } else if let Some(value) = raw.value() {
        param.set_value(value);
    }
    Ok(param)
}

/// Iterator over the `(name, parameter)` pairs of one element
///
/// Items are owned copies. An engine failure is yielded once as an error,
/// after which the iterator is exhausted.
pub struct ParameterIter<'c, 'a, E: Engine> {
    channel: &'c mut Channel<'a, E>,
    element: ElementId,
    cursor: RawHandle,
    record: CParameter,
    name_buf: Vec<u8>,
    finished: bool,
}

impl<'c, 'a, E: Engine> ParameterIter<'c, 'a, E> {
    pub(crate) fn new(channel: &'c mut Channel<'a, E>, element: ElementId) -> Self {
        let name_buf = vec![0u8; channel.config.name_buffer_capacity];
        Self {
            channel,
            element,
            cursor: 0,
            record: CParameter::new(),
            name_buf,
            finished: false,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Hand the cursor and the record back to the engine
    fn release(&mut self) {
        if self.cursor == 0 && !self.record.is_array() {
            return;
        }
        trace!("releasing parameter enumeration of {}", self.element);
        self.channel
            .engine
            .release_parameter_enum(self.cursor, Some(&mut self.record));
        self.cursor = 0;
        self.record = CParameter::new();
    }

    /// Classify a failed step as a stale element or an engine rejection
    fn step_failure(&mut self, message: String) -> OptixError {
        debug!("parameter enumeration of {} failed: {}", self.element, message);
        if self.channel.is_element_valid(self.element) {
            OptixError::Engine {
                operation: "EnumerateParameters",
                message,
            }
        } else {
            OptixError::InvalidHandle { message }
        }
    }
}

impl<E: Engine> Iterator for ParameterIter<'_, '_, E> {
    type Item = Result<(String, Parameter)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.name_buf.fill(0);
        let ok = self.channel.engine.enumerate_parameters(
            self.element.raw(),
            &mut self.cursor,
            &mut self.name_buf,
            &mut self.record,
        );

        if !ok {
            self.finished = true;
            let failure = self.channel.last_error().map(|message| self.step_failure(message));
            if failure.is_none() {
                trace!("element {} has no parameters", self.element);
            }
            self.release();
            return failure.map(Err);
        }

        let item = owned_parameter(&self.record).map(|param| (decode_name(&self.name_buf), param));
        if self.cursor == 0 {
            trace!("parameter enumeration of {} complete", self.element);
            self.finished = true;
            self.release();
        } else if let Ok((name, _)) = &item {
            trace!("enumerated '{}' of {}", name, self.element);
        }
        Some(item)
    }
}

impl<E: Engine> Drop for ParameterIter<'_, '_, E> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Iterator over the `(name, id)` pairs of the elements of the system
pub struct ElementIter<'c, 'a, E: Engine> {
    channel: &'c mut Channel<'a, E>,
    cursor: RawHandle,
    name_buf: Vec<u8>,
    finished: bool,
}

impl<'c, 'a, E: Engine> ElementIter<'c, 'a, E> {
    pub(crate) fn new(channel: &'c mut Channel<'a, E>) -> Self {
        let name_buf = vec![0u8; channel.config.element_name_capacity];
        Self {
            channel,
            cursor: 0,
            name_buf,
            finished: false,
        }
    }
}

impl<E: Engine> Iterator for ElementIter<'_, '_, E> {
    type Item = Result<(String, ElementId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut raw: RawHandle = 0;
        self.name_buf.fill(0);
        let ok = self
            .channel
            .engine
            .enumerate_elements(&mut self.cursor, &mut raw, &mut self.name_buf);

        if !ok {
            self.finished = true;
            return self.channel.last_error().map(|message| {
                debug!("element enumeration failed: {}", message);
                Err(OptixError::Engine {
                    operation: "EnumerateElements",
                    message,
                })
            });
        }
        if self.cursor == 0 {
            self.finished = true;
        }

        let name = decode_name(&self.name_buf);
        trace!("enumerated element '{}'", name);
        Some(match ElementId::from_raw(raw) {
            Some(id) => Ok((name, id)),
            None => Err(OptixError::InvalidState(format!(
                "engine enumerated element '{}' with a null handle",
                name
            ))),
        })
    }
}

impl<E: Engine> Drop for ElementIter<'_, '_, E> {
    fn drop(&mut self) {
        if self.cursor != 0 {
            trace!("releasing element cursor");
            self.channel.engine.release_element_enum(self.cursor);
            self.cursor = 0;
        }
    }
}
