//! An in-process engine implementing the OptiX parameter ABI.
//!
//! `SimulatedEngine` keeps a small system of optical elements in memory and
//! answers every [`Engine`] call the way the native library does: failures
//! return `false` and leave a message in a last-error slot, each call clears
//! the previous message, enumeration hands out cursors that must be released
//! or run to completion, and arrays returned by enumeration stay allocated
//! until their record is handed back.
//!
//! The element classes and their parameter tables follow the native
//! engine's definitions (base element placement parameters, surface shape
//! parameters, and source parameters).

use std::collections::{BTreeMap, HashMap};
use std::ffi::CStr;

use log::trace;

use super::abi::{CParamArray, CParameter, RawHandle};
use super::Engine;
use crate::parameters::parameter::{ParameterFlags, ParameterGroup, UnitType};

const FIRST_HANDLE: RawHandle = 0x1000;
const HANDLE_STRIDE: RawHandle = 0x40;
const FIRST_CURSOR: RawHandle = 0x8000_0000;

/// Element classes known to the simulated engine
pub const ELEMENT_CLASSES: &[&str] = &[
    "PlaneMirror",
    "SphericalMirror",
    "NaturalPolynomialMirror",
    "LegendrePolynomialMirror",
    "PlaneFilm",
    "GaussianSource",
];

#[derive(Debug, Clone, PartialEq)]
enum SimValue {
    Scalar(f64),
    Array { dims: [i64; 2], data: Vec<f64> },
}

#[derive(Debug, Clone)]
struct SimParam {
    value: SimValue,
    bounds: [f64; 2],
    multiplier: f64,
    unit_type: i32,
    group: i32,
    flags: u32,
}

impl SimParam {
    fn scalar(value: f64, unit: UnitType, group: ParameterGroup) -> Self {
        Self {
            value: SimValue::Scalar(value),
            bounds: [value, value],
            multiplier: 1.0,
            unit_type: unit as i32,
            group: group as i32,
            flags: 0,
        }
    }

    fn array(dims: [i64; 2], data: Vec<f64>, unit: UnitType, group: ParameterGroup) -> Self {
        Self {
            value: SimValue::Array { dims, data },
            bounds: [0.0, 0.0],
            multiplier: 1.0,
            unit_type: unit as i32,
            group: group as i32,
            flags: ParameterFlags::NOT_OPTIMIZABLE.bits(),
        }
    }

    fn is_array(&self) -> bool {
        matches!(self.value, SimValue::Array { .. })
    }

    fn flags(&self) -> u32 {
        if self.is_array() {
            self.flags | ParameterFlags::ARRAY_DATA.bits()
        } else {
            self.flags
        }
    }

    /// Copy everything but the payload into `out`
    fn write_metadata(&self, out: &mut CParameter) {
        out.bounds = self.bounds;
        out.multiplier = self.multiplier;
        out.unit_type = self.unit_type;
        out.group = self.group;
        out.flags = self.flags();
    }
}

#[derive(Debug)]
struct SimElement {
    name: String,
    class: &'static str,
    params: BTreeMap<String, SimParam>,
    previous: RawHandle,
    next: RawHandle,
}

/// Engine storage for an array handed out by enumeration, keyed by the
/// address of its header until the record comes back
struct TransientArray {
    header: Box<CParamArray>,
    _data: Vec<f64>,
}

// SAFETY: the header points into `_data`; both are owned by this value and
// never shared, so moving it to another thread moves the whole allocation.
unsafe impl Send for TransientArray {}

impl TransientArray {
    fn new(dims: [i64; 2], data: &[f64]) -> Self {
        let mut data = data.to_vec();
        let header = Box::new(CParamArray {
            dims,
            data: data.as_mut_ptr(),
        });
        Self { header, _data: data }
    }
}

fn base_parameters() -> Vec<(&'static str, SimParam)> {
    let mut params = Vec::new();
    for name in ["theta", "phi", "psi", "Dtheta", "Dphi", "Dpsi"] {
        params.push((name, SimParam::scalar(0.0, UnitType::Angle, ParameterGroup::Basic)));
    }
    for name in ["distance", "DX", "DY", "DZ"] {
        params.push((name, SimParam::scalar(0.0, UnitType::Distance, ParameterGroup::Basic)));
    }
    params
}

fn class_parameters(class: &str) -> Option<(&'static str, Vec<(&'static str, SimParam)>)> {
    let class = *ELEMENT_CLASSES.iter().find(|c| **c == class)?;
    let mut params = base_parameters();
    match class {
        "SphericalMirror" => {
            params.push((
                "curvature",
                SimParam::scalar(0.0, UnitType::InverseDistance, ParameterGroup::Shape),
            ));
        }
        "NaturalPolynomialMirror" | "LegendrePolynomialMirror" => {
            params.push((
                "coefficients",
                SimParam::array([1, 1], vec![0.0], UnitType::Distance, ParameterGroup::Shape),
            ));
            params.push((
                "surfaceLimits",
                SimParam::array(
                    [2, 2],
                    vec![-1.0, 1.0, -1.0, 1.0],
                    UnitType::Distance,
                    ParameterGroup::Shape,
                ),
            ));
        }
        "GaussianSource" => {
            params.push((
                "nRays",
                SimParam::scalar(1000.0, UnitType::Dimensionless, ParameterGroup::Source),
            ));
            for name in ["sigmaX", "sigmaY"] {
                params.push((name, SimParam::scalar(0.0, UnitType::Distance, ParameterGroup::Source)));
            }
            for name in ["sigmaXdiv", "sigmaYdiv"] {
                params.push((name, SimParam::scalar(5e-4, UnitType::Angle, ParameterGroup::Source)));
            }
        }
        _ => {}
    }
    Some((class, params))
}

/// Class-specific checks applied when a parameter is stored
fn validate(name: &str, value: &SimValue) -> Result<(), String> {
    let SimValue::Array { data, .. } = value else {
        return Ok(());
    };
    match name {
        "surfaceLimits" => {
            if data.len() < 4 {
                return Err("Array size of surfaceLimits parameter must be at least 4".to_string());
            }
            if data[0] == data[1] {
                return Err(format!(
                    "X-range of surfaceLimits [{},{}], has a null extent",
                    data[0], data[1]
                ));
            }
            if data[2] == data[3] {
                return Err(format!(
                    "Y-range of surfaceLimits [{},{}], has a null extent",
                    data[2], data[3]
                ));
            }
            Ok(())
        }
        "coefficients" if data.is_empty() => {
            Err("Array size of coefficients parameter must be at least 1".to_string())
        }
        _ => Ok(()),
    }
}

/// strncpy-style copy; `false` when the name and its terminator do not fit
fn write_c_string(buf: &mut [u8], value: &str) -> bool {
    let bytes = value.as_bytes();
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    if n < buf.len() {
        buf[n] = 0;
    }
    buf.len() > bytes.len()
}

/// In-process implementation of the OptiX engine ABI
pub struct SimulatedEngine {
    elements: BTreeMap<RawHandle, SimElement>,
    names: BTreeMap<String, RawHandle>,
    next_handle: RawHandle,
    error: Option<String>,
    param_cursors: HashMap<RawHandle, (RawHandle, usize)>,
    element_cursors: HashMap<RawHandle, usize>,
    next_cursor: RawHandle,
    transients: HashMap<usize, TransientArray>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    /// An engine with an empty system
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            names: BTreeMap::new(),
            next_handle: FIRST_HANDLE,
            error: None,
            param_cursors: HashMap::new(),
            element_cursors: HashMap::new(),
            next_cursor: FIRST_CURSOR,
            transients: HashMap::new(),
        }
    }

    /// Number of enumeration cursors the engine is still holding
    pub fn open_cursors(&self) -> usize {
        self.param_cursors.len() + self.element_cursors.len()
    }

    /// Number of enumerated arrays whose record has not been handed back
    pub fn live_arrays(&self) -> usize {
        self.transients.len()
    }

    /// Add (or replace) a scalar parameter on an element
    pub fn define_scalar(&mut self, element: RawHandle, name: &str, value: f64, unit_type: i32) -> bool {
        self.define(element, name, SimValue::Scalar(value), unit_type, 0)
    }

    /// Add (or replace) an array parameter on an element, `data` in engine order
    pub fn define_array(&mut self, element: RawHandle, name: &str, dims: [i64; 2], data: Vec<f64>) -> bool {
        let size = usize::try_from(dims[0])
            .ok()
            .zip(usize::try_from(dims[1]).ok())
            .and_then(|(d0, d1)| d0.checked_mul(d1));
        if size != Some(data.len()) {
            return self.fail("array dims don't match the data size");
        }
        self.define(
            element,
            name,
            SimValue::Array { dims, data },
            UnitType::Dimensionless as i32,
            ParameterFlags::NOT_OPTIMIZABLE.bits(),
        )
    }

    /// Remove every parameter of an element
    pub fn clear_parameters(&mut self, element: RawHandle) -> bool {
        self.begin();
        match self.elements.get_mut(&element) {
            Some(elem) => {
                elem.params.clear();
                true
            }
            None => self.fail("invalid element ID"),
        }
    }

    fn define(&mut self, element: RawHandle, name: &str, value: SimValue, unit_type: i32, flags: u32) -> bool {
        self.begin();
        let Some(elem) = self.elements.get_mut(&element) else {
            return self.fail("invalid element ID");
        };
        elem.params.insert(
            name.to_string(),
            SimParam {
                value,
                bounds: [0.0, 0.0],
                multiplier: 1.0,
                unit_type,
                group: ParameterGroup::Basic as i32,
                flags,
            },
        );
        true
    }

    /// Start of every call: the previous message is gone
    fn begin(&mut self) {
        self.error = None;
    }

    /// Free the array a returned enumeration record points to
    fn reclaim(&mut self, record: &mut CParameter) {
        if let Some(header) = record.array_ptr() {
            if self.transients.remove(&(header as usize)).is_none() {
                trace!("record points to an array the engine does not own");
            }
        }
        *record = CParameter::new();
    }

    fn fail(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        trace!("simulated engine error: {}", message);
        self.error = Some(message);
        false
    }

    fn param(&mut self, element: RawHandle, name: &CStr) -> Result<&SimParam, bool> {
        let Ok(name) = name.to_str() else {
            return Err(self.fail("invalid parameter name encoding"));
        };
        if !self.elements.contains_key(&element) {
            return Err(self.fail("invalid element ID"));
        }
        if !self.elements[&element].params.contains_key(name) {
            let message = format!("Invalid parameter name '{}'", name);
            return Err(self.fail(message));
        }
        Ok(&self.elements[&element].params[name])
    }

    fn allocate_cursor(&mut self) -> RawHandle {
        let cursor = self.next_cursor;
        self.next_cursor += 1;
        cursor
    }

    fn unlink(&mut self, element: RawHandle) {
        let (previous, next) = match self.elements.get(&element) {
            Some(e) => (e.previous, e.next),
            None => return,
        };
        if let Some(p) = self.elements.get_mut(&previous) {
            p.next = 0;
        }
        if let Some(n) = self.elements.get_mut(&next) {
            n.previous = 0;
        }
        if let Some(e) = self.elements.get_mut(&element) {
            e.previous = 0;
            e.next = 0;
        }
    }
}

impl Engine for SimulatedEngine {
    fn create_element(&mut self, element_type: &CStr, name: &CStr) -> RawHandle {
        self.begin();
        let (Ok(element_type), Ok(name)) = (element_type.to_str(), name.to_str()) else {
            self.fail("invalid name encoding");
            return 0;
        };
        if self.names.contains_key(name) {
            self.fail("Name already exists in the current system");
            return 0;
        }
        let Some((class, defaults)) = class_parameters(element_type) else {
            self.fail(format!("Invalid element type '{}'", element_type));
            return 0;
        };

        let handle = self.next_handle;
        self.next_handle += HANDLE_STRIDE;
        let params = defaults
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect();
        self.elements.insert(
            handle,
            SimElement {
                name: name.to_string(),
                class,
                params,
                previous: 0,
                next: 0,
            },
        );
        self.names.insert(name.to_string(), handle);
        handle
    }

    fn delete_element(&mut self, element: RawHandle) -> bool {
        self.begin();
        if !self.elements.contains_key(&element) {
            return self.fail("invalid element ID");
        }
        self.unlink(element);
        if let Some(elem) = self.elements.remove(&element) {
            self.names.remove(&elem.name);
        }
        self.param_cursors.retain(|_, (e, _)| *e != element);
        true
    }

    fn find_element(&mut self, name: &CStr) -> RawHandle {
        self.begin();
        let found = name.to_str().ok().and_then(|n| self.names.get(n).copied());
        match found {
            Some(handle) => handle,
            None => {
                self.fail("Element not found");
                0
            }
        }
    }

    fn is_element_valid(&mut self, element: RawHandle) -> bool {
        self.begin();
        self.elements.contains_key(&element)
    }

    fn next_element(&mut self, element: RawHandle, next: &mut RawHandle) -> bool {
        self.begin();
        match self.elements.get(&element) {
            Some(e) => {
                *next = e.next;
                true
            }
            None => self.fail("invalid element ID"),
        }
    }

    fn previous_element(&mut self, element: RawHandle, previous: &mut RawHandle) -> bool {
        self.begin();
        match self.elements.get(&element) {
            Some(e) => {
                *previous = e.previous;
                true
            }
            None => self.fail("invalid element ID"),
        }
    }

    fn chain_elements(&mut self, previous: RawHandle, next: RawHandle) -> bool {
        self.begin();
        if !self.elements.contains_key(&previous) || !self.elements.contains_key(&next) {
            return self.fail("invalid element ID");
        }
        if previous == next {
            return self.fail("an element cannot be chained to itself");
        }
        let old_next = self.elements[&previous].next;
        if let Some(n) = self.elements.get_mut(&old_next) {
            n.previous = 0;
        }
        let old_previous = self.elements[&next].previous;
        if let Some(p) = self.elements.get_mut(&old_previous) {
            p.next = 0;
        }
        if let Some(p) = self.elements.get_mut(&previous) {
            p.next = next;
        }
        if let Some(n) = self.elements.get_mut(&next) {
            n.previous = previous;
        }
        true
    }

    fn element_name(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        self.begin();
        let Some(name) = self.elements.get(&element).map(|e| e.name.clone()) else {
            return self.fail("invalid element ID");
        };
        if !write_c_string(buf, &name) {
            return self.fail("Buffer too small, name was truncated");
        }
        true
    }

    fn element_type(&mut self, element: RawHandle, buf: &mut [u8]) -> bool {
        self.begin();
        let Some(class) = self.elements.get(&element).map(|e| e.class) else {
            return self.fail("invalid element ID");
        };
        if !write_c_string(buf, class) {
            return self.fail("Buffer too small, type was truncated");
        }
        true
    }

    fn enumerate_elements(
        &mut self,
        cursor: &mut RawHandle,
        element: &mut RawHandle,
        buf: &mut [u8],
    ) -> bool {
        self.begin();
        let (id, index) = if *cursor == 0 {
            if self.names.is_empty() {
                return false;
            }
            (self.allocate_cursor(), 0)
        } else {
            match self.element_cursors.remove(cursor) {
                Some(index) => (*cursor, index),
                None => return self.fail("invalid enumeration handle"),
            }
        };

        let Some((name, handle)) = self.names.iter().nth(index).map(|(n, h)| (n.clone(), *h)) else {
            *cursor = 0;
            return self.fail("enumeration handle is past the end of the system");
        };
        *element = handle;
        if !write_c_string(buf, &name) {
            *cursor = 0;
            return self.fail("nameBuffer is too small");
        }

        if index + 1 == self.names.len() {
            *cursor = 0;
        } else {
            self.element_cursors.insert(id, index + 1);
            *cursor = id;
        }
        true
    }

    fn release_element_enum(&mut self, cursor: RawHandle) -> bool {
        self.begin();
        self.element_cursors.remove(&cursor).is_some()
    }

    fn parameter_flags(&mut self, element: RawHandle, name: &CStr, flags: &mut u32) -> bool {
        self.begin();
        match self.param(element, name) {
            Ok(p) => {
                *flags = p.flags();
                true
            }
            Err(status) => status,
        }
    }

    fn parameter_array_dims(
        &mut self,
        element: RawHandle,
        name: &CStr,
        dims: &mut [i64; 2],
    ) -> bool {
        self.begin();
        let value = match self.param(element, name) {
            Ok(p) => p.value.clone(),
            Err(status) => return status,
        };
        match value {
            SimValue::Array { dims: d, .. } => {
                *dims = d;
                true
            }
            SimValue::Scalar(_) => self.fail(format!("Parameter '{}' is not an array", name.to_string_lossy())),
        }
    }

    fn get_parameter(&mut self, element: RawHandle, name: &CStr, out: &mut CParameter) -> bool {
        self.begin();
        let param = match self.param(element, name) {
            Ok(p) => p.clone(),
            Err(status) => return status,
        };
        match param.value {
            SimValue::Scalar(v) => {
                out.data.value = v;
                param.write_metadata(out);
                true
            }
            SimValue::Array { .. } => self.fail(format!(
                "Parameter '{}' is an array, use GetArrayParameter",
                name.to_string_lossy()
            )),
        }
    }

    unsafe fn get_array_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        out: &mut CParameter,
        max_size: usize,
    ) -> bool {
        self.begin();
        let Some(header) = out.array_ptr() else {
            return self.fail("paramData must have the ArrayData flag set and point to an ArrayParameter");
        };
        let param = match self.param(element, name) {
            Ok(p) => p.clone(),
            Err(status) => return status,
        };
        let SimValue::Array { dims, data } = &param.value else {
            return self.fail(format!("Parameter '{}' is not an array", name.to_string_lossy()));
        };
        if max_size < data.len() {
            return self.fail(format!(
                "Array storage too small: {} values needed, {} provided",
                data.len(),
                max_size
            ));
        }
        if (*header).data.is_null() && !data.is_empty() {
            return self.fail("ArrayParameter has no storage");
        }

        std::ptr::copy_nonoverlapping(data.as_ptr(), (*header).data, data.len());
        (*header).dims = *dims;
        param.write_metadata(out);
        true
    }

    unsafe fn set_parameter(
        &mut self,
        element: RawHandle,
        name: &CStr,
        param: CParameter,
    ) -> bool {
        self.begin();
        let stored_is_array = match self.param(element, name) {
            Ok(p) => p.is_array(),
            Err(status) => return status,
        };
        let tag = name.to_string_lossy().into_owned();

        let value = if param.is_array() {
            if !stored_is_array {
                return self.fail(format!("{} is not an array type parameter", tag));
            }
            let Some(header) = param.array_ptr() else {
                return self.fail(format!("{} array pointer is null", tag));
            };
            let header = *header;
            let Some(len) = header.len() else {
                return self.fail(format!("invalid array dims {:?}", header.dims));
            };
            if header.data.is_null() && len > 0 {
                return self.fail(format!("{} array has no storage", tag));
            }
            let data = if len == 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(header.data as *const f64, len).to_vec()
            };
            SimValue::Array {
                dims: header.dims,
                data,
            }
        } else {
            if stored_is_array {
                return self.fail(format!("{} must be an array type parameter", tag));
            }
            SimValue::Scalar(param.data.value)
        };

        if let Err(message) = validate(&tag, &value) {
            return self.fail(message);
        }

        // Unit type, group and flags are owned by the element
        if let Some(stored) = self
            .elements
            .get_mut(&element)
            .and_then(|e| e.params.get_mut(&tag))
        {
            stored.value = value;
            stored.bounds = param.bounds;
            stored.multiplier = param.multiplier;
        }
        true
    }

    fn enumerate_parameters(
        &mut self,
        element: RawHandle,
        cursor: &mut RawHandle,
        buf: &mut [u8],
        out: &mut CParameter,
    ) -> bool {
        self.begin();
        self.reclaim(out);
        let count = match self.elements.get(&element) {
            Some(e) => e.params.len(),
            None => return self.fail("Invalid element ID"),
        };

        let (id, index) = if *cursor == 0 {
            if count == 0 {
                return false;
            }
            (self.allocate_cursor(), 0)
        } else {
            match self.param_cursors.remove(cursor) {
                Some((e, index)) if e == element => (*cursor, index),
                Some(_) => {
                    *cursor = 0;
                    return self.fail("enumeration handle belongs to another element");
                }
                None => return self.fail("invalid enumeration handle"),
            }
        };

        let Some((name, param)) = self.elements[&element]
            .params
            .iter()
            .nth(index)
            .map(|(n, p)| (n.clone(), p.clone()))
        else {
            *cursor = 0;
            return self.fail("enumeration handle is past the end of the parameter list");
        };

        if !write_c_string(buf, &name) {
            *cursor = 0;
            return self.fail("Buffer too small");
        }

        param.write_metadata(out);
        match &param.value {
            SimValue::Scalar(v) => out.data.value = *v,
            SimValue::Array { dims, data } => {
                let mut transient = TransientArray::new(*dims, data);
                let header = &mut *transient.header as *mut CParamArray;
                out.data.p_array = header;
                self.transients.insert(header as usize, transient);
            }
        }

        if index + 1 == count {
            *cursor = 0;
        } else {
            self.param_cursors.insert(id, (element, index + 1));
            *cursor = id;
        }
        true
    }

    fn release_parameter_enum(&mut self, cursor: RawHandle, record: Option<&mut CParameter>) -> bool {
        self.begin();
        if let Some(record) = record {
            self.reclaim(record);
        }
        self.param_cursors.remove(&cursor).is_some()
    }

    fn last_error(&mut self, buf: &mut [u8]) -> bool {
        let (message, pending) = match self.error.take() {
            Some(message) => (message, true),
            None => ("No Error".to_string(), false),
        };
        if !buf.is_empty() {
            let n = message.len().min(buf.len() - 1);
            buf[..n].copy_from_slice(&message.as_bytes()[..n]);
            buf[n] = 0;
        }
        pending
    }
}
