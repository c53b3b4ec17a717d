//! Parameter definition and implementation
//!
//! A [`Parameter`] is the host-side form of the engine's tagged parameter
//! record. The engine marks the active union member with bit 3 of the flags
//! word; here the payload is a [`ParamValue`] and that bit is derived from
//! it, so a record can never claim one variant while holding the other.

use std::fmt;
use std::ops::BitOr;

use ndarray::{ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};

use crate::engine::abi::CParameter;
use crate::error::Result;
use crate::parameters::array::{HostValue, ParamArray};
use crate::parameters::bounds::Bounds;

/// The engine's parameter flags word
///
/// Only `ARRAY_DATA` has meaning to this crate. Every other bit is engine
/// reserved and is carried back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterFlags(u32);

impl ParameterFlags {
    /// The parameter cannot be optimized
    pub const NOT_OPTIMIZABLE: Self = Self(0x01);

    /// The array member of the payload is active
    pub const ARRAY_DATA: Self = Self(0x08);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for ParameterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ParameterFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Unit category of a parameter, as defined by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UnitType {
    Dimensionless = 0,
    Angle = 1,
    Distance = 2,
    InverseDistance = -1,
    InverseDistance2 = -2,
    InverseDistance3 = -3,
    InverseDistanceN = -4,
}

impl TryFrom<i32> for UnitType {
    type Error = i32;

    fn try_from(raw: i32) -> std::result::Result<Self, i32> {
        match raw {
            0 => Ok(UnitType::Dimensionless),
            1 => Ok(UnitType::Angle),
            2 => Ok(UnitType::Distance),
            -1 => Ok(UnitType::InverseDistance),
            -2 => Ok(UnitType::InverseDistance2),
            -3 => Ok(UnitType::InverseDistance3),
            -4 => Ok(UnitType::InverseDistanceN),
            other => Err(other),
        }
    }
}

/// Logical grouping of a parameter, as defined by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ParameterGroup {
    Basic = 0,
    Shape = 1,
    Source = 2,
    Grating = 3,
}

impl TryFrom<i32> for ParameterGroup {
    type Error = i32;

    fn try_from(raw: i32) -> std::result::Result<Self, i32> {
        match raw {
            0 => Ok(ParameterGroup::Basic),
            1 => Ok(ParameterGroup::Shape),
            2 => Ok(ParameterGroup::Source),
            3 => Ok(ParameterGroup::Grating),
            other => Err(other),
        }
    }
}

/// Payload of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ParamValue {
    Scalar(f64),
    Array(ParamArray),
}

/// A named configuration value of an optical element
///
/// The name is not part of the record: it is the key under which the
/// element stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    value: ParamValue,

    /// Optimization interval; meaningful for scalars only
    bounds: Bounds,

    /// Unit conversion factor, applied by callers for display
    multiplier: f64,

    /// Engine unit discriminant (see [`UnitType`])
    #[serde(rename = "type")]
    unit_type: i32,

    /// Engine group discriminant (see [`ParameterGroup`])
    group: i32,

    /// Flags without `ARRAY_DATA`
    flags: ParameterFlags,
}

impl Default for Parameter {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameter {
    /// An empty scalar record, ready to be filled by a fetch
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new();
    /// assert!(param.is_scalar());
    /// assert_eq!(param.value(), Some(0.0));
    /// assert_eq!(param.multiplier(), 1.0);
    /// ```
    pub fn new() -> Self {
        Self {
            value: ParamValue::Scalar(0.0),
            bounds: Bounds::default(),
            multiplier: 1.0,
            unit_type: 0,
            group: 0,
            flags: ParameterFlags::empty(),
        }
    }

    /// A scalar record holding `value`
    pub fn scalar(value: f64) -> Self {
        Self {
            value: ParamValue::Scalar(value),
            ..Self::new()
        }
    }

    /// An array record holding `array`
    pub fn from_array(array: ParamArray) -> Self {
        Self {
            value: ParamValue::Array(array),
            ..Self::new()
        }
    }

    pub fn payload(&self) -> &ParamValue {
        &self.value
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, ParamValue::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.value, ParamValue::Array(_))
    }

    /// Scalar value, or `None` for an array parameter
    pub fn value(&self) -> Option<f64> {
        match self.value {
            ParamValue::Scalar(v) => Some(v),
            ParamValue::Array(_) => None,
        }
    }

    /// Scalar value scaled by the multiplier
    pub fn scaled_value(&self) -> Option<f64> {
        self.value().map(|v| v * self.multiplier)
    }

    /// Switch to the scalar variant; any installed array is dropped
    pub fn set_value(&mut self, value: f64) {
        self.value = ParamValue::Scalar(value);
    }

    pub fn array(&self) -> Option<&ParamArray> {
        match &self.value {
            ParamValue::Array(a) => Some(a),
            ParamValue::Scalar(_) => None,
        }
    }

    pub fn array_mut(&mut self) -> Option<&mut ParamArray> {
        match &mut self.value {
            ParamValue::Array(a) => Some(a),
            ParamValue::Scalar(_) => None,
        }
    }

    /// Install an array payload
    pub fn set_param_array(&mut self, array: ParamArray) {
        self.value = ParamValue::Array(array);
    }

    /// Install a numeric host array, widening it to `f64`
    ///
    /// The host shape `(rows, cols)` becomes engine dims `[cols, rows]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use optix_rs::parameters::Parameter;
    ///
    /// let mut param = Parameter::new();
    /// param.set_array(&array![[0.0f32, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]]);
    /// assert!(param.is_array());
    /// assert_eq!(param.array().unwrap().dims(), [4, 2]);
    /// ```
    pub fn set_array<A, S>(&mut self, array: &ArrayBase<S, Ix2>)
    where
        A: Copy + Into<f64>,
        S: Data<Elem = A>,
    {
        self.value = ParamValue::Array(ParamArray::widen(array));
    }

    /// Install a dynamically typed host value into the array slot
    ///
    /// Non-array values, arrays that are not 2-D, and conversions that would
    /// lose precision are rejected with `TypeMismatch`; the record is left
    /// untouched in that case.
    pub fn install(&mut self, value: &HostValue) -> Result<()> {
        let array = ParamArray::try_from(value)?;
        self.value = ParamValue::Array(array);
        Ok(())
    }

    /// Remove the array payload, leaving a zero scalar
    pub fn take_array(&mut self) -> Option<ParamArray> {
        match std::mem::replace(&mut self.value, ParamValue::Scalar(0.0)) {
            ParamValue::Array(a) => Some(a),
            scalar => {
                self.value = scalar;
                None
            }
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    /// Raw unit discriminant
    pub fn unit_type(&self) -> i32 {
        self.unit_type
    }

    pub fn set_unit_type(&mut self, unit_type: i32) {
        self.unit_type = unit_type;
    }

    /// Unit category, if the discriminant is one this crate knows
    pub fn unit(&self) -> Option<UnitType> {
        UnitType::try_from(self.unit_type).ok()
    }

    /// Raw group discriminant
    pub fn group(&self) -> i32 {
        self.group
    }

    pub fn set_group(&mut self, group: i32) {
        self.group = group;
    }

    pub fn parameter_group(&self) -> Option<ParameterGroup> {
        ParameterGroup::try_from(self.group).ok()
    }

    /// Flags word, with `ARRAY_DATA` reflecting the active variant
    pub fn flags(&self) -> ParameterFlags {
        let flags = self.flags.without(ParameterFlags::ARRAY_DATA);
        if self.is_array() {
            flags | ParameterFlags::ARRAY_DATA
        } else {
            flags
        }
    }

    /// Set the engine attribute bits; `ARRAY_DATA` is ignored
    pub fn set_flags(&mut self, flags: ParameterFlags) {
        self.flags = flags.without(ParameterFlags::ARRAY_DATA);
    }

    pub fn is_optimizable(&self) -> bool {
        !self.flags.contains(ParameterFlags::NOT_OPTIMIZABLE)
    }

    /// Return to an empty scalar with a zero flags word
    ///
    /// Used before a scalar fetch, which only fills the scalar member.
    pub(crate) fn reset_scalar(&mut self) {
        self.value = ParamValue::Scalar(0.0);
        self.flags = ParameterFlags::empty();
    }

    /// Copy bounds, multiplier, type, group and flags from an engine record
    pub(crate) fn apply_metadata(&mut self, raw: &CParameter) {
        self.bounds = Bounds::from_engine(raw.bounds[0], raw.bounds[1]);
        self.multiplier = raw.multiplier;
        self.unit_type = raw.unit_type;
        self.group = raw.group;
        self.set_flags(ParameterFlags::from_bits(raw.flags));
    }

    /// Engine record for this parameter, without an array pointer
    ///
    /// The caller installs the array header for array parameters.
    pub(crate) fn to_raw(&self) -> CParameter {
        let mut raw = CParameter::new();
        if let ParamValue::Scalar(v) = self.value {
            raw.data.value = v;
        }
        raw.bounds = [self.bounds.min, self.bounds.max];
        raw.multiplier = self.multiplier;
        raw.unit_type = self.unit_type;
        raw.group = self.group;
        raw.flags = self.flags().bits();
        raw
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ParamValue::Scalar(v) => writeln!(f, "Parameter value {}", v)?,
            ParamValue::Array(a) => {
                writeln!(f, "Parameter array {}*{}", a.dims()[0], a.dims()[1])?;
                writeln!(f, "\tdata = {:?}", a.as_slice())?;
            }
        }
        writeln!(f, "\tbounds {}", self.bounds)?;
        writeln!(f, "\tmultiplier {}", self.multiplier)?;
        writeln!(f, "\ttype {}", self.unit_type)?;
        writeln!(f, "\tgroup {}", self.group)?;
        write!(f, "\tflags {}", self.flags())
    }
}
