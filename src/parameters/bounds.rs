//! Parameter bounds implementation
//!
//! Bounds are the optimization interval the engine attaches to every scalar
//! parameter. The engine owns their meaning: values read back from it are
//! taken verbatim, and nothing on the host side checks a value against them
//! before it is stored.

use std::f64::{INFINITY, NEG_INFINITY};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when building bounds from untrusted input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than or equal to max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Bounds must not contain NaN")]
    NotANumber,
}

/// Closed interval `[min, max]` constraining a scalar parameter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Lower end of the interval
    pub min: f64,

    /// Upper end of the interval
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;

        // JSON has no infinity literal
        if self.min.is_infinite() && self.min.is_sign_negative() {
            state.serialize_field("min", &serde_json::Value::Null)?;
        } else {
            state.serialize_field("min", &self.min)?;
        }

        if self.max.is_infinite() && self.max.is_sign_positive() {
            state.serialize_field("max", &serde_json::Value::Null)?;
        } else {
            state.serialize_field("max", &self.max)?;
        }

        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;

        let min = helper.min.unwrap_or(NEG_INFINITY);
        let max = helper.max.unwrap_or(INFINITY);

        Bounds::new(min, max).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

impl Bounds {
    /// Create validated bounds
    ///
    /// Use this for values coming from untrusted sources (user input, files).
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(-0.01, 0.01).unwrap();
    /// assert_eq!(bounds.min, -0.01);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NotANumber);
        }
        if min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Take bounds exactly as the engine reported them
    ///
    /// The engine does not enforce `min <= max`; an inverted pair is kept
    /// as is so that storing the record back sends the same bytes.
    pub fn from_engine(min: f64, max: f64) -> Self {
        if min > max {
            warn!("engine reported inverted bounds [{}, {}]", min, max);
        }
        Self { min, max }
    }

    /// Bounds collapsed onto a single value, as the engine builds them by default
    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Create an unbounded interval (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if the bounds are finite (both min and max are finite)
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Width of the interval; negative for inverted engine bounds
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}
