//! # Parameter System
//!
//! Host-side types of the parameter exchange protocol.
//!
//! ## Core Components
//!
//! - [`Parameter`]: a scalar or 2-D array value with bounds, multiplier, unit type, group and flags
//! - [`ParamArray`]: host-owned array storage with engine-ordered dims
//! - [`ArrayBuffer`]: receive buffer that must be sized before the engine copies into it
//! - [`HostValue`]: dynamically typed values from a scripting host
//! - [`Bounds`]: the optimization interval of a scalar parameter
//! - [`Parameters`]: an ordered, serializable snapshot of an element's parameters
//!
//! ## Example Usage
//!
//! ```rust
//! use ndarray::array;
//! use optix_rs::parameters::{Parameter, ParameterFlags};
//!
//! let mut param = Parameter::new();
//! param.set_array(&array![[-10, 10], [-5, 5]]);
//! assert!(param.flags().contains(ParameterFlags::ARRAY_DATA));
//!
//! param.set_value(0.5);
//! assert!(param.array().is_none());
//! ```

pub mod array;
pub mod bounds;
pub mod parameter;
pub mod parameters;


// Re-export key types
pub use array::{ArrayBuffer, HostValue, ParamArray};
pub use bounds::{Bounds, BoundsError};
pub use parameter::{ParamValue, Parameter, ParameterFlags, ParameterGroup, UnitType};
pub use parameters::{Parameters, SerializationError};
