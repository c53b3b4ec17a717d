//! # optix-rs
//!
//! `optix-rs` is a host-side binding for the OptiX optical simulation
//! engine: it exchanges the named, typed parameters of optical elements
//! (mirrors, films, sources) with the engine across its C ABI.
//!
//! The library provides:
//! - A [`Parameter`] sum type covering scalar and 2-D array values, with
//!   bounds, unit multiplier, unit type, group and flags
//! - A [`Channel`] of typed operations over a locked engine, with every
//!   engine failure carrying the engine's own diagnostic
//! - Cursor-driven enumeration of parameters and elements as iterators that
//!   release their cursor when dropped
//! - [`NativeEngine`], loading the engine shared library, and
//!   [`SimulatedEngine`], an in-process engine with the same contract
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::array;
//! use optix_rs::{Session, SimulatedEngine};
//!
//! let session = Session::new(SimulatedEngine::new());
//! let mut channel = session.lock()?;
//! let mirror = channel
//!     .create_element("NaturalPolynomialMirror", "NPmirror")?
//!     .expect("engine refused the element");
//!
//! let mut limits = channel.get_parameter(mirror, "surfaceLimits")?;
//! limits.set_array(&array![[-10, 10], [-5, 5]]);
//! channel.set_parameter(mirror, "surfaceLimits", &limits)?;
//!
//! let back = channel.get_parameter(mirror, "surfaceLimits")?;
//! assert_eq!(back.array().unwrap().as_slice(), &[-10.0, 10.0, -5.0, 5.0]);
//! # Ok::<(), optix_rs::OptixError>(())
//! ```

// Public modules
pub mod channel;
pub mod config;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod parameters;
pub mod session;

// Re-exports for convenience
pub use channel::Channel;
pub use config::SessionConfig;
pub use engine::{Engine, SimulatedEngine};
pub use enumerate::{ElementIter, ParameterIter};
pub use error::{OptixError, Result};
pub use parameters::{
    ArrayBuffer, Bounds, HostValue, ParamArray, ParamValue, Parameter, ParameterFlags,
    ParameterGroup, Parameters, UnitType,
};
pub use session::{ElementId, Session};

#[cfg(feature = "native")]
pub use engine::NativeEngine;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
