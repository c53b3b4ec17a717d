//! Sessions and element identifiers.
//!
//! The engine keeps process-wide state (the last-error slot, enumeration
//! cursors) that is not safe to touch from two threads at once. A
//! [`Session`] owns the engine behind a mutex; [`Session::lock`] hands out a
//! [`Channel`], and every protocol operation, including the error fetch that
//! follows a failing call, happens while that lock is held.
//!
//! Engine calls have no timeout. A call that never returns blocks the lock
//! holder, and every other thread waiting on the session, indefinitely.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::engine::{Engine, RawHandle};
use crate::error::{OptixError, Result};

#[cfg(feature = "native")]
use crate::engine::NativeEngine;

/// Opaque identifier of an engine element
///
/// Ids are only produced from engine return values; the null handle is
/// represented as `None`. An id can go stale when the element is deleted,
/// which the engine reports as an invalid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(NonZeroUsize);

impl ElementId {
    pub(crate) fn from_raw(raw: RawHandle) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    /// The handle value passed across the engine boundary
    pub fn raw(self) -> RawHandle {
        self.0.get()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// An engine together with the configuration of its protocol buffers
///
/// `Session<E>` is `Sync` whenever `E` is `Send`, so it can be shared
/// between threads behind an `Arc`.
///
/// # Examples
///
/// ```
/// use optix_rs::{Session, SimulatedEngine};
///
/// let session = Session::new(SimulatedEngine::new());
/// let mut channel = session.lock().unwrap();
/// let mirror = channel.create_element("PlaneMirror", "M1").unwrap().unwrap();
/// assert_eq!(channel.element_name(mirror).unwrap(), "M1");
/// ```
pub struct Session<E: Engine> {
    engine: Mutex<E>,
    config: SessionConfig,
}

impl<E: Engine> Session<E> {
    /// Wrap an engine with the default configuration
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(engine),
            config: SessionConfig::default(),
        }
    }

    /// Wrap an engine with a validated configuration
    pub fn with_config(engine: E, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: Mutex::new(engine),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Acquire exclusive access to the engine
    ///
    /// A lock poisoned by a panicking holder is reported as `InvalidState`:
    /// the engine may have been left mid-protocol.
    pub fn lock(&self) -> Result<Channel<'_, E>> {
        let guard = self
            .engine
            .lock()
            .map_err(|_| OptixError::InvalidState("engine lock poisoned".to_string()))?;
        Ok(Channel::new(guard, &self.config))
    }

    /// Take the engine back out of the session
    pub fn into_engine(self) -> Result<E> {
        self.engine
            .into_inner()
            .map_err(|_| OptixError::InvalidState("engine lock poisoned".to_string()))
    }
}

#[cfg(feature = "native")]
impl Session<NativeEngine> {
    /// Load the engine library named by `config` and open a session on it
    ///
    /// Without a `library_path` the library is searched for as `OptiX`.
    pub fn open(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let engine = match &config.library_path {
            Some(path) => NativeEngine::load(path)?,
            None => NativeEngine::load_by_name("OptiX")?,
        };
        log::debug!("session opened on '{}'", engine.path());
        Self::with_config(engine, config)
    }
}
