//! Session configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OptixError, Result};

/// Environment variable naming the engine library
pub const ENV_LIBRARY: &str = "OPTIX_LIBRARY";
/// Environment variable overriding the parameter name buffer capacity
pub const ENV_NAME_CAPACITY: &str = "OPTIX_NAME_CAPACITY";
/// Environment variable overriding the error buffer capacity
pub const ENV_ERROR_CAPACITY: &str = "OPTIX_ERROR_CAPACITY";

/// Buffer sizes and library location for a [`Session`](crate::Session)
///
/// # Examples
///
/// ```
/// use optix_rs::SessionConfig;
///
/// let config = SessionConfig::default().with_name_buffer_capacity(128);
/// assert_eq!(config.name_buffer_capacity, 128);
/// assert_eq!(config.error_buffer_capacity, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine library to load; `None` searches for `OptiX` in the standard paths
    pub library_path: Option<PathBuf>,

    /// Bytes reserved for each parameter name during enumeration
    pub name_buffer_capacity: usize,

    /// Bytes reserved for the engine's last-error message
    pub error_buffer_capacity: usize,

    /// Bytes reserved for element names and class names
    pub element_name_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            name_buffer_capacity: 48,
            error_buffer_capacity: 256,
            element_name_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_library_path(mut self, path: impl AsRef<Path>) -> Self {
        self.library_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_name_buffer_capacity(mut self, capacity: usize) -> Self {
        self.name_buffer_capacity = capacity;
        self
    }

    pub fn with_error_buffer_capacity(mut self, capacity: usize) -> Self {
        self.error_buffer_capacity = capacity;
        self
    }

    pub fn with_element_name_capacity(mut self, capacity: usize) -> Self {
        self.element_name_capacity = capacity;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the `OPTIX_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_LIBRARY) {
            config.library_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(ENV_NAME_CAPACITY) {
            config.name_buffer_capacity = parse_capacity(ENV_NAME_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_ERROR_CAPACITY) {
            config.error_buffer_capacity = parse_capacity(ENV_ERROR_CAPACITY, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject capacities no engine call could work with
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name_buffer_capacity", self.name_buffer_capacity),
            ("error_buffer_capacity", self.error_buffer_capacity),
            ("element_name_capacity", self.element_name_capacity),
        ] {
            if value == 0 {
                return Err(OptixError::InvalidState(format!("{} must be positive", field)));
            }
        }
        Ok(())
    }
}

fn parse_capacity(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| OptixError::InvalidState(format!("{}={:?}: {}", key, value, e)))
}
