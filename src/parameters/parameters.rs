//! Parameters collection implementation
//!
//! [`Parameters`] is a snapshot of every parameter of one element, kept in
//! the order the engine enumerated them. It can be saved to JSON and stored
//! back onto an element later.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parameters::parameter::Parameter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    name: String,
    parameter: Parameter,
}

/// Ordered collection of named parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    params: Vec<Entry>,
}

impl Parameters {
    /// Create a new empty parameters collection
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::parameters::Parameters;
    ///
    /// let params = Parameters::new();
    /// assert_eq!(params.len(), 0);
    /// ```
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter, replacing an existing one of the same name in place
    ///
    /// # Returns
    ///
    /// The replaced parameter, if there was one
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::parameters::{Parameter, Parameters};
    ///
    /// let mut params = Parameters::new();
    /// params.insert("theta", Parameter::scalar(0.01));
    /// params.insert("distance", Parameter::scalar(2.5));
    /// let old = params.insert("theta", Parameter::scalar(0.02));
    ///
    /// assert_eq!(old.unwrap().value(), Some(0.01));
    /// assert_eq!(params.names().collect::<Vec<_>>(), ["theta", "distance"]);
    /// ```
    pub fn insert(&mut self, name: &str, parameter: Parameter) -> Option<Parameter> {
        match self.params.iter_mut().find(|e| e.name == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.parameter, parameter)),
            None => {
                self.params.push(Entry {
                    name: name.to_string(),
                    parameter,
                });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.parameter)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| &mut e.parameter)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let index = self.params.iter().position(|e| e.name == name)?;
        Some(self.params.remove(index).parameter)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|e| e.name == name)
    }

    /// Parameter names, in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|e| e.name.as_str())
    }

    /// `(name, parameter)` pairs, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|e| (e.name.as_str(), &e.parameter))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Names of the array-valued parameters
    pub fn array_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, p)| p.is_array())
            .map(|(name, _)| name)
            .collect()
    }
}

impl FromIterator<(String, Parameter)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Parameter)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (name, parameter) in iter {
            params.insert(&name, parameter);
        }
        params
    }
}

/// Error that can occur during serialization/deserialization
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Parameters {
    /// Save parameters to a JSON file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to save the parameters to
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SerializationError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Save parameters to a JSON string
    ///
    /// # Examples
    ///
    /// ```
    /// use optix_rs::parameters::{Parameter, Parameters};
    ///
    /// let mut params = Parameters::new();
    /// params.insert("distance", Parameter::scalar(2.5));
    ///
    /// let json = params.to_json().unwrap();
    /// assert!(json.contains("distance"));
    /// ```
    pub fn to_json(&self) -> Result<String, SerializationError> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    /// Load parameters from a JSON file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file to load the parameters from
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load parameters from a JSON string
    ///
    /// Bounds are validated on load; a file with `min > max` is rejected.
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        let params: Parameters = serde_json::from_str(json)?;
        Ok(params)
    }
}
