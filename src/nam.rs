//! Reader for `.nam` neural amp model files.
//!
//! Only the metadata is interpreted here; running the network belongs to an
//! external inference backend plugged into the chain as a `BlockProcessor`.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ChainError;

#[derive(Debug, Deserialize)]
pub struct NamFile {
    pub version:      Option<String>,
    pub architecture: Option<String>,
    #[serde(default)]
    pub config:       Option<Value>,
    #[serde(default)]
    pub weights:      Vec<f32>,
}

/// Summary shown to the user after a model is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub version:      Option<String>,
    pub architecture: Option<String>,
    pub num_layers:   usize,
    pub num_weights:  usize,
}

impl NamFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(text)?)
    }

    fn layer_list(&self) -> Option<&Vec<Value>> {
        self.config.as_ref()?.get("layers")?.as_array()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            version:      self.version.clone(),
            architecture: self.architecture.clone(),
            num_layers:   self.layer_list().map_or(0, |l| l.len()),
            num_weights:  self.weights.len(),
        }
    }

    /// Configuration of layer `idx`, if the model declares a layer list.
    pub fn layer(&self, idx: usize) -> Option<&Value> {
        self.layer_list()?.get(idx)
    }

    pub fn layers(&self) -> &[Value] {
        self.layer_list().map(|l| l.as_slice()).unwrap_or(&[])
    }
}
