//! Structured machine state container
//!
//! Unlike the LIBSVM text format this container records the input
//! normalization next to the model, so a machine restored from it predicts
//! exactly like the one that was saved.

use crate::core::{Result, SVMError, SvmParameters};
use crate::solver::SvmModel;
use crate::utils::scaling::Normalization;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Version of the container layout written by this library
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Everything needed to rebuild a machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub format_version: u32,
    /// Library version used to write the state
    pub library_version: String,
    pub created_at: DateTime<Utc>,
    pub model: SvmModel,
    pub input_subtract: Vec<f64>,
    pub input_divide: Vec<f64>,
    /// Parameters the model was trained with, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_params: Option<SvmParameters>,
}

impl MachineState {
    pub fn new(model: SvmModel, normalization: &Normalization) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            model,
            input_subtract: normalization.subtract().to_vec(),
            input_divide: normalization.divide().to_vec(),
            training_params: None,
        }
    }

    pub fn with_training_params(mut self, params: SvmParameters) -> Self {
        self.training_params = Some(params);
        self
    }

    /// Normalization policy stored in the container, checked against the
    /// model input size
    pub fn normalization(&self) -> Result<Normalization> {
        let normalization =
            Normalization::new(self.input_subtract.clone(), self.input_divide.clone())?;
        if normalization.input_size() != self.model.n_features {
            return Err(SVMError::DimensionMismatch {
                expected: self.model.n_features,
                actual: normalization.input_size(),
            });
        }
        Ok(normalization)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| SVMError::SerializationError(e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let state: Self = serde_json::from_reader(reader)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        if state.format_version > STATE_FORMAT_VERSION {
            return Err(SVMError::SerializationError(format!(
                "State format version {} is newer than supported version {}",
                state.format_version, STATE_FORMAT_VERSION
            )));
        }
        Ok(state)
    }

    /// Save state to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load state from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}
