//! Model serialization and persistence
//!
//! Two on-disk formats are supported:
//!
//! - [`ModelFormat::Native`]: the LIBSVM text model format, readable by other
//!   LIBSVM based tools. It carries no normalization.
//! - [`ModelFormat::State`]: a JSON container holding the model together with
//!   the machine's normalization vectors.

pub mod native;
pub mod state;

pub use self::native::{load_model, read_model, save_model, write_model};
pub use self::state::{MachineState, STATE_FORMAT_VERSION};

use std::path::Path;

/// On-disk representation of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Native,
    State,
}

impl ModelFormat {
    /// Whether saving in this format keeps the input normalization
    pub fn preserves_normalization(&self) -> bool {
        matches!(self, ModelFormat::State)
    }

    /// Guess the format from a file extension: `.json` is a state container,
    /// anything else a LIBSVM model
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ModelFormat::State,
            _ => ModelFormat::Native,
        }
    }
}
