//! Centralized runtime options with TOML preset support.
//!
//! All tunables (geometry service endpoint, rack layout constants, handle
//! snapping, material presets) are consolidated here. Options serialize
//! to/from TOML so deployments can keep presets next to the binary.

mod handle;
mod layout;
mod materials;
mod service;

use std::path::Path;

pub use handle::HandleOptions;
pub use layout::LayoutOptions;
pub use materials::{MaterialOptions, MaterialPreset};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use service::ServiceOptions;

use crate::error::RackroomError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[service]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Geometry generation service connection.
    pub service: ServiceOptions,
    /// Rack placement and sub-assembly layout.
    pub layout: LayoutOptions,
    /// Transform handle snapping.
    pub handle: HandleOptions,
    /// Render material presets.
    #[schemars(skip)]
    pub materials: MaterialOptions,
}

impl Options {
    /// Generate JSON Schema describing the user-facing options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`RackroomError::Io`] when the file cannot be read and
    /// [`RackroomError::OptionsParse`] when it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, RackroomError> {
        let content =
            std::fs::read_to_string(path).map_err(RackroomError::Io)?;
        toml::from_str(&content)
            .map_err(|e| RackroomError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`RackroomError::OptionsParse`] on serialization failure and
    /// [`RackroomError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), RackroomError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RackroomError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RackroomError::Io)?;
        }
        std::fs::write(path, content).map_err(RackroomError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}
