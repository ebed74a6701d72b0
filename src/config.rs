//! # Compiler Options
//!
//! Everything is optional in the JSON form; missing fields take defaults.
//!
//! ```json
//! {
//!   "default_location": "./behaviors",
//!   "alias_separator": "_",
//!   "layout": { "columns": 4 }
//! }
//! ```

use crate::error::LoadError;
use crate::model::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directory default for behavior references with no other location
pub const DEFAULT_LOCATION: &str = "./";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Location used when neither the reference nor an enclosing library
    /// names one
    pub default_location: String,

    /// Joins an identifier and its ordinal when an alias is needed
    pub alias_separator: String,

    /// Record a diagnostic for every output variant with no destination
    pub report_empty_rows: bool,

    /// Auto-placement used when visual data is missing
    pub layout: LayoutOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            default_location: DEFAULT_LOCATION.to_string(),
            alias_separator: "_".to_string(),
            report_empty_rows: true,
            layout: LayoutOptions::default(),
        }
    }
}

impl CompilerOptions {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read options from a file, falling back to defaults when the file is
    /// missing or malformed
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("[CONFIG] No options at {}: {}", path.display(), err);
                return Self::default();
            }
        };

        match Self::from_json(&text) {
            Ok(options) => {
                tracing::info!("[CONFIG] Loaded options from {}", path.display());
                options
            }
            Err(err) => {
                tracing::warn!("[CONFIG] Ignoring malformed options in {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}

/// Grid used to place nodes and buses that have no stored geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub origin: Point,
    pub node_width: f64,
    pub node_height: f64,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
    pub columns: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            origin: Point::new(40.0, 40.0),
            node_width: 160.0,
            node_height: 80.0,
            horizontal_spacing: 60.0,
            vertical_spacing: 50.0,
            columns: 4,
        }
    }
}
