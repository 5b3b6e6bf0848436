//! Configuration file loading and parsing

use crate::error::{Error, Result};
use crate::types::Config;
use camino::Utf8Path;
use std::fs;
use std::io::Read;
use tracing::debug;

/// Path argument that selects standard input instead of a file
pub const STDIN_PATH: &str = "-";

impl Config {
    /// Load configuration from a JSON file, or from stdin when `path` is `-`
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if path.as_str() == STDIN_PATH {
            debug!("Reading configuration from stdin");
            return Self::from_reader(std::io::stdin().lock());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        debug!("Loaded configuration from {}", path);
        Self::from_json(&content)
    }

    /// Parse configuration from any reader
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
